//! PostgreSQL for integration tests
//!
//! `TestDatabase::start` connects to `SETTLEMENT_TEST_DATABASE_URL` when it
//! is set and otherwise runs a throwaway `postgres:16-alpine` container that
//! lives as long as the returned value. The schema is left to the caller.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use testcontainers_modules::postgres::Postgres;
use testcontainers_modules::testcontainers::runners::AsyncRunner;
use testcontainers_modules::testcontainers::{ContainerAsync, ImageExt};

/// Overrides the container with an existing database
pub const DATABASE_URL_VAR: &str = "SETTLEMENT_TEST_DATABASE_URL";

const POSTGRES_TAG: &str = "16-alpine";
const POSTGRES_USER: &str = "settlement";
const POSTGRES_PASSWORD: &str = "settlement";
const POSTGRES_DB: &str = "settlement_test";

pub type TestDatabaseError = Box<dyn std::error::Error + Send + Sync>;

/// A reachable PostgreSQL database
pub struct TestDatabase {
    _container: Option<ContainerAsync<Postgres>>,
    url: String,
    pool: PgPool,
}

impl TestDatabase {
    pub async fn start() -> Result<Self, TestDatabaseError> {
        let (container, url) = match std::env::var(DATABASE_URL_VAR) {
            Ok(url) => (None, url),
            Err(_) => {
                let container = Postgres::default()
                    .with_user(POSTGRES_USER)
                    .with_password(POSTGRES_PASSWORD)
                    .with_db_name(POSTGRES_DB)
                    .with_tag(POSTGRES_TAG)
                    .start()
                    .await?;
                let host = container.get_host().await?;
                let port = container.get_host_port_ipv4(5432).await?;
                (Some(container), connection_url(&host.to_string(), port))
            }
        };

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&url)
            .await?;

        Ok(Self {
            _container: container,
            url,
            pool,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

fn connection_url(host: &str, port: u16) -> String {
    format!(
        "postgres://{}:{}@{}:{}/{}",
        POSTGRES_USER, POSTGRES_PASSWORD, host, port, POSTGRES_DB
    )
}
