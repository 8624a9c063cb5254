//! Unit tests for the Identifiers module
//!
//! Tests cover identifier creation, parsing, conversion
//! and display formatting.

use core_kernel::{AccountId, LedgerEventId, ObligationId, RevenueId, TickId};
use std::collections::HashSet;
use uuid::Uuid;

mod obligation_id_tests {
    use super::*;

    #[test]
    fn test_new_generates_unique_ids() {
        let id1 = ObligationId::new();
        let id2 = ObligationId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_new_v7_generates_time_ordered_ids() {
        let id1 = ObligationId::new_v7();
        std::thread::sleep(std::time::Duration::from_millis(1));
        let id2 = ObligationId::new_v7();
        assert!(id1 < id2);
    }

    #[test]
    fn test_from_uuid() {
        let uuid = Uuid::new_v4();
        let id = ObligationId::from_uuid(uuid);
        assert_eq!(*id.as_uuid(), uuid);
    }

    #[test]
    fn test_prefix_and_display() {
        assert_eq!(ObligationId::prefix(), "OBL");
        assert!(ObligationId::new().to_string().starts_with("OBL-"));
    }

    #[test]
    fn test_from_str_with_prefix() {
        let original = ObligationId::new();
        let parsed: ObligationId = original.to_string().parse().unwrap();
        assert_eq!(original, parsed);
    }

    #[test]
    fn test_from_str_without_prefix() {
        let uuid = Uuid::new_v4();
        let parsed: ObligationId = uuid.to_string().parse().unwrap();
        assert_eq!(*parsed.as_uuid(), uuid);
    }

    #[test]
    fn test_from_str_invalid() {
        assert!("OBL-not-a-uuid".parse::<ObligationId>().is_err());
    }
}

mod prefixes {
    use super::*;

    #[test]
    fn test_all_prefixes_are_distinct() {
        let prefixes: HashSet<&str> = [
            ObligationId::prefix(),
            RevenueId::prefix(),
            AccountId::prefix(),
            LedgerEventId::prefix(),
            TickId::prefix(),
        ]
        .into_iter()
        .collect();
        assert_eq!(prefixes.len(), 5);
    }

    #[test]
    fn test_revenue_and_account_display() {
        assert!(RevenueId::new().to_string().starts_with("REV-"));
        assert!(AccountId::new().to_string().starts_with("ACC-"));
        assert!(LedgerEventId::new().to_string().starts_with("LEV-"));
        assert!(TickId::new().to_string().starts_with("TCK-"));
    }
}

mod serde_tests {
    use super::*;

    #[test]
    fn test_serializes_as_bare_uuid() {
        let uuid = Uuid::new_v4();
        let id = AccountId::from_uuid(uuid);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", uuid));

        let back: AccountId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_uuid_conversion() {
        let id = RevenueId::new();
        let uuid: Uuid = id.into();
        assert_eq!(RevenueId::from(uuid), id);
    }
}
