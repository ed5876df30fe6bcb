//! Property: secret-shaped values written through the journal never reach
//! the file bytes.

use chrono::Utc;
use proptest::prelude::*;
use serde_json::json;

use a2e_core::{ExecutionId, OperationId};
use a2e_journal::{AuditEvent, AuditJournal};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn secrets_under_sensitive_keys_never_reach_disk(
        secret in "[A-Za-z0-9]{16,40}",
        key in prop_oneof![
            Just("Authorization"),
            Just("X-API-Key"),
            Just("password"),
            Just("apiToken"),
            Just("client_secret"),
            Just("auth_header"),
        ],
    ) {
        let dir = tempfile::tempdir().unwrap();
        let journal = AuditJournal::open(dir.path()).unwrap();

        journal.append(&AuditEvent::OperationStart {
            timestamp: Utc::now(),
            execution_id: ExecutionId::new(),
            operation_id: OperationId::new("fetch").unwrap(),
            kind: "ApiCall".into(),
            config: json!({
                "url": "https://api.example.com/users",
                "headers": { key: format!("Bearer {secret}") },
                "nested": { "inner": { key: secret.clone() } }
            }),
        }).unwrap();

        for entry in std::fs::read_dir(dir.path()).unwrap() {
            let content = std::fs::read_to_string(entry.unwrap().path()).unwrap();
            prop_assert!(!content.contains(secret.as_str()));
        }
    }
}
