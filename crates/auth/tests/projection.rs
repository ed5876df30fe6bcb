//! Properties of the capability projection: applying the filter twice gives
//! the same view as applying it once, and an empty allow-list admits
//! everything.

use std::collections::BTreeMap;

use proptest::prelude::*;

use a2e_auth::AgentDirectory;
use a2e_core::{AgentId, ApiId, CredentialId};
use a2e_credential::{CredentialKind, CredentialMetadata};
use a2e_registry::ApiDefinition;

fn api(id: &str) -> ApiDefinition {
    ApiDefinition {
        id: ApiId::new(id).unwrap(),
        name: id.to_string(),
        base_url: format!("https://{id}.example.com"),
        description: String::new(),
        endpoints: vec![],
    }
}

fn credential(id: &str) -> CredentialMetadata {
    CredentialMetadata {
        id: CredentialId::new(id).unwrap(),
        kind: CredentialKind::ApiKey,
        metadata: BTreeMap::new(),
        description: String::new(),
    }
}

prop_compose! {
    fn id_vec()(ids in proptest::collection::vec("[a-z]{3,8}", 0..6)) -> Vec<String> {
        ids
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn projection_is_idempotent(
        catalog_apis in id_vec(),
        allowed_apis in id_vec(),
        catalog_creds in id_vec(),
        allowed_creds in id_vec(),
        allowed_ops in proptest::collection::vec("[A-Z][a-zA-Z]{3,10}", 0..4),
    ) {
        let directory = AgentDirectory::new();
        let agent = AgentId::new("prober").unwrap();
        directory.register(
            agent.clone(),
            "Prober",
            allowed_apis.iter().map(|a| ApiId::new(a).unwrap()).collect(),
            allowed_creds.iter().map(|c| CredentialId::new(c).unwrap()).collect(),
            allowed_ops,
            BTreeMap::new(),
        ).unwrap();

        let apis: Vec<ApiDefinition> = catalog_apis.iter().map(|a| api(a)).collect();
        let creds: Vec<CredentialMetadata> = catalog_creds.iter().map(|c| credential(c)).collect();
        let ops = vec!["ApiCall".to_string(), "FilterData".to_string()];

        let once = directory.filter_capabilities(&agent, apis, creds, ops);
        let twice = directory.filter_capabilities(
            &agent,
            once.available_apis.clone(),
            once.available_credentials.iter().map(|c| c.credential.clone()).collect(),
            once.supported_operations.clone(),
        );

        prop_assert_eq!(
            serde_json::to_value(&once).unwrap(),
            serde_json::to_value(&twice).unwrap()
        );
    }

    #[test]
    fn empty_allow_list_admits_every_resource(
        resources in proptest::collection::vec("[a-z]{3,10}", 1..8),
    ) {
        let directory = AgentDirectory::new();
        let agent = AgentId::new("open").unwrap();
        directory
            .register(agent.clone(), "Open", vec![], vec![], vec![], BTreeMap::new())
            .unwrap();

        for resource in &resources {
            prop_assert!(directory.is_api_allowed(&agent, &ApiId::new(resource).unwrap()));
            prop_assert!(
                directory.is_credential_allowed(&agent, &CredentialId::new(resource).unwrap())
            );
            prop_assert!(directory.is_operation_allowed(&agent, resource));
        }
    }
}
