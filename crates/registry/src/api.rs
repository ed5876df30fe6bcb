//! Registered API definitions.
//!
//! The catalog answers two questions for the rest of the service: "which
//! APIs may an agent see?" (capability projection) and "which API does this
//! URL belong to?" (validator domain lookup).

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use a2e_core::ApiId;
use a2e_error::Result;

use crate::search::{keyword_score, rank, SemanticIndex};

/// One endpoint of a registered API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub path: String,
    pub method: String,
    #[serde(default)]
    pub description: String,
    /// Free-form parameter schema, passed through to the capability view.
    #[serde(default)]
    pub parameters: Value,
}

/// A registered API: base URL plus its declared endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiDefinition {
    pub id: ApiId,
    pub name: String,
    pub base_url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
}

impl ApiDefinition {
    /// Host component of the base URL, if it parses.
    pub fn host(&self) -> Option<String> {
        Url::parse(&self.base_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_owned))
    }
}

/// An endpoint search hit.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointMatch {
    pub api_id: ApiId,
    pub endpoint: Endpoint,
    pub score: f64,
}

#[derive(Serialize, Deserialize)]
struct ApiCatalogFile {
    apis: Vec<ApiDefinition>,
}

/// The API definition catalog.
pub struct ApiCatalog {
    apis: BTreeMap<ApiId, ApiDefinition>,
    semantic: Option<Arc<dyn SemanticIndex>>,
}

impl ApiCatalog {
    pub fn new() -> Self {
        Self {
            apis: BTreeMap::new(),
            semantic: None,
        }
    }

    /// Attach the optional semantic-search collaborator.
    pub fn with_semantic_index(mut self, index: Arc<dyn SemanticIndex>) -> Self {
        self.semantic = Some(index);
        self
    }

    /// Load a catalog from its JSON document (`{"apis": [...]}`).
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let file: ApiCatalogFile = serde_json::from_str(&raw)?;
        let mut catalog = Self::new();
        for api in file.apis {
            catalog.insert(api);
        }
        debug!(apis = catalog.apis.len(), "loaded API catalog");
        Ok(catalog)
    }

    /// Register or replace an API definition.
    pub fn insert(&mut self, api: ApiDefinition) {
        self.apis.insert(api.id.clone(), api);
    }

    pub fn list(&self) -> Vec<&ApiDefinition> {
        self.apis.values().collect()
    }

    pub fn get(&self, id: &ApiId) -> Option<&ApiDefinition> {
        self.apis.get(id)
    }

    pub fn len(&self) -> usize {
        self.apis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apis.is_empty()
    }

    /// Find the API whose base URL host matches the given host.
    pub fn api_for_host(&self, host: &str) -> Option<&ApiDefinition> {
        self.apis
            .values()
            .find(|api| api.host().is_some_and(|h| h == host))
    }

    /// Find the declared endpoint for `(method, path)` within one API.
    pub fn find_endpoint(&self, id: &ApiId, method: &str, path: &str) -> Option<&Endpoint> {
        self.get(id)?.endpoints.iter().find(|ep| {
            ep.path == path && ep.method.eq_ignore_ascii_case(method)
        })
    }

    /// Push every definition into the semantic index, metadata only.
    pub async fn index_all(&self) -> Result<()> {
        let Some(index) = &self.semantic else {
            return Ok(());
        };
        for api in self.apis.values() {
            let text = format!("{} {} {}", api.name, api.description, api.base_url);
            index
                .index("api", api.id.as_str(), &text, serde_json::to_value(api)?)
                .await?;
        }
        Ok(())
    }

    /// Search registered APIs, semantically when possible.
    pub async fn search_apis(&self, query: &str, top_k: usize) -> Result<Vec<(f64, ApiDefinition)>> {
        if let Some(index) = &self.semantic {
            match index.search(query, Some("api"), top_k).await {
                Ok(hits) => {
                    let mut out = Vec::new();
                    for hit in hits {
                        if let Ok(api) = serde_json::from_value::<ApiDefinition>(hit.payload) {
                            out.push((hit.score, api));
                        }
                    }
                    return Ok(out);
                }
                Err(err) => {
                    warn!(error = %err, "semantic API search failed, falling back to keywords");
                }
            }
        }
        Ok(self.keyword_search_apis(query, top_k))
    }

    fn keyword_search_apis(&self, query: &str, top_k: usize) -> Vec<(f64, ApiDefinition)> {
        let candidates = self
            .apis
            .values()
            .map(|api| {
                let score = keyword_score(
                    query,
                    &[
                        (api.description.as_str(), 3),
                        (api.name.as_str(), 2),
                        (api.id.as_str(), 1),
                    ],
                );
                (score, api.id.to_string(), api.clone())
            })
            .collect();
        rank(candidates, top_k)
            .into_iter()
            .map(|(score, api)| (f64::from(score), api))
            .collect()
    }

    /// Search declared endpoints across all APIs (or one, when `api` given).
    pub fn search_endpoints(
        &self,
        query: &str,
        api: Option<&ApiId>,
        top_k: usize,
    ) -> Vec<EndpointMatch> {
        let mut candidates = Vec::new();
        for def in self.apis.values() {
            if api.is_some_and(|wanted| wanted != &def.id) {
                continue;
            }
            for ep in &def.endpoints {
                let score = keyword_score(
                    query,
                    &[(ep.description.as_str(), 2), (ep.path.as_str(), 1)],
                );
                let tie = format!("{}{}", def.id, ep.path);
                candidates.push((score, tie, (def.id.clone(), ep.clone())));
            }
        }
        rank(candidates, top_k)
            .into_iter()
            .map(|(score, (api_id, endpoint))| EndpointMatch {
                api_id,
                endpoint,
                score: f64::from(score),
            })
            .collect()
    }
}

impl Default for ApiCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ApiCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCatalog")
            .field("apis", &self.apis.len())
            .field("semantic", &self.semantic.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn user_api() -> ApiDefinition {
        ApiDefinition {
            id: ApiId::new("user-api").unwrap(),
            name: "User API".into(),
            base_url: "https://api.example.com".into(),
            description: "Manages users and their points".into(),
            endpoints: vec![
                Endpoint {
                    path: "/users".into(),
                    method: "GET".into(),
                    description: "List all users".into(),
                    parameters: Value::Null,
                },
                Endpoint {
                    path: "/users/{id}".into(),
                    method: "GET".into(),
                    description: "Fetch one user".into(),
                    parameters: Value::Null,
                },
            ],
        }
    }

    fn catalog() -> ApiCatalog {
        let mut catalog = ApiCatalog::new();
        catalog.insert(user_api());
        catalog
    }

    #[test]
    fn api_for_host_matches_base_url_domain() {
        let catalog = catalog();
        let api = catalog.api_for_host("api.example.com").unwrap();
        assert_eq!(api.id, "user-api");
        assert!(catalog.api_for_host("other.example.com").is_none());
    }

    #[test]
    fn find_endpoint_matches_method_case_insensitively() {
        let catalog = catalog();
        let id = ApiId::new("user-api").unwrap();
        assert!(catalog.find_endpoint(&id, "get", "/users").is_some());
        assert!(catalog.find_endpoint(&id, "POST", "/users").is_none());
        assert!(catalog.find_endpoint(&id, "GET", "/missing").is_none());
    }

    #[tokio::test]
    async fn search_falls_back_to_keywords_without_index() {
        let catalog = catalog();
        let hits = catalog.search_apis("users", 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].1.id, "user-api");
    }

    #[test]
    fn endpoint_search_ranks_description_above_path() {
        let catalog = catalog();
        let hits = catalog.search_endpoints("users", None, 5);
        assert_eq!(hits.len(), 2);
        // "List all users" scores 2 (description) + 1 (path); the other only 1.
        assert_eq!(hits[0].endpoint.path, "/users");
    }

    #[test]
    fn load_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("apis.json");
        let doc = serde_json::json!({ "apis": [user_api()] });
        std::fs::write(&path, serde_json::to_string_pretty(&doc).unwrap()).unwrap();

        let catalog = ApiCatalog::load_file(&path).unwrap();
        assert_eq!(catalog.len(), 1);
        assert!(catalog.get(&ApiId::new("user-api").unwrap()).is_some());
    }
}
