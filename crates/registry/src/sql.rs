//! SQL query catalog.
//!
//! Operators register parameterized queries by id; agents only ever see the
//! catalog entries and reference them by identifier.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use a2e_core::QueryId;
use a2e_error::{A2eError, Result};

use crate::search::{keyword_score, rank, SemanticIndex};

/// One catalog entry: the SQL text plus the metadata agents search over.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlQuery {
    pub id: QueryId,
    pub sql: String,
    #[serde(default)]
    pub description: String,
    /// Which database this query targets (e.g. `"analytics"`).
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub category: String,
    /// Declared parameter names, in order.
    #[serde(default)]
    pub parameters: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct SqlCatalogFile {
    queries: Vec<SqlQuery>,
}

/// The SQL query catalog.
pub struct SqlCatalog {
    queries: BTreeMap<QueryId, SqlQuery>,
    semantic: Option<Arc<dyn SemanticIndex>>,
}

impl SqlCatalog {
    pub fn new() -> Self {
        Self {
            queries: BTreeMap::new(),
            semantic: None,
        }
    }

    pub fn with_semantic_index(mut self, index: Arc<dyn SemanticIndex>) -> Self {
        self.semantic = Some(index);
        self
    }

    /// Load a catalog from its JSON document (`{"queries": [...]}`).
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let file: SqlCatalogFile = serde_json::from_str(&raw)?;
        let mut catalog = Self::new();
        for query in file.queries {
            catalog.insert(query);
        }
        debug!(queries = catalog.queries.len(), "loaded SQL catalog");
        Ok(catalog)
    }

    /// Save the catalog back to its JSON document.
    pub fn save_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = SqlCatalogFile {
            queries: self.queries.values().cloned().collect(),
        };
        std::fs::write(path.as_ref(), serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }

    /// Register or replace a query.
    pub fn insert(&mut self, query: SqlQuery) {
        self.queries.insert(query.id.clone(), query);
    }

    /// Remove a query; error if it does not exist.
    pub fn remove(&mut self, id: &QueryId) -> Result<SqlQuery> {
        self.queries
            .remove(id)
            .ok_or_else(|| A2eError::not_found("SQL query", id))
    }

    pub fn get(&self, id: &QueryId) -> Option<&SqlQuery> {
        self.queries.get(id)
    }

    /// List entries, optionally filtered by database and category.
    pub fn list(&self, database: Option<&str>, category: Option<&str>) -> Vec<&SqlQuery> {
        self.queries
            .values()
            .filter(|q| database.is_none_or(|db| q.database == db))
            .filter(|q| category.is_none_or(|cat| q.category == cat))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// Push every entry into the semantic index.
    pub async fn index_all(&self) -> Result<()> {
        let Some(index) = &self.semantic else {
            return Ok(());
        };
        for query in self.queries.values() {
            let text = format!("{} {} {}", query.description, query.category, query.sql);
            index
                .index("sql", query.id.as_str(), &text, serde_json::to_value(query)?)
                .await?;
        }
        Ok(())
    }

    /// Search the catalog, semantically when possible.
    pub async fn search(
        &self,
        query: &str,
        database: Option<&str>,
        category: Option<&str>,
        top_k: usize,
    ) -> Result<Vec<(f64, SqlQuery)>> {
        if let Some(index) = &self.semantic {
            match index.search(query, Some("sql"), top_k * 2).await {
                Ok(hits) => {
                    let mut out = Vec::new();
                    for hit in hits {
                        let Ok(entry) = serde_json::from_value::<SqlQuery>(hit.payload) else {
                            continue;
                        };
                        if database.is_some_and(|db| entry.database != db)
                            || category.is_some_and(|cat| entry.category != cat)
                        {
                            continue;
                        }
                        out.push((hit.score, entry));
                        if out.len() == top_k {
                            break;
                        }
                    }
                    return Ok(out);
                }
                Err(err) => {
                    warn!(error = %err, "semantic SQL search failed, falling back to keywords");
                }
            }
        }
        Ok(self.keyword_search(query, database, category, top_k))
    }

    fn keyword_search(
        &self,
        query: &str,
        database: Option<&str>,
        category: Option<&str>,
        top_k: usize,
    ) -> Vec<(f64, SqlQuery)> {
        let candidates = self
            .list(database, category)
            .into_iter()
            .map(|entry| {
                let score = keyword_score(
                    query,
                    &[
                        (entry.description.as_str(), 3),
                        (entry.sql.as_str(), 2),
                        (entry.id.as_str(), 1),
                    ],
                );
                (score, entry.id.to_string(), entry.clone())
            })
            .collect();
        rank(candidates, top_k)
            .into_iter()
            .map(|(score, entry)| (f64::from(score), entry))
            .collect()
    }
}

impl Default for SqlCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SqlCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlCatalog")
            .field("queries", &self.queries.len())
            .field("semantic", &self.semantic.is_some())
            .finish()
    }
}
