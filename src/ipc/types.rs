use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::taxonomy::TaxonomyRegistry;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub taxonomy: TaxonomyRegistry,
    pub taxonomy_source: &'static str,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            workspace: None,
            db: None,
            taxonomy: TaxonomyRegistry::default(),
            taxonomy_source: "builtin",
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
