use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::db_conn;
use crate::ipc::types::{AppState, Request};
use crate::taxonomy::{parse_entries, TaxonomyEntry, TaxonomyRegistry};
use rusqlite::Connection;
use serde_json::json;
use std::path::Path;

pub const TAXONOMY_SETTINGS_KEY: &str = "taxonomy.entries";
pub const TAXONOMY_FILE_NAME: &str = "taxonomy.json";

/// Copies `<workspace>/taxonomy.json` into settings when present.
pub fn import_workspace_file(conn: &Connection, workspace: &Path) -> anyhow::Result<bool> {
    let file = workspace.join(TAXONOMY_FILE_NAME);
    if !file.is_file() {
        return Ok(false);
    }
    let text = std::fs::read_to_string(&file)?;
    let raw: serde_json::Value = serde_json::from_str(&text)?;
    let entries = parse_entries(&raw).map_err(anyhow::Error::msg)?;
    db::settings_set_json(conn, TAXONOMY_SETTINGS_KEY, &serde_json::to_value(&entries)?)?;
    Ok(true)
}

/// Stored taxonomy if one is saved and valid, otherwise the built-in default.
pub fn load_stored(conn: &Connection) -> (TaxonomyRegistry, &'static str) {
    match db::settings_get_json(conn, TAXONOMY_SETTINGS_KEY) {
        Ok(Some(raw)) => match parse_entries(&raw) {
            Ok(entries) => (TaxonomyRegistry::from_entries(entries), "workspace"),
            Err(e) => {
                tracing::warn!(error = %e, "stored taxonomy is invalid; using built-in");
                (TaxonomyRegistry::default(), "builtin")
            }
        },
        Ok(None) => (TaxonomyRegistry::default(), "builtin"),
        Err(e) => {
            tracing::warn!(error = %e, "failed to read stored taxonomy; using built-in");
            (TaxonomyRegistry::default(), "builtin")
        }
    }
}

fn entries_json(entries: &[TaxonomyEntry]) -> serde_json::Value {
    json!(entries)
}

fn handle_taxonomy_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "source": state.taxonomy_source,
            "entries": entries_json(state.taxonomy.entries())
        }),
    )
}

fn handle_taxonomy_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(raw) = req.params.get("entries") else {
        return err(&req.id, "bad_params", "missing entries", None);
    };
    let entries = match parse_entries(raw) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    if entries.is_empty() {
        return err(&req.id, "bad_params", "entries must not be empty", None);
    }
    if let Err(e) = db::settings_set_json(conn, TAXONOMY_SETTINGS_KEY, &entries_json(&entries)) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }

    let count = entries.len();
    state.taxonomy = TaxonomyRegistry::from_entries(entries);
    state.taxonomy_source = "workspace";
    tracing::info!(entries = count, "taxonomy replaced");
    ok(&req.id, json!({ "entryCount": count }))
}

fn handle_taxonomy_reset(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Err(e) = db::settings_delete(conn, TAXONOMY_SETTINGS_KEY) {
        return err(&req.id, "db_delete_failed", e.to_string(), None);
    }
    state.taxonomy = TaxonomyRegistry::default();
    state.taxonomy_source = "builtin";
    tracing::info!("taxonomy reset to built-in");
    ok(
        &req.id,
        json!({ "entryCount": state.taxonomy.entries().len() }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "taxonomy.get" => Some(handle_taxonomy_get(state, req)),
        "taxonomy.set" => Some(handle_taxonomy_set(state, req)),
        "taxonomy.reset" => Some(handle_taxonomy_reset(state, req)),
        _ => None,
    }
}
