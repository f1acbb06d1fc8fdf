use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

use super::taxonomy;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match db::open_db(&path) {
        Ok(conn) => {
            // Best-effort: a taxonomy.json dropped into the workspace replaces the
            // stored curriculum order. It must not prevent the workspace from opening.
            if let Err(e) = taxonomy::import_workspace_file(&conn, &path) {
                tracing::warn!(error = %e, "ignoring unreadable taxonomy.json");
            }
            let (registry, source) = taxonomy::load_stored(&conn);
            tracing::info!(
                workspace = %path.display(),
                taxonomy_source = source,
                taxonomy_entries = registry.entries().len(),
                "workspace opened"
            );

            state.workspace = Some(path.clone());
            state.taxonomy = registry;
            state.taxonomy_source = source;
            state.db = Some(conn);
            ok(
                &req.id,
                json!({
                    "workspacePath": path.to_string_lossy(),
                    "taxonomySource": source
                }),
            )
        }
        Err(e) => err(&req.id, "db_open_failed", format!("{e:?}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
