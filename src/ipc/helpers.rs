use rusqlite::{Connection, OptionalExtension};

use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn required_i64(req: &Request, key: &str) -> Result<i64, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| err(&req.id, "bad_params", format!("{} must be an integer", key), None))
}

/// `year` and `month` params, checked for range before any chrono conversion.
pub fn year_month(req: &Request) -> Result<(i32, u32), serde_json::Value> {
    let year = required_i64(req, "year")?;
    let month = required_i64(req, "month")?;
    if !(1..=9999).contains(&year) || !(1..=12).contains(&month) {
        return Err(err(
            &req.id,
            "bad_params",
            "year must be 1..=9999 and month 1..=12",
            Some(serde_json::json!({ "year": year, "month": month })),
        ));
    }
    Ok((year as i32, month as u32))
}

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn class_exists(conn: &Connection, req: &Request, class_id: &str) -> Result<(), serde_json::Value> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM classes WHERE id = ?", [class_id], |r| r.get(0))
        .optional()
        .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))?;
    if found.is_none() {
        return Err(err(&req.id, "not_found", "class not found", None));
    }
    Ok(())
}
