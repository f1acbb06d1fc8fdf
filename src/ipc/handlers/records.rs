use crate::db;
use crate::ipc::error::{calc_err, err, ok};
use crate::ipc::helpers::{class_exists, db_conn, required_str};
use crate::ipc::types::{AppState, Request};
use crate::report::{parse_date, parse_raw_record, RawRecord};
use rusqlite::Connection;
use serde_json::json;
use std::collections::HashSet;

fn class_member_ids(conn: &Connection, class_id: &str) -> rusqlite::Result<HashSet<String>> {
    let mut stmt = conn.prepare("SELECT id FROM members WHERE class_id = ?")?;
    let ids = stmt
        .query_map([class_id], |r| r.get::<_, String>(0))?
        .collect::<Result<HashSet<_>, _>>()?;
    Ok(ids)
}

fn handle_records_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let date_raw = match required_str(req, "date") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let date = match parse_date(&date_raw) {
        Ok(v) => v,
        Err(e) => return calc_err(&req.id, e),
    };
    let Some(items) = req.params.get("records").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "records must be an array", None);
    };
    if let Err(e) = class_exists(conn, req, &class_id) {
        return e;
    }

    // Validate the whole batch before touching storage.
    let records: Vec<RawRecord> = match items
        .iter()
        .map(|r| parse_raw_record(r, date))
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(v) => v,
        Err(e) => return calc_err(&req.id, e),
    };
    let members = match class_member_ids(conn, &class_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Some(unknown) = records.iter().find(|r| !members.contains(&r.student_id)) {
        return err(
            &req.id,
            "not_found",
            "studentId is not a member of this class",
            Some(json!({ "studentId": unknown.student_id })),
        );
    }

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };
    for r in &records {
        if let Err(e) = db::upsert_day_record(&tx, &class_id, r) {
            let _ = tx.rollback();
            return err(
                &req.id,
                "db_insert_failed",
                e.to_string(),
                Some(json!({ "table": "daily_records", "studentId": r.student_id })),
            );
        }
    }
    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    ok(&req.id, json!({ "upserted": records.len() }))
}

fn handle_records_day(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let date_raw = match required_str(req, "date") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let date = match parse_date(&date_raw) {
        Ok(v) => v,
        Err(e) => return calc_err(&req.id, e),
    };
    if let Err(e) = class_exists(conn, req, &class_id) {
        return e;
    }

    match db::fetch_day_records(conn, &class_id, date) {
        Ok(records) => {
            let records: Vec<serde_json::Value> = records.iter().map(|r| r.to_json()).collect();
            ok(&req.id, json!({ "date": date.to_string(), "records": records }))
        }
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "records.upsert" => Some(handle_records_upsert(state, req)),
        "records.day" => Some(handle_records_day(state, req)),
        _ => None,
    }
}
