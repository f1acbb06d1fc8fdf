use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{class_exists, db_conn, required_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use uuid::Uuid;

const USER_TYPES: &[&str] = &["student", "parent", "teacher"];

fn handle_members_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Err(e) = class_exists(conn, req, &class_id) {
        return e;
    }

    let mut stmt = match conn.prepare(
        "SELECT id, name, user_type, sort_order
         FROM members
         WHERE class_id = ?
         ORDER BY sort_order",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([&class_id], |r| {
            let id: String = r.get(0)?;
            let name: String = r.get(1)?;
            let user_type: String = r.get(2)?;
            let sort_order: i64 = r.get(3)?;
            Ok(json!({
                "id": id,
                "name": name,
                "userType": user_type,
                "sortOrder": sort_order
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(members) => ok(&req.id, json!({ "members": members })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_members_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let user_type = req
        .params
        .get("userType")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_ascii_lowercase())
        .unwrap_or_else(|| "student".to_string());
    if !USER_TYPES.contains(&user_type.as_str()) {
        return err(
            &req.id,
            "bad_params",
            "userType must be one of: student, parent, teacher",
            Some(json!({ "userType": user_type })),
        );
    }
    if let Err(e) = class_exists(conn, req, &class_id) {
        return e;
    }

    let next_sort: i64 = match conn.query_row(
        "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM members WHERE class_id = ?",
        [&class_id],
        |r| r.get(0),
    ) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let member_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO members(id, class_id, name, user_type, sort_order) VALUES(?, ?, ?, ?, ?)",
        (&member_id, &class_id, &name, &user_type, next_sort),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "members" })),
        );
    }

    ok(
        &req.id,
        json!({ "memberId": member_id, "userType": user_type, "sortOrder": next_sort }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "members.list" => Some(handle_members_list(state, req)),
        "members.create" => Some(handle_members_create(state, req)),
        _ => None,
    }
}
