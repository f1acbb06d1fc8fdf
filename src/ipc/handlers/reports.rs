use crate::db;
use crate::ipc::error::{calc_err, err, ok};
use crate::ipc::helpers::{class_exists, db_conn, required_str, year_month};
use crate::ipc::types::{AppState, Request};
use crate::report::{self, MonthInput};
use serde_json::json;

use super::setup;

fn optional_str(req: &Request, key: &str) -> String {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

fn handle_reports_monthly_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let (year, month) = match year_month(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Err(e) = class_exists(conn, req, &class_id) {
        return e;
    }

    let class_name = match db::class_name(conn, &class_id) {
        Ok(v) => v.unwrap_or_default(),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let student_name = match db::member_name(conn, &class_id, &student_id) {
        Ok(Some(v)) => v,
        Ok(None) => return err(&req.id, "not_found", "student not found in class", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let options = match setup::report_options(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    // Every day of the month is collected before aggregation starts.
    let days = match db::fetch_month_days(conn, &class_id, year, month) {
        Ok(v) => v,
        Err(e) => return calc_err(&req.id, e),
    };

    let input = MonthInput {
        year,
        month,
        class_name,
        student_id,
        student_name,
        days,
    };
    match report::build_monthly_report(&input, &state.taxonomy, &options) {
        Ok(r) => ok(&req.id, json!(r)),
        Err(e) => calc_err(&req.id, e),
    }
}

fn handle_reports_monthly_from_records(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let (year, month) = match year_month(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(days_raw) = req.params.get("days") else {
        return err(&req.id, "bad_params", "missing days", None);
    };
    let days = match report::parse_month_days(days_raw) {
        Ok(v) => v,
        Err(e) => return calc_err(&req.id, e),
    };

    // Without a workspace the defaults apply.
    let options = match state.db.as_ref() {
        Some(conn) => match setup::report_options(conn) {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        },
        None => report::ReportOptions::default(),
    };

    let input = MonthInput {
        year,
        month,
        class_name: optional_str(req, "className"),
        student_id,
        student_name: optional_str(req, "studentName"),
        days,
    };
    match report::build_monthly_report(&input, &state.taxonomy, &options) {
        Ok(r) => ok(&req.id, json!(r)),
        Err(e) => calc_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.monthlyStudent" => Some(handle_reports_monthly_student(state, req)),
        "reports.monthlyFromRecords" => Some(handle_reports_monthly_from_records(state, req)),
        _ => None,
    }
}
