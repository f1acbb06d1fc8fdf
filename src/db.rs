use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

use crate::calc::CalcError;
use crate::report::{self, DayRecords, RawRecord};

pub const DB_FILE_NAME: &str = "academy.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        )",
        [],
    )?;

    // Members share one collection: students, parents and teachers all live
    // here and are told apart by user_type.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS members(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            name TEXT NOT NULL,
            user_type TEXT NOT NULL DEFAULT 'student',
            sort_order INTEGER NOT NULL,
            FOREIGN KEY(class_id) REFERENCES classes(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_members_class_sort ON members(class_id, sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS daily_records(
            class_id TEXT NOT NULL,
            member_id TEXT NOT NULL,
            date TEXT NOT NULL,
            attendance INTEGER NOT NULL DEFAULT 0,
            assignment INTEGER NOT NULL DEFAULT 0,
            daily_test_score TEXT,
            monthly_evaluation_score TEXT,
            subject TEXT,
            main_unit TEXT,
            sub_unit TEXT,
            updated_at TEXT,
            PRIMARY KEY(class_id, member_id, date),
            FOREIGN KEY(class_id) REFERENCES classes(id),
            FOREIGN KEY(member_id) REFERENCES members(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_daily_records_class_date ON daily_records(class_id, date)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row("SELECT value_json FROM settings WHERE key = ?", [key], |r| {
            r.get(0)
        })
        .optional()?;
    match raw {
        Some(text) => Ok(Some(serde_json::from_str(&text)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

pub fn settings_delete(conn: &Connection, key: &str) -> anyhow::Result<()> {
    conn.execute("DELETE FROM settings WHERE key = ?", [key])?;
    Ok(())
}

pub fn class_name(conn: &Connection, class_id: &str) -> anyhow::Result<Option<String>> {
    Ok(conn
        .query_row("SELECT name FROM classes WHERE id = ?", [class_id], |r| {
            r.get(0)
        })
        .optional()?)
}

pub fn member_name(conn: &Connection, class_id: &str, member_id: &str) -> anyhow::Result<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT name FROM members WHERE id = ? AND class_id = ?",
            (member_id, class_id),
            |r| r.get(0),
        )
        .optional()?)
}

fn score_to_text(v: &serde_json::Value) -> anyhow::Result<Option<String>> {
    if v.is_null() {
        Ok(None)
    } else {
        Ok(Some(serde_json::to_string(v)?))
    }
}

fn score_from_text(text: Option<String>) -> serde_json::Value {
    // Unreadable stored values degrade to "no score" like any other bad score.
    text.and_then(|t| serde_json::from_str(&t).ok())
        .unwrap_or(serde_json::Value::Null)
}

pub fn upsert_day_record(conn: &Connection, class_id: &str, record: &RawRecord) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO daily_records(
            class_id, member_id, date, attendance, assignment,
            daily_test_score, monthly_evaluation_score,
            subject, main_unit, sub_unit, updated_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(class_id, member_id, date) DO UPDATE SET
            attendance = excluded.attendance,
            assignment = excluded.assignment,
            daily_test_score = excluded.daily_test_score,
            monthly_evaluation_score = excluded.monthly_evaluation_score,
            subject = excluded.subject,
            main_unit = excluded.main_unit,
            sub_unit = excluded.sub_unit,
            updated_at = excluded.updated_at",
        rusqlite::params![
            class_id,
            record.student_id,
            record.date.to_string(),
            record.attendance as i64,
            record.assignment as i64,
            score_to_text(&record.daily_test_score)?,
            score_to_text(&record.monthly_evaluation_score)?,
            record.subject,
            record.main_unit,
            record.sub_unit,
            chrono::Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// All member records of one class on one date, in member sort order.
pub fn fetch_day_records(conn: &Connection, class_id: &str, date: NaiveDate) -> anyhow::Result<Vec<RawRecord>> {
    let mut stmt = conn.prepare(
        "SELECT r.member_id, m.user_type, r.attendance, r.assignment,
                r.daily_test_score, r.monthly_evaluation_score,
                r.subject, r.main_unit, r.sub_unit
         FROM daily_records r
         JOIN members m ON m.id = r.member_id
         WHERE r.class_id = ? AND r.date = ?
         ORDER BY m.sort_order, r.member_id",
    )?;
    let rows = stmt
        .query_map((class_id, date.to_string()), |r| {
            Ok(RawRecord {
                student_id: r.get(0)?,
                user_type: r.get(1)?,
                date,
                attendance: r.get::<_, i64>(2)? != 0,
                assignment: r.get::<_, i64>(3)? != 0,
                daily_test_score: score_from_text(r.get(4)?),
                monthly_evaluation_score: score_from_text(r.get(5)?),
                subject: r.get(6)?,
                main_unit: r.get(7)?,
                sub_unit: r.get(8)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Collects every calendar day of the month with one query per day.
///
/// A day whose query fails is logged and treated as a day without records;
/// the report never distinguishes the two.
pub fn fetch_month_days(
    conn: &Connection,
    class_id: &str,
    year: i32,
    month: u32,
) -> Result<Vec<DayRecords>, CalcError> {
    let days = report::days_of_month(year, month)?;
    Ok(days
        .into_iter()
        .map(|date| {
            let records = match fetch_day_records(conn, class_id, date) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(class_id, date = %date, error = %e, "day fetch failed; treating as empty");
                    Vec::new()
                }
            };
            DayRecords { date, records }
        })
        .collect())
}
