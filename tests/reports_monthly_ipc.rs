mod test_support;

use serde_json::json;
use test_support::{request_err, request_ok, seed_class, spawn_sidecar, temp_dir};

fn day_record(student_id: &str, score: &str, unit: (&str, &str, &str)) -> serde_json::Value {
    json!({
        "studentId": student_id,
        "attendance": true,
        "assignment": true,
        "dailyTestScore": score,
        "subject": unit.0,
        "mainUnit": unit.1,
        "subUnit": unit.2
    })
}

const SEQ: (&str, &str, &str) = ("대수", "수열", "등차수열과 등비수열");
const DOT: (&str, &str, &str) = ("기하", "벡터", "내적 계산");

#[test]
fn monthly_student_report_from_stored_records() {
    let workspace = temp_dir("academyd-reports-monthly");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (class_id, ids) = seed_class(
        &mut stdin,
        &mut reader,
        &workspace,
        &[
            ("김민준", "student"),
            ("이서연", "student"),
            ("박지호", "student"),
            ("김민준 학부모", "parent"),
        ],
    );
    let (s, t, u, p) = (&ids[0], &ids[1], &ids[2], &ids[3]);

    let batches = [
        (
            "2025-06-02",
            vec![
                day_record(s, "8/10", SEQ),
                day_record(t, "9/10", SEQ),
                day_record(u, "7/10", SEQ),
                day_record(p, "10/10", SEQ),
            ],
        ),
        ("2025-06-09", vec![day_record(s, "9/10", SEQ)]),
        (
            "2025-06-16",
            vec![day_record(s, "4/10", DOT), day_record(t, "6/10", DOT)],
        ),
        ("2025-07-01", vec![day_record(s, "10/10", SEQ)]),
    ];
    for (i, (date, records)) in batches.iter().enumerate() {
        let res = request_ok(
            &mut stdin,
            &mut reader,
            &format!("up-{}", i),
            "records.upsert",
            json!({ "classId": class_id, "date": date, "records": records }),
        );
        assert_eq!(res.get("upserted").and_then(|v| v.as_u64()), Some(records.len() as u64));
    }

    let report = request_ok(
        &mut stdin,
        &mut reader,
        "r1",
        "reports.monthlyStudent",
        json!({ "classId": class_id, "studentId": s, "year": 2025, "month": 6 }),
    );

    assert_eq!(report.get("studentName").and_then(|v| v.as_str()), Some("김민준"));
    assert_eq!(report.get("className").and_then(|v| v.as_str()), Some("고2 수학 A반"));
    assert_eq!(report.get("totalCorrect").and_then(|v| v.as_f64()), Some(21.0));
    assert_eq!(report.get("totalQuestions").and_then(|v| v.as_f64()), Some(30.0));
    assert_eq!(report.get("totalPercentage").and_then(|v| v.as_i64()), Some(70));
    assert_eq!(report.get("avgPercentile").and_then(|v| v.as_i64()), Some(72));

    let units = report
        .get("subUnitList")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    let subjects: Vec<&str> = units
        .iter()
        .filter_map(|u| u.get("subject").and_then(|v| v.as_str()))
        .collect();
    assert_eq!(subjects, vec!["대수", "기하"]);

    let strong = report.get("strongUnits").and_then(|v| v.as_array()).expect("strongUnits");
    assert_eq!(strong.len(), 1);
    assert_eq!(strong[0].get("subUnit").and_then(|v| v.as_str()), Some("등차수열과 등비수열"));
    assert_eq!(strong[0].get("percentage").and_then(|v| v.as_i64()), Some(85));

    let weak = report.get("weakUnits").and_then(|v| v.as_array()).expect("weakUnits");
    assert_eq!(weak.len(), 1);
    assert_eq!(weak[0].get("subUnit").and_then(|v| v.as_str()), Some("내적 계산"));
    assert_eq!(weak[0].get("percentage").and_then(|v| v.as_i64()), Some(40));

    let chart = report.get("chartData").and_then(|v| v.as_array()).expect("chartData");
    let dates: Vec<&str> = chart
        .iter()
        .filter_map(|p| p.get("date").and_then(|v| v.as_str()))
        .collect();
    assert_eq!(dates, vec!["2025-06-02", "2025-06-09", "2025-06-16"]);
    for point in chart {
        assert!(point.get("myScore").map(|v| !v.is_null()).unwrap_or(false));
    }
    // The parent's 100 is not part of the class statistics.
    assert_eq!(chart[0].get("maxScore").and_then(|v| v.as_i64()), Some(90));
    assert_eq!(chart[0].get("classAverage").and_then(|v| v.as_i64()), Some(80));

    let attendance = report.get("attendance").expect("attendance");
    assert_eq!(attendance.get("recordedDays").and_then(|v| v.as_u64()), Some(3));
    assert_eq!(attendance.get("rate").and_then(|v| v.as_i64()), Some(100));

    // Same input twice gives the same report.
    let again = request_ok(
        &mut stdin,
        &mut reader,
        "r2",
        "reports.monthlyStudent",
        json!({ "classId": class_id, "studentId": s, "year": 2025, "month": 6 }),
    );
    assert_eq!(report, again);

    drop(stdin);
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn monthly_report_for_empty_month_is_zeroed() {
    let workspace = temp_dir("academyd-reports-empty");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let (class_id, ids) = seed_class(&mut stdin, &mut reader, &workspace, &[("학생", "student")]);

    let report = request_ok(
        &mut stdin,
        &mut reader,
        "r1",
        "reports.monthlyStudent",
        json!({ "classId": class_id, "studentId": ids[0], "year": 2025, "month": 2 }),
    );
    assert_eq!(report.get("totalPercentage").and_then(|v| v.as_i64()), Some(0));
    assert_eq!(report.get("avgPercentile").and_then(|v| v.as_i64()), Some(0));
    for key in ["subUnitList", "strongUnits", "weakUnits", "chartData"] {
        assert_eq!(
            report.get(key).and_then(|v| v.as_array()).map(|a| a.len()),
            Some(0),
            "{} should be empty",
            key
        );
    }
    assert!(report.get("monthlyEvaluation").map(|v| v.is_null()).unwrap_or(false));

    drop(stdin);
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn monthly_report_param_errors() {
    let workspace = temp_dir("academyd-reports-errors");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let code = request_err(
        &mut stdin,
        &mut reader,
        "0",
        "reports.monthlyStudent",
        json!({ "classId": "x", "studentId": "y", "year": 2025, "month": 6 }),
    );
    assert_eq!(code, "no_workspace");

    let (class_id, _ids) = seed_class(&mut stdin, &mut reader, &workspace, &[("학생", "student")]);
    let code = request_err(
        &mut stdin,
        &mut reader,
        "1",
        "reports.monthlyStudent",
        json!({ "classId": class_id, "studentId": "nobody", "year": 2025, "month": 6 }),
    );
    assert_eq!(code, "not_found");

    let code = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "reports.monthlyStudent",
        json!({ "classId": class_id, "studentId": "nobody", "year": 2025, "month": 13 }),
    );
    assert_eq!(code, "bad_params");

    let code = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "reports.monthlyStudent",
        json!({ "classId": "missing-class", "studentId": "nobody", "year": 2025, "month": 6 }),
    );
    assert_eq!(code, "not_found");

    drop(stdin);
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn monthly_report_from_inline_records_without_workspace() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let report = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "reports.monthlyFromRecords",
        json!({
            "year": 2025,
            "month": 6,
            "studentId": "S",
            "studentName": "Student S",
            "className": "C",
            "days": [
                { "date": "2025-06-02", "records": [
                    { "studentId": { "_id": "S", "userType": "student" }, "dailyTestScore": "8/10",
                      "subject": "대수", "mainUnit": "수열", "subUnit": "등차수열과 등비수열" },
                    { "studentId": { "_id": "P", "userType": "parent" }, "dailyTestScore": "10/10",
                      "subject": "대수", "mainUnit": "수열", "subUnit": "등차수열과 등비수열" }
                ]},
                { "date": "2025-06-09", "records": [
                    { "studentId": { "_id": "S", "userType": "student" }, "dailyTestScore": "9/10",
                      "subject": "대수", "mainUnit": "수열", "subUnit": "등차수열과 등비수열" }
                ]},
                { "date": "2025-06-16", "records": [
                    { "studentId": { "_id": "S", "userType": "student" }, "dailyTestScore": "4/10",
                      "monthlyEvaluationScore": 88,
                      "subject": "기하", "mainUnit": "벡터", "subUnit": "내적 계산" }
                ]}
            ]
        }),
    );
    assert_eq!(report.get("totalCorrect").and_then(|v| v.as_f64()), Some(21.0));
    assert_eq!(report.get("totalQuestions").and_then(|v| v.as_f64()), Some(30.0));
    assert_eq!(report.get("totalPercentage").and_then(|v| v.as_i64()), Some(70));
    assert_eq!(report.get("avgPercentile").and_then(|v| v.as_i64()), Some(100));
    assert_eq!(
        report
            .get("monthlyEvaluation")
            .and_then(|v| v.get("score"))
            .and_then(|v| v.as_i64()),
        Some(88)
    );

    let code = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "reports.monthlyFromRecords",
        json!({
            "year": 2025,
            "month": 6,
            "studentId": "S",
            "days": [{ "date": "2025-06-02", "records": [{ "dailyTestScore": "8/10" }] }]
        }),
    );
    assert_eq!(code, "bad_params");

    drop(stdin);
}
