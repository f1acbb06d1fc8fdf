use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::calc::{
    class_day_stats, mean_rounded, percentile_rank, ratio_percent, CalcError, ClassDayStats,
};
use crate::score::Score;
use crate::taxonomy::{TaxonomyRegistry, UnitKey};
use crate::units::{SubUnitStat, UnitClassifier};

pub const STUDENT_USER_TYPE: &str = "student";

/// One member's record for one day, as supplied by the persistence layer.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub student_id: String,
    pub user_type: String,
    pub date: NaiveDate,
    pub attendance: bool,
    pub assignment: bool,
    pub daily_test_score: Value,
    pub monthly_evaluation_score: Value,
    pub subject: Option<String>,
    pub main_unit: Option<String>,
    pub sub_unit: Option<String>,
}

impl RawRecord {
    pub fn is_student(&self) -> bool {
        self.user_type == STUDENT_USER_TYPE
    }

    pub fn unit_key(&self) -> UnitKey {
        UnitKey::new(
            self.subject.clone().unwrap_or_default(),
            self.main_unit.clone().unwrap_or_default(),
            self.sub_unit.clone().unwrap_or_default(),
        )
    }

    /// Wire shape shared with the UI: `studentId` is a populated member object.
    pub fn to_json(&self) -> Value {
        json!({
            "studentId": { "_id": self.student_id, "userType": self.user_type },
            "date": self.date.to_string(),
            "attendance": self.attendance,
            "assignment": self.assignment,
            "dailyTestScore": self.daily_test_score,
            "monthlyEvaluationScore": self.monthly_evaluation_score,
            "subject": self.subject,
            "mainUnit": self.main_unit,
            "subUnit": self.sub_unit,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DayRecords {
    pub date: NaiveDate,
    pub records: Vec<RawRecord>,
}

#[derive(Debug, Clone)]
pub struct MonthInput {
    pub year: i32,
    pub month: u32,
    pub class_name: String,
    pub student_id: String,
    pub student_name: String,
    pub days: Vec<DayRecords>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportOptions {
    pub strong_threshold: i64,
    pub weak_limit: usize,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            strong_threshold: 70,
            weak_limit: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPoint {
    pub date: NaiveDate,
    pub my_score: i64,
    pub class_average: Option<i64>,
    pub max_score: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyObservation {
    pub my_score: Option<i64>,
    pub class: ClassDayStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
    pub present_days: usize,
    pub recorded_days: usize,
    pub rate: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentSummary {
    pub completed_days: usize,
    pub recorded_days: usize,
    pub rate: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyEvaluation {
    pub date: NaiveDate,
    pub score: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyReport {
    pub year: i32,
    pub month: u32,
    pub class_name: String,
    pub student_id: String,
    pub student_name: String,
    pub total_correct: f64,
    pub total_questions: f64,
    pub total_percentage: i64,
    pub avg_percentile: i64,
    pub sub_unit_list: Vec<SubUnitStat>,
    pub strong_units: Vec<SubUnitStat>,
    pub weak_units: Vec<SubUnitStat>,
    pub chart_data: Vec<ChartPoint>,
    pub attendance: AttendanceSummary,
    pub assignment: AssignmentSummary,
    pub monthly_evaluation: Option<MonthlyEvaluation>,
}

pub fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate), CalcError> {
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| {
        CalcError::new("bad_params", "invalid year/month")
            .with_details(json!({ "year": year, "month": month }))
    })?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    let last = next
        .and_then(|d| d.pred_opt())
        .ok_or_else(|| CalcError::new("bad_params", "invalid year/month"))?;
    Ok((first, last))
}

pub fn days_of_month(year: i32, month: u32) -> Result<Vec<NaiveDate>, CalcError> {
    let (first, last) = month_bounds(year, month)?;
    Ok(first.iter_days().take_while(|d| *d <= last).collect())
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, CalcError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        CalcError::new("bad_params", "date must be YYYY-MM-DD")
            .with_details(json!({ "date": raw }))
    })
}

fn optional_tag(obj: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Boundary check for one incoming record. Records without a student id are
/// rejected here rather than silently skipped later.
pub fn parse_raw_record(raw: &Value, date: NaiveDate) -> Result<RawRecord, CalcError> {
    let Some(obj) = raw.as_object() else {
        return Err(CalcError::new("bad_params", "record must be an object"));
    };

    let (student_id, user_type) = match obj.get("studentId") {
        Some(Value::String(s)) => (s.trim().to_string(), STUDENT_USER_TYPE.to_string()),
        Some(Value::Object(member)) => {
            let id = member
                .get("_id")
                .and_then(|v| v.as_str())
                .map(|s| s.trim().to_string())
                .unwrap_or_default();
            let user_type = member
                .get("userType")
                .and_then(|v| v.as_str())
                .unwrap_or(STUDENT_USER_TYPE)
                .to_string();
            (id, user_type)
        }
        _ => (String::new(), String::new()),
    };
    if student_id.is_empty() {
        return Err(CalcError::new("bad_params", "record is missing studentId")
            .with_details(json!({ "date": date.to_string() })));
    }

    Ok(RawRecord {
        student_id,
        user_type,
        date,
        attendance: obj.get("attendance").and_then(|v| v.as_bool()).unwrap_or(false),
        assignment: obj.get("assignment").and_then(|v| v.as_bool()).unwrap_or(false),
        daily_test_score: obj.get("dailyTestScore").cloned().unwrap_or(Value::Null),
        monthly_evaluation_score: obj
            .get("monthlyEvaluationScore")
            .cloned()
            .unwrap_or(Value::Null),
        subject: optional_tag(obj, "subject"),
        main_unit: optional_tag(obj, "mainUnit"),
        sub_unit: optional_tag(obj, "subUnit"),
    })
}

/// Parses `[{ "date": "YYYY-MM-DD", "records": [...] }, ...]`.
pub fn parse_month_days(raw: &Value) -> Result<Vec<DayRecords>, CalcError> {
    let Some(days) = raw.as_array() else {
        return Err(CalcError::new("bad_params", "days must be an array"));
    };
    let mut out = Vec::with_capacity(days.len());
    for (i, day) in days.iter().enumerate() {
        let Some(date_raw) = day.get("date").and_then(|v| v.as_str()) else {
            return Err(CalcError::new("bad_params", format!("days[{i}].date is required")));
        };
        let date = parse_date(date_raw)?;
        let records = match day.get("records") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|r| parse_raw_record(r, date))
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => {
                return Err(CalcError::new(
                    "bad_params",
                    format!("days[{i}].records must be an array"),
                ))
            }
        };
        out.push(DayRecords { date, records });
    }
    Ok(out)
}

/// Sparse series for the trend chart: only dates with an own score, ascending.
pub fn build_chart_series(days: &BTreeMap<NaiveDate, DailyObservation>) -> Vec<ChartPoint> {
    days.iter()
        .filter_map(|(date, obs)| {
            obs.my_score.map(|my_score| ChartPoint {
                date: *date,
                my_score,
                class_average: obs.class.average,
                max_score: obs.class.max,
            })
        })
        .collect()
}

struct NormalizedRecord<'a> {
    raw: &'a RawRecord,
    key: UnitKey,
    daily: Score,
    monthly: Score,
}

pub fn build_monthly_report(
    input: &MonthInput,
    taxonomy: &TaxonomyRegistry,
    options: &ReportOptions,
) -> Result<MonthlyReport, CalcError> {
    let (first, last) = month_bounds(input.year, input.month)?;

    let mut by_date: BTreeMap<NaiveDate, Vec<NormalizedRecord>> = BTreeMap::new();
    for day in &input.days {
        if day.date < first || day.date > last {
            tracing::warn!(date = %day.date, year = input.year, month = input.month, "ignoring day outside report month");
            continue;
        }
        let bucket = by_date.entry(day.date).or_default();
        for r in day.records.iter().filter(|r| r.is_student()) {
            // One record per student per day; later duplicates are dropped
            // before class stats, peers and the student's own score see them.
            if bucket.iter().any(|n| n.raw.student_id == r.student_id) {
                tracing::warn!(date = %day.date, student_id = %r.student_id, "duplicate record for one day; keeping the first");
                continue;
            }
            bucket.push(NormalizedRecord {
                raw: r,
                key: r.unit_key(),
                daily: Score::from_value(Some(&r.daily_test_score)),
                monthly: Score::from_value(Some(&r.monthly_evaluation_score)),
            });
        }
    }

    let mut classifier = UnitClassifier::new();
    let mut observations: BTreeMap<NaiveDate, DailyObservation> = BTreeMap::new();
    let mut day_percentiles: Vec<i64> = Vec::new();
    let mut total_correct = 0.0;
    let mut total_questions = 0.0;
    let mut present_days = 0usize;
    let mut completed_days = 0usize;
    let mut recorded_days = 0usize;
    let mut monthly_evaluation: Option<MonthlyEvaluation> = None;

    for (date, records) in &by_date {
        let class_scores: Vec<i64> = records.iter().filter_map(|r| r.daily.percent()).collect();
        let class = class_day_stats(*date, &class_scores);

        let own = records
            .iter()
            .find(|r| r.raw.student_id == input.student_id);

        let mut my_score = None;
        if let Some(own) = own {
            recorded_days += 1;
            if own.raw.attendance {
                present_days += 1;
            }
            if own.raw.assignment {
                completed_days += 1;
            }
            if let Some(score) = own.monthly.percent() {
                monthly_evaluation = Some(MonthlyEvaluation { date: *date, score });
            }

            if let Some(mine) = own.daily.percent() {
                let peers: Vec<i64> = records
                    .iter()
                    .filter(|r| r.key == own.key)
                    .filter_map(|r| r.daily.percent())
                    .collect();
                let percentile = percentile_rank(mine, &peers);
                day_percentiles.push(percentile);
                my_score = Some(mine);

                if let Some((correct, total)) = own.daily.fraction() {
                    total_correct += correct;
                    total_questions += total;
                }
                classifier.record(&own.key, &own.daily, Some(percentile));
            }
        }

        observations.insert(*date, DailyObservation { my_score, class });
    }

    let mut sub_unit_list = classifier.finish();
    taxonomy.sort_units(&mut sub_unit_list, |s| &s.key);
    for s in sub_unit_list.iter() {
        if !taxonomy.is_known(&s.key) {
            tracing::warn!(
                subject = %s.key.subject,
                main_unit = %s.key.main_unit,
                sub_unit = %s.key.sub_unit,
                "unit not in taxonomy; sorted last"
            );
        }
    }

    let mut strong_units: Vec<SubUnitStat> = sub_unit_list
        .iter()
        .filter(|s| s.percentage >= options.strong_threshold)
        .cloned()
        .collect();
    strong_units.sort_by(|a, b| b.percentage.cmp(&a.percentage));

    let mut weak_units: Vec<SubUnitStat> = sub_unit_list
        .iter()
        .filter(|s| s.percentage < options.strong_threshold)
        .cloned()
        .collect();
    weak_units.sort_by(|a, b| a.percentage.cmp(&b.percentage));
    weak_units.truncate(options.weak_limit);

    Ok(MonthlyReport {
        year: input.year,
        month: input.month,
        class_name: input.class_name.clone(),
        student_id: input.student_id.clone(),
        student_name: input.student_name.clone(),
        total_correct,
        total_questions,
        total_percentage: ratio_percent(total_correct, total_questions).clamp(0, 100),
        avg_percentile: mean_rounded(&day_percentiles).unwrap_or(0),
        sub_unit_list,
        strong_units,
        weak_units,
        chart_data: build_chart_series(&observations),
        attendance: AttendanceSummary {
            present_days,
            recorded_days,
            rate: ratio_percent(present_days as f64, recorded_days as f64),
        },
        assignment: AssignmentSummary {
            completed_days,
            recorded_days,
            rate: ratio_percent(completed_days as f64, recorded_days as f64),
        },
        monthly_evaluation,
    })
}
