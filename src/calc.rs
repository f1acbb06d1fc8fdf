use chrono::NaiveDate;
use serde::Serialize;

/// Half-up rounding to an integer, matching how the academy's UI has always
/// rounded percentages: `floor(x + 0.5)`.
pub fn round_half_up(x: f64) -> i64 {
    (x + 0.5).floor() as i64
}

/// `round(part / whole * 100)`, or 0 when there is nothing to divide by.
pub fn ratio_percent(part: f64, whole: f64) -> i64 {
    if whole > 0.0 {
        round_half_up(part * 100.0 / whole)
    } else {
        0
    }
}

pub fn mean_rounded(values: &[i64]) -> Option<i64> {
    if values.is_empty() {
        return None;
    }
    let sum: i64 = values.iter().sum();
    Some(round_half_up(sum as f64 / values.len() as f64))
}

#[derive(Debug, Clone, Serialize)]
pub struct CalcError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl CalcError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassDayStats {
    pub date: NaiveDate,
    pub average: Option<i64>,
    pub max: Option<i64>,
}

/// Reduces one day's class scores. Callers pass only valid percentages of
/// student-role members; no filtering happens here.
pub fn class_day_stats(date: NaiveDate, scores: &[i64]) -> ClassDayStats {
    ClassDayStats {
        date,
        average: mean_rounded(scores),
        max: scores.iter().copied().max(),
    }
}

/// Rank-based percentile of `mine` within `peers` (which should include `mine`).
///
/// Tied scores share the best rank: `rank = 1 + #(peers > mine)`. The result is
/// `round((N - rank + 1) / N * 100)` clamped to [1, 100]; an empty peer group
/// yields 100.
pub fn percentile_rank(mine: i64, peers: &[i64]) -> i64 {
    let n = peers.len();
    if n == 0 {
        return 100;
    }
    let mut sorted = peers.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    let higher = sorted.iter().take_while(|p| **p > mine).count();
    let rank = higher + 1;
    let p = round_half_up(((n + 1).saturating_sub(rank)) as f64 * 100.0 / n as f64);
    p.clamp(1, 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, day).expect("valid date")
    }

    #[test]
    fn round_half_up_matches_ui_rounding() {
        assert_eq!(round_half_up(0.0), 0);
        assert_eq!(round_half_up(84.5), 85);
        assert_eq!(round_half_up(84.49), 84);
        assert_eq!(round_half_up(66.666), 67);
        assert_eq!(ratio_percent(21.0, 30.0), 70);
        assert_eq!(ratio_percent(5.0, 0.0), 0);
    }

    #[test]
    fn class_day_stats_average_and_max() {
        let s = class_day_stats(d(3), &[80, 90, 70]);
        assert_eq!(s.average, Some(80));
        assert_eq!(s.max, Some(90));

        let odd = class_day_stats(d(3), &[85, 90]);
        assert_eq!(odd.average, Some(88));
    }

    #[test]
    fn class_day_stats_empty_is_null() {
        let s = class_day_stats(d(4), &[]);
        assert_eq!(s.average, None);
        assert_eq!(s.max, None);
        assert_eq!(s.date, d(4));
    }

    #[test]
    fn percentile_counts_strictly_greater_peers() {
        assert_eq!(percentile_rank(80, &[90, 80, 70, 60]), 75);
        assert_eq!(percentile_rank(90, &[90, 80, 70, 60]), 100);
        assert_eq!(percentile_rank(60, &[90, 80, 70, 60]), 25);
        // Order of peers does not matter.
        assert_eq!(percentile_rank(80, &[60, 70, 80, 90]), 75);
    }

    #[test]
    fn percentile_ties_share_the_best_rank() {
        // Three-way tie at the top: everyone is rank 1.
        assert_eq!(percentile_rank(90, &[90, 90, 90, 50]), 100);
        assert_eq!(percentile_rank(50, &[90, 90, 90, 50]), 25);
        // Tie in the middle: both 80s are rank 2 of 5.
        assert_eq!(percentile_rank(80, &[95, 80, 80, 70, 60]), 80);
        assert_eq!(percentile_rank(70, &[95, 80, 80, 70, 60]), 40);
    }

    #[test]
    fn percentile_edge_cases() {
        assert_eq!(percentile_rank(80, &[]), 100);
        assert_eq!(percentile_rank(42, &[42]), 100);
        // A score below every peer (not itself in the group) still reports >= 1.
        assert_eq!(percentile_rank(10, &[90, 80]), 1);
        let big: Vec<i64> = (0..300).collect();
        assert_eq!(percentile_rank(0, &big), 1);
    }
}
