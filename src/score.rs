use serde_json::Value;

use crate::calc::round_half_up;

/// A daily-test or monthly-evaluation result after boundary parsing.
///
/// Raw scores arrive as `"correct/total"` strings, bare percentages (numbers or
/// numeric strings), or nothing at all. Everything downstream works on this type
/// and never looks at the raw value again.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Score {
    Fraction { correct: f64, total: f64 },
    Percentage { value: i64 },
    Missing,
}

impl Score {
    pub fn from_value(raw: Option<&Value>) -> Score {
        match raw {
            None | Some(Value::Null) => Score::Missing,
            Some(Value::String(s)) => Score::parse_str(s),
            Some(Value::Number(n)) => match n.as_f64() {
                Some(v) => percentage_from_number(v),
                None => Score::Missing,
            },
            Some(_) => Score::Missing,
        }
    }

    pub fn parse_str(raw: &str) -> Score {
        let t = raw.trim();
        if t.is_empty() {
            return Score::Missing;
        }
        if let Some((left, right)) = t.split_once('/') {
            let Some(correct) = parse_non_negative(left) else {
                return Score::Missing;
            };
            let Some(total) = parse_non_negative(right) else {
                return Score::Missing;
            };
            if total <= 0.0 {
                return Score::Missing;
            }
            return Score::Fraction { correct, total };
        }
        match t.parse::<f64>() {
            Ok(v) => percentage_from_number(v),
            Err(_) => Score::Missing,
        }
    }

    /// Integer percentage in [0, 100], or `None` for `Missing`.
    ///
    /// Fractions with `correct > total` are accepted as recorded; only the
    /// derived percentage is capped.
    pub fn percent(&self) -> Option<i64> {
        match *self {
            Score::Fraction { correct, total } => {
                Some(round_half_up(correct * 100.0 / total).clamp(0, 100))
            }
            Score::Percentage { value } => Some(value),
            Score::Missing => None,
        }
    }

    pub fn fraction(&self) -> Option<(f64, f64)> {
        match *self {
            Score::Fraction { correct, total } => Some((correct, total)),
            _ => None,
        }
    }
}

#[cfg(test)]
fn normalize(raw: Option<&Value>) -> Option<i64> {
    Score::from_value(raw).percent()
}

fn parse_non_negative(s: &str) -> Option<f64> {
    let v: f64 = s.trim().parse().ok()?;
    if v.is_finite() && v >= 0.0 {
        Some(v)
    } else {
        None
    }
}

fn percentage_from_number(v: f64) -> Score {
    if v.is_finite() && (0.0..=100.0).contains(&v) {
        Score::Percentage {
            value: round_half_up(v),
        }
    } else {
        Score::Missing
    }
}
