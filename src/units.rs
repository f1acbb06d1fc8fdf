use serde::Serialize;
use std::collections::HashMap;

use crate::calc::{mean_rounded, ratio_percent};
use crate::score::Score;
use crate::taxonomy::UnitKey;

#[derive(Debug, Clone, PartialEq)]
pub struct SubUnitAccumulator {
    pub key: UnitKey,
    pub correct_sum: f64,
    pub total_sum: f64,
    pub sample_count: usize,
    pub percentile_samples: Vec<i64>,
}

impl SubUnitAccumulator {
    fn new(key: UnitKey) -> Self {
        Self {
            key,
            correct_sum: 0.0,
            total_sum: 0.0,
            sample_count: 0,
            percentile_samples: Vec::new(),
        }
    }

    pub fn finalize(&self) -> SubUnitStat {
        SubUnitStat {
            key: self.key.clone(),
            correct_sum: self.correct_sum,
            total_sum: self.total_sum,
            sample_count: self.sample_count,
            percentage: ratio_percent(self.correct_sum, self.total_sum).clamp(0, 100),
            avg_percentile: mean_rounded(&self.percentile_samples).unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubUnitStat {
    #[serde(flatten)]
    pub key: UnitKey,
    pub correct_sum: f64,
    pub total_sum: f64,
    pub sample_count: usize,
    pub percentage: i64,
    pub avg_percentile: i64,
}

/// Month-long fold of one student's fraction scores per curriculum sub unit.
///
/// Units are kept in first-seen order.
#[derive(Debug, Default)]
pub struct UnitClassifier {
    order: Vec<SubUnitAccumulator>,
    index: HashMap<UnitKey, usize>,
}

impl UnitClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one day's record. Returns false (and changes nothing) when the
    /// score is not a usable fraction.
    pub fn record(&mut self, key: &UnitKey, score: &Score, percentile: Option<i64>) -> bool {
        let Some((correct, total)) = score.fraction() else {
            return false;
        };
        let idx = match self.index.get(key) {
            Some(i) => *i,
            None => {
                self.order.push(SubUnitAccumulator::new(key.clone()));
                self.index.insert(key.clone(), self.order.len() - 1);
                self.order.len() - 1
            }
        };
        let acc = &mut self.order[idx];
        acc.correct_sum += correct;
        acc.total_sum += total;
        acc.sample_count += 1;
        if let Some(p) = percentile {
            acc.percentile_samples.push(p);
        }
        true
    }

    pub fn finish(&self) -> Vec<SubUnitStat> {
        self.order.iter().map(|a| a.finalize()).collect()
    }
}
