use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Rank given to any subject, main unit or sub unit the registry does not list.
pub const UNKNOWN_RANK: usize = 999;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxonomyEntry {
    pub subject: String,
    pub main_unit: String,
    pub sub_unit: String,
}

/// Curriculum identity of a sub unit. Absent tags are empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitKey {
    pub subject: String,
    pub main_unit: String,
    pub sub_unit: String,
}

impl UnitKey {
    pub fn new(
        subject: impl Into<String>,
        main_unit: impl Into<String>,
        sub_unit: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            main_unit: main_unit.into(),
            sub_unit: sub_unit.into(),
        }
    }
}

/// Three-level ordering of the curriculum.
///
/// Built once from an ordered list of `(subject, mainUnit, subUnit)` entries:
/// subjects rank by first appearance, main units by first appearance within
/// their subject, sub units by first appearance within their main unit. The
/// registry is immutable after construction and can be shared freely.
#[derive(Debug, Clone)]
pub struct TaxonomyRegistry {
    entries: Vec<TaxonomyEntry>,
    subjects: HashMap<String, usize>,
    main_units: HashMap<(String, String), usize>,
    sub_units: HashMap<(String, String, String), usize>,
}

impl TaxonomyRegistry {
    pub fn from_entries(entries: Vec<TaxonomyEntry>) -> Self {
        let mut subjects: HashMap<String, usize> = HashMap::new();
        let mut main_units: HashMap<(String, String), usize> = HashMap::new();
        let mut sub_units: HashMap<(String, String, String), usize> = HashMap::new();
        let mut main_counts: HashMap<String, usize> = HashMap::new();
        let mut sub_counts: HashMap<(String, String), usize> = HashMap::new();

        for e in &entries {
            let next = subjects.len();
            subjects.entry(e.subject.clone()).or_insert(next);

            let main_key = (e.subject.clone(), e.main_unit.clone());
            if !main_units.contains_key(&main_key) {
                let n = main_counts.entry(e.subject.clone()).or_insert(0);
                main_units.insert(main_key.clone(), *n);
                *n += 1;
            }

            let sub_key = (e.subject.clone(), e.main_unit.clone(), e.sub_unit.clone());
            if !sub_units.contains_key(&sub_key) {
                let n = sub_counts.entry(main_key).or_insert(0);
                sub_units.insert(sub_key, *n);
                *n += 1;
            }
        }

        Self {
            entries,
            subjects,
            main_units,
            sub_units,
        }
    }

    pub fn entries(&self) -> &[TaxonomyEntry] {
        &self.entries
    }

    pub fn subject_rank(&self, subject: &str) -> usize {
        self.subjects.get(subject).copied().unwrap_or(UNKNOWN_RANK)
    }

    pub fn main_unit_rank(&self, subject: &str, main_unit: &str) -> usize {
        self.main_units
            .get(&(subject.to_string(), main_unit.to_string()))
            .copied()
            .unwrap_or(UNKNOWN_RANK)
    }

    pub fn sub_unit_rank(&self, subject: &str, main_unit: &str, sub_unit: &str) -> usize {
        self.sub_units
            .get(&(
                subject.to_string(),
                main_unit.to_string(),
                sub_unit.to_string(),
            ))
            .copied()
            .unwrap_or(UNKNOWN_RANK)
    }

    pub fn rank_of(&self, key: &UnitKey) -> (usize, usize, usize) {
        (
            self.subject_rank(&key.subject),
            self.main_unit_rank(&key.subject, &key.main_unit),
            self.sub_unit_rank(&key.subject, &key.main_unit, &key.sub_unit),
        )
    }

    pub fn is_known(&self, key: &UnitKey) -> bool {
        let (s, m, u) = self.rank_of(key);
        s != UNKNOWN_RANK && m != UNKNOWN_RANK && u != UNKNOWN_RANK
    }

    /// Equal ranks compare `Equal`, so stable sorts keep input order for ties
    /// (including any two units that are both unknown).
    pub fn compare(&self, a: &UnitKey, b: &UnitKey) -> Ordering {
        self.rank_of(a).cmp(&self.rank_of(b))
    }

    pub fn sort_units<T, F>(&self, items: &mut [T], key: F)
    where
        F: Fn(&T) -> &UnitKey,
    {
        items.sort_by(|a, b| self.compare(key(a), key(b)));
    }
}

impl Default for TaxonomyRegistry {
    fn default() -> Self {
        Self::from_entries(default_entries())
    }
}

pub fn parse_entries(raw: &serde_json::Value) -> Result<Vec<TaxonomyEntry>, String> {
    let list = match raw {
        serde_json::Value::Array(_) => raw,
        serde_json::Value::Object(obj) => obj
            .get("entries")
            .ok_or_else(|| "taxonomy must be an array or an object with entries".to_string())?,
        _ => return Err("taxonomy must be an array or an object with entries".to_string()),
    };
    let entries: Vec<TaxonomyEntry> =
        serde_json::from_value(list.clone()).map_err(|e| format!("invalid taxonomy entries: {e}"))?;
    for (i, e) in entries.iter().enumerate() {
        if e.subject.trim().is_empty()
            || e.main_unit.trim().is_empty()
            || e.sub_unit.trim().is_empty()
        {
            return Err(format!("entries[{i}] has an empty name"));
        }
    }
    Ok(entries)
}

/// Korean 2022-revision high-school mathematics, in teaching order.
const DEFAULT_CURRICULUM: &[(&str, &[(&str, &[&str])])] = &[
    (
        "공통수학1",
        &[
            ("다항식", &["다항식의 연산", "항등식과 나머지정리", "인수분해"]),
            (
                "방정식과 부등식",
                &[
                    "복소수와 이차방정식",
                    "이차방정식과 이차함수",
                    "여러 가지 방정식과 부등식",
                ],
            ),
            ("경우의 수", &["합의 법칙과 곱의 법칙", "순열과 조합"]),
            ("행렬", &["행렬과 그 연산"]),
        ],
    ),
    (
        "공통수학2",
        &[
            (
                "도형의 방정식",
                &["평면좌표", "직선의 방정식", "원의 방정식", "도형의 이동"],
            ),
            ("집합과 명제", &["집합", "명제"]),
            ("함수와 그래프", &["함수", "유리함수와 무리함수"]),
        ],
    ),
    (
        "대수",
        &[
            ("지수함수와 로그함수", &["지수와 로그", "지수함수와 로그함수"]),
            (
                "삼각함수",
                &["삼각함수", "삼각함수의 그래프", "사인법칙과 코사인법칙"],
            ),
            (
                "수열",
                &["등차수열과 등비수열", "수열의 합", "수학적 귀납법"],
            ),
        ],
    ),
    (
        "미적분Ⅰ",
        &[
            ("함수의 극한과 연속", &["함수의 극한", "함수의 연속"]),
            ("미분", &["미분계수와 도함수", "도함수의 활용"]),
            ("적분", &["부정적분", "정적분", "정적분의 활용"]),
        ],
    ),
    (
        "확률과 통계",
        &[
            ("경우의 수", &["중복순열과 중복조합", "이항정리"]),
            ("확률", &["확률의 뜻과 활용", "조건부확률"]),
            ("통계", &["확률분포", "통계적 추정"]),
        ],
    ),
    (
        "미적분Ⅱ",
        &[
            ("수열의 극한", &["수열의 극한", "급수"]),
            (
                "미분법",
                &["여러 가지 함수의 미분", "여러 가지 미분법", "도함수의 활용"],
            ),
            ("적분법", &["여러 가지 적분법", "정적분의 활용"]),
        ],
    ),
    (
        "기하",
        &[
            (
                "이차곡선",
                &["포물선", "타원", "쌍곡선", "이차곡선과 직선"],
            ),
            ("공간도형과 공간좌표", &["직선과 평면", "정사영", "공간좌표"]),
            (
                "벡터",
                &["벡터의 연산", "벡터의 성분", "내적 계산", "직선과 원의 방정식"],
            ),
        ],
    ),
];

pub fn default_entries() -> Vec<TaxonomyEntry> {
    let mut out = Vec::new();
    for (subject, mains) in DEFAULT_CURRICULUM {
        for (main_unit, subs) in mains.iter() {
            for sub_unit in subs.iter() {
                out.push(TaxonomyEntry {
                    subject: subject.to_string(),
                    main_unit: main_unit.to_string(),
                    sub_unit: sub_unit.to_string(),
                });
            }
        }
    }
    out
}
