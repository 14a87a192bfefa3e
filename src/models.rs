use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Employee,
    Team,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Employee => "employee",
            EntityKind::Team => "team",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single ledger entry. `entity_id` is always the employee the event
/// was recorded against, also when it is fetched for a team.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub entity_id: i64,
    pub date: NaiveDate,
    pub is_positive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityIdentity {
    pub id: i64,
    pub display_name: String,
    pub kind: EntityKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Note {
    pub entity_id: i64,
    pub kind: EntityKind,
    pub date: NaiveDate,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectorOption {
    pub label: String,
    pub id: i64,
}

impl From<EntityIdentity> for SelectorOption {
    fn from(identity: EntityIdentity) -> Self {
        SelectorOption {
            label: identity.display_name,
            id: identity.id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub positive_count: u64,
    pub negative_count: u64,
    pub cumulative_positive: u64,
    pub cumulative_negative: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TimeSeries {
    pub points: Vec<SeriesPoint>,
}

impl TimeSeries {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Column layout of a feature row. Models are trained against one
/// version and refuse rows built for another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureSchema {
    pub version: u32,
    pub names: &'static [&'static str],
}

pub const FEATURE_SCHEMA: FeatureSchema = FeatureSchema {
    version: 1,
    names: &["positive_events", "negative_events"],
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRow {
    pub employee_id: i64,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct RiskScore(f64);

impl RiskScore {
    /// Callers guarantee `value` is already within [0, 1].
    pub(crate) fn new(value: f64) -> Self {
        debug_assert!((0.0..=1.0).contains(&value));
        RiskScore(value)
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: i64,
}

#[derive(Debug, Clone)]
pub struct EntityRiskRanking {
    pub label: String,
    pub id: i64,
    pub score: RiskScore,
}
