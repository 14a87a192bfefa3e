use std::future::Future;
use std::sync::Arc;

use crate::aggregate;
use crate::error::Result;
use crate::models::{EntityKind, Event, FeatureRow, Note, SelectorOption, TimeSeries};
use crate::store::EventStore;

/// Events behind one report, together with the employees they were
/// collected for. The chart and the feature rows are both derived from
/// this one fetch.
#[derive(Debug, Clone, Default)]
pub struct EventSet {
    pub members: Vec<i64>,
    pub events: Vec<Event>,
}

impl EventSet {
    pub fn time_series(&self) -> TimeSeries {
        aggregate::time_series(&self.events)
    }

    pub fn feature_rows(&self) -> Vec<FeatureRow> {
        aggregate::feature_rows(&self.members, &self.events)
    }
}

/// Everything the dashboard needs from an entity kind. Rendering code is
/// written against this trait only.
pub trait ReportModel: Send + Sync {
    fn kind(&self) -> EntityKind;

    fn display_name(&self) -> &'static str {
        self.kind().as_str()
    }

    fn selector_options(&self) -> impl Future<Output = Result<Vec<SelectorOption>>> + Send;

    fn event_set(&self, id: i64) -> impl Future<Output = Result<EventSet>> + Send;

    fn notes(&self, id: i64) -> impl Future<Output = Result<Vec<Note>>> + Send;

    /// Standalone chart query. `report::assemble` reads `event_set` once
    /// instead so the chart and the feature rows share one fetch.
    fn time_series(&self, id: i64) -> impl Future<Output = Result<TimeSeries>> + Send {
        async move { Ok(self.event_set(id).await?.time_series()) }
    }

    fn feature_rows(&self, id: i64) -> impl Future<Output = Result<Vec<FeatureRow>>> + Send {
        async move { Ok(self.event_set(id).await?.feature_rows()) }
    }
}

async fn options_for<S: EventStore>(store: &S, kind: EntityKind) -> Result<Vec<SelectorOption>> {
    Ok(store
        .identities(kind)
        .await?
        .into_iter()
        .map(SelectorOption::from)
        .collect())
}

pub struct Employee<S> {
    store: Arc<S>,
}

impl<S> Employee<S> {
    pub fn new(store: Arc<S>) -> Self {
        Employee { store }
    }
}

impl<S: EventStore> ReportModel for Employee<S> {
    fn kind(&self) -> EntityKind {
        EntityKind::Employee
    }

    async fn selector_options(&self) -> Result<Vec<SelectorOption>> {
        options_for(self.store.as_ref(), EntityKind::Employee).await
    }

    async fn event_set(&self, id: i64) -> Result<EventSet> {
        let events = self.store.events_for(id, EntityKind::Employee).await?;
        Ok(EventSet {
            members: vec![id],
            events,
        })
    }

    async fn notes(&self, id: i64) -> Result<Vec<Note>> {
        self.store.notes_for(id, EntityKind::Employee).await
    }
}

/// A team aggregates over whoever belongs to it at query time.
pub struct Team<S> {
    store: Arc<S>,
}

impl<S> Team<S> {
    pub fn new(store: Arc<S>) -> Self {
        Team { store }
    }
}

impl<S: EventStore> ReportModel for Team<S> {
    fn kind(&self) -> EntityKind {
        EntityKind::Team
    }

    async fn selector_options(&self) -> Result<Vec<SelectorOption>> {
        options_for(self.store.as_ref(), EntityKind::Team).await
    }

    async fn event_set(&self, id: i64) -> Result<EventSet> {
        let members = self.store.members(id).await?;
        if members.is_empty() {
            return Ok(EventSet::default());
        }
        let events = self.store.events_for(id, EntityKind::Team).await?;
        tracing::debug!(
            team = id,
            members = members.len(),
            events = events.len(),
            "team event set"
        );
        Ok(EventSet { members, events })
    }

    async fn notes(&self, id: i64) -> Result<Vec<Note>> {
        self.store.notes_for(id, EntityKind::Team).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::risk::tests::FixedScalars;
    use crate::risk::{ModelOutputKind, RiskModel, RiskScorer};
    use crate::store::memory::MemoryStore;

    fn store() -> Arc<MemoryStore> {
        Arc::new(
            MemoryStore::default()
                .with_team(1, "Core")
                .with_team(2, "Empty")
                .with_employee(10, "Ada Byron", 1)
                .with_employee(11, "Grace Hopper", 1)
                .with_employee(12, "Idle Ian", 1)
                .with_event(10, "2024-01-01", true)
                .with_event(10, "2024-01-03", false)
                .with_event(11, "2024-01-01", false)
                .with_event(11, "2024-01-02", true)
                .with_event(11, "2024-01-02", true)
                .with_note(EntityKind::Employee, 10, "2024-01-04", "Asked about promotion")
                .with_note(EntityKind::Employee, 11, "2024-01-02", "Great demo")
                .with_note(EntityKind::Team, 1, "2024-01-05", "Quarterly offsite"),
        )
    }

    fn logistic_scorer() -> RiskScorer {
        let model = r#"{
            "name": "recruitment-risk",
            "schema_version": 1,
            "features": ["positive_events", "negative_events"],
            "estimator": {"type": "logistic_regression", "coefficients": [-0.8, 1.1], "intercept": 0.3}
        }"#;
        let path = std::env::temp_dir().join(format!("risk-model-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, model).unwrap();
        let loaded = RiskModel::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        RiskScorer::new(Arc::new(loaded))
    }

    #[tokio::test]
    async fn team_series_is_union_of_member_events() {
        let team = Team::new(store());
        let series = team.time_series(1).await.unwrap();

        let rows: Vec<_> = series
            .points
            .iter()
            .map(|p| {
                (
                    p.date.to_string(),
                    p.positive_count,
                    p.negative_count,
                    p.cumulative_positive,
                    p.cumulative_negative,
                )
            })
            .collect();
        assert_eq!(
            rows,
            vec![
                ("2024-01-01".to_string(), 1, 1, 1, 1),
                ("2024-01-02".to_string(), 2, 0, 3, 1),
                ("2024-01-03".to_string(), 0, 1, 3, 2),
            ]
        );
    }

    #[tokio::test]
    async fn team_has_one_feature_row_per_member() {
        let team = Team::new(store());
        let rows = team.feature_rows(1).await.unwrap();

        let ids: Vec<i64> = rows.iter().map(|r| r.employee_id).collect();
        assert_eq!(ids, vec![10, 11, 12]);
        assert_eq!(rows[0].values, vec![1.0, 1.0]);
        assert_eq!(rows[1].values, vec![2.0, 1.0]);
        assert_eq!(rows[2].values, vec![0.0, 0.0]);
    }

    #[tokio::test]
    async fn entities_without_data_are_empty_not_errors() {
        let store = store();
        let employee = Employee::new(store.clone());
        assert!(employee.time_series(12).await.unwrap().is_empty());
        assert!(employee.notes(12).await.unwrap().is_empty());

        let team = Team::new(store);
        assert!(team.time_series(2).await.unwrap().is_empty());
        assert!(team.notes(2).await.unwrap().is_empty());
        assert!(team.feature_rows(2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn team_notes_include_member_and_team_notes() {
        let team = Team::new(store());
        let notes = team.notes(1).await.unwrap();
        let texts: Vec<&str> = notes.iter().map(|n| n.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["Great demo", "Asked about promotion", "Quarterly offsite"]
        );

        let employee = Employee::new(store());
        let notes = employee.notes(11).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].text, "Great demo");
    }

    #[tokio::test]
    async fn team_score_is_mean_of_member_scores() {
        let store = store();
        let scorer = logistic_scorer();
        let employee = Employee::new(store.clone());
        let team = Team::new(store);

        let mut member_scores = Vec::new();
        for id in [10, 11, 12] {
            let score = scorer.score(&employee, id).await.unwrap().unwrap().value();
            assert!((0.0..=1.0).contains(&score));
            member_scores.push(score);
        }
        let expected = member_scores.iter().sum::<f64>() / member_scores.len() as f64;

        let team_score = scorer.score(&team, 1).await.unwrap().unwrap().value();
        assert!((0.0..=1.0).contains(&team_score));
        assert!((team_score - expected).abs() < 1e-9);
    }

    #[tokio::test]
    async fn memberless_team_has_no_score() {
        let scorer = RiskScorer::new(Arc::new(RiskModel::new(
            "constant",
            ModelOutputKind::ScalarOnly(Box::new(FixedScalars(vec![]))),
        )));
        let team = Team::new(store());
        assert!(scorer.score(&team, 2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn ranking_orders_by_descending_risk() {
        let scorer = logistic_scorer();
        let employee = Employee::new(store());
        let ranking = scorer.rank(&employee).await.unwrap();

        assert_eq!(ranking.len(), 3);
        for pair in ranking.windows(2) {
            assert!(pair[0].score.value() >= pair[1].score.value());
        }
    }

    #[test]
    fn display_names_follow_kind() {
        assert_eq!(Employee::new(store()).display_name(), "employee");
        assert_eq!(Team::new(store()).display_name(), "team");
    }
}
