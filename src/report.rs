use std::fmt::Write;

use serde::Serialize;

use crate::entity::ReportModel;
use crate::error::Result;
use crate::models::{EntityKind, Note, RiskScore, SelectorOption, TimeSeries};
use crate::risk::RiskScorer;

/// Everything one dashboard page shows, already aggregated and scored.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardData {
    pub kind: EntityKind,
    pub id: i64,
    pub title: String,
    pub entity_label: String,
    pub model: String,
    pub selector_options: Vec<SelectorOption>,
    pub series: TimeSeries,
    pub risk: Option<RiskScore>,
    pub notes: Vec<Note>,
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Runs the dashboard queries for one entity concurrently and joins
/// them. The chart and the score share a single event fetch.
pub async fn assemble<M: ReportModel>(
    model: &M,
    scorer: &RiskScorer,
    id: i64,
) -> Result<DashboardData> {
    let (options, event_set, notes) =
        tokio::join!(model.selector_options(), model.event_set(id), model.notes(id));
    let selector_options = options?;
    let event_set = event_set?;
    let notes = notes?;

    let series = event_set.time_series();
    let risk = scorer.score_rows(&event_set.feature_rows())?;

    let entity_label = selector_options
        .iter()
        .find(|option| option.id == id)
        .map(|option| option.label.clone())
        .unwrap_or_else(|| format!("#{id}"));

    tracing::debug!(
        kind = %model.kind(),
        id,
        points = series.points.len(),
        notes = notes.len(),
        "dashboard assembled"
    );

    Ok(DashboardData {
        kind: model.kind(),
        id,
        title: format!("{} Performance", capitalize(model.display_name())),
        entity_label,
        model: scorer.model_name().to_string(),
        selector_options,
        series,
        risk,
        notes,
    })
}

fn risk_bar(score: RiskScore) -> String {
    const WIDTH: usize = 20;
    let filled = (score.value() * WIDTH as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(WIDTH - filled))
}

pub fn build_report(data: &DashboardData) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# {}: {}", data.title, data.entity_label);
    let _ = writeln!(output, "Selected {} #{} (model {})", data.kind, data.id, data.model);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Cumulative Events");

    if data.series.is_empty() {
        let _ = writeln!(output, "No data");
    } else {
        let _ = writeln!(output, "| Date | Positive | Negative |");
        let _ = writeln!(output, "| --- | ---: | ---: |");
        for point in data.series.points.iter() {
            let _ = writeln!(
                output,
                "| {} | {} | {} |",
                point.date, point.cumulative_positive, point.cumulative_negative
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Predicted Recruitment Risk");

    match data.risk {
        Some(score) => {
            let _ = writeln!(output, "{:.2} {}", score.value(), risk_bar(score));
        }
        None => {
            let _ = writeln!(output, "No data");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Notes");

    if data.notes.is_empty() {
        let _ = writeln!(output, "No notes recorded.");
    } else {
        let _ = writeln!(output, "| Date | Note |");
        let _ = writeln!(output, "| --- | --- |");
        for note in data.notes.iter() {
            let _ = writeln!(output, "| {} | {} |", note.date, note.text.replace('|', "\\|"));
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Select {}", capitalize(data.kind.as_str()));

    for option in data.selector_options.iter() {
        let marker = if option.id == data.id { " (selected)" } else { "" };
        let _ = writeln!(output, "- {} ({}){}", option.label, option.id, marker);
    }

    output
}

pub fn build_json(data: &DashboardData) -> serde_json::Result<String> {
    serde_json::to_string_pretty(data)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::entity::{Employee, Team};
    use crate::risk::tests::FixedScalars;
    use crate::risk::{ModelOutputKind, RiskModel};
    use crate::store::memory::MemoryStore;

    fn store() -> Arc<MemoryStore> {
        Arc::new(
            MemoryStore::default()
                .with_team(1, "Core")
                .with_team(2, "Empty")
                .with_employee(10, "Ada Byron", 1)
                .with_employee(11, "Grace Hopper", 1)
                .with_event(10, "2024-01-01", true)
                .with_event(10, "2024-01-01", false)
                .with_event(10, "2024-01-02", true)
                .with_event(11, "2024-01-02", false)
                .with_note(EntityKind::Employee, 10, "2024-01-03", "Asked | about growth"),
        )
    }

    fn scorer(predictions: Vec<f64>) -> RiskScorer {
        RiskScorer::new(Arc::new(RiskModel::new(
            "fixed",
            ModelOutputKind::ScalarOnly(Box::new(FixedScalars(predictions))),
        )))
    }

    #[tokio::test]
    async fn employee_dashboard_renders_series_score_and_notes() {
        let employee = Employee::new(store());
        let data = assemble(&employee, &scorer(vec![0.25]), 10).await.unwrap();

        assert_eq!(data.title, "Employee Performance");
        assert_eq!(data.entity_label, "Ada Byron");
        assert_eq!(data.series.points.len(), 2);
        assert_eq!(data.risk.map(|r| r.value()), Some(0.25));

        let report = build_report(&data);
        assert!(report.starts_with("# Employee Performance: Ada Byron"));
        assert!(report.contains("| 2024-01-01 | 1 | 1 |"));
        assert!(report.contains("| 2024-01-02 | 2 | 1 |"));
        assert!(report.contains("0.25 [#####---------------]"));
        assert!(report.contains("Asked \\| about growth"));
        assert!(report.contains("- Ada Byron (10) (selected)"));
    }

    #[tokio::test]
    async fn team_dashboard_averages_member_predictions() {
        let team = Team::new(store());
        let data = assemble(&team, &scorer(vec![0.2, 0.6]), 1).await.unwrap();

        assert_eq!(data.title, "Team Performance");
        assert_eq!(data.entity_label, "Core");
        assert!((data.risk.unwrap().value() - 0.4).abs() < 1e-12);
        let last = data.series.points.last().unwrap();
        assert_eq!((last.cumulative_positive, last.cumulative_negative), (2, 2));
        assert_eq!(data.notes.len(), 1);
    }

    #[tokio::test]
    async fn empty_entity_renders_placeholders() {
        let team = Team::new(store());
        let data = assemble(&team, &scorer(vec![]), 2).await.unwrap();

        assert!(data.series.is_empty());
        assert!(data.risk.is_none());
        assert!(data.notes.is_empty());

        let report = build_report(&data);
        assert!(report.contains("## Cumulative Events\nNo data"));
        assert!(report.contains("## Predicted Recruitment Risk\nNo data"));
        assert!(report.contains("No notes recorded."));
    }

    #[tokio::test]
    async fn unknown_id_gets_a_numeric_label() {
        let employee = Employee::new(store());
        let data = assemble(&employee, &scorer(vec![0.0]), 99).await.unwrap();
        assert_eq!(data.entity_label, "#99");
        assert!(data.series.is_empty());
    }

    #[tokio::test]
    async fn json_output_carries_cumulative_series() {
        let employee = Employee::new(store());
        let data = assemble(&employee, &scorer(vec![1.0]), 10).await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&build_json(&data).unwrap()).unwrap();

        assert_eq!(json["kind"], "employee");
        assert_eq!(json["risk"], 1.0);
        assert_eq!(json["series"][1]["cumulative_positive"], 2);
        assert_eq!(json["notes"][0]["date"], "2024-01-03");
    }
}
