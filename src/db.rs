use anyhow::Context;
use chrono::NaiveDate;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{EntityIdentity, EntityKind, Event, Note};
use crate::store::EventStore;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Postgres-backed ledger. Cloning shares the underlying pool.
#[derive(Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    pub fn new(pool: PgPool) -> Self {
        PgEventStore { pool }
    }
}

fn event_from_row(row: PgRow) -> Event {
    Event {
        entity_id: row.get("employee_id"),
        date: row.get("event_date"),
        is_positive: row.get("is_positive"),
    }
}

fn note_from_row(row: PgRow) -> Option<Note> {
    let employee_id: Option<i64> = row.get("employee_id");
    let team_id: Option<i64> = row.get("team_id");
    let (entity_id, kind) = match (employee_id, team_id) {
        (Some(id), _) => (id, EntityKind::Employee),
        (None, Some(id)) => (id, EntityKind::Team),
        (None, None) => return None,
    };

    Some(Note {
        entity_id,
        kind,
        date: row.get("note_date"),
        text: row.get("note"),
    })
}

impl EventStore for PgEventStore {
    async fn identities(&self, kind: EntityKind) -> Result<Vec<EntityIdentity>> {
        let query = match kind {
            EntityKind::Employee => {
                "SELECT id, full_name AS display_name FROM employee_events.employees \
                 ORDER BY full_name, id"
            }
            EntityKind::Team => {
                "SELECT id, team_name AS display_name FROM employee_events.teams \
                 ORDER BY team_name, id"
            }
        };

        let rows = sqlx::query(query).fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .map(|row| EntityIdentity {
                id: row.get("id"),
                display_name: row.get("display_name"),
                kind,
            })
            .collect())
    }

    async fn members(&self, team_id: i64) -> Result<Vec<i64>> {
        let rows = sqlx::query(
            "SELECT id FROM employee_events.employees WHERE team_id = $1 ORDER BY id",
        )
        .bind(team_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|row| row.get("id")).collect())
    }

    async fn events_for(&self, entity_id: i64, kind: EntityKind) -> Result<Vec<Event>> {
        let query = match kind {
            EntityKind::Employee => {
                "SELECT employee_id, event_date, is_positive FROM employee_events.events \
                 WHERE employee_id = $1 \
                 ORDER BY event_date, id"
            }
            EntityKind::Team => {
                "SELECT ev.employee_id, ev.event_date, ev.is_positive \
                 FROM employee_events.events ev \
                 JOIN employee_events.employees em ON em.id = ev.employee_id \
                 WHERE em.team_id = $1 \
                 ORDER BY ev.event_date, ev.id"
            }
        };

        let rows = sqlx::query(query)
            .bind(entity_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(event_from_row).collect())
    }

    async fn notes_for(&self, entity_id: i64, kind: EntityKind) -> Result<Vec<Note>> {
        let query = match kind {
            EntityKind::Employee => {
                "SELECT employee_id, team_id, note_date, note FROM employee_events.notes \
                 WHERE employee_id = $1 \
                 ORDER BY note_date, id"
            }
            EntityKind::Team => {
                "SELECT n.employee_id, n.team_id, n.note_date, n.note \
                 FROM employee_events.notes n \
                 LEFT JOIN employee_events.employees em ON em.id = n.employee_id \
                 WHERE n.team_id = $1 OR em.team_id = $1 \
                 ORDER BY n.note_date, n.id"
            }
        };

        let rows = sqlx::query(query)
            .bind(entity_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().filter_map(note_from_row).collect())
    }
}

async fn upsert_team(
    pool: &PgPool,
    team_name: &str,
    shift: Option<&str>,
    manager_name: Option<&str>,
) -> anyhow::Result<i64> {
    let id: i64 = sqlx::query(
        r#"
        INSERT INTO employee_events.teams (team_name, shift, manager_name)
        VALUES ($1, $2, $3)
        ON CONFLICT (team_name) DO UPDATE
        SET shift = COALESCE(EXCLUDED.shift, teams.shift),
            manager_name = COALESCE(EXCLUDED.manager_name, teams.manager_name)
        RETURNING id
        "#,
    )
    .bind(team_name)
    .bind(shift)
    .bind(manager_name)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to upsert team {team_name}"))?
    .get("id");

    Ok(id)
}

async fn upsert_employee(pool: &PgPool, full_name: &str, team_id: i64) -> anyhow::Result<i64> {
    let id: i64 = sqlx::query(
        r#"
        INSERT INTO employee_events.employees (full_name, team_id)
        VALUES ($1, $2)
        ON CONFLICT (full_name) DO UPDATE
        SET team_id = EXCLUDED.team_id
        RETURNING id
        "#,
    )
    .bind(full_name)
    .bind(team_id)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to upsert employee {full_name}"))?
    .get("id");

    Ok(id)
}

async fn insert_event(
    pool: &PgPool,
    employee_id: i64,
    event_date: NaiveDate,
    is_positive: bool,
    source_key: &str,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO employee_events.events (employee_id, event_date, is_positive, source_key)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(employee_id)
    .bind(event_date)
    .bind(is_positive)
    .bind(source_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

async fn insert_note(
    pool: &PgPool,
    employee_id: Option<i64>,
    team_id: Option<i64>,
    note_date: NaiveDate,
    note: &str,
    source_key: &str,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO employee_events.notes (employee_id, team_id, note_date, note, source_key)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(employee_id)
    .bind(team_id)
    .bind(note_date)
    .bind(note)
    .bind(source_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

fn date(year: i32, month: u32, day: u32) -> anyhow::Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day).context("invalid date")
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let teams = vec![
        ("Platform", "Day", "Morgan Hale"),
        ("Support", "Night", "Riley Chen"),
    ];

    for (team_name, shift, manager_name) in teams {
        upsert_team(pool, team_name, Some(shift), Some(manager_name)).await?;
    }

    let employees = vec![
        ("Avery Lee", "Platform"),
        ("Jules Moreno", "Platform"),
        ("Kiara Patel", "Support"),
        ("Theo Park", "Support"),
    ];

    for (full_name, team_name) in employees {
        let team_id = upsert_team(pool, team_name, None, None).await?;
        upsert_employee(pool, full_name, team_id).await?;
    }

    let events = vec![
        ("seed-001", "Avery Lee", "Platform", date(2026, 1, 5)?, true),
        ("seed-002", "Avery Lee", "Platform", date(2026, 1, 5)?, false),
        ("seed-003", "Avery Lee", "Platform", date(2026, 1, 19)?, true),
        ("seed-004", "Jules Moreno", "Platform", date(2026, 1, 7)?, false),
        ("seed-005", "Jules Moreno", "Platform", date(2026, 1, 21)?, false),
        ("seed-006", "Jules Moreno", "Platform", date(2026, 2, 2)?, true),
        ("seed-007", "Kiara Patel", "Support", date(2026, 1, 9)?, true),
        ("seed-008", "Kiara Patel", "Support", date(2026, 1, 30)?, true),
        ("seed-009", "Theo Park", "Support", date(2026, 1, 12)?, false),
    ];

    for (source_key, full_name, team_name, event_date, is_positive) in events {
        let team_id = upsert_team(pool, team_name, None, None).await?;
        let employee_id = upsert_employee(pool, full_name, team_id).await?;
        insert_event(pool, employee_id, event_date, is_positive, source_key).await?;
    }

    let notes = vec![
        (
            "seed-note-001",
            Some("Avery Lee"),
            "Platform",
            date(2026, 1, 20)?,
            "Mentioned a recruiter reached out",
        ),
        (
            "seed-note-002",
            Some("Jules Moreno"),
            "Platform",
            date(2026, 1, 22)?,
            "Frustrated with on-call load",
        ),
        (
            "seed-note-003",
            None,
            "Support",
            date(2026, 2, 1)?,
            "Night shift rotation reshuffled",
        ),
    ];

    for (source_key, full_name, team_name, note_date, note) in notes {
        let team_id = upsert_team(pool, team_name, None, None).await?;
        let employee_id = match full_name {
            Some(name) => Some(upsert_employee(pool, name, team_id).await?),
            None => None,
        };
        let team_id = employee_id.is_none().then_some(team_id);
        insert_note(pool, employee_id, team_id, note_date, note, source_key).await?;
    }

    Ok(())
}

pub async fn import_events(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        full_name: String,
        team_name: String,
        event_date: NaiveDate,
        is_positive: bool,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let team_id = upsert_team(pool, &row.team_name, None, None).await?;
        let employee_id = upsert_employee(pool, &row.full_name, team_id).await?;

        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        if insert_event(pool, employee_id, row.event_date, row.is_positive, &source_key).await? {
            inserted += 1;
        }
    }

    tracing::debug!(path = %csv_path.display(), inserted, "events imported");
    Ok(inserted)
}

/// Rows with a `full_name` attach to that employee; rows without one
/// attach to the team itself.
pub async fn import_notes(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        full_name: Option<String>,
        team_name: String,
        note_date: NaiveDate,
        note: String,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let team_id = upsert_team(pool, &row.team_name, None, None).await?;
        let employee_id = match row.full_name.as_deref() {
            Some(name) => Some(upsert_employee(pool, name, team_id).await?),
            None => None,
        };
        let team_id = employee_id.is_none().then_some(team_id);

        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-note-{}", Uuid::new_v4()));

        if insert_note(pool, employee_id, team_id, row.note_date, &row.note, &source_key).await? {
            inserted += 1;
        }
    }

    tracing::debug!(path = %csv_path.display(), inserted, "notes imported");
    Ok(inserted)
}
