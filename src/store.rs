use std::future::Future;

use crate::error::Result;
use crate::models::{EntityIdentity, EntityKind, Event, Note};

/// Read-only access to the event ledger, identity tables and notes.
///
/// Missing data is an empty `Vec`, never an error; errors are reserved
/// for the backing storage itself failing.
pub trait EventStore: Send + Sync {
    /// Identities of `kind`, ordered by display name then id.
    fn identities(&self, kind: EntityKind)
        -> impl Future<Output = Result<Vec<EntityIdentity>>> + Send;

    /// Employee ids belonging to `team_id`, ascending.
    fn members(&self, team_id: i64) -> impl Future<Output = Result<Vec<i64>>> + Send;

    /// Events of an employee, or of every current member of a team,
    /// ordered by date.
    fn events_for(
        &self,
        entity_id: i64,
        kind: EntityKind,
    ) -> impl Future<Output = Result<Vec<Event>>> + Send;

    /// Notes attached to an employee, or to a team and any of its members.
    fn notes_for(
        &self,
        entity_id: i64,
        kind: EntityKind,
    ) -> impl Future<Output = Result<Vec<Note>>> + Send;
}
