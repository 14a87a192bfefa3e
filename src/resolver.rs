use crate::error::{ReportError, Result};
use crate::models::{EntityKind, EntityRef};
use crate::store::EventStore;

/// What to do with a selector that is neither numeric nor a known name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultEntityPolicy {
    /// Render this entity instead of failing.
    Fallback(i64),
    /// Surface `ReportError::NotFound` to the caller.
    Reject,
}

impl Default for DefaultEntityPolicy {
    fn default() -> Self {
        DefaultEntityPolicy::Fallback(1)
    }
}

pub struct EntityResolver<'a, S> {
    store: &'a S,
    policy: DefaultEntityPolicy,
}

impl<'a, S: EventStore> EntityResolver<'a, S> {
    pub fn new(store: &'a S, policy: DefaultEntityPolicy) -> Self {
        EntityResolver { store, policy }
    }

    /// Numeric selectors (surrounding whitespace ignored) are returned
    /// untouched. Existence is not checked here: an unknown id simply
    /// yields empty results downstream. Names must match exactly.
    pub async fn resolve(&self, raw: &str, kind: EntityKind) -> Result<i64> {
        if let Ok(id) = raw.trim().parse::<i64>() {
            return Ok(id);
        }

        let identities = self.store.identities(kind).await?;
        if let Some(identity) = identities
            .iter()
            .find(|i| i.kind == kind && i.display_name == raw)
        {
            return Ok(identity.id);
        }

        match self.policy {
            DefaultEntityPolicy::Fallback(id) => {
                tracing::warn!(
                    %kind,
                    selector = raw,
                    fallback = id,
                    "unknown selector, using default entity"
                );
                Ok(id)
            }
            DefaultEntityPolicy::Reject => Err(ReportError::NotFound {
                kind,
                raw: raw.to_string(),
            }),
        }
    }
}

pub async fn resolve_and_build<S: EventStore>(
    store: &S,
    policy: DefaultEntityPolicy,
    raw: &str,
    kind: EntityKind,
) -> Result<EntityRef> {
    let id = EntityResolver::new(store, policy).resolve(raw, kind).await?;
    Ok(EntityRef { kind, id })
}
