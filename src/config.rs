use std::path::PathBuf;

use clap::Args;

use crate::resolver::DefaultEntityPolicy;

/// Connection and model settings shared by every subcommand.
#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    pub database_url: Option<String>,

    #[arg(long, default_value_t = 5, global = true)]
    pub max_connections: u32,

    /// Risk model artifact (JSON)
    #[arg(
        long = "model",
        env = "MODEL_PATH",
        default_value = "models/recruitment_risk.json",
        global = true
    )]
    pub model_path: PathBuf,

    /// Entity shown when a selector matches nothing
    #[arg(long, env = "DEFAULT_ENTITY_ID", default_value_t = 1, global = true)]
    pub default_entity_id: i64,

    /// Fail on unknown selectors instead of falling back to the default entity
    #[arg(long, global = true)]
    pub reject_unknown: bool,
}

impl Settings {
    pub fn entity_policy(&self) -> DefaultEntityPolicy {
        if self.reject_unknown {
            DefaultEntityPolicy::Reject
        } else {
            DefaultEntityPolicy::Fallback(self.default_entity_id)
        }
    }
}
