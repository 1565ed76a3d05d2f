use anyhow::Context;
use thesis_config::ThesisConfig;
use thesis_core::enums::Role;
use thesis_core::identity::{Actor, Administrator};
use thesis_db::service::ThesisService;

use crate::cli::GlobalFlags;

/// Shared application resources initialized once at startup.
pub struct AppContext {
    pub service: ThesisService,
    pub config: ThesisConfig,
    /// The administrator every mutating command acts as.
    pub admin: Administrator,
}

impl AppContext {
    pub async fn init(config: ThesisConfig, flags: &GlobalFlags) -> anyhow::Result<Self> {
        let service = ThesisService::from_config(&config)
            .await
            .with_context(|| format!("failed to open {}", config.database.path))?;
        let admin = Actor::new(flags.actor.clone(), Role::Admin).administrator()?;
        tracing::debug!(actor = %flags.actor, db = %config.database.path, "context ready");
        Ok(Self {
            service,
            config,
            admin,
        })
    }
}
