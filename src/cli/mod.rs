mod admin;
mod commands;
mod plan;
pub mod pickers;
mod profile;
mod school;

pub use admin::{run_db_rebuild, run_init, run_logs, run_reset, run_status};
pub use commands::{DbCommands, ProfileCommands, SchoolCommands};
pub use plan::{run_show, run_sync, run_watch};
pub use profile::{run_profile_add, run_profile_list, run_profile_remove, run_profile_use};
pub use school::{run_school_add, run_school_list, run_school_remove};

use std::path::{Path, PathBuf};

use crate::config::AppConfig;
use crate::fetch::HttpPlanSource;
use crate::store::{SqliteStore, Store};

/// Resolves the data directory, defaulting to the platform location.
pub fn data_dir_or_default(data_dir: Option<PathBuf>) -> PathBuf {
    data_dir.unwrap_or_else(AppConfig::default_data_dir)
}

/// Loads the config and opens the store of an initialized data directory.
pub fn init_store(data_dir: &Path) -> anyhow::Result<(AppConfig, SqliteStore)> {
    let config = AppConfig::load(data_dir)?;
    let db_path = config.db_path();

    if !db_path.exists() {
        anyhow::bail!(
            "Database not found at {}. Run 'vplan init' first.",
            db_path.display()
        );
    }

    let store = SqliteStore::new(&db_path)?;
    store.initialize()?;
    Ok((config, store))
}

pub fn plan_source(config: &AppConfig) -> anyhow::Result<HttpPlanSource> {
    HttpPlanSource::from_config(config).map_err(Into::into)
}
