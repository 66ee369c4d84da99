use std::fs;
use std::path::Path;

use serde::Serialize;

use super::init_store;
use super::pickers::{confirm_action, format_relative_time};
use crate::config::{AppConfig, CONFIG_FILE_NAME};
use crate::store::{Settings, SqliteStore, Store, latest_schema_version};
use crate::usecases::{active_profile, ignore_invalid_session};

/// Creates the data directory, writes `config.toml` and the database.
pub fn run_init(data_dir: &Path, base_url: Option<String>) -> anyhow::Result<()> {
    fs::create_dir_all(data_dir)?;

    let mut config = AppConfig::load(data_dir)?;
    if let Some(url) = base_url {
        config.base_url = url.trim_end_matches('/').to_string();
    }
    config.save()?;
    // Validate what was written.
    let config = AppConfig::load(data_dir)?;

    let store = SqliteStore::new(config.db_path())?;
    store.initialize()?;

    println!();
    println!("Initialized {}", data_dir.display());
    println!("  Config:   {}", data_dir.join(CONFIG_FILE_NAME).display());
    println!("  Database: {}", config.db_path().display());
    println!("  Provider: {}", config.base_url);
    println!();
    println!("Next: vplan school add");
    println!();

    Ok(())
}

#[derive(Serialize)]
struct StatusOutput {
    data_dir: String,
    base_url: String,
    schema_version: i32,
    latest_schema_version: i32,
    schools: usize,
    profiles: usize,
    active_profile: Option<String>,
    last_sync: Option<String>,
    invalid_session: bool,
}

pub fn run_status(data_dir: &Path, json: bool, ignore_session: bool) -> anyhow::Result<()> {
    let (config, store) = init_store(data_dir)?;

    if ignore_session {
        ignore_invalid_session(&store)?;
    }

    let settings = Settings::load(&store)?;
    let status = StatusOutput {
        data_dir: config.data_dir.display().to_string(),
        base_url: config.base_url.clone(),
        schema_version: store.schema_version()?,
        latest_schema_version: latest_schema_version(),
        schools: store.list_schools()?.len(),
        profiles: store.list_profiles()?.len(),
        active_profile: active_profile(&store)?.map(|p| format!("{} ({})", p.name, p.kind)),
        last_sync: settings.last_sync.map(|ts| ts.to_rfc3339()),
        invalid_session: settings.invalid_session,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!();
    println!("Data directory:  {}", status.data_dir);
    println!("Provider:        {}", status.base_url);
    println!(
        "Schema version:  {} (latest {})",
        status.schema_version, status.latest_schema_version
    );
    println!("Schools:         {}", status.schools);
    println!("Profiles:        {}", status.profiles);
    println!(
        "Active profile:  {}",
        status.active_profile.as_deref().unwrap_or("none")
    );
    let last_sync = settings
        .last_sync
        .as_ref()
        .map(format_relative_time)
        .unwrap_or_else(|| "never".to_string());
    println!("Last sync:       {last_sync}");
    if status.invalid_session {
        println!();
        println!("Warning: the online session was reported invalid.");
        println!("Run 'vplan status --ignore-invalid-session' to dismiss.");
    }
    println!();

    Ok(())
}

/// Deletes all lessons and day info. Schools, rosters and profiles stay.
pub fn run_reset(data_dir: &Path, yes: bool, non_interactive: bool) -> anyhow::Result<()> {
    let (_config, store) = init_store(data_dir)?;

    if !confirm_action("Delete all stored plan data?", yes, non_interactive)? {
        println!("Cancelled.");
        return Ok(());
    }

    let removed = store.delete_all_lessons()?;
    store.log("Reset", &format!("deleted {removed} lessons"))?;
    println!("Deleted {removed} lessons.");
    Ok(())
}

pub fn run_logs(data_dir: &Path, limit: i64, json: bool) -> anyhow::Result<()> {
    let (_config, store) = init_store(data_dir)?;
    let records = store.list_logs(limit)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No log records.");
        return Ok(());
    }

    for record in records.iter().rev() {
        println!(
            "{}  {:<10} {}",
            record.timestamp.format("%Y-%m-%d %H:%M:%S"),
            record.tag,
            record.message
        );
    }
    Ok(())
}

pub fn run_db_rebuild(data_dir: &Path, yes: bool) -> anyhow::Result<()> {
    if !yes {
        anyhow::bail!("Rebuilding drops all data; pass --yes to confirm");
    }

    let (_config, store) = init_store(data_dir)?;
    store.rebuild_destructive()?;
    store.log("Database", "rebuilt schema, all data dropped")?;
    println!("Database rebuilt at schema version {}.", store.schema_version()?);
    Ok(())
}
