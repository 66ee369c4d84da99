//! # vplan
//!
//! Substitution plan sync for schools publishing on stundenplan24: fetches the
//! daily XML plan, parses it and keeps a local SQLite store current, with live
//! lesson queries per student, teacher or room profile.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! vplan = { version = "0.0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vplan::config::AppConfig;
//! use vplan::fetch::HttpPlanSource;
//! use vplan::store::{SqliteStore, Store};
//! use vplan::sync::SyncService;
//!
//! let config = AppConfig::load("./data")?;
//! let store = SqliteStore::new(config.db_path())?;
//! store.initialize()?;
//!
//! let service = SyncService::new(Arc::new(store), Arc::new(HttpPlanSource::from_config(&config)?));
//! let reports = service.sync_all(chrono::Local::now().date_naive()).await?;
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Includes CLI module. Disable with `default-features = false`.

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod plan;
pub mod store;
pub mod sync;
pub mod types;
pub mod usecases;
