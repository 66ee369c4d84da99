use chrono::{DateTime, Utc};
use serde::Serialize;

use super::Store;
use crate::error::Result;

/// Keys of the key/value table and the type stored under each.
pub mod keys {
    /// `i64`: id of the profile shown by default.
    pub const ACTIVE_PROFILE: &str = "active_profile";
    /// `bool`: the online account session was reported invalid.
    pub const INVALID_SESSION: &str = "invalid_vpp_session";
    /// RFC 3339 timestamp of the last sync that returned success.
    pub const LAST_SYNC: &str = "last_sync";
}

/// Typed view of the process-wide settings. Each setter writes only its own
/// key, so concurrent writers of other keys are never overwritten.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Settings {
    pub active_profile: Option<i64>,
    pub invalid_session: bool,
    pub last_sync: Option<DateTime<Utc>>,
}

impl Settings {
    pub fn load(store: &dyn Store) -> Result<Self> {
        let active_profile = store
            .get_value(keys::ACTIVE_PROFILE)?
            .and_then(|v| v.parse().ok());
        let invalid_session = store
            .get_value(keys::INVALID_SESSION)?
            .is_some_and(|v| v == "true");
        let last_sync = store
            .get_value(keys::LAST_SYNC)?
            .and_then(|v| DateTime::parse_from_rfc3339(&v).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Ok(Self {
            active_profile,
            invalid_session,
            last_sync,
        })
    }

    pub fn set_active_profile(store: &dyn Store, profile_id: Option<i64>) -> Result<()> {
        match profile_id {
            Some(id) => store.set_value(keys::ACTIVE_PROFILE, &id.to_string()),
            None => store.delete_value(keys::ACTIVE_PROFILE).map(|_| ()),
        }
    }

    pub fn set_invalid_session(store: &dyn Store, invalid: bool) -> Result<()> {
        store.set_value(keys::INVALID_SESSION, &invalid.to_string())
    }

    pub fn set_last_sync(store: &dyn Store, at: DateTime<Utc>) -> Result<()> {
        store.set_value(keys::LAST_SYNC, &at.to_rfc3339())
    }
}
