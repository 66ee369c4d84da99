//! Onboarding and profile workflows built on the store and the fetcher.

mod profile;
mod school;

pub use profile::{
    ProfileDay, ProfileWatch, active_profile, create_profile, day_type, delete_profile,
    lessons_for_profile, set_active_profile, subscribe_profile,
};
pub use school::{check_school_id, create_school, delete_school, login, process_base_data};

use crate::error::Result;
use crate::store::{Settings, Store};

/// Clears the invalid-session warning until the next sync reports it again.
pub fn ignore_invalid_session(store: &dyn Store) -> Result<()> {
    Settings::set_invalid_session(store, false)
}
