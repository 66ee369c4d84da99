mod live;
mod schema;
mod settings;
mod sqlite;

pub use live::{ChangeSet, LessonQuery, LessonSubscription};
pub use schema::latest_version as latest_schema_version;
pub use settings::{Settings, keys};
pub use sqlite::SqliteStore;

use chrono::NaiveDate;

use crate::error::Result;
use crate::types::*;

/// Result of replacing one (class, day) of lessons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Stored rows already carry the incoming version; nothing was written.
    Unchanged,
    Replaced { removed: usize, inserted: usize },
}

/// Store defines the database interface.
pub trait Store: Send + Sync {
    /// Applies pending schema migrations.
    fn initialize(&self) -> Result<()>;
    fn schema_version(&self) -> Result<i32>;

    // School operations
    fn create_school(&self, school: &School) -> Result<()>;
    fn get_school(&self, id: i64) -> Result<Option<School>>;
    fn list_schools(&self) -> Result<Vec<School>>;
    fn update_school_credentials(&self, id: i64, username: &str, password: &str) -> Result<()>;
    fn update_school_days_per_week(&self, id: i64, days_per_week: i32) -> Result<()>;
    /// Removes the school and everything that depends on it, including profiles.
    fn delete_school(&self, id: i64) -> Result<bool>;

    // Reference entities (materialized from base data or lazily)
    fn find_or_create_class(&self, school_id: i64, name: &str) -> Result<Class>;
    fn get_class(&self, id: i64) -> Result<Option<Class>>;
    fn get_class_by_name(&self, school_id: i64, name: &str) -> Result<Option<Class>>;
    fn list_classes(&self, school_id: i64) -> Result<Vec<Class>>;

    fn find_or_create_teacher(&self, school_id: i64, acronym: &str) -> Result<Teacher>;
    fn get_teacher(&self, id: i64) -> Result<Option<Teacher>>;
    fn get_teacher_by_acronym(&self, school_id: i64, acronym: &str) -> Result<Option<Teacher>>;
    fn list_teachers(&self, school_id: i64) -> Result<Vec<Teacher>>;

    fn find_or_create_room(&self, school_id: i64, name: &str) -> Result<Room>;
    fn get_room(&self, id: i64) -> Result<Option<Room>>;
    fn get_room_by_name(&self, school_id: i64, name: &str) -> Result<Option<Room>>;
    fn list_rooms(&self, school_id: i64) -> Result<Vec<Room>>;

    // Profile operations
    fn create_profile(&self, kind: ProfileType, name: &str, reference_id: i64) -> Result<Profile>;
    fn get_profile(&self, id: i64) -> Result<Option<Profile>>;
    fn find_profile(&self, kind: ProfileType, reference_id: i64) -> Result<Option<Profile>>;
    fn list_profiles(&self) -> Result<Vec<Profile>>;
    fn delete_profile(&self, id: i64) -> Result<bool>;
    /// School that owns the entity a profile points at.
    fn profile_school(&self, profile: &Profile) -> Result<Option<School>>;

    // Lesson operations
    /// Replaces every lesson of (class_id, day) with `lessons` in one
    /// transaction, unless the stored rows already carry `version`.
    fn sync_day(
        &self,
        class_id: i64,
        day: NaiveDate,
        lessons: &[NewLesson],
        version: i64,
    ) -> Result<SyncOutcome>;
    /// Version shared by the stored rows of (class_id, day), if any.
    fn stored_version(&self, class_id: i64, day: NaiveDate) -> Result<Option<i64>>;
    fn lessons_for(&self, query: LessonQuery) -> Result<Vec<Lesson>>;
    fn subscribe(&self, query: LessonQuery) -> Result<LessonSubscription>;
    fn delete_lessons_for_class(&self, class_id: i64, day: NaiveDate) -> Result<usize>;
    /// Clears all plan data: every lesson, day info row and free day.
    fn delete_all_lessons(&self) -> Result<usize>;

    // Day info
    fn upsert_day_info(&self, info: &DayInfo) -> Result<()>;
    fn get_day_info(&self, school_id: i64, day: NaiveDate) -> Result<Option<DayInfo>>;

    // Free days
    /// Replaces the school's free days with `days` in one transaction.
    fn replace_free_days(&self, school_id: i64, days: &[NaiveDate]) -> Result<()>;
    fn is_free_day(&self, school_id: i64, day: NaiveDate) -> Result<bool>;

    // Key/value operations
    fn get_value(&self, key: &str) -> Result<Option<String>>;
    fn set_value(&self, key: &str, value: &str) -> Result<()>;
    fn delete_value(&self, key: &str) -> Result<bool>;

    // Log records
    fn log(&self, tag: &str, message: &str) -> Result<()>;
    fn list_logs(&self, limit: i64) -> Result<Vec<LogRecord>>;
}
