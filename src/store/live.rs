//! Live lesson queries.
//!
//! A subscription registers a [`LessonQuery`]; after every committed write the
//! store builds a [`ChangeSet`] of the keys it touched and pushes a fresh
//! snapshot to the subscriptions whose query it matches.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::Serialize;
use tokio::sync::watch;

use crate::types::{Lesson, Profile, ProfileType};

/// The filter behind a lesson query: one reference entity on one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "by", rename_all = "lowercase")]
pub enum LessonQuery {
    Class { class_id: i64, day: NaiveDate },
    Teacher { teacher_id: i64, day: NaiveDate },
    Room { room_id: i64, day: NaiveDate },
}

impl LessonQuery {
    #[must_use]
    pub fn for_profile(profile: &Profile, day: NaiveDate) -> Self {
        match profile.kind {
            ProfileType::Student => LessonQuery::Class {
                class_id: profile.reference_id,
                day,
            },
            ProfileType::Teacher => LessonQuery::Teacher {
                teacher_id: profile.reference_id,
                day,
            },
            ProfileType::Room => LessonQuery::Room {
                room_id: profile.reference_id,
                day,
            },
        }
    }

    #[must_use]
    pub fn day(&self) -> NaiveDate {
        match *self {
            LessonQuery::Class { day, .. }
            | LessonQuery::Teacher { day, .. }
            | LessonQuery::Room { day, .. } => day,
        }
    }
}

/// Keys touched by one committed write.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    all: bool,
    classes: HashSet<(i64, NaiveDate)>,
    teachers: HashSet<(i64, NaiveDate)>,
    rooms: HashSet<(i64, NaiveDate)>,
}

impl ChangeSet {
    /// Matches every query; used for table-wide clears.
    #[must_use]
    pub fn all() -> Self {
        Self {
            all: true,
            ..Self::default()
        }
    }

    pub fn add_class(&mut self, class_id: i64, day: NaiveDate) {
        self.classes.insert((class_id, day));
    }

    pub fn add_teachers(&mut self, teacher_ids: impl IntoIterator<Item = i64>, day: NaiveDate) {
        self.teachers.extend(teacher_ids.into_iter().map(|id| (id, day)));
    }

    pub fn add_rooms(&mut self, room_ids: impl IntoIterator<Item = i64>, day: NaiveDate) {
        self.rooms.extend(room_ids.into_iter().map(|id| (id, day)));
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.all && self.classes.is_empty() && self.teachers.is_empty() && self.rooms.is_empty()
    }

    #[must_use]
    pub fn matches(&self, query: &LessonQuery) -> bool {
        if self.all {
            return true;
        }
        match *query {
            LessonQuery::Class { class_id, day } => self.classes.contains(&(class_id, day)),
            LessonQuery::Teacher { teacher_id, day } => self.teachers.contains(&(teacher_id, day)),
            LessonQuery::Room { room_id, day } => self.rooms.contains(&(room_id, day)),
        }
    }
}

/// Receiving end of a live query. Dropping it unregisters the query on the
/// next commit.
#[derive(Debug)]
pub struct LessonSubscription {
    query: LessonQuery,
    receiver: watch::Receiver<Vec<Lesson>>,
}

impl LessonSubscription {
    #[must_use]
    pub fn query(&self) -> LessonQuery {
        self.query
    }

    /// Latest snapshot without waiting.
    #[must_use]
    pub fn current(&self) -> Vec<Lesson> {
        self.receiver.borrow().clone()
    }

    /// Returns true if a snapshot arrived that has not been seen yet.
    pub fn has_changed(&self) -> bool {
        self.receiver.has_changed().unwrap_or(false)
    }

    /// Waits for the next snapshot. Returns `None` once the store is gone.
    pub async fn changed(&mut self) -> Option<Vec<Lesson>> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }
}

pub(super) struct Subscriber {
    pub query: LessonQuery,
    pub sender: watch::Sender<Vec<Lesson>>,
}

pub(super) fn channel(query: LessonQuery, initial: Vec<Lesson>) -> (Subscriber, LessonSubscription) {
    let (sender, receiver) = watch::channel(initial);
    (
        Subscriber { query, sender },
        LessonSubscription { query, receiver },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_change_set_matches_only_touched_keys() {
        let mut changes = ChangeSet::default();
        changes.add_class(42, day(4));
        changes.add_teachers([7], day(4));

        assert!(changes.matches(&LessonQuery::Class { class_id: 42, day: day(4) }));
        assert!(!changes.matches(&LessonQuery::Class { class_id: 42, day: day(5) }));
        assert!(!changes.matches(&LessonQuery::Class { class_id: 43, day: day(4) }));
        assert!(changes.matches(&LessonQuery::Teacher { teacher_id: 7, day: day(4) }));
        assert!(!changes.matches(&LessonQuery::Room { room_id: 7, day: day(4) }));
    }

    #[test]
    fn test_change_set_all_matches_everything() {
        let changes = ChangeSet::all();
        assert!(!changes.is_empty());
        assert!(changes.matches(&LessonQuery::Room { room_id: 1, day: day(1) }));
        assert!(ChangeSet::default().is_empty());
    }

    #[test]
    fn test_query_for_profile() {
        let profile = Profile {
            id: 1,
            kind: ProfileType::Teacher,
            name: "MUE".to_string(),
            reference_id: 9,
        };
        assert_eq!(
            LessonQuery::for_profile(&profile, day(4)),
            LessonQuery::Teacher { teacher_id: 9, day: day(4) }
        );
    }
}
