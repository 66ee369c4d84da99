use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::store::{LessonQuery, LessonSubscription, Settings, Store};
use crate::types::{DayType, Lesson, Profile, ProfileType};

/// Creates a profile for the class, teacher or room called `name` and makes
/// it the active one. An existing profile for the same entity is reused.
pub fn create_profile(
    store: &dyn Store,
    school_id: i64,
    kind: ProfileType,
    name: &str,
) -> Result<Profile> {
    let reference_id = match kind {
        ProfileType::Student => store.get_class_by_name(school_id, name)?.map(|c| c.id),
        ProfileType::Teacher => store.get_teacher_by_acronym(school_id, name)?.map(|t| t.id),
        ProfileType::Room => store.get_room_by_name(school_id, name)?.map(|r| r.id),
    }
    .ok_or(Error::NotFound)?;

    let profile = match store.find_profile(kind, reference_id)? {
        Some(existing) => existing,
        None => {
            let profile = store.create_profile(kind, name, reference_id)?;
            info!(profile_id = profile.id, %kind, name, "created profile");
            profile
        }
    };

    Settings::set_active_profile(store, Some(profile.id))?;
    Ok(profile)
}

/// The active profile, or `None` when unset or pointing at a deleted profile.
pub fn active_profile(store: &dyn Store) -> Result<Option<Profile>> {
    match Settings::load(store)?.active_profile {
        Some(id) => store.get_profile(id),
        None => Ok(None),
    }
}

pub fn set_active_profile(store: &dyn Store, profile_id: i64) -> Result<Profile> {
    let profile = store.get_profile(profile_id)?.ok_or(Error::NotFound)?;
    Settings::set_active_profile(store, Some(profile.id))?;
    Ok(profile)
}

pub fn delete_profile(store: &dyn Store, profile_id: i64) -> Result<bool> {
    if !store.delete_profile(profile_id)? {
        return Ok(false);
    }
    if Settings::load(store)?.active_profile == Some(profile_id) {
        Settings::set_active_profile(store, None)?;
    }
    Ok(true)
}

/// Lessons of one profile on one day, with the kind of day it is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileDay {
    pub day: NaiveDate,
    pub day_type: DayType,
    pub lessons: Vec<Lesson>,
}

/// Classifies `day` for a school from its week length, its stored free days
/// and whether a plan for the day has been stored.
pub fn day_type(store: &dyn Store, school_id: i64, day: NaiveDate) -> Result<DayType> {
    let school = store.get_school(school_id)?.ok_or(Error::NotFound)?;
    let is_free_day = store.is_free_day(school_id, day)?;
    let has_plan = store.get_day_info(school_id, day)?.is_some();
    Ok(DayType::classify(day, school.days_per_week, is_free_day, has_plan))
}

pub fn lessons_for_profile(store: &dyn Store, profile: &Profile, day: NaiveDate) -> Result<ProfileDay> {
    let school = store.profile_school(profile)?.ok_or(Error::NotFound)?;
    Ok(ProfileDay {
        day,
        day_type: day_type(store, school.id, day)?,
        lessons: store.lessons_for(LessonQuery::for_profile(profile, day))?,
    })
}

pub fn subscribe_profile(
    store: &dyn Store,
    profile: &Profile,
    day: NaiveDate,
) -> Result<LessonSubscription> {
    store.subscribe(LessonQuery::for_profile(profile, day))
}

/// A profile subscription that can be moved to another day, so a long-running
/// watcher follows the calendar.
pub struct ProfileWatch {
    profile: Profile,
    day: NaiveDate,
    subscription: LessonSubscription,
}

impl ProfileWatch {
    pub fn new(store: &dyn Store, profile: Profile, day: NaiveDate) -> Result<Self> {
        let subscription = subscribe_profile(store, &profile, day)?;
        Ok(Self {
            profile,
            day,
            subscription,
        })
    }

    #[must_use]
    pub fn day(&self) -> NaiveDate {
        self.day
    }

    pub fn subscription(&mut self) -> &mut LessonSubscription {
        &mut self.subscription
    }

    /// Re-subscribes for `day` when it differs from the watched day. Returns
    /// whether the subscription was replaced.
    pub fn advance_to(&mut self, store: &dyn Store, day: NaiveDate) -> Result<bool> {
        if day == self.day {
            return Ok(false);
        }
        self.subscription = subscribe_profile(store, &self.profile, day)?;
        debug!(profile_id = self.profile.id, from = %self.day, to = %day, "watch moved to new day");
        self.day = day;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::store::SqliteStore;
    use crate::types::{DayInfo, NewLesson, School};

    fn setup() -> (TempDir, SqliteStore) {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
        store.initialize().unwrap();
        store
            .create_school(&School {
                id: 10000000,
                name: "Testschule".to_string(),
                username: "schueler".to_string(),
                password: "secret".to_string(),
                days_per_week: 5,
            })
            .unwrap();
        (temp, store)
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
    }

    fn lesson(number: i32, subject: &str) -> NewLesson {
        NewLesson {
            lesson_number: number,
            subject: Some(subject.to_string()),
            changed_subject: None,
            info: None,
            room_changed: false,
            teacher_changed: false,
            begin: None,
            end: None,
            course_number: None,
            teacher_ids: vec![],
            room_ids: vec![],
        }
    }

    #[test]
    fn test_create_profile_sets_active() {
        let (_temp, store) = setup();
        let class = store.find_or_create_class(10000000, "5a").unwrap();

        let profile = create_profile(&store, 10000000, ProfileType::Student, "5a").unwrap();
        assert_eq!(profile.reference_id, class.id);
        assert_eq!(active_profile(&store).unwrap(), Some(profile.clone()));

        let again = create_profile(&store, 10000000, ProfileType::Student, "5a").unwrap();
        assert_eq!(again.id, profile.id);
        assert_eq!(store.list_profiles().unwrap().len(), 1);
    }

    #[test]
    fn test_create_profile_for_unknown_name() {
        let (_temp, store) = setup();
        let result = create_profile(&store, 10000000, ProfileType::Teacher, "XYZ");
        assert!(matches!(result, Err(Error::NotFound)));
        assert_eq!(active_profile(&store).unwrap(), None);
    }

    #[test]
    fn test_switch_and_delete_active_profile() {
        let (_temp, store) = setup();
        store.find_or_create_class(10000000, "5a").unwrap();
        store.find_or_create_room(10000000, "101").unwrap();
        let student = create_profile(&store, 10000000, ProfileType::Student, "5a").unwrap();
        let room = create_profile(&store, 10000000, ProfileType::Room, "101").unwrap();
        assert_eq!(active_profile(&store).unwrap().unwrap().id, room.id);

        set_active_profile(&store, student.id).unwrap();
        assert_eq!(active_profile(&store).unwrap().unwrap().id, student.id);
        assert!(matches!(set_active_profile(&store, 999), Err(Error::NotFound)));

        assert!(delete_profile(&store, student.id).unwrap());
        assert_eq!(active_profile(&store).unwrap(), None);
        assert!(!delete_profile(&store, student.id).unwrap());
    }

    #[test]
    fn test_lessons_for_teacher_profile() {
        let (_temp, store) = setup();
        let class = store.find_or_create_class(10000000, "5a").unwrap();
        let teacher = store.find_or_create_teacher(10000000, "MUE").unwrap();
        let lesson = |number, teacher_ids| NewLesson {
            lesson_number: number,
            subject: Some("MA".to_string()),
            changed_subject: None,
            info: None,
            room_changed: false,
            teacher_changed: false,
            begin: None,
            end: None,
            course_number: None,
            teacher_ids,
            room_ids: vec![],
        };
        store
            .sync_day(class.id, day(), &[lesson(1, vec![teacher.id]), lesson(2, vec![])], 1)
            .unwrap();

        let profile = create_profile(&store, 10000000, ProfileType::Teacher, "MUE").unwrap();
        let shown = lessons_for_profile(&store, &profile, day()).unwrap();
        assert_eq!(shown.lessons.len(), 1);
        assert_eq!(shown.lessons[0].lesson_number, 1);
        assert_eq!(shown.day_type, DayType::NoData);

        let sub = subscribe_profile(&store, &profile, day()).unwrap();
        assert_eq!(sub.current(), shown.lessons);
    }

    #[test]
    fn test_day_type_for_plan_holiday_and_weekend() {
        let (_temp, store) = setup();
        store.find_or_create_class(10000000, "5a").unwrap();
        let profile = create_profile(&store, 10000000, ProfileType::Student, "5a").unwrap();
        store
            .upsert_day_info(&DayInfo {
                school_id: 10000000,
                day: day(),
                version: 1,
                info_lines: vec![],
            })
            .unwrap();
        assert_eq!(lessons_for_profile(&store, &profile, day()).unwrap().day_type, DayType::Normal);

        let easter = NaiveDate::from_ymd_opt(2024, 3, 25).unwrap();
        store.replace_free_days(10000000, &[easter]).unwrap();
        let holiday = lessons_for_profile(&store, &profile, easter).unwrap();
        assert_eq!(holiday.day_type, DayType::Holiday);
        assert!(holiday.lessons.is_empty());

        let saturday = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(
            lessons_for_profile(&store, &profile, saturday).unwrap().day_type,
            DayType::Weekend
        );
        store.update_school_days_per_week(10000000, 6).unwrap();
        assert_eq!(day_type(&store, 10000000, saturday).unwrap(), DayType::NoData);
    }

    #[test]
    fn test_watch_advances_to_next_day() {
        let (_temp, store) = setup();
        let class = store.find_or_create_class(10000000, "5a").unwrap();
        let next = day().succ_opt().unwrap();
        store.sync_day(class.id, day(), &[lesson(1, "MA")], 1).unwrap();
        store.sync_day(class.id, next, &[lesson(3, "DE")], 1).unwrap();

        let profile = create_profile(&store, 10000000, ProfileType::Student, "5a").unwrap();
        let mut watch = ProfileWatch::new(&store, profile, day()).unwrap();
        assert_eq!(watch.subscription().current()[0].lesson_number, 1);

        assert!(!watch.advance_to(&store, day()).unwrap());
        assert!(watch.advance_to(&store, next).unwrap());
        assert_eq!(watch.day(), next);
        let current = watch.subscription().current();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].subject.as_deref(), Some("DE"));
    }
}
