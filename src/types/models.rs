use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::ProfileType;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct School {
    /// Numeric id issued by the timetable provider.
    pub id: i64,
    pub name: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub days_per_week: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Class {
    pub id: i64,
    pub school_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Teacher {
    pub id: i64,
    pub school_id: i64,
    pub acronym: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: i64,
    pub school_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: i64,
    pub kind: ProfileType,
    pub name: String,
    /// Class, teacher or room id depending on `kind`.
    pub reference_id: i64,
}

/// A stored lesson row with its teachers and rooms resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: i64,
    pub lesson_number: i32,
    pub class_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed_subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
    pub room_changed: bool,
    pub teacher_changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub begin: Option<NaiveTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<NaiveTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_number: Option<i64>,
    pub day: NaiveDate,
    pub version: i64,
    pub teachers: Vec<Teacher>,
    pub rooms: Vec<Room>,
}

impl Lesson {
    /// The subject actually taught, preferring the substitution.
    #[must_use]
    pub fn display_subject(&self) -> Option<&str> {
        self.changed_subject.as_deref().or(self.subject.as_deref())
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.display_subject() == Some(CANCELLED_SUBJECT)
    }
}

/// Subject text the provider publishes for a cancelled lesson.
pub const CANCELLED_SUBJECT: &str = "---";

/// A lesson ready for insertion; class, teachers and rooms are already materialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLesson {
    pub lesson_number: i32,
    pub subject: Option<String>,
    pub changed_subject: Option<String>,
    pub info: Option<String>,
    pub room_changed: bool,
    pub teacher_changed: bool,
    pub begin: Option<NaiveTime>,
    pub end: Option<NaiveTime>,
    pub course_number: Option<i64>,
    pub teacher_ids: Vec<i64>,
    pub room_ids: Vec<i64>,
}

/// Per-day plan metadata that is not tied to a class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayInfo {
    pub school_id: i64,
    pub day: NaiveDate,
    pub version: i64,
    pub info_lines: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub tag: String,
    pub message: String,
}
