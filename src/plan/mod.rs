//! Conversion of the provider's XML into plan data.
//!
//! Both parsers are pure: the same bytes always produce the same structure,
//! which keeps re-syncs idempotent.

mod xml;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::types::CANCELLED_SUBJECT;
use xml::{XmlBaseData, XmlLesson, XmlMarked, XmlPlan};

const DEFAULT_DAYS_PER_WEEK: i32 = 5;

/// A day's plan for one school.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedPlan {
    pub school_id: i64,
    /// Date named by the payload itself, if it names one.
    pub date: Option<NaiveDate>,
    /// Provider revision stamp used for change detection.
    pub version: i64,
    pub days_per_week: Option<i32>,
    pub free_days: Vec<NaiveDate>,
    pub info_lines: Vec<String>,
    pub classes: Vec<PlannedClass>,
}

impl ParsedPlan {
    pub fn class(&self, name: &str) -> Option<&PlannedClass> {
        self.classes.iter().find(|c| c.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedClass {
    pub name: String,
    pub lessons: Vec<PlannedLesson>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedLesson {
    pub lesson_number: i32,
    pub subject: Option<String>,
    pub subject_changed: bool,
    pub teachers: Vec<String>,
    pub teacher_changed: bool,
    pub rooms: Vec<String>,
    pub room_changed: bool,
    pub info: Option<String>,
    pub begin: Option<NaiveTime>,
    pub end: Option<NaiveTime>,
    pub course_number: Option<i64>,
}

impl PlannedLesson {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.subject.as_deref() == Some(CANCELLED_SUBJECT)
    }

    /// The substituted subject, present only when the provider marked a change.
    #[must_use]
    pub fn changed_subject(&self) -> Option<&str> {
        if self.subject_changed {
            self.subject.as_deref()
        } else {
            None
        }
    }
}

/// A school's roster as published in its base data file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BaseData {
    pub school_name: String,
    pub days_per_week: i32,
    pub class_names: Vec<String>,
    pub teacher_shorts: Vec<String>,
    pub room_names: Vec<String>,
}

pub fn parse_plan(raw: &str, school_id: i64) -> Result<ParsedPlan> {
    let doc: XmlPlan = quick_xml::de::from_str(raw)?;

    let version = doc
        .head
        .timestamp
        .as_deref()
        .and_then(parse_timestamp_version)
        .unwrap_or_else(|| content_version(raw));

    let date = doc.head.file.as_deref().and_then(parse_file_date);
    let days_per_week = doc.head.days_per_week.as_deref().and_then(parse_int::<i32>);

    let free_days = doc
        .free_days
        .days
        .iter()
        .filter_map(|d| NaiveDate::parse_from_str(d.trim(), "%y%m%d").ok())
        .collect();

    let info_lines = doc
        .extra_info
        .lines
        .into_iter()
        .map(|line| line.trim().to_string())
        .collect();

    let mut classes: Vec<PlannedClass> = Vec::with_capacity(doc.classes.classes.len());
    for class in doc.classes.classes {
        let name = class.name.trim().to_string();
        if name.is_empty() {
            tracing::debug!(school_id, "skipping class without name");
            continue;
        }
        let lessons = class
            .plan
            .lessons
            .into_iter()
            .filter_map(|lesson| convert_lesson(lesson, &name))
            .collect();
        classes.push(PlannedClass { name, lessons });
    }

    Ok(ParsedPlan {
        school_id,
        date,
        version,
        days_per_week,
        free_days,
        info_lines,
        classes,
    })
}

pub fn parse_base_data(raw: &str) -> Result<BaseData> {
    let doc: XmlBaseData = quick_xml::de::from_str(raw)?;

    let school_name = doc
        .head
        .school_name
        .map(|s| s.trim().to_string())
        .unwrap_or_default();

    let days_per_week = doc
        .basics
        .days_per_week
        .as_deref()
        .or(doc.head.days_per_week.as_deref())
        .and_then(parse_int::<i32>)
        .unwrap_or(DEFAULT_DAYS_PER_WEEK);

    let mut class_names = Vec::new();
    let mut teacher_shorts = Vec::new();
    for class in &doc.classes.classes {
        push_unique(&mut class_names, class.name.trim());
        for course in &class.courses.courses {
            if let Some(teacher) = course.number.as_ref().and_then(|n| n.teacher.as_deref()) {
                for short in split_names(teacher) {
                    push_unique(&mut teacher_shorts, &short);
                }
            }
        }
    }

    let mut room_names = Vec::new();
    for room in &doc.rooms.rooms {
        push_unique(&mut room_names, room.trim());
    }

    Ok(BaseData {
        school_name,
        days_per_week,
        class_names,
        teacher_shorts,
        room_names,
    })
}

fn convert_lesson(lesson: XmlLesson, class_name: &str) -> Option<PlannedLesson> {
    let Some(lesson_number) = lesson.number.as_deref().and_then(parse_int::<i32>) else {
        tracing::debug!(class = class_name, "skipping lesson without slot number");
        return None;
    };

    let (subject, subject_changed) = marked_text(lesson.subject.as_ref());
    let (teachers, teacher_changed) = marked_list(lesson.teacher.as_ref());
    let (rooms, room_changed) = marked_list(lesson.room.as_ref());

    Some(PlannedLesson {
        lesson_number,
        subject,
        subject_changed,
        teachers,
        teacher_changed,
        rooms,
        room_changed,
        info: lesson.info.as_deref().and_then(non_empty),
        begin: lesson.begin.as_deref().and_then(parse_time),
        end: lesson.end.as_deref().and_then(parse_time),
        course_number: lesson.course_number.as_deref().and_then(parse_int::<i64>),
    })
}

fn is_marked(marked: &XmlMarked) -> bool {
    marked.changed.as_deref().is_some_and(|m| !m.trim().is_empty())
}

fn marked_text(marked: Option<&XmlMarked>) -> (Option<String>, bool) {
    match marked {
        Some(m) => (non_empty(&m.value), is_marked(m)),
        None => (None, false),
    }
}

fn marked_list(marked: Option<&XmlMarked>) -> (Vec<String>, bool) {
    match marked {
        Some(m) => (split_names(&m.value), is_marked(m)),
        None => (Vec::new(), false),
    }
}

/// Splits "MUE, SCH" or "101 102" into individual names.
fn split_names(s: &str) -> Vec<String> {
    s.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn push_unique(names: &mut Vec<String>, name: &str) {
    if !name.is_empty() && !names.iter().any(|n| n == name) {
        names.push(name.to_string());
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_int<T: std::str::FromStr>(s: &str) -> Option<T> {
    s.trim().parse().ok()
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").ok()
}

/// "04.03.2024, 07:12" becomes 202403040712.
fn parse_timestamp_version(s: &str) -> Option<i64> {
    let ts = NaiveDateTime::parse_from_str(s.trim(), "%d.%m.%Y, %H:%M").ok()?;
    ts.format("%Y%m%d%H%M").to_string().parse().ok()
}

/// Fallback revision for payloads without a timestamp: first 8 bytes of the
/// SHA-256 of the payload, kept non-negative.
fn content_version(raw: &str) -> i64 {
    let digest = Sha256::digest(raw.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(bytes) >> 1) as i64
}

/// "PlanKl20240304.xml" names 2024-03-04.
fn parse_file_date(file: &str) -> Option<NaiveDate> {
    let digits: String = file.chars().filter(char::is_ascii_digit).collect();
    if digits.len() != 8 {
        return None;
    }
    NaiveDate::parse_from_str(&digits, "%Y%m%d").ok()
}
