use std::fmt;

use chrono::{DateTime, Utc};
use inquire::Select;

use crate::store::Store;
use crate::types::{Lesson, Profile, ProfileType, School};

/// Profile row for pickers and listings
pub struct ProfileDisplay {
    pub profile: Profile,
    pub active: bool,
}

impl fmt::Display for ProfileDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = if self.active { "*" } else { " " };
        write!(
            f,
            "{marker} {:>3}  {:<8} {}",
            self.profile.id, self.profile.kind, self.profile.name
        )
    }
}

pub struct SchoolDisplay(pub School);

impl fmt::Display for SchoolDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.0.name, self.0.id)
    }
}

pub fn confirm_action(message: &str, yes: bool, non_interactive: bool) -> anyhow::Result<bool> {
    if yes {
        Ok(true)
    } else if non_interactive {
        anyhow::bail!("--yes is required for destructive operations in non-interactive mode");
    } else {
        Ok(inquire::Confirm::new(message)
            .with_default(false)
            .prompt()?)
    }
}

/// Picks a school, skipping the prompt when only one is stored.
pub fn select_school(store: &dyn Store, school_id: Option<i64>, non_interactive: bool) -> anyhow::Result<School> {
    if let Some(id) = school_id {
        return store
            .get_school(id)?
            .ok_or_else(|| anyhow::anyhow!("School {id} not found"));
    }

    let mut schools = store.list_schools()?;
    match schools.len() {
        0 => anyhow::bail!("No schools stored. Run 'vplan school add' first."),
        1 => Ok(schools.remove(0)),
        _ if non_interactive => anyhow::bail!("Several schools stored; pass --school"),
        _ => {
            let options: Vec<SchoolDisplay> = schools.into_iter().map(SchoolDisplay).collect();
            Ok(Select::new("School:", options).prompt()?.0)
        }
    }
}

pub fn select_profile(store: &dyn Store, active: Option<i64>, message: &str) -> anyhow::Result<Profile> {
    let profiles = store.list_profiles()?;
    if profiles.is_empty() {
        anyhow::bail!("No profiles stored. Run 'vplan profile add' first.");
    }
    let options: Vec<ProfileDisplay> = profiles
        .into_iter()
        .map(|profile| ProfileDisplay {
            active: Some(profile.id) == active,
            profile,
        })
        .collect();
    Ok(Select::new(message, options).prompt()?.profile)
}

/// Names a profile of `kind` can point at, for the name picker.
pub fn reference_names(store: &dyn Store, school_id: i64, kind: ProfileType) -> anyhow::Result<Vec<String>> {
    let names = match kind {
        ProfileType::Student => store.list_classes(school_id)?.into_iter().map(|c| c.name).collect(),
        ProfileType::Teacher => store.list_teachers(school_id)?.into_iter().map(|t| t.acronym).collect(),
        ProfileType::Room => store.list_rooms(school_id)?.into_iter().map(|r| r.name).collect(),
    };
    Ok(names)
}

/// One line of the lesson table. Changed fields are marked with '!'.
pub fn format_lesson(lesson: &Lesson, class_name: Option<&str>) -> String {
    let subject = lesson.display_subject().unwrap_or("-");
    let subject_mark = if lesson.changed_subject.is_some() { "!" } else { "" };
    let teachers = join_or_dash(lesson.teachers.iter().map(|t| t.acronym.as_str()));
    let teacher_mark = if lesson.teacher_changed { "!" } else { "" };
    let rooms = join_or_dash(lesson.rooms.iter().map(|r| r.name.as_str()));
    let room_mark = if lesson.room_changed { "!" } else { "" };
    let time = match (lesson.begin, lesson.end) {
        (Some(begin), Some(end)) => format!("{}-{}", begin.format("%H:%M"), end.format("%H:%M")),
        _ => String::new(),
    };

    let mut line = format!(
        "{:>2}  {:<11} {:<6} {:<8} {:<10} {:<8}",
        lesson.lesson_number,
        time,
        class_name.unwrap_or(""),
        format!("{subject}{subject_mark}"),
        format!("{teachers}{teacher_mark}"),
        format!("{rooms}{room_mark}"),
    );
    if lesson.is_cancelled() {
        line.push_str(" [cancelled]");
    }
    if let Some(info) = &lesson.info {
        line.push_str("  ");
        line.push_str(info);
    }
    line.trim_end().to_string()
}

fn join_or_dash<'a>(names: impl Iterator<Item = &'a str>) -> String {
    let joined = names.collect::<Vec<_>>().join(",");
    if joined.is_empty() { "-".to_string() } else { joined }
}

pub fn format_relative_time(dt: &DateTime<Utc>) -> String {
    let diff = Utc::now().signed_duration_since(*dt);

    if diff.num_seconds() < 0 {
        return "in the future".to_string();
    }
    if diff.num_seconds() < 60 {
        return "just now".to_string();
    }
    if diff.num_minutes() < 60 {
        let mins = diff.num_minutes();
        return if mins == 1 {
            "1 minute ago".to_string()
        } else {
            format!("{mins} minutes ago")
        };
    }
    if diff.num_hours() < 24 {
        let hours = diff.num_hours();
        return if hours == 1 {
            "1 hour ago".to_string()
        } else {
            format!("{hours} hours ago")
        };
    }
    let days = diff.num_days();
    if days == 1 {
        "1 day ago".to_string()
    } else {
        format!("{days} days ago")
    }
}
