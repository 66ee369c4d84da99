use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::pickers::format_lesson;
use super::{init_store, plan_source};
use crate::store::Store;
use crate::sync::{SyncReport, SyncService};
use crate::types::{DayType, Lesson, Profile, ProfileType, Response};
use crate::usecases::{ProfileWatch, active_profile, day_type, lessons_for_profile};

const DAY_CHECK_INTERVAL: Duration = Duration::from_secs(60);

fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub async fn run_sync(data_dir: &Path, date: Option<NaiveDate>, json: bool) -> anyhow::Result<()> {
    let (config, store) = init_store(data_dir)?;
    if store.list_schools()?.is_empty() {
        anyhow::bail!("No schools stored. Run 'vplan school add' first.");
    }

    let service = SyncService::new(Arc::new(store), Arc::new(plan_source(&config)?));
    let date = date.unwrap_or_else(today);
    let reports = service.sync_all(date).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    for report in &reports {
        print_report(report);
    }
    Ok(())
}

fn print_report(report: &SyncReport) {
    match report.response {
        Response::Success => println!(
            "School {} on {}: {} classes updated, {} unchanged",
            report.school_id, report.date, report.classes_updated, report.classes_unchanged
        ),
        Response::NoDataAvailable => {
            println!("School {} on {}: no plan published", report.school_id, report.date)
        }
        other => println!("School {} on {}: failed ({other})", report.school_id, report.date),
    }
}

fn resolve_profile(store: &dyn Store, profile_id: Option<i64>) -> anyhow::Result<Profile> {
    match profile_id {
        Some(id) => store
            .get_profile(id)?
            .ok_or_else(|| anyhow::anyhow!("Profile {id} not found")),
        None => active_profile(store)?
            .ok_or_else(|| anyhow::anyhow!("No active profile. Run 'vplan profile add' first.")),
    }
}

#[derive(Serialize)]
struct ShowOutput<'a> {
    profile: &'a Profile,
    date: NaiveDate,
    day_type: DayType,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<i64>,
    info: Vec<String>,
    lessons: &'a [Lesson],
}

pub fn run_show(
    data_dir: &Path,
    date: Option<NaiveDate>,
    profile_id: Option<i64>,
    json: bool,
) -> anyhow::Result<()> {
    let (_config, store) = init_store(data_dir)?;
    let profile = resolve_profile(&store, profile_id)?;
    let date = date.unwrap_or_else(today);
    let shown = lessons_for_profile(&store, &profile, date)?;
    let day_info = match store.profile_school(&profile)? {
        Some(school) => store.get_day_info(school.id, date)?,
        None => None,
    };

    if json {
        let output = ShowOutput {
            profile: &profile,
            date,
            day_type: shown.day_type,
            version: day_info.as_ref().map(|d| d.version),
            info: day_info.map(|d| d.info_lines).unwrap_or_default(),
            lessons: &shown.lessons,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!();
    println!("{} ({}) on {}", profile.name, profile.kind, date.format("%A %Y-%m-%d"));
    println!();
    print_lessons(&store, &profile, shown.day_type, &shown.lessons)?;
    if let Some(info) = day_info.filter(|d| !d.info_lines.is_empty()) {
        println!();
        for line in info.info_lines {
            println!("  {line}");
        }
    }
    println!();
    Ok(())
}

fn profile_day_type(store: &dyn Store, profile: &Profile, date: NaiveDate) -> anyhow::Result<DayType> {
    let school = store
        .profile_school(profile)?
        .ok_or_else(|| anyhow::anyhow!("Profile {} has no school", profile.id))?;
    Ok(day_type(store, school.id, date)?)
}

fn print_lessons(
    store: &dyn Store,
    profile: &Profile,
    day_type: DayType,
    lessons: &[Lesson],
) -> anyhow::Result<()> {
    if lessons.is_empty() {
        match day_type {
            DayType::Weekend => println!("  Weekend, no school."),
            DayType::Holiday => println!("  Holiday, no school."),
            DayType::Normal => println!("  No lessons on this day."),
            DayType::NoData => println!("  No lessons stored. Run 'vplan sync' to fetch the plan."),
        }
        return Ok(());
    }

    // Student views are a single class; the other views span classes.
    let mut class_names: HashMap<i64, String> = HashMap::new();
    for lesson in lessons {
        let class_name = if profile.kind == ProfileType::Student {
            None
        } else {
            if !class_names.contains_key(&lesson.class_id) {
                let name = store
                    .get_class(lesson.class_id)?
                    .map(|c| c.name)
                    .unwrap_or_default();
                class_names.insert(lesson.class_id, name);
            }
            class_names.get(&lesson.class_id).map(String::as_str)
        };
        println!("  {}", format_lesson(lesson, class_name));
    }
    Ok(())
}

/// Runs the background sync and prints the profile's lessons whenever they
/// change, until interrupted. The watched day follows the local date.
pub async fn run_watch(data_dir: &Path, profile_id: Option<i64>) -> anyhow::Result<()> {
    let (config, store) = init_store(data_dir)?;
    let store = Arc::new(store);
    let profile = resolve_profile(store.as_ref(), profile_id)?;

    let mut watch = ProfileWatch::new(store.as_ref(), profile.clone(), today())?;
    let service = SyncService::new(store.clone(), Arc::new(plan_source(&config)?));

    let cancel = CancellationToken::new();
    let sync_task = tokio::spawn({
        let cancel = cancel.clone();
        let interval = config.sync_interval();
        let days_ahead = config.days_ahead;
        async move { service.run_periodic(interval, days_ahead, cancel).await }
    });

    println!(
        "Watching {} ({}) on {}, syncing every {}s. Press Ctrl-C to stop.",
        profile.name,
        profile.kind,
        watch.day(),
        config.sync_interval_secs
    );
    println!();
    let kind = profile_day_type(store.as_ref(), &profile, watch.day())?;
    print_lessons(store.as_ref(), &profile, kind, &watch.subscription().current())?;

    let mut day_check = tokio::time::interval(DAY_CHECK_INTERVAL);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!();
                println!("Stopping...");
                break;
            }
            _ = day_check.tick() => {
                if watch.advance_to(store.as_ref(), today())? {
                    println!();
                    println!("Now showing {}:", watch.day().format("%A %Y-%m-%d"));
                    let kind = profile_day_type(store.as_ref(), &profile, watch.day())?;
                    print_lessons(store.as_ref(), &profile, kind, &watch.subscription().current())?;
                }
            }
            update = watch.subscription().changed() => match update {
                Some(lessons) => {
                    println!();
                    println!("Updated at {}:", Local::now().format("%H:%M:%S"));
                    let kind = profile_day_type(store.as_ref(), &profile, watch.day())?;
                    print_lessons(store.as_ref(), &profile, kind, &lessons)?;
                }
                None => break,
            }
        }
    }

    cancel.cancel();
    sync_task.await?;
    Ok(())
}
