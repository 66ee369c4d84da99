//! Fetch, parse and store a school's daily plan.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, Local, NaiveDate, Utc};
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::fetch::PlanSource;
use crate::plan::{ParsedPlan, PlannedLesson, parse_plan};
use crate::store::{Settings, Store, SyncOutcome};
use crate::types::{DayInfo, NewLesson, Response, School};

const LOG_TAG: &str = "Sync";

/// Outcome of syncing one school for one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub school_id: i64,
    pub date: NaiveDate,
    pub response: Response,
    /// Plan revision that was applied, if a plan was parsed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    pub classes_updated: usize,
    pub classes_unchanged: usize,
}

impl SyncReport {
    fn failed(school_id: i64, date: NaiveDate, response: Response) -> Self {
        Self {
            school_id,
            date,
            response,
            version: None,
            classes_updated: 0,
            classes_unchanged: 0,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ApplyStats {
    pub classes_updated: usize,
    pub classes_unchanged: usize,
}

#[derive(Clone)]
pub struct SyncService {
    store: Arc<dyn Store>,
    source: Arc<dyn PlanSource>,
}

impl SyncService {
    pub fn new(store: Arc<dyn Store>, source: Arc<dyn PlanSource>) -> Self {
        Self { store, source }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Syncs one school for one day. Never fails: every problem is reported
    /// through `SyncReport::response` and logged.
    pub async fn sync_school_day(&self, school: &School, date: NaiveDate) -> SyncReport {
        let fetched = self.source.fetch_plan(school, date).await;
        let Some(raw) = fetched.data else {
            self.record(&format!(
                "school {} on {date}: fetch failed with {}",
                school.id, fetched.response
            ));
            return SyncReport::failed(school.id, date, fetched.response);
        };

        let plan = match parse_plan(&raw, school.id) {
            Ok(plan) => plan,
            Err(e) => {
                warn!(school_id = school.id, %date, "discarding unparseable plan: {e}");
                self.record(&format!("school {} on {date}: {e}", school.id));
                return SyncReport::failed(school.id, date, Response::Other);
            }
        };

        if plan.date.is_some_and(|d| d != date) {
            warn!(school_id = school.id, requested = %date, plan_date = ?plan.date, "plan names a different day");
        }

        match self.apply_plan(school, date, &plan) {
            Ok(stats) => {
                if let Err(e) = Settings::set_last_sync(self.store.as_ref(), Utc::now()) {
                    warn!("failed to record sync time: {e}");
                }
                self.record(&format!(
                    "school {} on {date}: version {}, {} classes updated, {} unchanged",
                    school.id, plan.version, stats.classes_updated, stats.classes_unchanged
                ));
                SyncReport {
                    school_id: school.id,
                    date,
                    response: Response::Success,
                    version: Some(plan.version),
                    classes_updated: stats.classes_updated,
                    classes_unchanged: stats.classes_unchanged,
                }
            }
            Err(e) => {
                error!(school_id = school.id, %date, "sync aborted: {e}");
                self.record(&format!("school {} on {date}: sync aborted: {e}", school.id));
                SyncReport::failed(school.id, date, Response::Other)
            }
        }
    }

    /// Writes a parsed plan for `date`. Each class is replaced in its own
    /// transaction; classes the store knows but the plan omits are emptied.
    /// A class that has never had lessons and arrives empty is left alone.
    /// A non-empty free-day list replaces the stored one.
    pub fn apply_plan(&self, school: &School, date: NaiveDate, plan: &ParsedPlan) -> Result<ApplyStats> {
        let mut stats = ApplyStats::default();
        let mut seen = HashSet::new();

        for planned in &plan.classes {
            let class = self.store.find_or_create_class(school.id, &planned.name)?;
            seen.insert(class.id);

            let stored = self.store.stored_version(class.id, date)?;
            if stored == Some(plan.version) || (stored.is_none() && planned.lessons.is_empty()) {
                stats.classes_unchanged += 1;
                continue;
            }

            let lessons = planned
                .lessons
                .iter()
                .map(|lesson| self.materialize(school.id, lesson))
                .collect::<Result<Vec<_>>>()?;

            match self.store.sync_day(class.id, date, &lessons, plan.version)? {
                SyncOutcome::Unchanged => stats.classes_unchanged += 1,
                SyncOutcome::Replaced { .. } => stats.classes_updated += 1,
            }
        }

        for class in self.store.list_classes(school.id)? {
            if seen.contains(&class.id) || self.store.stored_version(class.id, date)?.is_none() {
                continue;
            }
            match self.store.sync_day(class.id, date, &[], plan.version)? {
                SyncOutcome::Replaced { removed, .. } if removed > 0 => {
                    debug!(class = %class.name, %date, removed, "class no longer in plan");
                    stats.classes_updated += 1;
                }
                _ => {}
            }
        }

        if let Some(days) = plan.days_per_week {
            if days != school.days_per_week {
                debug!(school_id = school.id, days, "plan reports a new week length");
                self.store.update_school_days_per_week(school.id, days)?;
            }
        }
        if !plan.free_days.is_empty() {
            self.store.replace_free_days(school.id, &plan.free_days)?;
        }

        self.store.upsert_day_info(&DayInfo {
            school_id: school.id,
            day: date,
            version: plan.version,
            info_lines: plan.info_lines.clone(),
        })?;

        Ok(stats)
    }

    /// Resolves teacher and room names, creating unknown ones.
    fn materialize(&self, school_id: i64, lesson: &PlannedLesson) -> Result<NewLesson> {
        let teacher_ids = lesson
            .teachers
            .iter()
            .map(|acronym| self.store.find_or_create_teacher(school_id, acronym).map(|t| t.id))
            .collect::<Result<Vec<_>>>()?;
        let room_ids = lesson
            .rooms
            .iter()
            .map(|name| self.store.find_or_create_room(school_id, name).map(|r| r.id))
            .collect::<Result<Vec<_>>>()?;

        Ok(NewLesson {
            lesson_number: lesson.lesson_number,
            subject: lesson.subject.clone(),
            changed_subject: lesson.changed_subject().map(str::to_string),
            info: lesson.info.clone(),
            room_changed: lesson.room_changed,
            teacher_changed: lesson.teacher_changed,
            begin: lesson.begin,
            end: lesson.end,
            course_number: lesson.course_number,
            teacher_ids,
            room_ids,
        })
    }

    /// Syncs every stored school for `date`.
    pub async fn sync_all(&self, date: NaiveDate) -> Result<Vec<SyncReport>> {
        let schools = self.store.list_schools()?;
        let mut reports = Vec::with_capacity(schools.len());
        for school in &schools {
            reports.push(self.sync_school_day(school, date).await);
        }
        Ok(reports)
    }

    /// Periodic background sync of today and the following `days_ahead` days.
    /// Stops when `cancel` fires; each (class, day) is left either fully
    /// synced or untouched.
    pub async fn run_periodic(&self, interval: Duration, days_ahead: u32, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = interval.as_secs(), days_ahead, "background sync started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let today = Local::now().date_naive();
            for offset in 0..=u64::from(days_ahead) {
                let Some(date) = today.checked_add_days(Days::new(offset)) else {
                    break;
                };
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("background sync cancelled");
                        return;
                    }
                    result = self.sync_all(date) => match result {
                        Ok(reports) => {
                            for report in reports {
                                debug!(school_id = report.school_id, %date, response = %report.response, "background sync");
                            }
                        }
                        Err(e) => error!(%date, "background sync failed: {e}"),
                    }
                }
            }
        }

        info!("background sync stopped");
    }

    fn record(&self, message: &str) {
        if let Err(e) = self.store.log(LOG_TAG, message) {
            warn!("failed to write log record: {e}");
        }
    }
}
