//! Remote access to the timetable provider.
//!
//! Every failure is converted into a [`Response`] here; callers never see a
//! transport error.

mod http;

pub use http::HttpPlanSource;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};

use crate::types::{DataResponse, School};

#[async_trait]
pub trait PlanSource: Send + Sync {
    /// Raw XML of the school's plan for `date`.
    async fn fetch_plan(&self, school: &School, date: NaiveDate) -> DataResponse<String>;

    /// Raw XML of the school's base data (roster). Used before a school is
    /// stored, so it takes the credentials directly.
    async fn fetch_base_data(
        &self,
        school_id: i64,
        username: &str,
        password: &str,
    ) -> DataResponse<String>;
}

/// `<base>/<school>/wplan/wdatenk/WPlanKl_<YYYY><M><DD>.xml`; the month is
/// not padded, the day is.
#[must_use]
pub fn plan_url(base_url: &str, school_id: i64, date: NaiveDate) -> String {
    format!(
        "{}/{}/wplan/wdatenk/WPlanKl_{:04}{}{:02}.xml",
        base_url.trim_end_matches('/'),
        school_id,
        date.year(),
        date.month(),
        date.day()
    )
}

#[must_use]
pub fn base_data_url(base_url: &str, school_id: i64) -> String {
    format!(
        "{}/{}/wplan/wdatenk/SPlanKl_Basis.xml",
        base_url.trim_end_matches('/'),
        school_id
    )
}
