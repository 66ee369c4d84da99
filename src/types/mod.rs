mod day;
mod models;
mod profile;
mod response;

pub use day::DayType;
pub use models::*;
pub use profile::ProfileType;
pub use response::{DataResponse, Response, SchoolIdCheckResult};
