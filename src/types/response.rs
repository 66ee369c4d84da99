use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of a remote operation. Failures are always converted to one of
/// these at the point of capture; nothing network-related is propagated as an
/// error past the fetch boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Response {
    Success,
    NoInternet,
    WrongCredentials,
    /// The school id is not known to the provider.
    NotFound,
    /// The provider has no plan for the requested day.
    NoDataAvailable,
    Other,
    /// No operation attempted yet.
    #[default]
    None,
}

impl Response {
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Response::Success)
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Response::Success => "SUCCESS",
            Response::NoInternet => "NO_INTERNET",
            Response::WrongCredentials => "WRONG_CREDENTIALS",
            Response::NotFound => "NOT_FOUND",
            Response::NoDataAvailable => "NO_DATA_AVAILABLE",
            Response::Other => "OTHER",
            Response::None => "NONE",
        };
        f.write_str(s)
    }
}

/// A payload paired with the outcome that produced it. `data` is only
/// populated on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataResponse<T> {
    pub data: Option<T>,
    pub response: Response,
}

impl<T> DataResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            response: Response::Success,
        }
    }

    pub fn failure(response: Response) -> Self {
        Self {
            data: None,
            response,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> DataResponse<U> {
        DataResponse {
            data: self.data.map(f),
            response: self.response,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchoolIdCheckResult {
    Invalid,
    Valid,
    SyntacticallyCorrect,
    NotFound,
}
