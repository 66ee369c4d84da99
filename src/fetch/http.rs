use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, StatusCode};

use super::{PlanSource, base_data_url, plan_url};
use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::types::{DataResponse, Response, School};

/// Fetches plans over HTTP with basic auth. One attempt per call.
#[derive(Clone)]
pub struct HttpPlanSource {
    client: Client,
    base_url: String,
}

impl HttpPlanSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(&config.base_url, config.timeout())
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `missing` is what a 404 means for this resource.
    async fn get(&self, url: &str, username: &str, password: &str, missing: Response) -> DataResponse<String> {
        let resp = match self
            .client
            .get(url)
            .basic_auth(username, Some(password))
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => return DataResponse::failure(classify_error(url, &e)),
        };

        let status = resp.status();
        if !status.is_success() {
            let response = classify_status(status, missing);
            if response == Response::Other {
                tracing::warn!(%url, %status, "unexpected status from provider");
            } else {
                tracing::debug!(%url, %status, %response, "provider rejected request");
            }
            return DataResponse::failure(response);
        }

        match resp.text().await {
            Ok(body) if body.trim().is_empty() => {
                tracing::debug!(%url, "provider returned an empty body");
                DataResponse::failure(Response::NoDataAvailable)
            }
            Ok(body) => DataResponse::success(body),
            Err(e) => DataResponse::failure(classify_error(url, &e)),
        }
    }
}

#[async_trait]
impl PlanSource for HttpPlanSource {
    async fn fetch_plan(&self, school: &School, date: NaiveDate) -> DataResponse<String> {
        let url = plan_url(&self.base_url, school.id, date);
        self.get(&url, &school.username, &school.password, Response::NoDataAvailable)
            .await
    }

    async fn fetch_base_data(
        &self,
        school_id: i64,
        username: &str,
        password: &str,
    ) -> DataResponse<String> {
        let url = base_data_url(&self.base_url, school_id);
        self.get(&url, username, password, Response::NotFound).await
    }
}

fn classify_status(status: StatusCode, missing: Response) -> Response {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Response::WrongCredentials,
        StatusCode::NOT_FOUND => missing,
        _ => Response::Other,
    }
}

/// Unreachable hosts and timeouts count as offline; everything else is
/// unexpected and logged with its cause chain.
fn classify_error(url: &str, e: &reqwest::Error) -> Response {
    if e.is_connect() || e.is_timeout() {
        tracing::debug!(%url, "provider unreachable: {e}");
        return Response::NoInternet;
    }

    let mut chain = Vec::new();
    let mut source = std::error::Error::source(e);
    while let Some(cause) = source {
        chain.push(cause.to_string());
        source = std::error::Error::source(cause);
    }
    tracing::warn!(%url, error = %e, causes = ?chain, "other error while fetching plan");
    Response::Other
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        assert_eq!(
            classify_status(StatusCode::UNAUTHORIZED, Response::NotFound),
            Response::WrongCredentials
        );
        assert_eq!(
            classify_status(StatusCode::NOT_FOUND, Response::NoDataAvailable),
            Response::NoDataAvailable
        );
        assert_eq!(
            classify_status(StatusCode::NOT_FOUND, Response::NotFound),
            Response::NotFound
        );
        assert_eq!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR, Response::NotFound),
            Response::Other
        );
    }

    #[tokio::test]
    async fn test_unreachable_host_is_no_internet() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let source = HttpPlanSource::new(&format!("http://127.0.0.1:{port}"), Duration::from_secs(5)).unwrap();
        let result = source.fetch_base_data(10000000, "user", "pass").await;
        assert_eq!(result.response, Response::NoInternet);
        assert!(result.data.is_none());
    }
}
