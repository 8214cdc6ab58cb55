//! External data-source clients for articheck.
//!
//! # Architecture
//!
//! The crate is organized around one seam:
//!
//! - [`ArticulationSource`] - the interface the engine consumes: directory,
//!   course-listing, and articulation retrieval as `Send` futures
//! - [`HttpSource`] - the production implementation over the provider's
//!   JSON endpoints, with bounded retries ([`retry`])
//!
//! Every failure crosses the boundary as a [`SourceError`] value; nothing in
//! this crate panics on provider misbehavior. The engine decides how to
//! degrade.

pub mod retry;

use std::future::Future;
use std::sync::OnceLock;
use std::time::Duration;

pub use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use articheck_config::Endpoints;
use articheck_types::{
    CollegeDirectory, Course, CourseId, InstitutionDirectory, InstitutionId,
    RawArticulationResponse,
};

use crate::retry::{Attempt, RetryPolicy};

const CONNECT_TIMEOUT_SECS: u64 = 30;
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Errors from the external data provider.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The provider answered with a non-success status.
    #[error("provider returned HTTP {status}")]
    Http { status: StatusCode },
    /// The provider could not be reached.
    #[error("failed to reach provider after {attempts} attempt(s): {source}")]
    Transport {
        attempts: u32,
        source: reqwest::Error,
    },
    /// The provider answered, but not with the shape we expect.
    #[error("failed to decode provider response: {0}")]
    Decode(#[source] reqwest::Error),
}

/// The collaborator interface the engine consumes.
///
/// Implementations must be shareable across tasks; the controller spawns
/// fetches that outlive the call that started them.
pub trait ArticulationSource: Send + Sync + 'static {
    /// Bulk institution reference data, fetched once at startup.
    fn load_institution_directory(
        &self,
    ) -> impl Future<Output = Result<InstitutionDirectory, SourceError>> + Send;

    /// Bulk community-college reference data, fetched once.
    fn load_college_directory(
        &self,
    ) -> impl Future<Output = Result<CollegeDirectory, SourceError>> + Send;

    /// All courses offered by one institution.
    fn load_courses(
        &self,
        institution: &InstitutionId,
    ) -> impl Future<Output = Result<Vec<Course>, SourceError>> + Send;

    /// The raw articulation payload for one course.
    fn load_articulation(
        &self,
        course: &CourseId,
    ) -> impl Future<Output = Result<RawArticulationResponse, SourceError>> + Send;
}

/// Process-wide HTTP client with shared pool and timeouts.
pub fn http_client() -> &'static reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|e| {
                tracing::error!("failed to build HTTP client with timeouts: {e}");
                reqwest::Client::new()
            })
    })
}

/// HTTP implementation of [`ArticulationSource`].
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    endpoints: Endpoints,
    retry: RetryPolicy,
}

impl HttpSource {
    /// Build against the given endpoints with the shared client and the
    /// default retry policy.
    #[must_use]
    pub fn new(endpoints: Endpoints) -> Self {
        Self {
            client: http_client().clone(),
            endpoints,
            retry: RetryPolicy::default(),
        }
    }

    /// Override the retry policy (used by tests to drop the delays).
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, SourceError> {
        let attempt = self
            .retry
            .run(|| self.client.get(url).query(query))
            .await;

        match attempt {
            Attempt::Ok(response) => response.json::<T>().await.map_err(SourceError::Decode),
            Attempt::Failed(response) => Err(SourceError::Http {
                status: response.status(),
            }),
            Attempt::Unreachable { attempts, source } => {
                Err(SourceError::Transport { attempts, source })
            }
        }
    }
}

impl ArticulationSource for HttpSource {
    async fn load_institution_directory(&self) -> Result<InstitutionDirectory, SourceError> {
        self.fetch_json(&self.endpoints.institutions_url, &[]).await
    }

    async fn load_college_directory(&self) -> Result<CollegeDirectory, SourceError> {
        self.fetch_json(&self.endpoints.colleges_url, &[]).await
    }

    async fn load_courses(&self, institution: &InstitutionId) -> Result<Vec<Course>, SourceError> {
        self.fetch_json(
            &self.endpoints.courses_url,
            &[("uni", institution.as_str())],
        )
        .await
    }

    async fn load_articulation(
        &self,
        course: &CourseId,
    ) -> Result<RawArticulationResponse, SourceError> {
        self.fetch_json(
            &self.endpoints.articulations_url,
            &[("course_id", course.as_str())],
        )
        .await
    }
}
