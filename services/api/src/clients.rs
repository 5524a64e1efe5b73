//! HTTP clients for the admission classifier and recommender microservices.
//!
//! Each request carries its own timeout. Transport failures and 5xx responses are retried
//! with exponential backoff; 4xx responses fail immediately.

use std::time::Duration;

use admission_ratings::admission::{
    AdmissionClassifier, Exam, Gender, PredictionRequest, Profile, RecommendationSource,
    RecommendedDirection, ServiceError,
};
use admission_ratings::config::ServiceEndpoints;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

const INITIAL_BACKOFF: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryPolicy {
    pub(crate) timeout: Duration,
    pub(crate) max_retries: u32,
    pub(crate) initial_backoff: Duration,
}

impl RetryPolicy {
    pub(crate) fn from_endpoints(endpoints: &ServiceEndpoints) -> Self {
        Self {
            timeout: endpoints.request_timeout,
            max_retries: endpoints.max_retries,
            initial_backoff: INITIAL_BACKOFF,
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

#[derive(Debug)]
enum AttemptError {
    Retryable(String),
    Fatal(String),
}

/// POST `body` to `url`, retrying transient failures, and decode the JSON response.
async fn post_json<B, T>(
    client: &reqwest::Client,
    service: &'static str,
    url: &str,
    body: &B,
    policy: RetryPolicy,
) -> Result<T, ServiceError>
where
    B: Serialize + ?Sized,
    T: DeserializeOwned,
{
    let mut attempt = 0;
    loop {
        let message = match try_post(client, url, body, policy.timeout).await {
            Ok(decoded) => return Ok(decoded),
            Err(AttemptError::Fatal(message)) => message,
            Err(AttemptError::Retryable(message)) if attempt < policy.max_retries => {
                let delay = policy.backoff(attempt);
                attempt += 1;
                warn!(
                    service,
                    attempt,
                    url,
                    error = %message,
                    delay_ms = delay.as_millis() as u64,
                    "request failed, retrying"
                );
                tokio::time::sleep(delay).await;
                continue;
            }
            Err(AttemptError::Retryable(message)) => message,
        };

        error!(service, url, error = %message, "request failed");
        return Err(ServiceError::Transport { service, message });
    }
}

async fn try_post<B, T>(
    client: &reqwest::Client,
    url: &str,
    body: &B,
    timeout: Duration,
) -> Result<T, AttemptError>
where
    B: Serialize + ?Sized,
    T: DeserializeOwned,
{
    let response = client
        .post(url)
        .timeout(timeout)
        .json(body)
        .send()
        .await
        .map_err(|err| AttemptError::Retryable(err.to_string()))?;

    let status = response.status();
    if status.is_server_error() {
        return Err(AttemptError::Retryable(format!("HTTP {}", status.as_u16())));
    }
    if !status.is_success() {
        return Err(AttemptError::Fatal(format!("HTTP {}", status.as_u16())));
    }

    response
        .json::<T>()
        .await
        .map_err(|err| AttemptError::Fatal(format!("invalid response body: {err}")))
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

#[derive(Debug, Serialize)]
struct PredictBatchBody<'a> {
    applicants: &'a [PredictionRequest],
}

#[derive(Debug, Deserialize)]
struct PredictionBody {
    probability: f64,
}

pub(crate) struct HttpAdmissionClassifier {
    client: reqwest::Client,
    url: String,
    policy: RetryPolicy,
}

impl HttpAdmissionClassifier {
    pub(crate) fn new(client: reqwest::Client, base_url: &str, policy: RetryPolicy) -> Self {
        Self {
            client,
            url: endpoint(base_url, "/api/v1/classifier/predict-batch"),
            policy,
        }
    }
}

#[async_trait]
impl AdmissionClassifier for HttpAdmissionClassifier {
    async fn predict_batch(
        &self,
        requests: Vec<PredictionRequest>,
    ) -> Result<Vec<f64>, ServiceError> {
        let body = PredictBatchBody {
            applicants: &requests,
        };
        let predictions: Vec<PredictionBody> =
            post_json(&self.client, "classifier", &self.url, &body, self.policy).await?;
        Ok(predictions
            .into_iter()
            .map(|prediction| prediction.probability)
            .collect())
    }
}

#[derive(Debug, Serialize)]
struct RecommendBody<'a> {
    gender: Gender,
    gpa: f32,
    points: u16,
    exams: &'a [Exam],
}

#[derive(Debug, Deserialize)]
struct RecommendationsBody {
    directions: Vec<DirectionBody>,
}

#[derive(Debug, Deserialize)]
struct DirectionBody {
    direction_id: i64,
    name: String,
}

pub(crate) struct HttpRecommendationSource {
    client: reqwest::Client,
    url: String,
    policy: RetryPolicy,
}

impl HttpRecommendationSource {
    pub(crate) fn new(client: reqwest::Client, base_url: &str, policy: RetryPolicy) -> Self {
        Self {
            client,
            url: endpoint(base_url, "/api/v1/recommendations/"),
            policy,
        }
    }
}

#[async_trait]
impl RecommendationSource for HttpRecommendationSource {
    async fn recommend(
        &self,
        profile: &Profile,
        points: u16,
        top_n: usize,
    ) -> Result<Vec<RecommendedDirection>, ServiceError> {
        let body = RecommendBody {
            gender: profile.gender,
            gpa: profile.gpa,
            points,
            exams: &profile.exams,
        };
        let url = format!("{}?top_n={top_n}", self.url);
        let response: RecommendationsBody =
            post_json(&self.client, "recommender", &url, &body, self.policy).await?;
        Ok(response
            .directions
            .into_iter()
            .map(|direction| RecommendedDirection {
                direction_id: direction.direction_id,
                direction: direction.name,
            })
            .collect())
    }
}
