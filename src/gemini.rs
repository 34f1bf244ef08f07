use crate::errors::ClientError;
use crate::fit::google_error_message;
use crate::retry::{with_backoff, RetryPolicy};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// Generative-text client used for activity advice.
#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    url: String,
    retry: RetryPolicy,
}

impl GeminiClient {
    pub fn new(http: Client, url: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            http,
            url: url.into(),
            retry,
        }
    }

    /// Sends a single user prompt and returns the first candidate's text.
    /// Rate limits and server errors are retried with backoff.
    pub async fn generate(&self, api_key: &str, prompt: &str) -> Result<String, ClientError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(ClientError::MissingCredential("generative API key"));
        }
        let request = GenerateRequest {
            contents: [Content {
                role: "user",
                parts: [Part { text: prompt }],
            }],
        };

        let text = with_backoff(&self.retry, |attempt| {
            let request = &request;
            async move {
                info!(attempt, "requesting advice");
                let response = self
                    .http
                    .post(&self.url)
                    .header("X-Goog-Api-Key", api_key)
                    .json(request)
                    .send()
                    .await?;
                let status = response.status();
                let body = response.text().await?;
                if !status.is_success() {
                    return Err(ClientError::Status {
                        status: status.as_u16(),
                        message: google_error_message(&body),
                    });
                }
                first_candidate_text(&body)
            }
        })
        .await?;

        Ok(text)
    }
}

fn first_candidate_text(body: &str) -> Result<String, ClientError> {
    let response: GenerateResponse =
        serde_json::from_str(body).map_err(|err| ClientError::Malformed(err.to_string()))?;
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .ok_or_else(|| ClientError::Malformed("response has no candidate text".to_string()))
}
