//! Resilient requests to the remote completion endpoint.
//!
//! [`CompletionClient::complete`] builds the prompt, POSTs it, and retries
//! rate-limit and overload responses (429, 500, 503) with exponential
//! backoff. Every failure is reported as a [`CompletionError`]; nothing else
//! escapes the client.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    error::Result,
    prompt::{CompletionRequest, GenerateResponse},
    transport::{HttpResponse, ReqwestTransport, Sleeper, TokioSleeper, Transport},
};

pub const MISSING_INPUT_MESSAGE: &str =
    "Please upload documents and enter a question.";

/// Statuses that are worth another attempt after a backoff.
pub const RETRYABLE_STATUSES: &[StatusCode] = &[
    StatusCode::TOO_MANY_REQUESTS,
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::SERVICE_UNAVAILABLE,
];

const ERROR_DETAIL_MAX_CHARS: usize = 300;

/// A successful answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    /// Number of requests sent, including the successful one.
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompletionError {
    /// The document content or the question was empty. No request was sent.
    #[error("Please upload documents and enter a question.")]
    MissingInput,

    /// A non-retryable status, or a request that never got a response.
    #[error("An API error occurred after {attempts} attempts: {detail}")]
    Api {
        attempts: u32,
        status: Option<u16>,
        detail: String,
    },

    /// The server answered with a success status but the body could not be
    /// decoded.
    #[error("An unexpected error occurred: {detail}")]
    Unexpected { attempts: u32, detail: String },

    #[error("Failed to get a response from the API after multiple retries.")]
    RetriesExhausted {
        attempts: u32,
        last_status: Option<u16>,
    },

    #[error("The request was cancelled after {attempts} attempts.")]
    Cancelled { attempts: u32 },
}

impl CompletionError {
    /// Number of requests that were sent before the call gave up.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::MissingInput => 0,
            Self::Api { attempts, .. }
            | Self::Unexpected { attempts, .. }
            | Self::RetriesExhausted { attempts, .. }
            | Self::Cancelled { attempts } => *attempts,
        }
    }

    /// Status code of the last response, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => *status,
            Self::RetriesExhausted { last_status, .. } => *last_status,
            _ => None,
        }
    }
}

pub type CompletionResult = std::result::Result<Completion, CompletionError>;

/// Attempt bookkeeping for a single call.
#[derive(Debug, Clone)]
struct RetryState {
    attempt: u32,
    max_attempts: u32,
    last_status: Option<StatusCode>,
}

impl RetryState {
    fn new(max_attempts: u32) -> Self {
        Self {
            attempt: 0,
            max_attempts,
            last_status: None,
        }
    }

    /// 1-based number of the current attempt.
    fn number(&self) -> u32 {
        self.attempt + 1
    }

    fn has_remaining(&self) -> bool {
        self.number() < self.max_attempts
    }

    /// `unit * 2^attempt`
    fn backoff(&self, unit: Duration) -> Duration {
        unit.saturating_mul(1u32 << self.attempt.min(31))
    }
}

pub fn is_retryable(status: StatusCode) -> bool {
    RETRYABLE_STATUSES.contains(&status)
}

fn is_error(status: StatusCode) -> bool {
    status.is_client_error() || status.is_server_error()
}

/// Client for the `generateContent` endpoint.
#[derive(Debug, Clone)]
pub struct CompletionClient<T = ReqwestTransport, S = TokioSleeper> {
    transport: T,
    sleeper: S,
    max_attempts: u32,
    backoff_unit: Duration,
}

impl CompletionClient {
    /// Build a client that talks HTTP to the configured endpoint.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            ReqwestTransport::new(config)?,
            TokioSleeper,
            config.max_attempts,
            config.backoff_unit,
        ))
    }
}

impl<T: Transport, S: Sleeper> CompletionClient<T, S> {
    pub fn new(
        transport: T,
        sleeper: S,
        max_attempts: u32,
        backoff_unit: Duration,
    ) -> Self {
        Self {
            transport,
            sleeper,
            max_attempts: max_attempts.max(1),
            backoff_unit,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Ask `user_query` about `document_content`.
    pub async fn complete(
        &self,
        document_content: &str,
        user_query: &str,
    ) -> CompletionResult {
        self.complete_with_cancel(
            document_content,
            user_query,
            &CancellationToken::new(),
        )
        .await
    }

    /// Like [`complete`](Self::complete), but stops at the next attempt or
    /// backoff boundary once `cancel` fires.
    pub async fn complete_with_cancel(
        &self,
        document_content: &str,
        user_query: &str,
        cancel: &CancellationToken,
    ) -> CompletionResult {
        let request = CompletionRequest::new(document_content, user_query);
        self.send(&request, cancel).await
    }

    pub async fn send(
        &self,
        request: &CompletionRequest,
        cancel: &CancellationToken,
    ) -> CompletionResult {
        if !request.is_dispatchable() {
            return Err(CompletionError::MissingInput);
        }

        let payload = request.to_payload();
        let mut state = RetryState::new(self.max_attempts);

        loop {
            if cancel.is_cancelled() {
                return Err(CompletionError::Cancelled {
                    attempts: state.attempt,
                });
            }

            tracing::debug!(
                attempt = state.number(),
                max_attempts = state.max_attempts,
                content_bytes = request.document_content().len(),
                "sending completion request"
            );

            let response = match self.transport.post(&payload).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(
                        attempt = state.number(),
                        error = %e,
                        "completion request failed"
                    );
                    return Err(CompletionError::Api {
                        attempts: state.number(),
                        status: None,
                        detail: e.to_string(),
                    });
                }
            };

            // Decisions below use this attempt's status only.
            let status = response.status;
            state.last_status = Some(status);

            if !is_error(status) {
                return match decode_answer(&response.body) {
                    Ok(text) => Ok(Completion {
                        text,
                        attempts: state.number(),
                    }),
                    Err(e) => Err(CompletionError::Unexpected {
                        attempts: state.number(),
                        detail: format!("invalid response body: {e}"),
                    }),
                };
            }

            if !is_retryable(status) {
                return Err(CompletionError::Api {
                    attempts: state.number(),
                    status: Some(status.as_u16()),
                    detail: describe_status(&response),
                });
            }

            if !state.has_remaining() {
                tracing::warn!(
                    attempts = state.number(),
                    status = status.as_u16(),
                    "giving up on completion request"
                );
                return Err(CompletionError::RetriesExhausted {
                    attempts: state.number(),
                    last_status: state.last_status.map(|s| s.as_u16()),
                });
            }

            let delay = state.backoff(self.backoff_unit);
            tracing::warn!(
                "Attempt {} failed ({}). Retrying in {:?}...",
                state.number(),
                status.as_u16(),
                delay
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(CompletionError::Cancelled {
                        attempts: state.number(),
                    });
                }
                _ = self.sleeper.sleep(delay) => {}
            }

            state.attempt += 1;
        }
    }
}

fn decode_answer(body: &str) -> serde_json::Result<String> {
    let response: GenerateResponse = serde_json::from_str(body)?;
    Ok(response.answer_text())
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

/// `"<code> <reason>"`, followed by the server's error message or a body
/// excerpt when there is one.
fn describe_status(response: &HttpResponse) -> String {
    let head = response.status.to_string();

    let message = serde_json::from_str::<ApiErrorBody>(&response.body)
        .ok()
        .and_then(|body| body.error)
        .and_then(|error| error.message)
        .unwrap_or_else(|| {
            response.body.split_whitespace().collect::<Vec<_>>().join(" ")
        });

    if message.is_empty() {
        return head;
    }

    let mut excerpt: String =
        message.chars().take(ERROR_DETAIL_MAX_CHARS).collect();
    if excerpt.len() < message.len() {
        excerpt.push_str("...");
    }
    format!("{head}: {excerpt}")
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::{
        prompt::NO_RESPONSE_PLACEHOLDER,
        transport::{
            TransportError,
            fakes::{
                FakeTransport,
                RecordingSleeper,
                Scripted,
                answer_body,
                respond,
            },
        },
    };

    /// Fires the token on the first sleep and never wakes up.
    struct CancellingSleeper(CancellationToken);

    impl Sleeper for CancellingSleeper {
        async fn sleep(&self, _duration: Duration) {
            self.0.cancel();
            std::future::pending::<()>().await;
        }
    }

    fn client(
        script: Vec<Scripted>,
    ) -> CompletionClient<FakeTransport, RecordingSleeper> {
        CompletionClient::new(
            FakeTransport::new(script),
            RecordingSleeper::default(),
            5,
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn returns_text_on_first_success() {
        let client = client(vec![respond(200, &answer_body("forty-two"))]);

        let completion = client.complete("doc", "question").await.unwrap();
        assert_eq!(completion.text, "forty-two");
        assert_eq!(completion.attempts, 1);
        assert_eq!(client.transport().calls(), 1);
        assert!(client.sleeper().slept().is_empty());
    }

    #[tokio::test]
    async fn empty_inputs_short_circuit() {
        let client = client(vec![respond(200, &answer_body("unused"))]);

        for (doc, query) in [("", "q"), ("doc", ""), ("", "")] {
            let err = client.complete(doc, query).await.unwrap_err();
            assert_eq!(err, CompletionError::MissingInput);
            assert_eq!(err.to_string(), MISSING_INPUT_MESSAGE);
        }
        assert_eq!(client.transport().calls(), 0);
    }

    #[tokio::test]
    async fn retries_transient_failures_with_doubling_backoff() {
        let client = client(vec![
            respond(503, ""),
            respond(503, ""),
            respond(503, ""),
            respond(503, ""),
            respond(200, &answer_body("finally")),
        ]);

        let completion = client.complete("doc", "q").await.unwrap();
        assert_eq!(completion.text, "finally");
        assert_eq!(completion.attempts, 5);
        assert_eq!(client.transport().calls(), 5);
        assert_eq!(
            client.sleeper().slept(),
            [1, 2, 4, 8].map(Duration::from_secs).to_vec()
        );
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let client = client(vec![respond(503, "overloaded")]);

        let err = client.complete("doc", "q").await.unwrap_err();
        assert_eq!(
            err,
            CompletionError::RetriesExhausted {
                attempts: 5,
                last_status: Some(503),
            }
        );
        assert_eq!(
            err.to_string(),
            "Failed to get a response from the API after multiple retries."
        );
        assert_eq!(client.transport().calls(), 5);
        // No sleep after the final attempt.
        assert_eq!(client.sleeper().slept().len(), 4);
    }

    #[tokio::test]
    async fn all_retryable_statuses_are_retried() {
        let client = client(vec![
            respond(429, ""),
            respond(500, ""),
            respond(503, ""),
            respond(200, &answer_body("ok")),
        ]);

        let completion = client.complete("doc", "q").await.unwrap();
        assert_eq!(completion.attempts, 4);
        assert_eq!(client.sleeper().slept().len(), 3);
    }

    #[tokio::test]
    async fn non_retryable_status_fails_immediately() {
        let client = client(vec![respond(404, "model not found")]);

        let err = client.complete("doc", "q").await.unwrap_err();
        assert_eq!(err.attempts(), 1);
        assert_eq!(err.status(), Some(404));
        let message = err.to_string();
        assert!(message.starts_with("An API error occurred after 1 attempts: "));
        assert!(message.contains("404 Not Found"));
        assert!(message.contains("model not found"));
        assert_eq!(client.transport().calls(), 1);
        assert!(client.sleeper().slept().is_empty());
    }

    #[tokio::test]
    async fn non_retryable_status_after_retries_reports_attempt_count() {
        let client = client(vec![
            respond(503, ""),
            respond(500, ""),
            respond(400, r#"{"error":{"code":400,"message":"API key not valid"}}"#),
        ]);

        let err = client.complete("doc", "q").await.unwrap_err();
        assert_eq!(
            err,
            CompletionError::Api {
                attempts: 3,
                status: Some(400),
                detail: "400 Bad Request: API key not valid".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn transport_failure_is_not_retried() {
        let client = client(vec![Err(TransportError(
            "connection failed: refused".to_string(),
        ))]);

        let err = client.complete("doc", "q").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "An API error occurred after 1 attempts: connection failed: refused"
        );
        assert_eq!(err.status(), None);
        assert_eq!(client.transport().calls(), 1);
    }

    #[tokio::test]
    async fn transport_failure_after_retryable_status_uses_its_own_outcome() {
        let client = client(vec![
            respond(503, ""),
            Err(TransportError("request timed out".to_string())),
            respond(200, &answer_body("never reached")),
        ]);

        let err = client.complete("doc", "q").await.unwrap_err();
        assert_eq!(
            err,
            CompletionError::Api {
                attempts: 2,
                status: None,
                detail: "request timed out".to_string(),
            }
        );
        assert_eq!(client.transport().calls(), 2);
    }

    #[tokio::test]
    async fn missing_candidates_yield_placeholder() {
        let client = client(vec![respond(200, r#"{"promptFeedback":{}}"#)]);

        let completion = client.complete("doc", "q").await.unwrap();
        assert_eq!(completion.text, NO_RESPONSE_PLACEHOLDER);
    }

    #[tokio::test]
    async fn malformed_body_is_unexpected_and_not_retried() {
        let client = client(vec![respond(200, "<html>oops</html>")]);

        let err = client.complete("doc", "q").await.unwrap_err();
        assert!(matches!(
            err,
            CompletionError::Unexpected { attempts: 1, .. }
        ));
        assert!(
            err.to_string()
                .starts_with("An unexpected error occurred: ")
        );
        assert_eq!(client.transport().calls(), 1);
    }

    #[tokio::test]
    async fn model_text_is_passed_through_unchanged() {
        let text = "I could not find the answer in the provided documents.";
        let client = client(vec![respond(200, &answer_body(text))]);

        let completion = client.complete("doc", "q").await.unwrap();
        assert_eq!(completion.text, text);
    }

    #[tokio::test]
    async fn request_body_carries_prompt_and_system_instruction() {
        let client = client(vec![respond(200, &answer_body("ok"))]);
        client.complete("the doc", "the question").await.unwrap();

        let bodies = client.transport().bodies();
        assert_eq!(bodies.len(), 1);
        let request = CompletionRequest::new("the doc", "the question");
        let expected = serde_json::to_value(request.to_payload()).unwrap();
        assert_eq!(bodies[0], expected);
    }

    #[tokio::test]
    async fn cancelled_before_start_sends_nothing() {
        let client = client(vec![respond(200, &answer_body("ok"))]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = client
            .complete_with_cancel("doc", "q", &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, CompletionError::Cancelled { attempts: 0 });
        assert_eq!(client.transport().calls(), 0);
    }

    #[tokio::test]
    async fn cancellation_interrupts_backoff() {
        let cancel = CancellationToken::new();
        let client = CompletionClient::new(
            FakeTransport::new(vec![respond(503, "")]),
            CancellingSleeper(cancel.clone()),
            5,
            Duration::from_secs(1),
        );

        let err = client
            .complete_with_cancel("doc", "q", &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, CompletionError::Cancelled { attempts: 1 });
        assert_eq!(client.transport().calls(), 1);
    }

    #[tokio::test]
    async fn single_attempt_client_never_sleeps() {
        let client = CompletionClient::new(
            FakeTransport::new(vec![respond(429, "")]),
            RecordingSleeper::default(),
            1,
            Duration::from_secs(1),
        );

        let err = client.complete("doc", "q").await.unwrap_err();
        assert!(matches!(
            err,
            CompletionError::RetriesExhausted { attempts: 1, .. }
        ));
        assert!(client.sleeper().slept().is_empty());
    }

    #[test]
    fn backoff_doubles_from_unit() {
        let unit = Duration::from_millis(250);
        let delays: Vec<_> = (0..5)
            .map(|attempt| {
                RetryState {
                    attempt,
                    max_attempts: 5,
                    last_status: None,
                }
                .backoff(unit)
            })
            .collect();
        assert_eq!(
            delays,
            [250, 500, 1000, 2000, 4000].map(Duration::from_millis).to_vec()
        );
    }

    #[test]
    fn describe_status_truncates_long_bodies() {
        let response = HttpResponse {
            status: StatusCode::FORBIDDEN,
            body: "x".repeat(1000),
        };
        let detail = describe_status(&response);
        assert!(detail.starts_with("403 Forbidden: xxx"));
        assert!(detail.ends_with("..."));
        assert!(detail.len() < 400);
    }

    #[test]
    fn describe_status_without_body() {
        let response = HttpResponse {
            status: StatusCode::UNAUTHORIZED,
            body: "  \n".to_string(),
        };
        assert_eq!(describe_status(&response), "401 Unauthorized");
    }

    proptest! {
        #[test]
        fn empty_input_never_reaches_transport(
            text in ".{0,64}",
            empty_content in any::<bool>(),
        ) {
            let (doc, query) = if empty_content {
                (String::new(), text)
            } else {
                (text, String::new())
            };

            let runtime = tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap();
            let client = client(vec![respond(200, &answer_body("unused"))]);
            let result = runtime.block_on(client.complete(&doc, &query));

            prop_assert_eq!(result, Err(CompletionError::MissingInput));
            prop_assert_eq!(client.transport().calls(), 0);
        }
    }
}
