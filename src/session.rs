use tokio_util::sync::CancellationToken;

use crate::{
    completion::{CompletionClient, CompletionResult},
    loader::LoadReport,
    text_util::{char_count, truncate_chars},
    transport::{ReqwestTransport, Sleeper, TokioSleeper, Transport},
};

/// Interaction state for one user: the loaded document content and the
/// outcome of the last question.
pub struct Session<T = ReqwestTransport, S = TokioSleeper> {
    client: CompletionClient<T, S>,
    max_content_chars: usize,
    content: String,
    last_result: Option<CompletionResult>,
}

impl<T: Transport, S: Sleeper> Session<T, S> {
    pub fn new(client: CompletionClient<T, S>, max_content_chars: usize) -> Self {
        Self {
            client,
            max_content_chars,
            content: String::new(),
            last_result: None,
        }
    }

    /// Replace the session content with everything in `report`. An empty
    /// report clears the content.
    pub fn load(&mut self, report: &LoadReport) {
        self.content = report.combined();
    }

    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
    }

    pub fn clear_content(&mut self) {
        self.content.clear();
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn has_content(&self) -> bool {
        !self.content.is_empty()
    }

    /// Content as it will be sent: cut to the configured character limit.
    /// The flag is `true` when the content was truncated.
    pub fn prepared_content(&self) -> (&str, bool) {
        truncate_chars(&self.content, self.max_content_chars)
    }

    /// Ask a question about the current content and remember the outcome.
    pub async fn ask(
        &mut self,
        query: &str,
        cancel: &CancellationToken,
    ) -> &CompletionResult {
        let (content, truncated) = self.prepared_content();
        if truncated {
            tracing::warn!(
                "Document content is very large ({} chars). Truncating to the first {} characters for processing.",
                char_count(&self.content),
                self.max_content_chars
            );
        }

        let result = self
            .client
            .complete_with_cancel(content, query, cancel)
            .await;
        self.last_result.insert(result)
    }

    pub fn last_result(&self) -> Option<&CompletionResult> {
        self.last_result.as_ref()
    }

    /// The last answer, or the last failure's message.
    pub fn last_answer(&self) -> Option<String> {
        self.last_result.as_ref().map(|result| match result {
            Ok(completion) => completion.text.clone(),
            Err(e) => e.to_string(),
        })
    }

    pub fn clear_answer(&mut self) {
        self.last_result = None;
    }

    pub fn client(&self) -> &CompletionClient<T, S> {
        &self.client
    }
}
