//! Request construction and response decoding for the `generateContent`
//! wire format.

use serde::{Deserialize, Serialize};

pub const SYSTEM_INSTRUCTION: &str = "You are a highly efficient document analyst and summarization assistant. \
Your primary goal is to answer the user's question with a clear, concise, \
and accurate summary based *only* on the provided 'DOCUMENT CONTENT'. \
If the information required to answer the question is not present in the content, \
you MUST explicitly state, 'I could not find the answer in the provided documents.'";

pub const DOCUMENT_CONTENT_MARKER: &str = "--- DOCUMENT CONTENT ---";
pub const USER_QUESTION_MARKER: &str = "--- USER QUESTION ---";
pub const INSTRUCTIONS_MARKER: &str = "--- INSTRUCTIONS ---";

const ANSWER_INSTRUCTION: &str = "Based ONLY on the document content above, provide the summary or answer the question:";

/// Placeholder returned when a successful response carries no text.
pub const NO_RESPONSE_PLACEHOLDER: &str = "No response generated.";

/// A single question about a block of document content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    system_instruction: String,
    document_content: String,
    user_query: String,
}

impl CompletionRequest {
    /// Build a request with the default analyst system instruction.
    pub fn new(
        document_content: impl Into<String>,
        user_query: impl Into<String>,
    ) -> Self {
        Self::with_system_instruction(
            SYSTEM_INSTRUCTION,
            document_content,
            user_query,
        )
    }

    pub fn with_system_instruction(
        system_instruction: impl Into<String>,
        document_content: impl Into<String>,
        user_query: impl Into<String>,
    ) -> Self {
        Self {
            system_instruction: system_instruction.into(),
            document_content: document_content.into(),
            user_query: user_query.into(),
        }
    }

    pub fn system_instruction(&self) -> &str {
        &self.system_instruction
    }

    pub fn document_content(&self) -> &str {
        &self.document_content
    }

    pub fn user_query(&self) -> &str {
        &self.user_query
    }

    /// Both the content and the question must be present before dispatch.
    pub fn is_dispatchable(&self) -> bool {
        !self.document_content.is_empty() && !self.user_query.is_empty()
    }

    /// The user-facing prompt: content, question, then the answer
    /// instruction, each under its own marker.
    pub fn full_prompt(&self) -> String {
        format!(
            "{DOCUMENT_CONTENT_MARKER}\n\n{}\n\n\
             {USER_QUESTION_MARKER}\n\n{}\n\n\
             {INSTRUCTIONS_MARKER}\n\n{ANSWER_INSTRUCTION}",
            self.document_content, self.user_query
        )
    }

    pub fn to_payload(&self) -> GenerateRequest {
        GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: Some(self.full_prompt()),
                }],
            }],
            system_instruction: Content {
                parts: vec![Part {
                    text: Some(self.system_instruction.clone()),
                }],
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub contents: Vec<Content>,
    pub system_instruction: Content,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Response body. Every level is optional; absent fields decode to `None`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Option<Vec<Part>>,
}

impl GenerateResponse {
    /// Text of the first part of the first candidate, or
    /// [`NO_RESPONSE_PLACEHOLDER`].
    pub fn answer_text(&self) -> String {
        self.candidates
            .as_deref()
            .and_then(|candidates| candidates.first())
            .and_then(|candidate| candidate.content.as_ref())
            .and_then(|content| content.parts.as_deref())
            .and_then(|parts| parts.first())
            .and_then(|part| part.text.clone())
            .unwrap_or_else(|| NO_RESPONSE_PLACEHOLDER.to_string())
    }
}
