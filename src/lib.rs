//! docask - ask questions about your documents using a remote LLM.
//!
//! Text and PDF files are extracted into one provenance-tagged block of
//! content, which is sent together with a question to a Gemini-style
//! `generateContent` endpoint. Rate-limit and overload responses are retried
//! with exponential backoff.
//!
//! # Quick start
//!
//! ```no_run
//! use docask::{CompletionClient, Config, config::Overrides};
//! use docask::{loader, walker};
//! use std::path::PathBuf;
//!
//! # async fn run() -> docask::Result<()> {
//! let config = Config::resolve(&Overrides::default())?;
//! let inputs = walker::collect_inputs(&[PathBuf::from("notes")], None)?;
//! let report = loader::load_documents(&inputs);
//!
//! let client = CompletionClient::from_config(&config)?;
//! match client.complete(&report.combined(), "What are the key points?").await {
//!     Ok(answer) => println!("{}", answer.text),
//!     Err(e) => eprintln!("{e}"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod completion;
pub mod config;
pub mod error;
pub mod loader;
pub mod prompt;
pub mod session;
pub mod text_util;
pub mod transport;
pub mod vocab;
pub mod walker;

pub use completion::{Completion, CompletionClient, CompletionError, CompletionResult};
pub use config::Config;
pub use error::{Error, Result};
pub use loader::LoadReport;
pub use prompt::CompletionRequest;
pub use session::Session;
