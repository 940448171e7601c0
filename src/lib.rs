//! Natural-language questions over a SQLite store: an LLM drafts the SQL, a
//! guard decides whether it may run, the store answers, and the LLM explains
//! the answer.

pub mod config;
pub mod error;
pub mod executor;
pub mod guard;
pub mod llm;
pub mod pipeline;
pub mod result;
pub mod schema;
pub mod seed;
pub mod server;
pub mod store;
pub mod summarizer;
pub mod synthesizer;

pub use error::{AppError, Result};
pub use pipeline::{Pipeline, PipelineOptions, PipelineResponse};
pub use schema::SchemaDescriptor;
