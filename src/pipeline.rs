//! Pipeline Orchestrator
//!
//! One run per question:
//! `Start → Synthesizing → Guarding → Executing → Summarizing → Done`.
//! Synthesis, guard and execution failures end the run with an error
//! response. A summary failure still yields a success response, with an empty
//! explanation. Nothing is retried.

use crate::error::{ExecutionFailure, GuardRejection, SynthesisFailure};
use crate::executor::QueryExecutor;
use crate::guard::{GuardLimits, QueryGuard};
use crate::llm::CompletionClient;
use crate::result::ResultSet;
use crate::schema::SchemaDescriptor;
use crate::store::Store;
use crate::summarizer::Summarizer;
use crate::synthesizer::Synthesizer;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Start,
    Synthesizing,
    Guarding,
    Executing,
    Summarizing,
    Done,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Start => "start",
            PipelineStage::Synthesizing => "synthesizing",
            PipelineStage::Guarding => "guarding",
            PipelineStage::Executing => "executing",
            PipelineStage::Summarizing => "summarizing",
            PipelineStage::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Synthesis,
    Guard,
    Execution,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineSuccess {
    pub sql: String,
    pub rows: ResultSet,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineFailure {
    /// Machine-readable reason, e.g. `transport_error` or `unknown_table`.
    pub error: &'static str,
    pub kind: FailureKind,
    pub message: String,
    /// SQL that reached the store and failed there.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    /// Model output the guard refused to run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PipelineResponse {
    Success(PipelineSuccess),
    Failure(PipelineFailure),
}

impl PipelineResponse {
    /// HTTP status for this outcome. Guard rejections are 422 so they can be
    /// told apart from upstream and store failures (500).
    pub fn status_code(&self) -> u16 {
        match self {
            PipelineResponse::Success(_) => 200,
            PipelineResponse::Failure(failure) => match failure.kind {
                FailureKind::Guard => 422,
                FailureKind::Synthesis | FailureKind::Execution => 500,
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PipelineResponse::Success(_))
    }

    fn synthesis(failure: SynthesisFailure) -> Self {
        PipelineResponse::Failure(PipelineFailure {
            error: failure.reason(),
            kind: FailureKind::Synthesis,
            message: failure.to_string(),
            sql: None,
            raw: None,
        })
    }

    fn guard(rejection: GuardRejection, raw: &str) -> Self {
        PipelineResponse::Failure(PipelineFailure {
            error: rejection.reason(),
            kind: FailureKind::Guard,
            message: rejection.to_string(),
            sql: None,
            raw: Some(raw.to_string()),
        })
    }

    fn execution(failure: ExecutionFailure, sql: &str) -> Self {
        PipelineResponse::Failure(PipelineFailure {
            error: failure.reason(),
            kind: FailureKind::Execution,
            message: failure.to_string(),
            sql: Some(sql.to_string()),
            raw: None,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    pub guard: GuardLimits,
    pub summary_max_rows: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            guard: GuardLimits::default(),
            summary_max_rows: 100,
        }
    }
}

pub struct Pipeline {
    synthesizer: Synthesizer,
    guard: QueryGuard,
    executor: QueryExecutor,
    summarizer: Summarizer,
}

impl Pipeline {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        schema: Arc<SchemaDescriptor>,
        store: Store,
        options: PipelineOptions,
    ) -> Self {
        Self {
            synthesizer: Synthesizer::new(client.clone(), schema.clone()),
            guard: QueryGuard::new(schema, options.guard),
            executor: QueryExecutor::new(store),
            summarizer: Summarizer::new(client, options.summary_max_rows),
        }
    }

    pub async fn run(&self, question: &str) -> PipelineResponse {
        let request_id = Uuid::new_v4();
        self.run_stages(question)
            .instrument(info_span!("pipeline", %request_id))
            .await
    }

    async fn run_stages(&self, question: &str) -> PipelineResponse {
        info!(stage = %PipelineStage::Start, "Question: {}", question);

        info!(stage = %PipelineStage::Synthesizing, "Translating question to SQL");
        let candidate = match self.synthesizer.synthesize(question).await {
            Ok(candidate) => candidate,
            Err(failure) => return finish(PipelineResponse::synthesis(failure)),
        };

        info!(stage = %PipelineStage::Guarding, "Validating candidate SQL");
        let validated = match self.guard.validate(&candidate) {
            Ok(validated) => validated,
            Err(rejection) => return finish(PipelineResponse::guard(rejection, candidate.raw())),
        };

        info!(stage = %PipelineStage::Executing, "Running validated SQL");
        let rows = match self.executor.execute(&validated).await {
            Ok(rows) => rows,
            Err(failure) => return finish(PipelineResponse::execution(failure, validated.sql())),
        };

        info!(stage = %PipelineStage::Summarizing, "Summarizing {} rows", rows.len());
        let explanation = match self.summarizer.summarize(&validated, &rows).await {
            Ok(text) => text,
            Err(failure) => {
                warn!("Summary unavailable ({}): {}", failure.reason(), failure);
                String::new()
            }
        };

        finish(PipelineResponse::Success(PipelineSuccess {
            sql: validated.sql().to_string(),
            rows,
            explanation,
        }))
    }
}

fn finish(response: PipelineResponse) -> PipelineResponse {
    match &response {
        PipelineResponse::Success(success) => {
            info!(stage = %PipelineStage::Done, rows = success.rows.len(), "Pipeline succeeded")
        }
        PipelineResponse::Failure(failure) => warn!(
            stage = %PipelineStage::Done,
            error = failure.error,
            "Pipeline failed: {}",
            failure.message
        ),
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedClient;
    use crate::llm::LlmError;
    use serde_json::json;

    fn pipeline(client: Arc<ScriptedClient>) -> Pipeline {
        let schema = Arc::new(SchemaDescriptor::products());
        let store = Store::in_memory(&schema).unwrap();
        Pipeline::new(client, schema, store, PipelineOptions::default())
    }

    #[tokio::test]
    async fn test_guard_rejection_skips_execution_and_summary() {
        let client = Arc::new(ScriptedClient::new(vec![Ok("DROP TABLE products".to_string())]));
        let response = pipeline(client.clone()).run("delete everything").await;

        assert_eq!(response.status_code(), 422);
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["error"], "not_read_only");
        assert_eq!(value["kind"], "guard");
        assert_eq!(value["raw"], "DROP TABLE products");
        assert!(value.get("sql").is_none());
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_execution_failure_carries_sql() {
        let client = Arc::new(ScriptedClient::new(vec![Ok("SELECT colour FROM products".to_string())]));
        let response = pipeline(client.clone()).run("what colours?").await;

        assert_eq!(response.status_code(), 500);
        match response {
            PipelineResponse::Failure(failure) => {
                assert_eq!(failure.error, "sql_error");
                assert_eq!(failure.kind, FailureKind::Execution);
                assert_eq!(failure.sql.as_deref(), Some("SELECT colour FROM products"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_summary_failure_keeps_rows() {
        let client = Arc::new(ScriptedClient::new(vec![
            Ok("SELECT id FROM products WHERE id <= 2 ORDER BY id".to_string()),
            Err(LlmError::Timeout),
        ]));
        let response = pipeline(client).run("first two ids").await;

        assert_eq!(response.status_code(), 200);
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["rows"], json!([{"id": 1}, {"id": 2}]));
        assert_eq!(value["explanation"], "");
        assert_eq!(value["sql"], "SELECT id FROM products WHERE id <= 2 ORDER BY id");
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(PipelineStage::Synthesizing.to_string(), "synthesizing");
        assert_eq!(PipelineStage::Done.to_string(), "done");
    }
}
