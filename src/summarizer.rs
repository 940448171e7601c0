//! Result Summarizer
//!
//! Asks the LLM for a one or two line explanation of a result set.

use crate::error::SummaryFailure;
use crate::guard::ValidatedQuery;
use crate::llm::{CompletionClient, LlmError};
use crate::result::ResultSet;
use std::sync::Arc;
use tracing::{debug, warn};

const SYSTEM_PROMPT: &str = "You summarize SQL results into plain English.";

pub struct Summarizer {
    client: Arc<dyn CompletionClient>,
    max_rows: usize,
}

impl Summarizer {
    pub fn new(client: Arc<dyn CompletionClient>, max_rows: usize) -> Self {
        Self { client, max_rows }
    }

    pub async fn summarize(
        &self,
        query: &ValidatedQuery,
        rows: &ResultSet,
    ) -> Result<String, SummaryFailure> {
        let prompt = build_prompt(query.sql(), rows, self.max_rows);
        debug!("Summary prompt: {}", prompt);

        let text = self
            .client
            .complete(SYSTEM_PROMPT, &prompt)
            .await
            .map_err(|e| match e {
                LlmError::Empty => SummaryFailure::EmptyResponse,
                other => SummaryFailure::TransportError(other.to_string()),
            })?;

        let text = text.trim();
        if text.is_empty() {
            warn!("LLM returned an empty summary");
            return Err(SummaryFailure::EmptyResponse);
        }
        Ok(text.to_string())
    }
}

pub fn build_prompt(sql: &str, rows: &ResultSet, max_rows: usize) -> String {
    let shown = rows.head(max_rows);
    let rows_json = serde_json::to_string(&shown).unwrap_or_else(|_| "[]".to_string());
    let note = if rows.len() > shown.len() {
        format!(" ({} of {} rows shown)", shown.len(), rows.len())
    } else {
        String::new()
    };

    format!(
        r#"Given the SQL query and the rows returned, write a plain English explanation of the result.

SQL: {}

Rows{}: {}

Answer (1-2 lines only):"#,
        sql, note, rows_json
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::{validate, GuardLimits};
    use crate::llm::testing::ScriptedClient;
    use crate::result::CellValue;
    use crate::schema::SchemaDescriptor;
    use crate::synthesizer::CandidateQuery;

    fn count_rows() -> ResultSet {
        let mut rs = ResultSet::new(vec!["COUNT(*)".to_string()]);
        rs.push_row(vec![CellValue::Integer(13)]);
        rs
    }

    fn query() -> ValidatedQuery {
        validate(
            &CandidateQuery::new("SELECT COUNT(*) FROM products WHERE category = 'Electronics'"),
            &SchemaDescriptor::products(),
            &GuardLimits::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_prompt_carries_sql_and_rows() {
        let prompt = build_prompt("SELECT COUNT(*) FROM products", &count_rows(), 100);
        assert!(prompt.contains("SQL: SELECT COUNT(*) FROM products"));
        assert!(prompt.contains(r#"Rows: [{"COUNT(*)":13}]"#));
        assert!(prompt.ends_with("Answer (1-2 lines only):"));
    }

    #[test]
    fn test_prompt_truncates_rows() {
        let mut rs = ResultSet::new(vec!["id".to_string()]);
        for id in 0..5 {
            rs.push_row(vec![CellValue::Integer(id)]);
        }
        let prompt = build_prompt("SELECT id FROM products", &rs, 2);
        assert!(prompt.contains(r#"Rows (2 of 5 rows shown): [{"id":0},{"id":1}]"#));
    }

    #[tokio::test]
    async fn test_summarize_trims_reply() {
        let client = Arc::new(ScriptedClient::new(vec![Ok(
            "  There are 13 products in the Electronics category.\n".to_string(),
        )]));
        let summarizer = Summarizer::new(client.clone(), 100);
        let text = summarizer.summarize(&query(), &count_rows()).await.unwrap();
        assert_eq!(text, "There are 13 products in the Electronics category.");
        assert_eq!(client.calls.lock().unwrap()[0].0, SYSTEM_PROMPT);
    }

    #[tokio::test]
    async fn test_summarize_failures() {
        let client = Arc::new(ScriptedClient::new(vec![Ok("   ".to_string())]));
        let err = Summarizer::new(client, 100)
            .summarize(&query(), &count_rows())
            .await
            .unwrap_err();
        assert_eq!(err, SummaryFailure::EmptyResponse);

        let client = Arc::new(ScriptedClient::new(vec![Err(LlmError::Transport(
            "connection reset".to_string(),
        ))]));
        let err = Summarizer::new(client, 100)
            .summarize(&query(), &count_rows())
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "transport_error");
    }
}
