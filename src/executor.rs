//! Query Executor
//!
//! Runs a validated query on the store's blocking pool and translates store
//! errors into `ExecutionFailure`. Accepts nothing but a `ValidatedQuery`.

use crate::error::ExecutionFailure;
use crate::guard::ValidatedQuery;
use crate::result::ResultSet;
use crate::store::Store;
use std::time::Instant;
use tracing::{info, warn};

#[derive(Clone)]
pub struct QueryExecutor {
    store: Store,
}

impl QueryExecutor {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn execute(&self, query: &ValidatedQuery) -> Result<ResultSet, ExecutionFailure> {
        let store = self.store.clone();
        let sql = query.sql().to_string();
        let started = Instant::now();

        let outcome = tokio::task::spawn_blocking(move || store.query(&sql))
            .await
            .map_err(|e| ExecutionFailure::SqlError(format!("query task failed: {}", e)))?;

        match outcome {
            Ok(rows) => {
                info!(
                    rows = rows.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Query executed"
                );
                Ok(rows)
            }
            Err(e) => {
                warn!("Query failed: {}", e);
                Err(ExecutionFailure::SqlError(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::{validate, GuardLimits};
    use crate::result::CellValue;
    use crate::schema::SchemaDescriptor;
    use crate::synthesizer::CandidateQuery;
    use std::time::Duration;

    fn executor() -> QueryExecutor {
        QueryExecutor::new(Store::in_memory(&SchemaDescriptor::products()).unwrap())
    }

    fn validated(sql: &str) -> ValidatedQuery {
        validate(
            &CandidateQuery::new(sql),
            &SchemaDescriptor::products(),
            &GuardLimits::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_category_variants_are_not_merged() {
        let executor = executor();
        let clean = executor
            .execute(&validated("SELECT COUNT(*) FROM products WHERE category = 'Electronics'"))
            .await
            .unwrap();
        let misspelled = executor
            .execute(&validated("SELECT COUNT(*) FROM products WHERE category = 'Electroniks'"))
            .await
            .unwrap();

        assert_eq!(clean.get(0, "COUNT(*)"), Some(&CellValue::Integer(13)));
        assert_eq!(misspelled.get(0, "COUNT(*)"), Some(&CellValue::Integer(3)));
    }

    #[tokio::test]
    async fn test_repeated_execution_is_identical() {
        let executor = executor();
        let query = validated("SELECT id, name, category, price, rating FROM products");
        let first = executor.execute(&query).await.unwrap();
        let second = executor.execute(&query).await.unwrap();
        assert_eq!(first.len(), 50);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_nulls_pass_through() {
        let rows = executor()
            .execute(&validated("SELECT name, category FROM products WHERE id IN (6, 13) ORDER BY id"))
            .await
            .unwrap();
        assert_eq!(rows.get(0, "name"), Some(&CellValue::Null));
        assert_eq!(rows.get(1, "category"), Some(&CellValue::Null));
    }

    #[tokio::test]
    async fn test_query_over_budget_is_sql_error() {
        let store = Store::in_memory(&SchemaDescriptor::products())
            .unwrap()
            .with_query_timeout(Duration::from_millis(1));
        let executor = QueryExecutor::new(store);
        let err = executor
            .execute(&validated(
                "SELECT COUNT(*) FROM products a, products b, products c, products d",
            ))
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "sql_error");
        assert!(err.to_string().contains("execution budget"));
    }

    #[tokio::test]
    async fn test_bad_column_is_sql_error() {
        let err = executor()
            .execute(&validated("SELECT colour FROM products"))
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "sql_error");
        assert!(err.to_string().contains("colour"));
    }
}
