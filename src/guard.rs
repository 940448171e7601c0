//! Query Guard
//!
//! Decides whether a candidate query may run against the store. The decision
//! is a pure function of the candidate text, the schema and the limits:
//!
//! 1. length cap (before any parsing)
//! 2. token scan for write/DDL/admin keywords, comments included
//! 3. structural parse: exactly one statement, and it must be a query
//! 4. every referenced relation must be a schema table (or a CTE in scope)
//! 5. join cap across the whole statement, sub-queries included, and no
//!    recursive CTEs

use crate::error::GuardRejection;
use crate::schema::SchemaDescriptor;
use crate::synthesizer::CandidateQuery;
use lazy_static::lazy_static;
use regex::Regex;
use sqlparser::ast::{
    visit_relations, ObjectName, Query, SetExpr, Statement, TableFactor, TableWithJoins, Visit,
    Visitor,
};
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Token, Tokenizer, Whitespace};
use std::collections::{BTreeSet, HashSet};
use std::ops::ControlFlow;
use std::sync::Arc;
use tracing::{debug, warn};

/// Keywords that must never appear unquoted in a candidate, nor inside its
/// comments. `REPLACE` is absent because it is also a scalar function; a
/// `REPLACE INTO` statement is caught by the statement check instead.
const FORBIDDEN_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "MERGE", "UPSERT", "DROP", "CREATE", "ALTER", "TRUNCATE",
    "ATTACH", "DETACH", "PRAGMA", "VACUUM", "REINDEX", "ANALYZE", "GRANT", "REVOKE",
];

lazy_static! {
    static ref FORBIDDEN_IN_COMMENT: Regex = Regex::new(&format!(
        r"(?i)\b({})\b",
        FORBIDDEN_KEYWORDS.join("|")
    ))
    .unwrap();
}

/// Complexity bounds applied to every candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardLimits {
    /// Maximum statement length in characters.
    pub max_length: usize,
    /// Maximum number of joins, explicit or comma-separated, across all sub-queries.
    pub max_joins: usize,
}

impl Default for GuardLimits {
    fn default() -> Self {
        Self {
            max_length: 2000,
            max_joins: 3,
        }
    }
}

/// A candidate that passed the guard. Only this module can build one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedQuery {
    sql: String,
    tables: BTreeSet<String>,
}

impl ValidatedQuery {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Schema tables the query reads from.
    pub fn tables(&self) -> &BTreeSet<String> {
        &self.tables
    }
}

pub struct QueryGuard {
    schema: Arc<SchemaDescriptor>,
    limits: GuardLimits,
}

impl QueryGuard {
    pub fn new(schema: Arc<SchemaDescriptor>, limits: GuardLimits) -> Self {
        Self { schema, limits }
    }

    pub fn limits(&self) -> &GuardLimits {
        &self.limits
    }

    pub fn validate(&self, candidate: &CandidateQuery) -> Result<ValidatedQuery, GuardRejection> {
        let verdict = validate(candidate, &self.schema, &self.limits);
        match &verdict {
            Ok(validated) => debug!("Guard accepted query over {:?}", validated.tables()),
            Err(rejection) => warn!("Guard rejected query ({}): {}", rejection.reason(), rejection),
        }
        verdict
    }
}

pub fn validate(
    candidate: &CandidateQuery,
    schema: &SchemaDescriptor,
    limits: &GuardLimits,
) -> Result<ValidatedQuery, GuardRejection> {
    let sql = candidate.text();

    let length = sql.chars().count();
    if length > limits.max_length {
        return Err(GuardRejection::TooComplex(format!(
            "statement is {} characters (max: {})",
            length, limits.max_length
        )));
    }

    let dialect = SQLiteDialect {};
    scan_tokens(&dialect, sql)?;

    let statements = Parser::parse_sql(&dialect, sql)
        .map_err(|e| GuardRejection::NotReadOnly(format!("could not parse statement: {}", e)))?;

    let statement = match statements.as_slice() {
        [single] => single,
        other => {
            return Err(GuardRejection::NotReadOnly(format!(
                "expected exactly one statement, found {}",
                other.len()
            )))
        }
    };

    if !matches!(statement, Statement::Query(_)) {
        return Err(GuardRejection::NotReadOnly(
            "only SELECT queries are allowed".to_string(),
        ));
    }

    let mut inspector = StatementInspector::default();
    let _ = statement.visit(&mut inspector);

    if inspector.writes {
        return Err(GuardRejection::NotReadOnly(
            "query body writes data".to_string(),
        ));
    }

    let mut tables = BTreeSet::new();
    for relation in &inspector.relations {
        match schema.table(relation) {
            Some(table) => {
                tables.insert(table.name.clone());
            }
            None => return Err(GuardRejection::UnknownTable(relation.clone())),
        }
    }

    if inspector.recursive {
        return Err(GuardRejection::TooComplex(
            "recursive common table expressions are not allowed".to_string(),
        ));
    }

    if inspector.joins > limits.max_joins {
        return Err(GuardRejection::TooComplex(format!(
            "{} joins (max: {})",
            inspector.joins, limits.max_joins
        )));
    }

    Ok(ValidatedQuery {
        sql: sql.to_string(),
        tables,
    })
}

/// Reject write keywords anywhere outside string literals and quoted identifiers.
fn scan_tokens(dialect: &SQLiteDialect, sql: &str) -> Result<(), GuardRejection> {
    let tokens = Tokenizer::new(dialect, sql)
        .tokenize()
        .map_err(|e| GuardRejection::NotReadOnly(format!("could not tokenize statement: {}", e)))?;

    for token in &tokens {
        match token {
            Token::Word(word) if word.quote_style.is_none() => {
                let upper = word.value.to_uppercase();
                if FORBIDDEN_KEYWORDS.contains(&upper.as_str()) {
                    return Err(GuardRejection::NotReadOnly(format!(
                        "forbidden keyword {}",
                        upper
                    )));
                }
            }
            Token::Whitespace(Whitespace::SingleLineComment { comment, .. })
            | Token::Whitespace(Whitespace::MultiLineComment(comment)) => {
                if let Some(found) = FORBIDDEN_IN_COMMENT.find(comment) {
                    return Err(GuardRejection::NotReadOnly(format!(
                        "forbidden keyword {} inside a comment",
                        found.as_str().to_uppercase()
                    )));
                }
            }
            _ => {}
        }
    }

    Ok(())
}

/// Walks a parsed statement collecting relations and join counts.
///
/// CTE names are scoped to the query that defines them: one scope is pushed
/// per visited query and popped when the query ends, so a CTE only shadows
/// relations inside its own query.
#[derive(Default)]
struct StatementInspector {
    scopes: Vec<HashSet<String>>,
    relations: Vec<String>,
    joins: usize,
    writes: bool,
    recursive: bool,
}

impl StatementInspector {
    fn is_cte_in_scope(&self, relation: &ObjectName) -> bool {
        match relation.0.as_slice() {
            [ident] => {
                let name = ident.value.to_lowercase();
                self.scopes.iter().any(|scope| scope.contains(&name))
            }
            _ => false,
        }
    }

    fn inspect_set_expr(&mut self, body: &SetExpr) {
        match body {
            SetExpr::Select(select) => {
                if select.into.is_some() {
                    self.writes = true;
                }
                self.joins += select.from.len().saturating_sub(1);
                for table_with_joins in &select.from {
                    self.joins += count_joins(table_with_joins);
                }
            }
            SetExpr::SetOperation { left, right, .. } => {
                self.inspect_set_expr(left);
                self.inspect_set_expr(right);
            }
            // Nested queries are visited on their own; nested INSERT/UPDATE
            // bodies are caught by `pre_visit_statement`.
            _ => {}
        }
    }
}

impl Visitor for StatementInspector {
    type Break = ();

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<Self::Break> {
        let mut scope = HashSet::new();
        if let Some(with) = &query.with {
            if with.recursive {
                self.recursive = true;
            }
            for cte in &with.cte_tables {
                let name = cte.alias.name.value.to_lowercase();
                // SQLite treats a self-referencing CTE as recursive even
                // without the RECURSIVE keyword.
                if references(&cte.query, &name) {
                    self.recursive = true;
                }
                scope.insert(name);
            }
        }
        self.scopes.push(scope);
        self.inspect_set_expr(&query.body);
        ControlFlow::Continue(())
    }

    fn post_visit_query(&mut self, _query: &Query) -> ControlFlow<Self::Break> {
        self.scopes.pop();
        ControlFlow::Continue(())
    }

    fn pre_visit_relation(&mut self, relation: &ObjectName) -> ControlFlow<Self::Break> {
        if self.is_cte_in_scope(relation) {
            return ControlFlow::Continue(());
        }
        if let Some(ident) = relation.0.last() {
            self.relations.push(ident.value.clone());
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_statement(&mut self, statement: &Statement) -> ControlFlow<Self::Break> {
        if !matches!(statement, Statement::Query(_)) {
            self.writes = true;
        }
        ControlFlow::Continue(())
    }
}

fn references(query: &Query, name: &str) -> bool {
    visit_relations(query, |relation| match relation.0.last() {
        Some(ident) if ident.value.eq_ignore_ascii_case(name) => ControlFlow::Break(()),
        _ => ControlFlow::Continue(()),
    })
    .is_break()
}

fn count_joins(table_with_joins: &TableWithJoins) -> usize {
    let mut joins = table_with_joins.joins.len() + nested_joins(&table_with_joins.relation);
    for join in &table_with_joins.joins {
        joins += nested_joins(&join.relation);
    }
    joins
}

fn nested_joins(factor: &TableFactor) -> usize {
    match factor {
        TableFactor::NestedJoin { table_with_joins, .. } => count_joins(table_with_joins),
        _ => 0,
    }
}
