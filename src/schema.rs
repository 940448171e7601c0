//! Schema Descriptor
//!
//! Static description of the queryable tables. Used to build the synthesis
//! prompt, to validate generated SQL, and to create the store's tables.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared column type as seen by the prompt and the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalType {
    Integer,
    Real,
    Text,
}

impl LogicalType {
    pub fn sql_name(&self) -> &'static str {
        match self {
            LogicalType::Integer => "INTEGER",
            LogicalType::Real => "REAL",
            LogicalType::Text => "TEXT",
        }
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    #[serde(rename = "type")]
    pub logical_type: LogicalType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

impl TableDef {
    pub fn new(name: &str, columns: &[(&str, LogicalType)]) -> Self {
        Self {
            name: name.to_string(),
            columns: columns
                .iter()
                .map(|(name, logical_type)| ColumnDef {
                    name: name.to_string(),
                    logical_type: *logical_type,
                })
                .collect(),
        }
    }

    /// Compact signature used in prompts: `products(id INTEGER, name TEXT, ...)`
    pub fn signature(&self) -> String {
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("{} {}", c.name, c.logical_type))
            .collect();
        format!("{}({})", self.name, columns.join(", "))
    }

    /// `CREATE TABLE` statement for the store. The first integer column
    /// named `id` becomes the primary key.
    pub fn create_table_sql(&self) -> String {
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                if c.name == "id" && c.logical_type == LogicalType::Integer {
                    format!("{} {} PRIMARY KEY", c.name, c.logical_type)
                } else {
                    format!("{} {}", c.name, c.logical_type)
                }
            })
            .collect();
        format!("CREATE TABLE {} ({})", self.name, columns.join(", "))
    }
}

/// Immutable after construction; shared behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    pub version: u32,
    tables: Vec<TableDef>,
}

impl SchemaDescriptor {
    pub fn new(version: u32, tables: Vec<TableDef>) -> Self {
        Self { version, tables }
    }

    /// The products catalogue served by the demo store.
    pub fn products() -> Self {
        Self::new(
            1,
            vec![TableDef::new(
                "products",
                &[
                    ("id", LogicalType::Integer),
                    ("name", LogicalType::Text),
                    ("category", LogicalType::Text),
                    ("price", LogicalType::Real),
                    ("rating", LogicalType::Real),
                ],
            )],
        )
    }

    pub fn tables(&self) -> &[TableDef] {
        &self.tables
    }

    /// Case-insensitive, matching SQLite identifier resolution.
    pub fn table(&self, name: &str) -> Option<&TableDef> {
        self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.table(name).is_some()
    }

    /// One table signature per line, for embedding in prompts.
    pub fn prompt_fragment(&self) -> String {
        self.tables
            .iter()
            .map(TableDef::signature)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
