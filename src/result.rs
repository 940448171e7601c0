//! Result Set - rows returned by the store, passed through untouched

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::fmt;

/// A single cell as reported by the store. No coercion is applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Integer(v) => write!(f, "{}", v),
            CellValue::Real(v) => write!(f, "{}", v),
            CellValue::Text(v) => f.write_str(v),
        }
    }
}

/// Ordered rows with the column order chosen by the executed query.
///
/// Serializes as a JSON array of objects, keys in column order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultSet {
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<CellValue>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value of `column` in row `row`; first match wins on duplicate names.
    pub fn get(&self, row: usize, column: &str) -> Option<&CellValue> {
        let index = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row).and_then(|values| values.get(index))
    }

    /// First `limit` rows, same columns.
    pub fn head(&self, limit: usize) -> ResultSet {
        Self {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(limit).cloned().collect(),
        }
    }
}

struct RowView<'a> {
    columns: &'a [String],
    values: &'a [CellValue],
}

impl Serialize for RowView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (column, value) in self.columns.iter().zip(self.values) {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

impl Serialize for ResultSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.rows.len()))?;
        for values in &self.rows {
            seq.serialize_element(&RowView {
                columns: &self.columns,
                values,
            })?;
        }
        seq.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> ResultSet {
        let mut rs = ResultSet::new(vec!["name".to_string(), "price".to_string()]);
        rs.push_row(vec![CellValue::Text("Product A".to_string()), CellValue::Real(199.99)]);
        rs.push_row(vec![CellValue::Null, CellValue::Integer(0)]);
        rs
    }

    #[test]
    fn test_serializes_as_array_of_objects() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(
            value,
            json!([
                {"name": "Product A", "price": 199.99},
                {"name": null, "price": 0}
            ])
        );
    }

    #[test]
    fn test_keys_keep_column_order() {
        let mut rs = ResultSet::new(vec!["zeta".to_string(), "alpha".to_string()]);
        rs.push_row(vec![CellValue::Integer(1), CellValue::Integer(2)]);
        let text = serde_json::to_string(&rs).unwrap();
        assert_eq!(text, r#"[{"zeta":1,"alpha":2}]"#);
    }

    #[test]
    fn test_nan_serializes_as_null() {
        let mut rs = ResultSet::new(vec!["price".to_string()]);
        rs.push_row(vec![CellValue::Real(f64::NAN)]);
        assert_eq!(serde_json::to_value(rs).unwrap(), json!([{"price": null}]));
    }

    #[test]
    fn test_get_and_head() {
        let rs = sample();
        assert_eq!(rs.get(0, "price"), Some(&CellValue::Real(199.99)));
        assert_eq!(rs.get(1, "name"), Some(&CellValue::Null));
        assert_eq!(rs.get(2, "name"), None);
        assert_eq!(rs.get(0, "rating"), None);
        assert_eq!(rs.head(1).len(), 1);
        assert_eq!(rs.head(10).len(), 2);
    }

    #[test]
    fn test_display() {
        assert_eq!(CellValue::Null.to_string(), "");
        assert_eq!(CellValue::Integer(13).to_string(), "13");
        assert_eq!(CellValue::Text("x".into()).to_string(), "x");
    }
}
