//! Positional column mapping from source fields to destination columns.

use std::collections::BTreeMap;

use anyhow::{Result, ensure};
use log::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    /// 0-based position in the source row.
    pub source: usize,
    pub column: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    fields: Vec<FieldMapping>,
}

impl ColumnMapping {
    /// Builds a mapping from configured column names and 1-based positions.
    pub fn from_positions(columns: &[String], positions: &[usize]) -> Result<Self> {
        ensure!(
            columns.len() == positions.len(),
            "{} column name(s) but {} data column position(s)",
            columns.len(),
            positions.len()
        );
        let mut fields = Vec::with_capacity(columns.len());
        for (column, &position) in columns.iter().zip(positions) {
            ensure!(
                position > 0,
                "Data column positions are 1-based; column '{column}' uses 0"
            );
            fields.push(FieldMapping {
                source: position - 1,
                column: column.clone(),
            });
        }
        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[FieldMapping] {
        &self.fields
    }

    pub fn columns(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.column.clone()).collect()
    }

    /// Maps one source row. Positions past the end of `row` leave their column
    /// absent from the record.
    pub fn apply(&self, row: &[String], line: usize) -> Record {
        let mut values = BTreeMap::new();
        for field in &self.fields {
            match row.get(field.source) {
                Some(value) => {
                    values.insert(field.column.clone(), value.clone());
                }
                None => warn!(
                    "Line {line}: column '{}' maps to field {} but the row has {} field(s); omitted",
                    field.column,
                    field.source + 1,
                    row.len()
                ),
            }
        }
        Record { values }
    }
}

/// One mapped row, keyed by destination column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    values: BTreeMap<String, String>,
}

impl Record {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values.get(column).map(String::as_str)
    }

    /// True when no mapped value carries any text.
    pub fn is_blank(&self) -> bool {
        self.values.values().all(|value| value.is_empty())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

pub type Batch = Vec<Record>;

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn positions_are_converted_to_zero_based() {
        let mapping = ColumnMapping::from_positions(&strings(&["name", "addr"]), &[1, 3])
            .expect("valid mapping");
        assert_eq!(mapping.fields()[0].source, 0);
        assert_eq!(mapping.fields()[1].source, 2);
        assert_eq!(mapping.columns(), strings(&["name", "addr"]));
    }

    #[test]
    fn zero_position_and_length_mismatch_are_rejected() {
        assert!(ColumnMapping::from_positions(&strings(&["name"]), &[0]).is_err());
        assert!(ColumnMapping::from_positions(&strings(&["name", "phone"]), &[1]).is_err());
    }

    #[test]
    fn apply_picks_fields_by_position() {
        let mapping =
            ColumnMapping::from_positions(&strings(&["phone", "name"]), &[2, 1]).expect("mapping");
        let record = mapping.apply(&strings(&["alice", "138", "Main St"]), 1);
        assert_eq!(record.get("name"), Some("alice"));
        assert_eq!(record.get("phone"), Some("138"));
        assert_eq!(record.len(), 2);
    }

    #[test]
    fn out_of_range_position_leaves_column_absent() {
        let mapping = ColumnMapping::from_positions(&strings(&["name", "addr"]), &[1, 5])
            .expect("mapping");
        let record = mapping.apply(&strings(&["alice", "138"]), 4);
        assert_eq!(record.get("name"), Some("alice"));
        assert_eq!(record.get("addr"), None);
        assert!(!record.is_blank());
    }

    #[test]
    fn blank_detection_covers_empty_and_absent_values() {
        let mapping =
            ColumnMapping::from_positions(&strings(&["a", "b"]), &[1, 2]).expect("mapping");
        assert!(mapping.apply(&strings(&["", ""]), 1).is_blank());
        assert!(mapping.apply(&[], 2).is_blank());
        assert!(!mapping.apply(&strings(&["", "x"]), 3).is_blank());
    }
}
