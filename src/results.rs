//! Normalized result rows and duplicate-column folding.

use std::sync::Arc;

use crate::value::SqlValue;

/// Column layout shared by every row of one result set: names deduplicated in
/// first-appearance order, each keeping the source indices it came from.
#[derive(Debug, Clone)]
pub(crate) struct ColumnLayout {
    names: Arc<Vec<String>>,
    groups: Vec<Vec<usize>>,
}

impl ColumnLayout {
    pub(crate) fn new<I, S>(raw_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = Vec::new();
        let mut groups: Vec<Vec<usize>> = Vec::new();
        for (idx, raw) in raw_names.into_iter().enumerate() {
            let raw = raw.into();
            match names.iter().position(|n| *n == raw) {
                Some(pos) => groups[pos].push(idx),
                None => {
                    names.push(raw);
                    groups.push(vec![idx]);
                }
            }
        }
        Self {
            names: Arc::new(names),
            groups,
        }
    }

    /// Fold one row's raw values into the deduplicated layout.
    ///
    /// A duplicate-named column whose instances are all equal collapses to
    /// that value; differing instances are kept as [`SqlValue::Multi`].
    /// Folding an already-folded row (every group a singleton) is a no-op.
    pub(crate) fn fold(&self, raw_values: Vec<SqlValue>) -> SqlRow {
        let mut cells: Vec<Option<SqlValue>> = raw_values.into_iter().map(Some).collect();
        let values = self
            .groups
            .iter()
            .map(|group| {
                let mut taken: Vec<SqlValue> = group
                    .iter()
                    .filter_map(|&idx| cells.get_mut(idx).and_then(Option::take))
                    .collect();
                if taken.len() <= 1 {
                    taken.pop().unwrap_or(SqlValue::Null)
                } else if taken.iter().all(|v| *v == taken[0]) {
                    taken.swap_remove(0)
                } else {
                    SqlValue::Multi(taken)
                }
            })
            .collect();
        SqlRow {
            column_names: Arc::clone(&self.names),
            values,
        }
    }
}

/// A single normalized row: shared column names plus this row's values.
#[derive(Debug, Clone)]
pub struct SqlRow {
    /// Column names, shared across all rows in a result set.
    pub column_names: Arc<Vec<String>>,
    /// The values for this row, aligned with `column_names`.
    pub values: Vec<SqlValue>,
}

impl SqlRow {
    /// Get a value by column name.
    pub fn get(&self, column_name: &str) -> Option<&SqlValue> {
        self.column_names
            .iter()
            .position(|name| name == column_name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Get a value by column index.
    pub fn get_by_index(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }
}

/// The normalized result of a query, command, or batch.
///
/// A statement returning no rows produces an empty set, never an error.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    /// The rows returned, after duplicate-column folding.
    pub rows: Vec<SqlRow>,
}

impl ResultSet {
    pub fn with_capacity(capacity: usize) -> ResultSet {
        ResultSet {
            rows: Vec::with_capacity(capacity),
        }
    }

    pub fn add_row(&mut self, row: SqlRow) {
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_columns_pass_through() {
        let layout = ColumnLayout::new(["a", "b"]);
        let row = layout.fold(vec![SqlValue::Int(1), SqlValue::Text("x".into())]);
        assert_eq!(*row.column_names, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(row.get("a"), Some(&SqlValue::Int(1)));
        assert_eq!(row.get("b"), Some(&SqlValue::Text("x".into())));
    }

    #[test]
    fn equal_duplicates_collapse() {
        let layout = ColumnLayout::new(["id", "id"]);
        let row = layout.fold(vec![SqlValue::Int(7), SqlValue::Int(7)]);
        assert_eq!(row.values, vec![SqlValue::Int(7)]);
    }

    #[test]
    fn differing_duplicates_stay_multi_valued() {
        let layout = ColumnLayout::new(["id", "id"]);
        let row = layout.fold(vec![SqlValue::Int(7), SqlValue::Int(8)]);
        assert_eq!(
            row.values,
            vec![SqlValue::Multi(vec![SqlValue::Int(7), SqlValue::Int(8)])]
        );
    }

    #[test]
    fn folding_is_idempotent() {
        let layout = ColumnLayout::new(["id", "id", "name"]);
        let row = layout.fold(vec![
            SqlValue::Int(7),
            SqlValue::Int(7),
            SqlValue::Text("x".into()),
        ]);

        // Re-normalizing the already-folded row leaves it unchanged.
        let refolded_layout = ColumnLayout::new(row.column_names.iter().cloned());
        let refolded = refolded_layout.fold(row.values.clone());
        assert_eq!(refolded.values, row.values);
    }

    #[test]
    fn empty_result_set_is_empty_not_absent() {
        let set = ResultSet::default();
        assert!(set.is_empty());
        assert_eq!(set.len(), 0);
    }
}
