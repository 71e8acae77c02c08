use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sentinel for a missing cell value.
pub const MISSING: i32 = -99;

/// Column type of a dataset variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableKind {
    /// Categorical with values in `0..categories`.
    Discrete { categories: usize },
    /// Present so a mixed dataset can be represented and rejected by the
    /// oracle at construction; no continuous inference is implemented.
    Continuous,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub kind: VariableKind,
}

impl Variable {
    pub fn discrete(name: impl Into<String>, categories: usize) -> Self {
        Self {
            name: name.into(),
            kind: VariableKind::Discrete { categories },
        }
    }

    pub fn is_discrete(&self) -> bool {
        matches!(self.kind, VariableKind::Discrete { .. })
    }
}

#[derive(Debug, Error)]
pub enum DataSetError {
    #[error("row {row} has {got} values, expected {expected}")]
    RowWidth {
        row: usize,
        got: usize,
        expected: usize,
    },

    #[error("row {row}, column {column}: value {value} outside 0..{categories}")]
    ValueOutOfRange {
        row: usize,
        column: usize,
        value: i32,
        categories: usize,
    },

    #[error("discrete variable {0} must have at least one category")]
    NoCategories(String),

    #[error("duplicate variable name {0}")]
    DuplicateVariable(String),
}

/// A row-major tabular dataset. Cells of discrete columns hold category
/// indices or [`MISSING`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSet {
    variables: Vec<Variable>,
    rows: Vec<Vec<i32>>,
}

impl DataSet {
    pub fn new(variables: Vec<Variable>, rows: Vec<Vec<i32>>) -> Result<Self, DataSetError> {
        for (i, v) in variables.iter().enumerate() {
            if let VariableKind::Discrete { categories: 0 } = v.kind {
                return Err(DataSetError::NoCategories(v.name.clone()));
            }
            if variables[..i].iter().any(|other| other.name == v.name) {
                return Err(DataSetError::DuplicateVariable(v.name.clone()));
            }
        }
        for (r, row) in rows.iter().enumerate() {
            if row.len() != variables.len() {
                return Err(DataSetError::RowWidth {
                    row: r,
                    got: row.len(),
                    expected: variables.len(),
                });
            }
            for (c, (&value, variable)) in row.iter().zip(&variables).enumerate() {
                if let VariableKind::Discrete { categories } = variable.kind {
                    if value != MISSING && !(0..categories as i32).contains(&value) {
                        return Err(DataSetError::ValueOutOfRange {
                            row: r,
                            column: c,
                            value,
                            categories,
                        });
                    }
                }
            }
        }
        Ok(Self { variables, rows })
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.variables.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.variables.iter().position(|v| v.name == name)
    }

    pub fn value(&self, row: usize, column: usize) -> i32 {
        self.rows[row][column]
    }

    pub fn is_all_discrete(&self) -> bool {
        self.variables.iter().all(Variable::is_discrete)
    }

    /// Indices of rows with no missing value in any of the given columns.
    pub fn complete_rows(&self, columns: &[usize]) -> Vec<usize> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| columns.iter().all(|&c| row[c] != MISSING))
            .map(|(i, _)| i)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> Vec<Variable> {
        vec![Variable::discrete("A", 2), Variable::discrete("B", 3)]
    }

    #[test]
    fn validates_row_width() {
        let err = DataSet::new(vars(), vec![vec![0]]).unwrap_err();
        assert!(matches!(err, DataSetError::RowWidth { .. }));
    }

    #[test]
    fn validates_category_range() {
        let err = DataSet::new(vars(), vec![vec![2, 0]]).unwrap_err();
        assert!(matches!(err, DataSetError::ValueOutOfRange { .. }));
    }

    #[test]
    fn missing_values_are_allowed() {
        let data = DataSet::new(vars(), vec![vec![MISSING, 2], vec![1, MISSING]]).unwrap();
        assert_eq!(data.num_rows(), 2);
    }

    #[test]
    fn complete_rows_skips_missing() {
        let data = DataSet::new(
            vars(),
            vec![vec![0, 1], vec![MISSING, 2], vec![1, MISSING], vec![1, 0]],
        )
        .unwrap();
        assert_eq!(data.complete_rows(&[0, 1]), vec![0, 3]);
        assert_eq!(data.complete_rows(&[1]), vec![0, 1, 3]);
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = DataSet::new(
            vec![Variable::discrete("A", 2), Variable::discrete("A", 2)],
            vec![],
        )
        .unwrap_err();
        assert!(matches!(err, DataSetError::DuplicateVariable(_)));
    }
}
