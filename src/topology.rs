//! Element DOF topology
//!
//! A topology row lists, in element-local order, the global DOF numbers an
//! element couples. Rows are stored zero-based. Input tables that number DOFs
//! from one go through [`DofTopology::from_one_based`] or [`dof_from_one_based`],
//! which are the only places an offset is applied.

use serde::{Deserialize, Serialize};

use crate::error::{FEAError, FEAResult};

/// Convert a one-based DOF number to a zero-based index
pub fn dof_from_one_based(dof: usize) -> FEAResult<usize> {
    dof.checked_sub(1).ok_or_else(|| {
        FEAError::InvalidTopology("DOF number 0 in a one-based table".to_string())
    })
}

/// Ordered element rows of global DOF indices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DofTopology {
    rows: Vec<Vec<usize>>,
}

impl DofTopology {
    /// Create from zero-based rows
    ///
    /// All rows must have the same length and contain no repeated DOF.
    pub fn new(rows: Vec<Vec<usize>>) -> FEAResult<Self> {
        if let Some(first) = rows.first() {
            let len = first.len();
            if len == 0 {
                return Err(FEAError::InvalidTopology("empty element row".to_string()));
            }
            for (e, row) in rows.iter().enumerate() {
                if row.len() != len {
                    return Err(FEAError::dimension(
                        format!("topology row {e}"),
                        len,
                        row.len(),
                    ));
                }
                check_unique(e, row)?;
            }
        }
        Ok(Self { rows })
    }

    /// Create from one-based rows as written in input tables
    pub fn from_one_based<R: AsRef<[usize]>>(rows: &[R]) -> FEAResult<Self> {
        let converted = rows
            .iter()
            .map(|row| {
                row.as_ref()
                    .iter()
                    .map(|&dof| dof_from_one_based(dof))
                    .collect::<FEAResult<Vec<usize>>>()
            })
            .collect::<FEAResult<Vec<Vec<usize>>>>()?;
        Self::new(converted)
    }

    /// Check every index against the system size
    pub fn validate(&self, n_dofs: usize) -> FEAResult<()> {
        for row in &self.rows {
            for &dof in row {
                if dof >= n_dofs {
                    return Err(FEAError::IndexOutOfRange {
                        index: dof,
                        size: n_dofs,
                    });
                }
            }
        }
        Ok(())
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// DOFs per element (0 for an empty topology)
    pub fn row_len(&self) -> usize {
        self.rows.first().map_or(0, |r| r.len())
    }

    /// Smallest system size that holds every referenced DOF
    pub fn required_dofs(&self) -> usize {
        self.rows
            .iter()
            .flat_map(|r| r.iter())
            .max()
            .map_or(0, |&m| m + 1)
    }

    /// Row of element `element`
    pub fn row(&self, element: usize) -> FEAResult<&[usize]> {
        self.rows
            .get(element)
            .map(|r| r.as_slice())
            .ok_or(FEAError::IndexOutOfRange {
                index: element,
                size: self.rows.len(),
            })
    }

    pub fn rows(&self) -> &[Vec<usize>] {
        &self.rows
    }

    pub fn iter(&self) -> impl Iterator<Item = &[usize]> {
        self.rows.iter().map(|r| r.as_slice())
    }
}

fn check_unique(element: usize, row: &[usize]) -> FEAResult<()> {
    for (i, dof) in row.iter().enumerate() {
        if row[..i].contains(dof) {
            return Err(FEAError::InvalidTopology(format!(
                "element {element} references DOF {dof} more than once"
            )));
        }
    }
    Ok(())
}
