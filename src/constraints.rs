//! Prescribed DOF conditions
//!
//! [`Constraints`] prescribes fixed values for static and modal analyses.
//! [`PrescribedHistory`] prescribes one value per time sample for transient
//! analyses. Both are resolved against a system size into a [`DofPartition`],
//! the free/constrained split every solver works on.

use serde::{Deserialize, Serialize};

use crate::error::{FEAError, FEAResult};
use crate::math::Mat;
use crate::topology::dof_from_one_based;

/// Prescribed values at a set of DOFs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    dofs: Vec<usize>,
    values: Vec<f64>,
}

impl Constraints {
    /// Prescribe `values[k]` at zero-based DOF `dofs[k]`
    pub fn new(dofs: Vec<usize>, values: Vec<f64>) -> FEAResult<Self> {
        if dofs.len() != values.len() {
            return Err(FEAError::Constraint(format!(
                "{} constrained DOFs but {} prescribed values",
                dofs.len(),
                values.len()
            )));
        }
        check_duplicates(&dofs)?;
        Ok(Self { dofs, values })
    }

    /// Fix DOFs at zero
    pub fn fixed(dofs: Vec<usize>) -> FEAResult<Self> {
        let values = vec![0.0; dofs.len()];
        Self::new(dofs, values)
    }

    /// No constrained DOFs
    pub fn none() -> Self {
        Self::default()
    }

    /// Build from one-based DOF numbers
    pub fn from_one_based(dofs: &[usize], values: &[f64]) -> FEAResult<Self> {
        let dofs = dofs
            .iter()
            .map(|&d| dof_from_one_based(d).map_err(|e| FEAError::Constraint(e.to_string())))
            .collect::<FEAResult<Vec<usize>>>()?;
        Self::new(dofs, values.to_vec())
    }

    /// Build from a one-based `(dof, value)` table
    pub fn from_table(table: &[(usize, f64)]) -> FEAResult<Self> {
        let (dofs, values): (Vec<usize>, Vec<f64>) = table.iter().copied().unzip();
        Self::from_one_based(&dofs, &values)
    }

    /// Add one prescribed DOF
    pub fn with(mut self, dof: usize, value: f64) -> FEAResult<Self> {
        if self.dofs.contains(&dof) {
            return Err(FEAError::Constraint(format!("DOF {dof} is constrained twice")));
        }
        self.dofs.push(dof);
        self.values.push(value);
        Ok(self)
    }

    pub fn dofs(&self) -> &[usize] {
        &self.dofs
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.dofs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dofs.is_empty()
    }

    pub fn is_constrained(&self, dof: usize) -> bool {
        self.dofs.contains(&dof)
    }

    /// Prescribed value at `dof`, if constrained
    pub fn value_of(&self, dof: usize) -> Option<f64> {
        self.dofs
            .iter()
            .position(|&d| d == dof)
            .map(|k| self.values[k])
    }

    /// Values reordered to match `partition.constrained()`
    pub fn ordered_values(&self, partition: &DofPartition) -> Vec<f64> {
        let mut ordered = vec![0.0; partition.num_constrained()];
        for (&dof, &value) in self.dofs.iter().zip(&self.values) {
            if let Slot::Constrained(k) = partition.slot(dof) {
                ordered[k] = value;
            }
        }
        ordered
    }
}

fn check_duplicates(dofs: &[usize]) -> FEAResult<()> {
    for (i, dof) in dofs.iter().enumerate() {
        if dofs[..i].contains(dof) {
            return Err(FEAError::Constraint(format!("DOF {dof} is constrained twice")));
        }
    }
    Ok(())
}

/// Position of a global DOF inside the partition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Free(usize),
    Constrained(usize),
}

/// Split of the global DOFs into free and constrained sets
///
/// Both sets are sorted ascending. The constrained set is a bijection onto
/// the validated constraint DOFs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DofPartition {
    free: Vec<usize>,
    constrained: Vec<usize>,
    slots: Vec<Slot>,
}

impl DofPartition {
    /// Partition `0..n_dofs`, treating `constrained_dofs` as constrained
    pub fn new(n_dofs: usize, constrained_dofs: &[usize]) -> FEAResult<Self> {
        let mut is_constrained = vec![false; n_dofs];
        for &dof in constrained_dofs {
            if dof >= n_dofs {
                return Err(FEAError::Constraint(format!(
                    "constrained DOF {dof} is outside a system of size {n_dofs}"
                )));
            }
            if is_constrained[dof] {
                return Err(FEAError::Constraint(format!("DOF {dof} is constrained twice")));
            }
            is_constrained[dof] = true;
        }

        let mut free = Vec::with_capacity(n_dofs - constrained_dofs.len());
        let mut constrained = Vec::with_capacity(constrained_dofs.len());
        let mut slots = Vec::with_capacity(n_dofs);
        for (dof, &c) in is_constrained.iter().enumerate() {
            if c {
                slots.push(Slot::Constrained(constrained.len()));
                constrained.push(dof);
            } else {
                slots.push(Slot::Free(free.len()));
                free.push(dof);
            }
        }

        Ok(Self {
            free,
            constrained,
            slots,
        })
    }

    pub fn num_dofs(&self) -> usize {
        self.slots.len()
    }

    pub fn free(&self) -> &[usize] {
        &self.free
    }

    pub fn constrained(&self) -> &[usize] {
        &self.constrained
    }

    pub fn num_free(&self) -> usize {
        self.free.len()
    }

    pub fn num_constrained(&self) -> usize {
        self.constrained.len()
    }

    pub fn slot(&self, dof: usize) -> Slot {
        self.slots[dof]
    }
}

/// Prescribed values sampled on the time grid of a transient analysis
///
/// `values` is `n_constrained × n_samples`; row `k` belongs to `dofs[k]`.
#[derive(Debug, Clone, PartialEq)]
pub struct PrescribedHistory {
    dofs: Vec<usize>,
    values: Mat,
}

impl PrescribedHistory {
    /// Create from zero-based DOFs and their sampled values
    pub fn new(dofs: Vec<usize>, values: Mat) -> FEAResult<Self> {
        if values.nrows() != dofs.len() {
            return Err(FEAError::dimension(
                "prescribed history rows",
                dofs.len(),
                values.nrows(),
            ));
        }
        check_duplicates(&dofs)?;
        Ok(Self { dofs, values })
    }

    /// Hold static constraints constant over `n_samples` samples
    pub fn constant(constraints: &Constraints, n_samples: usize) -> Self {
        let values = Mat::from_fn(constraints.len(), n_samples, |k, _| constraints.values()[k]);
        Self {
            dofs: constraints.dofs().to_vec(),
            values,
        }
    }

    /// Build from one-based table rows `[dof, v0, v1, ...]`
    ///
    /// A row with a single value is held constant; every other row must
    /// carry exactly `n_samples` values.
    pub fn from_table<R: AsRef<[f64]>>(table: &[R], n_samples: usize) -> FEAResult<Self> {
        let mut dofs = Vec::with_capacity(table.len());
        let mut values = Mat::zeros(table.len(), n_samples);

        for (k, row) in table.iter().enumerate() {
            let row = row.as_ref();
            let (&dof, samples) = row.split_first().ok_or_else(|| {
                FEAError::Constraint(format!("boundary table row {k} is empty"))
            })?;
            if dof < 1.0 || dof.fract() != 0.0 {
                return Err(FEAError::Constraint(format!(
                    "boundary table row {k} has invalid DOF number {dof}"
                )));
            }
            dofs.push(dof_from_one_based(dof as usize)?);

            match samples.len() {
                1 => values.row_mut(k).fill(samples[0]),
                n if n == n_samples => {
                    for (s, &v) in samples.iter().enumerate() {
                        values[(k, s)] = v;
                    }
                }
                n => {
                    return Err(FEAError::dimension(
                        format!("boundary table row {k} samples"),
                        n_samples,
                        n,
                    ))
                }
            }
        }

        Self::new(dofs, values)
    }

    pub fn dofs(&self) -> &[usize] {
        &self.dofs
    }

    pub fn num_samples(&self) -> usize {
        self.values.ncols()
    }

    /// Prescribed values at sample `step`, ordered like `dofs()`
    pub fn values_at(&self, step: usize) -> FEAResult<Vec<f64>> {
        if step >= self.values.ncols() {
            return Err(FEAError::IndexOutOfRange {
                index: step,
                size: self.values.ncols(),
            });
        }
        Ok(self.values.column(step).iter().copied().collect())
    }

    /// Static constraints at sample `step`
    pub fn constraints_at(&self, step: usize) -> FEAResult<Constraints> {
        Constraints::new(self.dofs.clone(), self.values_at(step)?)
    }

    /// Values at sample `step` reordered to match `partition.constrained()`
    pub fn ordered_values_at(&self, step: usize, partition: &DofPartition) -> FEAResult<Vec<f64>> {
        if step >= self.values.ncols() {
            return Err(FEAError::IndexOutOfRange {
                index: step,
                size: self.values.ncols(),
            });
        }
        let mut ordered = vec![0.0; partition.num_constrained()];
        for (k, &dof) in self.dofs.iter().enumerate() {
            if let Slot::Constrained(c) = partition.slot(dof) {
                ordered[c] = self.values[(k, step)];
            }
        }
        Ok(ordered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_length_mismatch() {
        let err = Constraints::new(vec![0, 1], vec![0.0]).unwrap_err();
        assert!(matches!(err, FEAError::Constraint(_)));
    }

    #[test]
    fn test_duplicates_rejected() {
        assert!(Constraints::fixed(vec![2, 0, 2]).is_err());
        assert!(Constraints::fixed(vec![1]).unwrap().with(1, 0.5).is_err());
    }

    #[test]
    fn test_from_table_converts_one_based() {
        let bc = Constraints::from_table(&[(1, -17.0), (6, 20.0)]).unwrap();
        assert_eq!(bc.dofs(), &[0, 5]);
        assert_eq!(bc.value_of(5), Some(20.0));
        assert!(Constraints::from_table(&[(0, 1.0)]).is_err());
    }

    #[test]
    fn test_partition() {
        let partition = DofPartition::new(5, &[3, 0]).unwrap();
        assert_eq!(partition.free(), &[1, 2, 4]);
        assert_eq!(partition.constrained(), &[0, 3]);
        assert_eq!(partition.slot(4), Slot::Free(2));
        assert_eq!(partition.slot(3), Slot::Constrained(1));

        let bc = Constraints::new(vec![3, 0], vec![7.0, 9.0]).unwrap();
        assert_eq!(bc.ordered_values(&partition), vec![9.0, 7.0]);
    }

    #[test]
    fn test_partition_rejects_out_of_range() {
        assert!(matches!(
            DofPartition::new(3, &[3]),
            Err(FEAError::Constraint(_))
        ));
    }

    #[test]
    fn test_history_from_table() {
        let table = vec![vec![1.0, 0.0, 0.5, 1.0], vec![14.0, 0.0]];
        let history = PrescribedHistory::from_table(&table, 3).unwrap();
        assert_eq!(history.dofs(), &[0, 13]);
        assert_eq!(history.values_at(1).unwrap(), vec![0.5, 0.0]);
        assert!(history.values_at(3).is_err());

        let short = vec![vec![2.0, 0.0, 1.0]];
        assert!(PrescribedHistory::from_table(&short, 3).is_err());
    }

    #[test]
    fn test_constant_history() {
        let bc = Constraints::new(vec![1], vec![0.25]).unwrap();
        let history = PrescribedHistory::constant(&bc, 4);
        assert_eq!(history.num_samples(), 4);
        assert_relative_eq!(history.values_at(3).unwrap()[0], 0.25);
    }
}
