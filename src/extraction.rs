//! Element-level views of global vectors

use crate::error::{FEAError, FEAResult};
use crate::math::Vec as FEVec;
use crate::topology::DofTopology;

/// Gather `a[row[i]]` in row order
pub fn extract_element(row: &[usize], a: &FEVec) -> FEAResult<FEVec> {
    if let Some(&index) = row.iter().find(|&&dof| dof >= a.len()) {
        return Err(FEAError::IndexOutOfRange {
            index,
            size: a.len(),
        });
    }
    Ok(FEVec::from_iterator(row.len(), row.iter().map(|&dof| a[dof])))
}

/// One local vector per element of `topology`
pub fn extract(topology: &DofTopology, a: &FEVec) -> FEAResult<Vec<FEVec>> {
    topology.iter().map(|row| extract_element(row, a)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_in_row_order() {
        let a = FEVec::from_vec(vec![10.0, 11.0, 12.0, 13.0]);
        let topology = DofTopology::new(vec![vec![0, 1], vec![3, 1]]).unwrap();
        let local = extract(&topology, &a).unwrap();
        assert_eq!(local.len(), 2);
        assert_eq!(local[1].as_slice(), &[13.0, 11.0]);
    }

    #[test]
    fn test_extract_out_of_range() {
        let a = FEVec::zeros(2);
        assert!(matches!(
            extract_element(&[0, 2], &a),
            Err(FEAError::IndexOutOfRange { index: 2, size: 2 })
        ));
    }
}
