//! Variance group assignment for heteroscedastic testing.
//!
//! Each input belongs to exactly one group; inputs within a group share a
//! single noise variance estimate.

use tracing::warn;

use crate::error::{GlmError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarianceGroups {
    assignments: Vec<usize>,
    counts: Vec<usize>,
}

impl VarianceGroups {
    /// Wrap 0-based group ids; every group up to the largest id must be used.
    pub fn new(assignments: Vec<usize>) -> Result<Self> {
        let num_groups = assignments.iter().max().map_or(0, |&m| m + 1);
        let mut counts = vec![0usize; num_groups];
        for &g in &assignments {
            counts[g] += 1;
        }
        if let Some(empty) = counts.iter().position(|&c| c == 0) {
            return Err(GlmError::EmptyVarianceGroup(empty));
        }
        Ok(Self {
            assignments,
            counts,
        })
    }

    /// Validate raw group ids as read from a variance group file.
    ///
    /// Ids may start from 0 or 1; 1-based ids are shifted down. A single
    /// distinct group means there is nothing to correct for, so `None` is
    /// returned (with a warning).
    pub fn from_indices(raw: &[usize], num_inputs: usize) -> Result<Option<Self>> {
        if raw.len() != num_inputs {
            return Err(GlmError::DimensionMismatch {
                what: "variance group assignment",
                expected: num_inputs,
                got: raw.len(),
            });
        }
        let (Some(&min), Some(&max)) = (raw.iter().min(), raw.iter().max()) else {
            return Ok(None);
        };
        if min > 1 {
            return Err(GlmError::VarianceGroupBase(min));
        }
        if min == max {
            warn!("Only a single variance group is defined; variance groups will not be used");
            return Ok(None);
        }
        let mut counts = vec![0usize; max + 1];
        for &g in raw {
            counts[g] += 1;
        }
        if let Some(empty) = (min..=max).find(|&g| counts[g] == 0) {
            return Err(GlmError::EmptyVarianceGroup(empty));
        }
        Self::new(raw.iter().map(|&g| g - min).collect()).map(Some)
    }

    /// Group of every input, in input order.
    pub fn assignments(&self) -> &[usize] {
        &self.assignments
    }

    /// Number of inputs in each group.
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    pub fn num_groups(&self) -> usize {
        self.counts.len()
    }

    pub fn num_inputs(&self) -> usize {
        self.assignments.len()
    }

    /// Group ids and per-group counts of the retained inputs only.
    pub fn masked(&self, retained: &[usize]) -> (Vec<usize>, Vec<usize>) {
        let mut counts = vec![0usize; self.num_groups()];
        let groups = retained
            .iter()
            .map(|&i| {
                let g = self.assignments[i];
                counts[g] += 1;
                g
            })
            .collect();
        (groups, counts)
    }
}
