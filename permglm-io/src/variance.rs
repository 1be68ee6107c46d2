//! Variance group files.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use permglm_core::VarianceGroups;

use crate::matrix::load_index_vector;

/// Load one variance group id per input, numbered from 0 or 1.
///
/// Returns `None` when the file defines a single group only.
pub fn load_variance_groups(path: &Path, num_inputs: usize) -> Result<Option<VarianceGroups>> {
    let context = || {
        format!(
            "Unable to read file {} as variance group data",
            path.display()
        )
    };
    let raw = load_index_vector(path).with_context(context)?;
    let groups = VarianceGroups::from_indices(&raw, num_inputs).with_context(context)?;
    if let Some(vg) = &groups {
        info!(
            "{} variance groups, inputs per group: {:?}",
            vg.num_groups(),
            vg.counts()
        );
    }
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_variance_groups() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vg.txt");
        write!(std::fs::File::create(&path).unwrap(), "1\n1\n2\n2\n").unwrap();
        let vg = load_variance_groups(&path, 4).unwrap().unwrap();
        assert_eq!(vg.assignments(), &[0, 0, 1, 1]);
        assert!(load_variance_groups(&path, 5).is_err());

        let single = dir.path().join("single.txt");
        write!(std::fs::File::create(&single).unwrap(), "0 0 0 0").unwrap();
        assert!(load_variance_groups(&single, 4).unwrap().is_none());
    }
}
