//! Element-wise design columns from per-subject binary files.
//!
//! A text list names one data file per input (subject), one path per line,
//! relative paths resolved against the list's directory. Each data file
//! holds one little-endian `f32` per element and is memory-mapped, so an
//! element's column is gathered without reading whole files.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use memmap2::Mmap;
use tracing::{debug, warn};

use permglm_core::ColumnImporter;

const VALUE_BYTES: usize = 4;

/// One input's memory-mapped data file.
struct SubjectFile {
    path: PathBuf,
    mmap: Mmap,
}

impl SubjectFile {
    fn open(path: PathBuf) -> Result<Self> {
        let file = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open subject data file: {}", path.display()))?;
        let mmap = unsafe { Mmap::map(&file)? };
        if mmap.len() % VALUE_BYTES != 0 {
            bail!(
                "Subject data file {} is {} bytes, not a whole number of f32 values",
                path.display(),
                mmap.len()
            );
        }
        Ok(Self { path, mmap })
    }

    fn num_values(&self) -> usize {
        self.mmap.len() / VALUE_BYTES
    }

    fn value(&self, element: usize) -> f64 {
        let offset = element * VALUE_BYTES;
        match self.mmap.get(offset..offset + VALUE_BYTES) {
            Some(&[a, b, c, d]) => f32::from_le_bytes([a, b, c, d]) as f64,
            _ => f64::NAN,
        }
    }

    fn all_finite(&self) -> bool {
        (0..self.num_values()).all(|e| self.value(e).is_finite())
    }
}

/// Column importer over a cohort of memory-mapped subject files.
pub struct MappedCohortImporter {
    list_path: PathBuf,
    subjects: Vec<SubjectFile>,
    num_elements: usize,
    finite: bool,
}

impl MappedCohortImporter {
    /// Open every file named in the list at `list_path`.
    pub fn open(list_path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(list_path)
            .with_context(|| format!("Failed to read subject list: {}", list_path.display()))?;
        let base = list_path.parent().unwrap_or_else(|| Path::new(""));

        let subjects = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| SubjectFile::open(base.join(line)))
            .collect::<Result<Vec<_>>>()?;
        if subjects.is_empty() {
            bail!("Subject list {} names no files", list_path.display());
        }

        let num_elements = subjects.iter().map(SubjectFile::num_values).max().unwrap_or(0);
        for subject in subjects.iter().filter(|s| s.num_values() != num_elements) {
            warn!(
                "{} holds {} values where {} were expected; missing values are treated as NaN",
                subject.path.display(),
                subject.num_values(),
                num_elements
            );
        }
        let finite = subjects.iter().all(|s| s.num_values() == num_elements && s.all_finite());
        debug!(
            "Opened {} subject files from {} ({} elements, all finite: {})",
            subjects.len(),
            list_path.display(),
            num_elements,
            finite
        );
        Ok(Self {
            list_path: list_path.to_path_buf(),
            subjects,
            num_elements,
            finite,
        })
    }

    pub fn num_inputs(&self) -> usize {
        self.subjects.len()
    }

    pub fn num_elements(&self) -> usize {
        self.num_elements
    }

    pub fn list_path(&self) -> &Path {
        &self.list_path
    }
}

impl ColumnImporter for MappedCohortImporter {
    fn import(&self, element: usize) -> Vec<f64> {
        self.subjects.iter().map(|s| s.value(element)).collect()
    }

    fn all_finite(&self) -> bool {
        self.finite
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_subject(dir: &Path, name: &str, values: &[f32]) {
        let mut f = std::fs::File::create(dir.join(name)).unwrap();
        for v in values {
            f.write_all(&v.to_le_bytes()).unwrap();
        }
    }

    #[test]
    fn test_import_columns() {
        let dir = tempfile::tempdir().unwrap();
        write_subject(dir.path(), "s1.bin", &[1.0, 2.0, 3.0]);
        write_subject(dir.path(), "s2.bin", &[4.0, 5.0, 6.0]);
        let list = dir.path().join("subjects.txt");
        write!(std::fs::File::create(&list).unwrap(), "s1.bin\n\ns2.bin\n").unwrap();

        let importer = MappedCohortImporter::open(&list).unwrap();
        assert_eq!(importer.num_inputs(), 2);
        assert_eq!(importer.num_elements(), 3);
        assert!(importer.all_finite());
        assert_eq!(importer.import(1), vec![2.0, 5.0]);
        assert!(importer.import(3).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_short_or_non_finite_files_flagged() {
        let dir = tempfile::tempdir().unwrap();
        write_subject(dir.path(), "s1.bin", &[1.0, f32::NAN]);
        write_subject(dir.path(), "s2.bin", &[4.0]);
        let list = dir.path().join("subjects.txt");
        write!(std::fs::File::create(&list).unwrap(), "s1.bin\ns2.bin\n").unwrap();

        let importer = MappedCohortImporter::open(&list).unwrap();
        assert!(!importer.all_finite());
        let col = importer.import(1);
        assert!(col[0].is_nan() && col[1].is_nan());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("subjects.txt");
        write!(std::fs::File::create(&list).unwrap(), "absent.bin\n").unwrap();
        assert!(MappedCohortImporter::open(&list).is_err());
    }
}
