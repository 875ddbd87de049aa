//! Subject lists (JSON arrays of company records).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::core::subject::Subject;

/// Load every subject from a JSON array.
///
/// Records are not validated here; a blank name fails that subject only, when
/// the batch reaches it.
pub fn load_subjects(path: &Path) -> Result<Vec<Subject>> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let subjects: Vec<Subject> =
        serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    info!(path = %path.display(), count = subjects.len(), "subjects loaded");
    Ok(subjects)
}

/// The `start..start + limit` window of `subjects`, clamped to the list.
pub fn select_window(subjects: &[Subject], start: usize, limit: Option<usize>) -> &[Subject] {
    let start = start.min(subjects.len());
    let end = match limit {
        Some(limit) => start.saturating_add(limit).min(subjects.len()),
        None => subjects.len(),
    };
    &subjects[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_lead_export_records() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("subjects.json");
        fs::write(
            &path,
            r#"[
                {"Title": "Acme Dental", "WebsiteURL": "https://acme.example", "Rating": 4.5},
                {"name": "Globex", "website": "globex.example"}
            ]"#,
        )
        .expect("write");

        let subjects = load_subjects(&path).expect("load");
        assert_eq!(subjects.len(), 2);
        assert_eq!(subjects[0].name, "Acme Dental");
        assert_eq!(subjects[1].website, "globex.example");
    }

    #[test]
    fn non_array_input_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("subjects.json");
        fs::write(&path, r#"{"name": "Acme"}"#).expect("write");
        assert!(load_subjects(&path).is_err());
    }

    #[test]
    fn window_is_clamped() {
        let subjects: Vec<Subject> = ["a", "b", "c"].into_iter().map(Subject::new).collect();
        assert_eq!(select_window(&subjects, 1, None).len(), 2);
        assert_eq!(select_window(&subjects, 1, Some(1))[0].name, "b");
        assert_eq!(select_window(&subjects, 2, Some(10)).len(), 1);
        assert!(select_window(&subjects, 5, Some(1)).is_empty());
    }
}
