//! Read-only report over the run directories of a dataset.
use crate::error::{Result, SegError};
use crate::fs_scan;
use crate::layout::METADATA_FILE;
use crate::metadata::{self, Descriptor};
use regex::Regex;
use std::path::{Path, PathBuf};

const UUID_PATTERN: &str = "[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}";
const CUSTOM_LABEL: &str = "CustomDir";

#[derive(Debug)]
pub struct ScanRow {
    pub index: usize,
    /// Eight-character run id prefix, or `CustomDir`.
    pub label: String,
    pub run_dir: PathBuf,
    pub descriptor: Descriptor,
}

fn run_dir_pattern(dataset_name: &str) -> Result<Regex> {
    Regex::new(&format!("^{}_({})$", regex::escape(dataset_name), UUID_PATTERN))
        .map_err(|e| SegError::Config(e.to_string()))
}

/// Run directories under `parent` named `<dataset>_<uuid>`, sorted by name,
/// each paired with its uuid prefix.
fn candidate_runs(parent: &Path, dataset_name: &str) -> Result<Vec<(String, PathBuf)>> {
    let re = run_dir_pattern(dataset_name)?;
    let entries = match std::fs::read_dir(parent) {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(SegError::io(parent, e)),
    };

    let mut runs: Vec<(String, String, PathBuf)> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().to_string();
            let short = re.captures(&name)?.get(1)?.as_str()[..8].to_string();
            Some((name, short, e.path()))
        })
        .collect();
    runs.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(runs.into_iter().map(|(_, short, path)| (short, path)).collect())
}

/// List the runs of `dataset`. A custom directory is reported on its own;
/// otherwise runs are looked up in `output_dir`, or beside the dataset.
pub fn scan_runs(
    dataset: &Path,
    output_dir: Option<&Path>,
    custom_output_dir: Option<&Path>,
) -> Result<Vec<ScanRow>> {
    let dataset = fs_scan::resolve_dataset(dataset)?;

    let runs = match custom_output_dir {
        Some(dir) if dir.is_dir() => vec![(CUSTOM_LABEL.to_string(), dir.to_path_buf())],
        Some(_) => Vec::new(),
        None => {
            let parent = match output_dir {
                Some(d) => d.to_path_buf(),
                None => dataset.parent().map(Path::to_path_buf).unwrap_or_default(),
            };
            candidate_runs(&parent, &fs_scan::dataset_name(&dataset))?
        }
    };

    Ok(runs
        .into_iter()
        .enumerate()
        .map(|(i, (label, run_dir))| ScanRow {
            index: i + 1,
            label,
            descriptor: metadata::read_descriptor(&run_dir.join(METADATA_FILE)),
            run_dir,
        })
        .collect())
}

const HEADERS: [&str; 10] = [
    "Run #",
    "UUID",
    "Completed",
    "Num Images",
    "Resize Dims",
    "Interp",
    "Crops",
    "BG Removal",
    "Visualize Seg",
    "Errors",
];

fn yes_no(b: bool) -> String {
    let s = if b { "Yes" } else { "No" };
    s.to_string()
}

fn cells(row: &ScanRow) -> [String; 10] {
    let unknown = |why: &str| {
        [
            row.index.to_string(),
            row.label.clone(),
            "?".into(),
            "-".into(),
            "-".into(),
            "-".into(),
            "-".into(),
            "-".into(),
            "-".into(),
            why.to_string(),
        ]
    };

    match &row.descriptor {
        Descriptor::Missing => unknown("missing metadata.json"),
        Descriptor::Malformed(_) => unknown("unreadable metadata.json"),
        Descriptor::Present(m) => {
            let p = &m.run_parameters;
            let bg = match (p.remove_crops_background, p.remove_full_background) {
                (true, true) => "Crops+Full",
                (true, false) => "Crops",
                (false, true) => "Full",
                (false, false) => "No",
            };
            [
                row.index.to_string(),
                row.label.clone(),
                yes_no(m.run_status.completed),
                m.dataset.num_images.to_string(),
                p.size.map(|s| s.to_string()).unwrap_or_else(|| "original".into()),
                p.interpolation.map(|i| i.to_string()).unwrap_or_else(|| "-".into()),
                yes_no(p.crop_by_class),
                bg.to_string(),
                yes_no(p.visualize_segmentation),
                m.run_status.errors.clone().unwrap_or_else(|| "-".into()),
            ]
        }
    }
}

/// Fixed-width text table, one line per row.
pub fn render_table(rows: &[ScanRow]) -> String {
    let body: Vec<[String; 10]> = rows.iter().map(cells).collect();
    let mut widths = HEADERS.map(str::len);
    for r in &body {
        for (w, c) in widths.iter_mut().zip(r.iter()) {
            *w = (*w).max(c.chars().count());
        }
    }

    let line = |cols: &[String]| {
        cols.iter()
            .zip(widths.iter())
            .map(|(c, w)| format!("{:<w$}", c, w = *w))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut out = String::new();
    out.push_str(&line(&HEADERS.map(String::from)[..]));
    out.push('\n');
    out.push_str(
        &widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    out.push('\n');
    for r in &body {
        out.push_str(&line(&r[..]));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const ID_A: &str = "0b0e8f1c-5d7a-5b3e-9c2f-11aa22bb33cc";
    const ID_B: &str = "f00dbabe-0000-5000-8000-000000000001";

    #[test]
    fn test_pattern_matches_only_own_runs() {
        let re = run_dir_pattern("wings.v2").unwrap();
        assert!(re.is_match(&format!("wings.v2_{}", ID_A)));
        assert!(!re.is_match(&format!("wingsXv2_{}", ID_A)));
        assert!(!re.is_match(&format!("wings.v2_{}_old", ID_A)));
        assert!(!re.is_match("wings.v2_notauuid"));
    }

    #[test]
    fn test_scan_missing_dataset_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = scan_runs(&dir.path().join("nope"), None, None).unwrap_err();
        assert!(matches!(err, SegError::DatasetNotFound(_)));
    }

    #[test]
    fn test_scan_reports_missing_and_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = dir.path().join("wings");
        fs::create_dir(&dataset).unwrap();
        fs::create_dir(dir.path().join(format!("wings_{}", ID_B))).unwrap();
        let bad = dir.path().join(format!("wings_{}", ID_A));
        fs::create_dir(&bad).unwrap();
        fs::write(bad.join(METADATA_FILE), "{ not json").unwrap();
        fs::create_dir(dir.path().join("other_thing")).unwrap();

        let rows = scan_runs(&dataset, None, None).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].label, "0b0e8f1c");
        assert!(matches!(rows[0].descriptor, Descriptor::Malformed(_)));
        assert_eq!(rows[1].label, "f00dbabe");
        assert!(matches!(rows[1].descriptor, Descriptor::Missing));

        let table = render_table(&rows);
        assert!(table.contains("unreadable metadata.json"));
        assert!(table.contains("missing metadata.json"));
        assert_eq!(table.lines().count(), 4);
    }

    #[test]
    fn test_scan_custom_dir() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = dir.path().join("wings");
        fs::create_dir(&dataset).unwrap();
        let custom = dir.path().join("out");
        fs::create_dir(&custom).unwrap();

        let rows = scan_runs(&dataset, None, Some(custom.as_path())).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].label, CUSTOM_LABEL);

        let rows = scan_runs(&dataset, None, Some(dir.path().join("absent").as_path())).unwrap();
        assert!(rows.is_empty());
    }
}
