use crate::error::{Result, SegError};
use crate::types::ClassId;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// One row of the segmentation table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SegmentationRecord {
    pub image: PathBuf,
    pub presence: [bool; ClassId::COUNT],
}

impl SegmentationRecord {
    pub fn new(image: PathBuf, present: &BTreeSet<ClassId>) -> Self {
        let mut presence = [false; ClassId::COUNT];
        for c in present {
            presence[c.id() as usize] = true;
        }
        Self { image, presence }
    }
}

/// Append-only table shared by all workers. Rows are kept in the order
/// workers finished, which varies between runs with more than one worker.
#[derive(Debug, Default)]
pub struct SegmentationAggregator {
    rows: Mutex<Vec<SegmentationRecord>>,
}

impl SegmentationAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, image: &Path, present: &BTreeSet<ClassId>) {
        self.rows
            .lock()
            .push(SegmentationRecord::new(image.to_path_buf(), present));
    }

    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `image,<class...>` header then one `0`/`1` row per record.
    pub fn to_csv(&self) -> String {
        let mut out = String::from("image");
        for c in ClassId::ALL {
            out.push(',');
            out.push_str(c.name());
        }
        out.push('\n');

        for row in self.rows.lock().iter() {
            out.push_str(&csv_field(&row.image.to_string_lossy()));
            for present in row.presence {
                out.push(',');
                out.push(if present { '1' } else { '0' });
            }
            out.push('\n');
        }
        out
    }

    pub fn export(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SegError::io(parent, e))?;
        }
        std::fs::write(path, self.to_csv()).map_err(|e| SegError::io(path, e))
    }
}

fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_header_and_rows() {
        let agg = SegmentationAggregator::new();
        let present: BTreeSet<_> = [ClassId::Background, ClassId::Body].into_iter().collect();
        agg.record(Path::new("/d/a.png"), &present);

        let csv = agg.to_csv();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "image,background,generic,right_forewing,left_forewing,right_hindwing,\
             left_hindwing,ruler,white_balance,label,color_card,body"
        );
        assert_eq!(lines.next().unwrap(), "/d/a.png,1,0,0,0,0,0,0,0,0,0,1");
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_quotes_awkward_paths() {
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field("plain"), "plain");
    }

    #[test]
    fn test_concurrent_appends() {
        let agg = Arc::new(SegmentationAggregator::new());
        let present: BTreeSet<_> = [ClassId::Label].into_iter().collect();
        std::thread::scope(|s| {
            for t in 0..4 {
                let agg = Arc::clone(&agg);
                let present = present.clone();
                s.spawn(move || {
                    for i in 0..25 {
                        agg.record(Path::new(&format!("{}-{}.png", t, i)), &present);
                    }
                });
            }
        });
        assert_eq!(agg.len(), 100);
    }

    #[test]
    fn test_export_empty_writes_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("segmentation.csv");
        SegmentationAggregator::new().export(&path).unwrap();
        let s = std::fs::read_to_string(&path).unwrap();
        assert_eq!(s.lines().count(), 1);
        assert!(s.starts_with("image,background"));
    }
}
