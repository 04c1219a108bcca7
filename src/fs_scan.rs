use crate::error::{Result, SegError};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "tif", "tiff", "bmp"];

/// jpg/jpeg/png/tif/tiff/bmp, any case
pub fn is_image_file(p: &Path) -> bool {
    let ext = p
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase();
    IMAGE_EXTENSIONS.contains(&ext.as_str())
}

/// Absolute, symlink-resolved dataset root.
pub fn resolve_dataset(dataset: &Path) -> Result<PathBuf> {
    if !dataset.is_dir() {
        return Err(SegError::DatasetNotFound(dataset.to_path_buf()));
    }
    dataset
        .canonicalize()
        .map_err(|e| SegError::io(dataset, e))
}

/// Last path component of the dataset root, used in run directory names.
pub fn dataset_name(dataset: &Path) -> String {
    dataset
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "dataset".to_string())
}

/// Regular files under `root`, directories and files visited in
/// lexicographic order. Symlinks to files are included; symlinked
/// directories are not descended into. Entries that fail mid-walk are
/// skipped.
pub fn sorted_files(root: &Path) -> impl Iterator<Item = walkdir::DirEntry> {
    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() || (e.path_is_symlink() && e.path().is_file()))
}

/// All images under the dataset in sorted walk order.
pub fn discover_images(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(SegError::DatasetNotFound(root.to_path_buf()));
    }
    Ok(sorted_files(root)
        .map(|e| e.into_path())
        .filter(|p| is_image_file(p))
        .collect())
}

/// `path` relative to `root`; falls back to the file name when `path`
/// is not under `root`.
pub fn relative_to(root: &Path, path: &Path) -> PathBuf {
    match path.strip_prefix(root) {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => path
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| path.to_path_buf()),
    }
}

/// Relative path with `/` separators regardless of platform.
pub fn portable_relative(root: &Path, path: &Path) -> String {
    relative_to(root, path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_is_image_file_case_insensitive() {
        assert!(is_image_file(Path::new("a/b.JPG")));
        assert!(is_image_file(Path::new("b.tiff")));
        assert!(is_image_file(Path::new("c.Bmp")));
        assert!(!is_image_file(Path::new("d.gif")));
        assert!(!is_image_file(Path::new("noext")));
        assert!(!is_image_file(Path::new("x.detections.json")));
    }

    #[test]
    fn test_discover_images_sorted_and_nested() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("b")).unwrap();
        fs::create_dir_all(dir.path().join("a")).unwrap();
        fs::write(dir.path().join("b/2.png"), b"x").unwrap();
        fs::write(dir.path().join("a/1.PNG"), b"x").unwrap();
        fs::write(dir.path().join("z.jpg"), b"x").unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        let found = discover_images(dir.path()).unwrap();
        let rel: Vec<_> = found
            .iter()
            .map(|p| portable_relative(dir.path(), p))
            .collect();
        assert_eq!(rel, vec!["a/1.PNG", "b/2.png", "z.jpg"]);
    }

    #[test]
    fn test_discover_images_missing_root() {
        let err = discover_images(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, SegError::DatasetNotFound(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_discover_images_follows_file_symlinks() {
        let src = tempfile::tempdir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        fs::write(src.path().join("real.png"), b"x").unwrap();
        fs::create_dir(src.path().join("nested")).unwrap();
        fs::write(src.path().join("nested/inner.png"), b"x").unwrap();

        std::os::unix::fs::symlink(src.path().join("real.png"), dir.path().join("link.png")).unwrap();
        std::os::unix::fs::symlink(src.path().join("gone.png"), dir.path().join("dangling.png")).unwrap();
        std::os::unix::fs::symlink(src.path().join("nested"), dir.path().join("linked_dir")).unwrap();

        let found = discover_images(dir.path()).unwrap();
        let rel: Vec<_> = found
            .iter()
            .map(|p| portable_relative(dir.path(), p))
            .collect();
        assert_eq!(rel, vec!["link.png"]);
    }

    #[test]
    fn test_dataset_name() {
        assert_eq!(dataset_name(Path::new("/data/butterflies")), "butterflies");
    }
}
