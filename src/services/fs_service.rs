use crate::error::AppError;
use crate::models::classify_types::RelocateMode;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn sort_by_file_name(paths: &mut [PathBuf]) {
    paths.sort_by_key(|p| {
        p.file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_lowercase()
    });
}

/// Image files directly inside `dir` (no recursion), sorted by name.
pub fn list_image_files(dir: &Path) -> Result<Vec<PathBuf>, AppError> {
    if !dir.is_dir() {
        return Err(format!("Path does not exist or is not a folder: {}", dir.display()).into());
    }

    let read_dir = std::fs::read_dir(dir)
        .map_err(|e| AppError::io(format!("Cannot read directory {}", dir.display()), e))?;

    let entries = read_dir.map(|entry| -> std::io::Result<(PathBuf, bool)> {
        let entry = entry?;
        let is_file = entry.file_type()?.is_file();
        Ok((entry.path(), is_file))
    });
    collect_images(dir, entries)
}

/// Keeps the image files among `(path, is_file)` entries. An unreadable entry
/// fails the whole listing.
fn collect_images<I>(dir: &Path, entries: I) -> Result<Vec<PathBuf>, AppError>
where
    I: IntoIterator<Item = std::io::Result<(PathBuf, bool)>>,
{
    let mut images = Vec::new();
    for entry in entries {
        let (path, is_file) =
            entry.map_err(|e| AppError::io(format!("Cannot read directory {}", dir.display()), e))?;
        if is_file && is_image_file(&path) {
            images.push(path);
        }
    }

    sort_by_file_name(&mut images);
    Ok(images)
}

/// Image files anywhere below `dir`, in a stable order.
pub fn list_image_files_recursive(dir: &Path) -> Result<Vec<PathBuf>, AppError> {
    if !dir.is_dir() {
        return Err(format!("Path does not exist or is not a folder: {}", dir.display()).into());
    }

    let images = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(folder = %dir.display(), "Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|e| e.file_type().is_file() && is_image_file(e.path()))
        .map(|e| e.into_path())
        .collect();

    Ok(images)
}

/// Creates `<root>/<label>` for each label. Existing folders are left alone.
pub fn ensure_category_dirs(root: &Path, labels: &[String]) -> Result<(), AppError> {
    for label in labels {
        let dest = root.join(label);
        std::fs::create_dir_all(&dest)
            .map_err(|e| AppError::io(format!("Failed to create directory {}", dest.display()), e))?;
    }
    Ok(())
}

/// Copies or moves `source` into `dest_dir`, returning the final path.
/// An existing file of the same name is never overwritten; a ` (n)` suffix
/// is added instead.
pub fn relocate(source: &Path, dest_dir: &Path, mode: RelocateMode) -> Result<PathBuf, AppError> {
    let dest = resolve_destination(dest_dir, source)?;

    match mode {
        RelocateMode::Copy => {
            std::fs::copy(source, &dest).map_err(|e| {
                AppError::io(format!("Failed to copy {} to {}", source.display(), dest.display()), e)
            })?;
        }
        RelocateMode::Move => {
            if let Err(rename_err) = std::fs::rename(source, &dest) {
                // Different filesystems: fall back to copy + remove.
                std::fs::copy(source, &dest).map_err(|_| {
                    AppError::io(
                        format!("Failed to move {} to {}", source.display(), dest.display()),
                        rename_err,
                    )
                })?;
                std::fs::remove_file(source)
                    .map_err(|e| AppError::io(format!("Failed to remove {}", source.display()), e))?;
            }
        }
    }

    Ok(dest)
}

fn resolve_destination(dest_dir: &Path, source: &Path) -> Result<PathBuf, AppError> {
    let file_name = source
        .file_name()
        .ok_or_else(|| AppError::from(format!("File name not found for {}", source.display())))?;

    let mut candidate = dest_dir.join(file_name);
    if !candidate.exists() {
        return Ok(candidate);
    }

    let stem = source
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| String::from("file"));
    let extension = source.extension().and_then(|ext| ext.to_str());
    let mut index = 1;

    loop {
        let mut name = format!("{} ({})", stem, index);
        if let Some(ext) = extension {
            name.push('.');
            name.push_str(ext);
        }
        candidate = dest_dir.join(name);
        if !candidate.exists() {
            return Ok(candidate);
        }
        index += 1;
    }
}

pub fn file_size(path: &Path) -> Result<u64, AppError> {
    std::fs::metadata(path)
        .map(|m| m.len())
        .map_err(|e| AppError::io(format!("Cannot stat {}", path.display()), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn lists_only_top_level_images_sorted() {
        let dir = tempdir().unwrap();
        for name in ["b.JPG", "a.png", "C.jpeg", "notes.txt", "d.gif"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("e.jpg"), b"x").unwrap();
        fs::create_dir(dir.path().join("folder.jpg")).unwrap();

        let names: Vec<String> = list_image_files(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.png", "b.JPG", "C.jpeg"]);
    }

    #[test]
    fn recursive_listing_descends_into_subfolders() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.png"), b"x").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("b.jpg"), b"x").unwrap();
        fs::write(dir.path().join("sub").join("skip.bmp"), b"x").unwrap();

        let found = list_image_files_recursive(dir.path()).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().any(|p| p.ends_with("sub/b.jpg")));
    }

    #[test]
    fn unreadable_entry_fails_the_listing() {
        let dir = Path::new("/photos");
        let entries = vec![
            Ok((dir.join("a.png"), true)),
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied")),
            Ok((dir.join("b.png"), true)),
        ];

        let err = collect_images(dir, entries).unwrap_err();
        match err {
            AppError::Io { context, source } => {
                assert!(context.contains("/photos"));
                assert_eq!(source.kind(), std::io::ErrorKind::PermissionDenied);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn collected_entries_keep_image_files_only() {
        let dir = Path::new("/photos");
        let entries = vec![
            Ok((dir.join("b.JPG"), true)),
            Ok((dir.join("folder.png"), false)),
            Ok((dir.join("notes.txt"), true)),
            Ok((dir.join("a.png"), true)),
        ];

        let images = collect_images(dir, entries).unwrap();
        assert_eq!(images, vec![dir.join("a.png"), dir.join("b.JPG")]);
    }

    #[test]
    fn listing_a_missing_folder_fails() {
        let dir = tempdir().unwrap();
        assert!(list_image_files(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn ensure_category_dirs_is_idempotent() {
        let dir = tempdir().unwrap();
        let labels = vec!["foods".to_string(), "people".to_string()];
        ensure_category_dirs(dir.path(), &labels).unwrap();
        ensure_category_dirs(dir.path(), &labels).unwrap();
        assert!(dir.path().join("foods").is_dir());
        assert!(dir.path().join("people").is_dir());
    }

    #[test]
    fn copy_keeps_source_and_move_removes_it() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("foods");
        fs::create_dir(&dest).unwrap();
        let a = dir.path().join("a.jpg");
        let b = dir.path().join("b.jpg");
        fs::write(&a, b"a").unwrap();
        fs::write(&b, b"b").unwrap();

        let copied = relocate(&a, &dest, RelocateMode::Copy).unwrap();
        assert!(a.exists());
        assert_eq!(fs::read(copied).unwrap(), b"a");

        let moved = relocate(&b, &dest, RelocateMode::Move).unwrap();
        assert!(!b.exists());
        assert_eq!(moved, dest.join("b.jpg"));
    }

    #[test]
    fn relocate_never_overwrites() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("foods");
        fs::create_dir(&dest).unwrap();
        fs::write(dest.join("a.jpg"), b"existing").unwrap();
        let a = dir.path().join("a.jpg");
        fs::write(&a, b"new").unwrap();

        let moved = relocate(&a, &dest, RelocateMode::Move).unwrap();
        assert_eq!(moved, dest.join("a (1).jpg"));
        assert_eq!(fs::read(dest.join("a.jpg")).unwrap(), b"existing");
    }
}
