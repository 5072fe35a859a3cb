//! Auto-saves go to a hidden sibling file; explicit saves replace the real
//! file and drop the sibling.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::CoreResult;

/// `dir/.~{stem}(-).{ext}` for `dir/{stem}.{ext}`.
pub fn backup_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!(".~{stem}(-).{}", ext.to_string_lossy()),
        None => format!(".~{stem}(-)"),
    };
    path.with_file_name(name)
}

/// The backup to open instead of `path`, when one exists and is newer.
pub fn recovery_candidate(path: &Path) -> Option<PathBuf> {
    let backup = backup_path(path);
    let backup_modified = fs::metadata(&backup).and_then(|m| m.modified()).ok()?;
    match fs::metadata(path).and_then(|m| m.modified()) {
        Ok(original) if original >= backup_modified => None,
        _ => Some(backup),
    }
}

/// Writes `bytes` to a temp file next to `path`, then renames it over
/// `path`.
pub fn write_atomically(path: &Path, bytes: &[u8]) -> CoreResult<()> {
    let mut tmp_name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    let mut file = File::create(&tmp)?;
    file.write_all(bytes)?;
    file.flush()?;
    file.sync_all()?;
    drop(file);
    fs::rename(&tmp, path)?;
    debug!(?path, len = bytes.len(), "document written");
    Ok(())
}

pub fn write_backup(path: &Path, bytes: &[u8]) -> CoreResult<PathBuf> {
    let backup = backup_path(path);
    write_atomically(&backup, bytes)?;
    Ok(backup)
}

pub fn discard_backup(path: &Path) {
    let backup = backup_path(path);
    if backup.exists() {
        if let Err(err) = fs::remove_file(&backup) {
            warn!(?backup, %err, "failed to remove backup");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::{Duration, SystemTime};

    use tempfile::tempdir;

    #[test]
    fn backup_name_hides_next_to_original() {
        assert_eq!(
            backup_path(Path::new("/docs/paper.pdf")),
            PathBuf::from("/docs/.~paper(-).pdf")
        );
        assert_eq!(
            backup_path(Path::new("notes")),
            PathBuf::from(".~notes(-)")
        );
    }

    #[test]
    fn atomic_write_replaces_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        fs::write(&path, b"old").unwrap();
        write_atomically(&path, b"new").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"new");
        assert!(!dir.path().join("doc.pdf.tmp").exists());
    }

    #[test]
    fn only_newer_backups_are_recovered() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        assert_eq!(recovery_candidate(&path), None);

        fs::write(&path, b"saved").unwrap();
        let backup = write_backup(&path, b"autosaved").unwrap();

        let earlier = SystemTime::now() - Duration::from_secs(60);
        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(earlier)
            .unwrap();
        assert_eq!(recovery_candidate(&path), Some(backup.clone()));

        File::options()
            .write(true)
            .open(&backup)
            .unwrap()
            .set_modified(earlier - Duration::from_secs(60))
            .unwrap();
        assert_eq!(recovery_candidate(&path), None);

        discard_backup(&path);
        assert!(!backup.exists());
    }
}
