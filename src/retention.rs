//! Retention: keep at most `max_files` log files under the root.
//!
//! Files are discovered by decoding names with the filename codec, so foreign
//! files are never touched, and ordered by the codec (never by mtime).

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::filename::FileIdentifier;

/// Default cap on retained files.
pub const DEFAULT_MAX_FILES: usize = 5;

// root/YYYY-MM/DD/file
const LAYOUT_DEPTH: usize = 3;

/// Which files share one `max_files` budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionScope {
    /// One budget across the whole log root.
    #[default]
    Global,
    /// One budget per day directory.
    Directory,
}

/// How many files to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Maximum number of files kept per scope. Always at least 1.
    pub max_files: usize,
    /// Budget grouping.
    pub scope: RetentionScope,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FILES)
    }
}

/// A decodable log file found under the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFile {
    pub path: PathBuf,
    pub id: FileIdentifier,
}

/// Outcome of one retention pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RetentionReport {
    /// Files removed by this pass.
    pub deleted: Vec<PathBuf>,
    /// Files that were already gone when we tried to remove them.
    pub already_gone: Vec<PathBuf>,
    /// Files kept because a writer still has them open.
    pub protected: Vec<PathBuf>,
    /// Files whose removal failed for another reason.
    pub failed: Vec<PathBuf>,
}

impl RetentionPolicy {
    pub fn new(max_files: usize) -> Self {
        Self {
            max_files: max_files.max(1),
            scope: RetentionScope::Global,
        }
    }

    pub fn with_scope(mut self, scope: RetentionScope) -> Self {
        self.scope = scope;
        self
    }

    /// Delete the oldest files beyond the cap, never touching `open_files`.
    pub fn enforce(&self, root: &Path, open_files: &HashSet<PathBuf>) -> RetentionReport {
        let mut report = RetentionReport::default();
        for mut group in self.group(list_log_files(root)) {
            group.sort_by(|a, b| a.id.cmp(&b.id));
            let mut excess = group.len().saturating_sub(self.max_files);
            for file in group {
                if excess == 0 {
                    break;
                }
                if open_files.contains(&file.path) {
                    report.protected.push(file.path);
                    continue;
                }
                match fs::remove_file(&file.path) {
                    Ok(()) => {
                        tracing::debug!(path = %file.path.display(), "deleted old log file");
                        report.deleted.push(file.path);
                        excess -= 1;
                    }
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {
                        report.already_gone.push(file.path);
                        excess -= 1;
                    }
                    Err(e) => {
                        tracing::warn!(path = %file.path.display(), error = %e, "failed to delete old log file");
                        report.failed.push(file.path);
                    }
                }
            }
        }
        report
    }

    fn group(&self, files: Vec<LogFile>) -> Vec<Vec<LogFile>> {
        match self.scope {
            RetentionScope::Global => vec![files],
            RetentionScope::Directory => {
                let mut groups: BTreeMap<PathBuf, Vec<LogFile>> = BTreeMap::new();
                for file in files {
                    let dir = file.path.parent().map(Path::to_path_buf).unwrap_or_default();
                    groups.entry(dir).or_default().push(file);
                }
                groups.into_values().collect()
            }
        }
    }
}

/// All decodable log files under `root`, oldest first.
///
/// Unreadable directories and foreign names are skipped.
pub fn list_log_files(root: &Path) -> Vec<LogFile> {
    let mut files = Vec::new();
    collect(root, LAYOUT_DEPTH, &mut files);
    files.sort_by(|a, b| a.id.cmp(&b.id));
    files
}

fn collect(dir: &Path, depth: usize, out: &mut Vec<LogFile>) {
    if depth == 0 {
        return;
    }
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            collect(&path, depth - 1, out);
        } else if file_type.is_file() {
            if let Ok(id) = FileIdentifier::from_path(&path) {
                out.push(LogFile { path, id });
            }
        }
    }
}

/// Highest part already used by `robot_id` on `date` inside `dir`.
pub(crate) fn highest_part(dir: &Path, robot_id: &str, date: chrono::NaiveDate) -> Option<u32> {
    let entries = fs::read_dir(dir).ok()?;
    entries
        .flatten()
        .filter_map(|entry| FileIdentifier::from_path(&entry.path()).ok())
        .filter(|id| id.robot_id == robot_id && id.date == date)
        .map(|id| id.part)
        .max()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn touch(root: &Path, part: u32, day: u32, second: u32) -> PathBuf {
        let date = NaiveDate::from_ymd_opt(2026, 3, day).unwrap();
        let id = FileIdentifier::new(
            "7",
            part,
            date,
            NaiveTime::from_hms_opt(8, 0, second).unwrap(),
            "01",
        );
        let dir = root.join(date.format("%Y-%m").to_string()).join(date.format("%d").to_string());
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(id.encode());
        fs::write(&path, b"{}\n").unwrap();
        path
    }

    #[test]
    fn test_keeps_newest_files() {
        let root = tempfile::tempdir().unwrap();
        let p1 = touch(root.path(), 1, 9, 0);
        let p2 = touch(root.path(), 2, 9, 1);
        let p3 = touch(root.path(), 3, 9, 2);

        let report = RetentionPolicy::new(2).enforce(root.path(), &HashSet::new());
        assert_eq!(report.deleted, vec![p1.clone()]);
        assert!(!p1.exists());
        assert!(p2.exists());
        assert!(p3.exists());
    }

    #[test]
    fn test_order_comes_from_names_not_mtime() {
        let root = tempfile::tempdir().unwrap();
        // Written newest-name first so mtime order is the reverse of name order.
        let newer = touch(root.path(), 1, 10, 0);
        let older = touch(root.path(), 5, 9, 0);

        let report = RetentionPolicy::new(1).enforce(root.path(), &HashSet::new());
        assert_eq!(report.deleted, vec![older]);
        assert!(newer.exists());
    }

    #[test]
    fn test_foreign_files_are_ignored() {
        let root = tempfile::tempdir().unwrap();
        let kept = touch(root.path(), 1, 9, 0);
        let foreign = root.path().join("2026-03").join("09").join("notes.log");
        fs::write(&foreign, b"keep me").unwrap();

        let report = RetentionPolicy::new(1).enforce(root.path(), &HashSet::new());
        assert!(report.deleted.is_empty());
        assert!(foreign.exists());
        assert!(kept.exists());
    }

    #[test]
    fn test_open_file_is_never_deleted() {
        let root = tempfile::tempdir().unwrap();
        let oldest = touch(root.path(), 1, 9, 0);
        let middle = touch(root.path(), 2, 9, 1);
        let newest = touch(root.path(), 3, 9, 2);

        let open: HashSet<PathBuf> = [oldest.clone()].into_iter().collect();
        let report = RetentionPolicy::new(2).enforce(root.path(), &open);
        assert_eq!(report.protected, vec![oldest.clone()]);
        assert_eq!(report.deleted, vec![middle.clone()]);
        assert!(oldest.exists());
        assert!(!middle.exists());
        assert!(newest.exists());
    }

    #[test]
    fn test_directory_scope_budgets_each_day() {
        let root = tempfile::tempdir().unwrap();
        let a1 = touch(root.path(), 1, 9, 0);
        let a2 = touch(root.path(), 2, 9, 1);
        let b1 = touch(root.path(), 1, 10, 0);
        let b2 = touch(root.path(), 2, 10, 1);

        let report = RetentionPolicy::new(1)
            .with_scope(RetentionScope::Directory)
            .enforce(root.path(), &HashSet::new());
        assert_eq!(report.deleted.len(), 2);
        assert!(!a1.exists());
        assert!(a2.exists());
        assert!(!b1.exists());
        assert!(b2.exists());
    }

    #[test]
    fn test_zero_is_clamped_to_one() {
        assert_eq!(RetentionPolicy::new(0).max_files, 1);
    }

    #[test]
    fn test_highest_part_filters_robot_and_date() {
        let root = tempfile::tempdir().unwrap();
        touch(root.path(), 4, 9, 0);
        touch(root.path(), 2, 9, 1);
        let dir = root.path().join("2026-03").join("09");
        let date = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        assert_eq!(highest_part(&dir, "7", date), Some(4));
        assert_eq!(highest_part(&dir, "8", date), None);
        assert_eq!(highest_part(&root.path().join("missing"), "7", date), None);
    }
}
