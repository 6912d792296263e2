//! Directory scanning with timestamp and optional content hash per file.
//!
//! Paths are reported relative to the scan root with forward slashes, and every
//! filter comparison happens on that normalized form. Directory paths get a
//! trailing `/` before they are compared against the exclude and no-recurse
//! prefixes, so a prefix of `Intermediate/` matches the directory itself.

use crate::hasher::file_hasher::{combine, hash_file};
use crate::hasher::{Digest, IgnoreRules};
use crate::Timestamp;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// What to visit during a scan. Empty include lists accept everything.
#[derive(Debug, Clone, Default)]
pub struct ScanFilters {
    /// A file is kept only if its path contains one of these.
    pub directory_includes: Vec<String>,
    /// Directories starting with one of these are not descended into.
    pub directory_excludes: Vec<String>,
    /// Directories starting with one of these are descended at most one level.
    pub no_recurse: Vec<String>,
    /// A file is kept only if its path contains one of these.
    pub file_includes: Vec<String>,
    pub ignore: IgnoreRules,
    /// Record directories as entries (minimum timestamp, no digest).
    pub include_directories: bool,
    pub compute_hashes: bool,
}

impl ScanFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn directory_includes<I: IntoIterator<Item = S>, S: Into<String>>(mut self, v: I) -> Self {
        self.directory_includes = normalize_all(v);
        self
    }

    pub fn directory_excludes<I: IntoIterator<Item = S>, S: Into<String>>(mut self, v: I) -> Self {
        self.directory_excludes = normalize_all(v);
        self
    }

    pub fn no_recurse<I: IntoIterator<Item = S>, S: Into<String>>(mut self, v: I) -> Self {
        self.no_recurse = normalize_all(v);
        self
    }

    pub fn file_includes<I: IntoIterator<Item = S>, S: Into<String>>(mut self, v: I) -> Self {
        self.file_includes = normalize_all(v);
        self
    }

    pub fn ignore(mut self, rules: IgnoreRules) -> Self {
        self.ignore = rules;
        self
    }

    pub fn include_directories(mut self, yes: bool) -> Self {
        self.include_directories = yes;
        self
    }

    pub fn compute_hashes(mut self, yes: bool) -> Self {
        self.compute_hashes = yes;
        self
    }

    fn accepts_file(&self, relative: &str) -> bool {
        let dir_ok = self.directory_includes.is_empty()
            || self.directory_includes.iter().any(|d| relative.contains(d.as_str()));
        let file_ok = self.file_includes.is_empty()
            || self.file_includes.iter().any(|f| relative.contains(f.as_str()));
        dir_ok && file_ok
    }

    /// `dir_key` is the directory's relative path with a trailing `/`.
    fn should_recurse(&self, dir_key: &str) -> bool {
        if self
            .directory_excludes
            .iter()
            .any(|prefix| dir_key.starts_with(prefix.as_str()))
        {
            return false;
        }
        // One level of nesting past the prefix is allowed, no more.
        !self.no_recurse.iter().any(|prefix| {
            dir_key.starts_with(prefix.as_str()) && dir_key[prefix.len()..].len() > 1
        })
    }
}

/// Timestamp and optional digest of one scanned entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileRecord {
    pub timestamp: Timestamp,
    pub hash: Option<Digest>,
    pub is_directory: bool,
}

impl FileRecord {
    fn directory() -> Self {
        Self {
            timestamp: DateTime::<Utc>::MIN_UTC,
            hash: None,
            is_directory: true,
        }
    }
}

/// Walk `root` pre-order and collect the entries `filters` accept.
///
/// Best effort: entries that vanish or cannot be read mid-scan are skipped.
pub fn scan(root: &Path, filters: &ScanFilters) -> Result<BTreeMap<String, FileRecord>> {
    if !root.is_dir() {
        anyhow::bail!("Scan root is not a directory: {}", root.display());
    }

    let mut records = BTreeMap::new();
    let mut files: Vec<(String, PathBuf, Timestamp)> = Vec::new();

    let mut it = WalkDir::new(root).min_depth(1).sort_by_file_name().into_iter();
    while let Some(entry) = it.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Skipping unreadable entry under {}: {e}", root.display());
                continue;
            }
        };
        let Some(relative) = relative_path(root, entry.path()) else {
            continue;
        };
        let file_type = entry.file_type();

        if filters.ignore.is_ignored(&relative) {
            if file_type.is_dir() {
                it.skip_current_dir();
            }
            continue;
        }

        if file_type.is_dir() {
            if filters.include_directories {
                records.insert(relative.clone(), FileRecord::directory());
            }
            if !filters.should_recurse(&format!("{relative}/")) {
                it.skip_current_dir();
            }
            continue;
        }

        if !file_type.is_file() || !filters.accepts_file(&relative) {
            continue;
        }

        let modified = entry.metadata().map_err(anyhow::Error::from).and_then(|m| {
            m.modified().context("modification time unavailable")
        });
        match modified {
            Ok(modified) => files.push((relative, entry.into_path(), modified.into())),
            Err(e) => debug!("Skipping {relative}: {e}"),
        }
    }

    let scanned: Vec<(String, FileRecord)> = files
        .into_par_iter()
        .filter_map(|(relative, path, timestamp)| {
            let hash = if filters.compute_hashes {
                match hash_file(&path) {
                    Ok(digest) => Some(digest),
                    Err(e) => {
                        debug!("Skipping {relative}, vanished while hashing: {e:#}");
                        return None;
                    }
                }
            } else {
                None
            };
            Some((
                relative,
                FileRecord {
                    timestamp,
                    hash,
                    is_directory: false,
                },
            ))
        })
        .collect();

    records.extend(scanned);
    Ok(records)
}

/// Aggregate view of a scan, used for the synthetic source nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSummary {
    /// Newest file timestamp, or the minimum timestamp when nothing matched.
    pub newest: Timestamp,
    pub newest_file: Option<String>,
    /// Every file digest combined in sorted path order.
    pub digest: Digest,
    pub file_count: usize,
}

impl SourceSummary {
    pub fn from_records(records: &BTreeMap<String, FileRecord>) -> Self {
        let mut newest = DateTime::<Utc>::MIN_UTC;
        let mut newest_file = None;
        let mut digests = Vec::new();

        for (path, record) in records.iter().filter(|(_, r)| !r.is_directory) {
            if record.timestamp > newest {
                newest = record.timestamp;
                newest_file = Some(path.clone());
            }
            if let Some(hash) = &record.hash {
                digests.push(hash);
            }
        }

        Self {
            newest,
            newest_file,
            digest: combine(digests.iter().copied()),
            file_count: records.values().filter(|r| !r.is_directory).count(),
        }
    }
}

/// Find script modules: every file named `<Module><marker>` below `root`
/// marks `<Module>` with its containing directory as source path.
pub fn find_module_source_paths(root: &Path, marker: &str) -> BTreeMap<String, PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let file_name = entry.file_name().to_string_lossy();
            let module = file_name.strip_suffix(marker)?;
            if module.is_empty() {
                return None;
            }
            let source_path = entry.path().parent()?.to_path_buf();
            Some((module.to_string(), source_path))
        })
        .collect()
}

fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    Some(normalize(relative.to_string_lossy()))
}

fn normalize<S: Into<String>>(s: S) -> String {
    s.into().replace('\\', "/")
}

fn normalize_all<I: IntoIterator<Item = S>, S: Into<String>>(v: I) -> Vec<String> {
    v.into_iter().map(normalize).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_recurse_allows_one_level() {
        let filters = ScanFilters::new().no_recurse(["Intermediate/"]);
        assert!(filters.should_recurse("Intermediate/"));
        assert!(!filters.should_recurse("Intermediate/sub/"));
        assert!(filters.should_recurse("Source/"));
    }

    #[test]
    fn test_exclude_prefix() {
        let filters = ScanFilters::new().directory_excludes(["Binaries/"]);
        assert!(!filters.should_recurse("Binaries/"));
        assert!(!filters.should_recurse("Binaries/Win64/"));
        assert!(filters.should_recurse("Source/Binaries/"));
    }

    #[test]
    fn test_filters_normalize_backslashes() {
        let filters = ScanFilters::new().directory_includes(["Public\\"]);
        assert!(filters.accepts_file("Module/Public/a.h"));
    }

    #[test]
    fn test_both_include_lists_must_match() {
        let filters = ScanFilters::new()
            .directory_includes(["Public/"])
            .file_includes([".h"]);
        assert!(filters.accepts_file("Public/a.h"));
        assert!(!filters.accepts_file("Public/a.cpp"));
        assert!(!filters.accepts_file("Private/a.h"));
    }

    #[test]
    fn test_summary_of_empty_scan() {
        let summary = SourceSummary::from_records(&BTreeMap::new());
        assert_eq!(summary.newest, DateTime::<Utc>::MIN_UTC);
        assert!(summary.newest_file.is_none());
        assert_eq!(summary.file_count, 0);
    }
}
