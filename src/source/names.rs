use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const SCRIPT_PREFIX: &str = "/Script/";

const INVALID_CHARS: &[char] = &['\\', ':', '*', '?', '"', '<', '>', '|', '.'];

/// A content directory mounted under a long-name prefix, e.g. `/Game`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRoot {
    pub mount: String,
    pub path: PathBuf,
}

impl ContentRoot {
    pub fn new(mount: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let mount = mount.into();
        Self {
            mount: format!("/{}", mount.trim_matches('/')),
            path: path.into(),
        }
    }

    /// Long package name for a file below this root (relative, `/` separated).
    pub fn long_package_name(&self, relative_file: &str) -> String {
        let without_ext = match relative_file.rfind('.') {
            Some(dot) if !relative_file[dot..].contains('/') => &relative_file[..dot],
            _ => relative_file,
        };
        format!("{}/{}", self.mount, without_ext)
    }

    /// Path relative to the root for a long name under this mount.
    pub fn relative_name<'a>(&self, long_name: &'a str) -> Option<&'a str> {
        long_name
            .strip_prefix(self.mount.as_str())?
            .strip_prefix('/')
            .filter(|rest| !rest.is_empty())
    }

    /// On-disk package file for `long_name`, trying each extension in turn.
    pub fn locate(&self, long_name: &str, extensions: &[String]) -> Option<PathBuf> {
        let relative = self.relative_name(long_name)?;
        extensions
            .iter()
            .map(|ext| self.path.join(format!("{relative}{ext}")))
            .find(|candidate| candidate.is_file())
    }
}

/// Shape check for long package names: `/Mount/Path/Name`.
pub fn is_valid_long_package_name(name: &str) -> bool {
    let Some(rest) = name.strip_prefix('/') else {
        return false;
    };
    let segments: Vec<&str> = rest.split('/').collect();
    segments.len() >= 2
        && segments.iter().all(|s| !s.is_empty())
        && !name.chars().any(|c| c.is_whitespace() || INVALID_CHARS.contains(&c))
}

pub fn is_script_package(name: &str) -> bool {
    name.starts_with(SCRIPT_PREFIX)
}

pub fn script_package_name(module: &str) -> String {
    format!("{SCRIPT_PREFIX}{module}")
}
