#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use pkgdeps::hasher::Digest;
use pkgdeps::source::{Classification, PackageInfo, PackageSource, SourceError};
use pkgdeps::Timestamp;
use std::collections::HashMap;
use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Route tracing output through the test writer when RUST_LOG is set.
pub fn init_test_logging() {
    INIT.call_once(|| {
        if std::env::var("RUST_LOG").is_err() {
            return;
        }
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn day(n: u32) -> Timestamp {
    Utc.with_ymd_and_hms(2024, 1, n, 0, 0, 0).unwrap()
}

/// In-memory package source that counts how often each package is opened.
#[derive(Default)]
pub struct MockPackageSource {
    packages: HashMap<String, PackageInfo>,
    opens: Mutex<HashMap<String, usize>>,
}

impl MockPackageSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn package(self, name: &str, dependencies: &[&str]) -> Self {
        self.package_with(name, dependencies, Classification::default(), name)
    }

    pub fn package_with(
        mut self,
        name: &str,
        dependencies: &[&str],
        classification: Classification,
        content: &str,
    ) -> Self {
        self.packages.insert(
            name.to_string(),
            PackageInfo {
                full_hash: Digest::of(content.as_bytes()),
                classification,
                dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
            },
        );
        self
    }

    pub fn opens(&self, name: &str) -> usize {
        self.opens.lock().get(name).copied().unwrap_or(0)
    }

    pub fn total_opens(&self) -> usize {
        self.opens.lock().values().sum()
    }
}

impl PackageSource for MockPackageSource {
    fn open_and_classify(&self, name: &str) -> Result<PackageInfo, SourceError> {
        *self.opens.lock().entry(name.to_string()).or_default() += 1;
        self.packages
            .get(name)
            .cloned()
            .ok_or_else(|| SourceError::NotFound {
                name: name.to_string(),
            })
    }
}
