//! The boundary between the tracker and whatever knows how to open packages.

pub mod json;
pub mod names;

use crate::hasher::Digest;

pub use json::JsonPackageSource;
pub use names::{is_script_package, is_valid_long_package_name, ContentRoot};

/// What a package contains, as far as the synthetic source nodes care.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct Classification {
    pub contains_map: bool,
    pub contains_shaders: bool,
    pub contains_script: bool,
}

/// Result of opening one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInfo {
    /// Digest of the package's raw bytes.
    pub full_hash: Digest,
    pub classification: Classification,
    /// Names the package imports, unfiltered.
    pub dependencies: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("no package file for {name}")]
    NotFound { name: String },
    #[error("malformed package {name}: {reason}")]
    Malformed { name: String, reason: String },
    #[error(transparent)]
    Io(#[from] anyhow::Error),
}

/// Opens packages and reports their digest, classification and imports.
pub trait PackageSource: Send + Sync {
    fn open_and_classify(&self, name: &str) -> Result<PackageInfo, SourceError>;
}

/// Filters import names and maps them onto registry keys.
pub trait NameResolver: Send + Sync {
    fn is_valid_dependency_name(&self, name: &str) -> bool;

    fn canonical_key(&self, name: &str) -> String {
        name.to_string()
    }
}

/// Accepts long package names such as `/Game/Maps/Arena` and `/Script/Engine`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LongPackageNames;

impl NameResolver for LongPackageNames {
    fn is_valid_dependency_name(&self, name: &str) -> bool {
        is_valid_long_package_name(name)
    }
}

/// Export class names that pull a package into the shader or script source sets.
pub fn classify_export_class(class: &str, classification: &mut Classification) {
    match class {
        "Material"
        | "MaterialInstanceConstant"
        | "MaterialInstanceDynamic"
        | "LandscapeMaterialInstanceConstant" => classification.contains_shaders = true,
        "World" => classification.contains_map = true,
        "Blueprint" | "AnimBlueprint" => classification.contains_script = true,
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_classification() {
        let mut c = Classification::default();
        classify_export_class("StaticMesh", &mut c);
        assert_eq!(c, Classification::default());

        classify_export_class("MaterialInstanceConstant", &mut c);
        classify_export_class("World", &mut c);
        assert!(c.contains_shaders);
        assert!(c.contains_map);
        assert!(!c.contains_script);

        classify_export_class("AnimBlueprint", &mut c);
        assert!(c.contains_script);
    }

    #[test]
    fn test_long_package_names_resolver() {
        let names = LongPackageNames;
        assert!(names.is_valid_dependency_name("/Game/Props/Crate"));
        assert!(!names.is_valid_dependency_name("None"));
        assert_eq!(names.canonical_key("/Game/Props/Crate"), "/Game/Props/Crate");
    }
}
