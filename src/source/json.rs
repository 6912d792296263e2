use crate::hasher::hash_file;
use crate::source::{
    classify_export_class, Classification, ContentRoot, PackageInfo, PackageSource, SourceError,
};
use anyhow::Context;
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;

/// Package descriptor stored in each content file.
///
/// ```json
/// { "imports": ["/Game/Textures/Rock"], "exports": [{ "class": "Material" }] }
/// ```
#[derive(Debug, Default, Deserialize)]
struct PackageDescriptor {
    #[serde(default)]
    imports: Vec<String>,
    #[serde(default)]
    exports: Vec<ExportEntry>,
    #[serde(default)]
    contains_map: bool,
}

#[derive(Debug, Deserialize)]
struct ExportEntry {
    class: String,
}

/// Reads packages written as JSON descriptors below mounted content roots.
#[derive(Debug, Clone)]
pub struct JsonPackageSource {
    roots: Vec<ContentRoot>,
    extensions: Vec<String>,
}

impl JsonPackageSource {
    pub fn new(roots: Vec<ContentRoot>, extensions: Vec<String>) -> Self {
        Self { roots, extensions }
    }
}

impl PackageSource for JsonPackageSource {
    fn open_and_classify(&self, name: &str) -> Result<PackageInfo, SourceError> {
        let path = self
            .roots
            .iter()
            .find_map(|root| root.locate(name, &self.extensions))
            .ok_or_else(|| SourceError::NotFound {
                name: name.to_string(),
            })?;

        let full_hash = hash_file(&path)?;

        let file = File::open(&path)
            .with_context(|| format!("Cannot open package: {}", path.display()))?;
        let descriptor: PackageDescriptor = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| SourceError::Malformed {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        let mut classification = Classification {
            contains_map: descriptor.contains_map,
            ..Default::default()
        };
        for export in &descriptor.exports {
            classify_export_class(&export.class, &mut classification);
        }

        let mut dependencies: Vec<String> = Vec::with_capacity(descriptor.imports.len());
        for import in descriptor.imports {
            if import != name && !dependencies.contains(&import) {
                dependencies.push(import);
            }
        }

        Ok(PackageInfo {
            full_hash,
            classification,
            dependencies,
        })
    }
}
