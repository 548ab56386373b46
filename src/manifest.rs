/// Package manifest patcher
///
/// Adds optional packages to a project's `Packages/manifest.json`: the
/// OpenUPM scoped registry with the scopes the packages need, and one
/// `dependencies` entry per package. The file is backed up to
/// `manifest.json.bak` before it is touched. Key order is preserved.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::ManifestError;

pub const OPENUPM_NAME: &str = "OpenUPM";
pub const OPENUPM_URL: &str = "https://package.openupm.com";

const SCOPED_REGISTRIES: &str = "scopedRegistries";
const DEPENDENCIES: &str = "dependencies";

/// Where a package is downloaded from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageSource {
    OpenUpm,
}

/// A package the installer knows how to add
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionalPackage {
    pub display_name: &'static str,
    pub package_name: &'static str,
    pub version: &'static str,
    pub source: PackageSource,
    pub scopes: &'static [&'static str],
}

impl OptionalPackage {
    pub const fn open_upm(
        display_name: &'static str,
        package_name: &'static str,
        version: &'static str,
        scopes: &'static [&'static str],
    ) -> Self {
        Self {
            display_name,
            package_name,
            version,
            source: PackageSource::OpenUpm,
            scopes,
        }
    }
}

/// Built-in package catalog
pub const CATALOG: &[OptionalPackage] = &[OptionalPackage::open_upm(
    "UniTask (Cysharp)",
    "com.cysharp.unitask",
    "2.5.10",
    &["com.cysharp"],
)];

/// Look up catalog entries by package name
pub fn find_packages(names: &[String]) -> Result<Vec<&'static OptionalPackage>, ManifestError> {
    names
        .iter()
        .map(|name| {
            CATALOG
                .iter()
                .find(|p| p.package_name == name.as_str())
                .ok_or_else(|| ManifestError::UnknownPackage(name.clone()))
        })
        .collect()
}

/// What an install changed
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub backup: PathBuf,
    pub registry_added: bool,
    pub scopes_added: Vec<String>,
    pub dependencies_added: Vec<String>,
    pub already_present: Vec<String>,
}

impl InstallReport {
    pub fn changed(&self) -> bool {
        self.registry_added || !self.scopes_added.is_empty() || !self.dependencies_added.is_empty()
    }
}

/// Edits the manifest of one project
pub struct ManifestPatcher {
    manifest_path: PathBuf,
}

impl ManifestPatcher {
    /// Patcher for `<project>/Packages/manifest.json`
    pub fn for_project(project_dir: &Path) -> Self {
        Self::new(project_dir.join("Packages").join("manifest.json"))
    }

    pub fn new(manifest_path: impl Into<PathBuf>) -> Self {
        Self {
            manifest_path: manifest_path.into(),
        }
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    pub fn backup_path(&self) -> PathBuf {
        let mut name = self.manifest_path.as_os_str().to_owned();
        name.push(".bak");
        PathBuf::from(name)
    }

    /// Install `packages` into the manifest.
    ///
    /// The backup is written before parsing, so it exists even when the
    /// manifest turns out to be malformed.
    pub fn install(&self, packages: &[&OptionalPackage]) -> Result<InstallReport, ManifestError> {
        let path = &self.manifest_path;
        if !path.is_file() {
            return Err(ManifestError::NotFound(path.display().to_string()));
        }

        let io_err = |path: &Path| {
            let path = path.display().to_string();
            move |source| ManifestError::Io { path, source }
        };

        let backup = self.backup_path();
        fs::copy(path, &backup).map_err(io_err(&backup))?;
        tracing::info!("Backed up {} to {}", path.display(), backup.display());

        let content = fs::read_to_string(path).map_err(io_err(path))?;
        let mut document: Value = serde_json::from_str(&content).map_err(ManifestError::Parse)?;
        let root = document
            .as_object_mut()
            .ok_or_else(|| ManifestError::Structure("root is not an object".to_string()))?;

        let mut report = InstallReport {
            backup,
            ..Default::default()
        };
        apply_packages(root, packages, &mut report)?;

        if report.changed() {
            let mut json = serde_json::to_string_pretty(&document).map_err(ManifestError::Parse)?;
            json.push('\n');
            fs::write(path, json).map_err(io_err(path))?;
            tracing::info!(
                "Updated {}: {} dependencies added",
                path.display(),
                report.dependencies_added.len()
            );
        } else {
            tracing::info!("{} already up to date", path.display());
        }
        Ok(report)
    }
}

fn apply_packages(
    root: &mut Map<String, Value>,
    packages: &[&OptionalPackage],
    report: &mut InstallReport,
) -> Result<(), ManifestError> {
    match root.get(DEPENDENCIES) {
        Some(Value::Object(_)) => {}
        Some(_) => {
            return Err(ManifestError::Structure(
                "\"dependencies\" is not an object".to_string(),
            ))
        }
        None => {
            return Err(ManifestError::Structure(
                "missing \"dependencies\"".to_string(),
            ))
        }
    }

    let open_upm: Vec<_> = packages
        .iter()
        .filter(|p| p.source == PackageSource::OpenUpm)
        .collect();
    if !open_upm.is_empty() {
        ensure_scoped_registries(root);
        let scopes = open_upm.iter().flat_map(|p| p.scopes.iter().copied());
        ensure_open_upm_registry(root, scopes, report)?;
    }

    let Some(Value::Object(dependencies)) = root.get_mut(DEPENDENCIES) else {
        return Err(ManifestError::Structure("missing \"dependencies\"".to_string()));
    };
    for package in packages {
        let name = package.package_name.to_string();
        if dependencies.contains_key(&name) {
            tracing::debug!("{} already listed, leaving its version alone", name);
            report.already_present.push(name);
            continue;
        }
        dependencies.insert(name.clone(), Value::String(package.version.to_string()));
        report.dependencies_added.push(name);
    }
    Ok(())
}

/// Add an empty `scopedRegistries` right before `dependencies` if missing
fn ensure_scoped_registries(root: &mut Map<String, Value>) {
    if root.contains_key(SCOPED_REGISTRIES) {
        return;
    }

    let entries = std::mem::take(root);
    for (key, value) in entries {
        if key == DEPENDENCIES {
            root.insert(SCOPED_REGISTRIES.to_string(), Value::Array(Vec::new()));
        }
        root.insert(key, value);
    }
}

fn ensure_open_upm_registry<'a>(
    root: &mut Map<String, Value>,
    scopes: impl Iterator<Item = &'a str>,
    report: &mut InstallReport,
) -> Result<(), ManifestError> {
    let Some(Value::Array(registries)) = root.get_mut(SCOPED_REGISTRIES) else {
        return Err(ManifestError::Structure(
            "\"scopedRegistries\" is not an array".to_string(),
        ));
    };

    let existing = registries
        .iter()
        .position(|r| r.get("url").and_then(Value::as_str) == Some(OPENUPM_URL));
    let index = match existing {
        Some(index) => index,
        None => {
            let mut entry = Map::new();
            entry.insert("name".to_string(), Value::String(OPENUPM_NAME.to_string()));
            entry.insert("url".to_string(), Value::String(OPENUPM_URL.to_string()));
            entry.insert("scopes".to_string(), Value::Array(Vec::new()));
            registries.push(Value::Object(entry));
            report.registry_added = true;
            registries.len() - 1
        }
    };

    let Some(Value::Object(registry)) = registries.get_mut(index) else {
        return Err(ManifestError::Structure(
            "OpenUPM registry entry is not an object".to_string(),
        ));
    };
    let registry_scopes = registry
        .entry("scopes")
        .or_insert_with(|| Value::Array(Vec::new()));
    let Value::Array(registry_scopes) = registry_scopes else {
        return Err(ManifestError::Structure(
            "OpenUPM \"scopes\" is not an array".to_string(),
        ));
    };

    for scope in scopes {
        if registry_scopes.iter().any(|s| s.as_str() == Some(scope)) {
            continue;
        }
        registry_scopes.push(Value::String(scope.to_string()));
        report.scopes_added.push(scope.to_string());
    }
    Ok(())
}
