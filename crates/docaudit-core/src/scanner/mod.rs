//! Startup scanner for audit-eligible models
//!
//! Walks a project's source tree once, finds every named-field struct that
//! embeds the audit marker type, and registers its type identity in a
//! [`ModelRegistry`]. [`Scanner::scan_and_seal`] then seals the registry,
//! which releases hook dispatch.
//!
//! ## What counts as eligible
//!
//! A struct is registered when one of its fields has type:
//!
//! - the marker itself (`AuditMarker`)
//! - the marker qualified by one of the configured namespaces
//!   (`docaudit::AuditMarker`, `crate::model::AuditMarker`)
//! - either of the above behind exactly one pointer
//!   (`&AuditMarker`, `Box<AuditMarker>`, `Arc<docaudit::AuditMarker>`)
//!
//! Tuple structs, unit structs and structs declared inside function bodies
//! are never registered.
//!
//! ## Failure handling
//!
//! A directory that cannot be read or parsed is recorded in
//! [`ScanReport::errors`] and skipped; the rest of the tree is still
//! scanned. Only an unusable root aborts the scan.

mod manifest;
mod parser;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::config::ScanConfig;
use crate::error::{Error, Result};
use crate::registry::ModelRegistry;
use manifest::{CrateInfo, CrateResolver, module_path};
use parser::{MarkerMatcher, parse_source};

/// Outcome of one scan
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Resolved project root
    pub root: PathBuf,

    /// Directories containing `.rs` files that were examined
    pub directories_scanned: usize,

    /// Identities registered by this scan, sorted
    pub registered: Vec<String>,

    /// Per-directory failures; each directory listed here was skipped
    pub errors: Vec<Error>,
}

impl ScanReport {
    /// Whether every directory was scanned successfully
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Source tree scanner
#[derive(Debug, Clone)]
pub struct Scanner {
    config: ScanConfig,
}

impl Scanner {
    pub fn new(config: ScanConfig) -> Self {
        Self { config }
    }

    /// Scanner configuration
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Resolve the project root
    ///
    /// The configured root when set, otherwise the nearest directory at or
    /// above the working directory that contains a `Cargo.toml`.
    pub fn resolve_root(&self) -> Result<PathBuf> {
        if let Some(root) = &self.config.root {
            if !root.is_dir() {
                return Err(Error::scan(root, "scan root is not a directory"));
            }
            return Ok(root.clone());
        }

        let cwd = std::env::current_dir()?;
        cwd.ancestors()
            .find(|dir| dir.join("Cargo.toml").is_file())
            .map(Path::to_path_buf)
            .ok_or_else(|| Error::scan(&cwd, "no Cargo.toml found in any parent directory"))
    }

    /// Scan the tree and register every eligible model
    ///
    /// Does not seal the registry.
    ///
    /// # Errors
    ///
    /// Fails when the root cannot be resolved or read, when any manifest in
    /// the tree is unreadable or invalid, or when the registry is already
    /// sealed. Per-directory failures are collected in the report.
    pub fn scan(&self, registry: &ModelRegistry) -> Result<ScanReport> {
        self.config.validate()?;
        if registry.is_ready() {
            return Err(Error::RegistrySealed("models from a startup scan".to_string()));
        }

        let root = self.resolve_root()?;
        info!(root = %root.display(), "Scanning for audit-eligible models");

        let mut report = ScanReport {
            root: root.clone(),
            ..ScanReport::default()
        };

        let mut dirs = BTreeMap::new();
        collect_source_dirs(&root, &root, &self.config.exclude_prefixes, &mut dirs, &mut report.errors)
            .map_err(|e| Error::scan(&root, format!("failed to read scan root: {}", e)))?;

        // Every manifest is resolved before anything is registered, so an
        // invalid one leaves the registry untouched
        let mut resolver = CrateResolver::new();
        resolver.resolve(&root, &root)?;
        let mut crates = Vec::with_capacity(dirs.len());
        for dir in dirs.keys() {
            crates.push(resolver.resolve(dir, &root)?);
        }

        for ((dir, files), krate) in dirs.iter().zip(crates) {
            report.directories_scanned += 1;
            let result = match krate {
                Some(krate) => self.scan_dir(&krate, files),
                None => Err(Error::scan(
                    dir,
                    "no Cargo.toml with a [package] section above this directory",
                )),
            };
            match result {
                Ok(identities) => {
                    for identity in identities {
                        registry.register(&identity)?;
                        debug!(model = %identity, "Found audit-eligible model");
                        report.registered.push(identity);
                    }
                }
                Err(e) => {
                    warn!(directory = %dir.display(), error = %e, "Skipping directory");
                    report.errors.push(e);
                }
            }
        }

        report.registered.sort();
        report.registered.dedup();

        info!(
            directories = report.directories_scanned,
            models = report.registered.len(),
            errors = report.errors.len(),
            "Scan complete"
        );
        Ok(report)
    }

    /// Scan, then seal the registry whatever the outcome
    ///
    /// A failed scan is logged and returned as a report holding only that
    /// error, so startup can continue with explicitly registered models.
    pub fn scan_and_seal(&self, registry: &ModelRegistry) -> ScanReport {
        let report = match self.scan(registry) {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "Model scan failed");
                ScanReport {
                    root: self.config.root.clone().unwrap_or_default(),
                    errors: vec![e],
                    ..ScanReport::default()
                }
            }
        };
        registry.seal();
        report
    }

    /// Identities declared by the files of one directory
    ///
    /// All-or-nothing: a failure in any file skips the whole directory.
    fn scan_dir(&self, krate: &CrateInfo, files: &[PathBuf]) -> Result<Vec<String>> {
        let mut found = Vec::new();

        for file in files {
            let Some(module) = module_path(krate, file) else {
                debug!(file = %file.display(), "Not a module file, skipping");
                continue;
            };

            let source = std::fs::read_to_string(file)
                .map_err(|e| Error::scan(file, format!("failed to read: {}", e)))?;
            let decls = parse_source(&source).map_err(|message| Error::scan(file, message))?;

            let matcher = MarkerMatcher {
                marker: self.config.marker_type.trim(),
                namespaces: &self.config.marker_namespaces,
                crate_name: &module[0],
            };

            for decl in decls {
                if decl.field_types.iter().any(|ty| matcher.matches(ty)) {
                    let mut path = module.clone();
                    path.extend(decl.module);
                    path.push(decl.name);
                    found.push(path.join("::"));
                }
            }
        }

        Ok(found)
    }
}

/// Collect every non-excluded directory holding `.rs` files, with its files sorted
///
/// Unreadable subdirectories are recorded in `errors`; only a failure to read
/// `dir` itself is returned.
fn collect_source_dirs(
    root: &Path,
    dir: &Path,
    exclude: &[String],
    out: &mut BTreeMap<PathBuf, Vec<PathBuf>>,
    errors: &mut Vec<Error>,
) -> std::io::Result<()> {
    let mut files = Vec::new();
    let mut subdirs = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            if !is_excluded(root, &path, exclude) {
                subdirs.push(path);
            }
        } else if file_type.is_file() && path.extension().is_some_and(|ext| ext == "rs") {
            files.push(path);
        }
    }

    if !files.is_empty() {
        files.sort();
        out.insert(dir.to_path_buf(), files);
    }

    subdirs.sort();
    for sub in subdirs {
        if let Err(e) = collect_source_dirs(root, &sub, exclude, out, errors) {
            warn!(directory = %sub.display(), error = %e, "Cannot read directory");
            errors.push(Error::scan(&sub, format!("failed to read directory: {}", e)));
        }
    }
    Ok(())
}

/// Whether `path` falls under one of the root-relative `exclude` prefixes
fn is_excluded(root: &Path, path: &Path, exclude: &[String]) -> bool {
    let Ok(rel) = path.strip_prefix(root) else {
        return false;
    };
    exclude
        .iter()
        .any(|prefix| rel.starts_with(prefix.trim().trim_matches('/')))
}
