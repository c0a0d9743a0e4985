//! Crate and module resolution for source files

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
struct Manifest {
    package: Option<Package>,
    lib: Option<LibTarget>,
}

#[derive(Debug, Deserialize)]
struct Package {
    name: String,
}

#[derive(Debug, Deserialize)]
struct LibTarget {
    name: Option<String>,
}

/// The package a directory belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CrateInfo {
    /// Directory holding the package's `Cargo.toml`
    pub dir: PathBuf,
    /// Package name as a crate identifier
    pub package: String,
    /// Library crate name (`[lib] name`, or the package name)
    pub lib: String,
}

/// Caches parsed manifests by directory
#[derive(Debug, Default)]
pub(crate) struct CrateResolver {
    cache: HashMap<PathBuf, Option<CrateInfo>>,
}

impl CrateResolver {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Nearest package at or above `dir`, not looking past `root`
    ///
    /// `Ok(None)` when no manifest on the way up has a `[package]` table.
    ///
    /// # Errors
    ///
    /// A manifest on the way up cannot be read or is not valid TOML.
    pub(crate) fn resolve(&mut self, dir: &Path, root: &Path) -> Result<Option<CrateInfo>> {
        for candidate in dir.ancestors() {
            if !candidate.starts_with(root) {
                break;
            }
            if let Some(info) = self.load(candidate)? {
                return Ok(Some(info));
            }
        }
        Ok(None)
    }

    fn load(&mut self, dir: &Path) -> Result<Option<CrateInfo>> {
        if let Some(cached) = self.cache.get(dir) {
            return Ok(cached.clone());
        }

        let path = dir.join("Cargo.toml");
        let info = if path.is_file() {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| Error::scan(&path, format!("failed to read manifest: {}", e)))?;
            let manifest: Manifest = toml::from_str(&content)
                .map_err(|e| Error::scan(&path, format!("invalid manifest: {}", e)))?;

            // Virtual manifests fall through to the next ancestor
            manifest.package.map(|package| {
                let name = crate_ident(&package.name);
                CrateInfo {
                    dir: dir.to_path_buf(),
                    lib: manifest
                        .lib
                        .and_then(|lib| lib.name)
                        .map(|n| crate_ident(&n))
                        .unwrap_or_else(|| name.clone()),
                    package: name,
                }
            })
        } else {
            None
        };

        self.cache.insert(dir.to_path_buf(), info.clone());
        Ok(info)
    }
}

fn crate_ident(name: &str) -> String {
    name.replace('-', "_")
}

/// Module path of a source file, or `None` when it is not a crate or module root
/// we know how to place
///
/// - `src/lib.rs` → `lib`
/// - `src/main.rs` → `package`
/// - `src/a/mod.rs`, `src/a.rs` → `lib::a`
/// - `src/bin/x.rs`, `src/bin/x/main.rs` → `x`
/// - `tests/x.rs`, `benches/x.rs`, `examples/x.rs` → `x`
pub(crate) fn module_path(krate: &CrateInfo, file: &Path) -> Option<Vec<String>> {
    let rel = file.strip_prefix(&krate.dir).ok()?;
    let parts: Vec<&str> = rel
        .components()
        .map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect::<Option<_>>()?;

    let (last, dirs) = parts.split_last()?;
    let stem = last.strip_suffix(".rs")?;

    match dirs {
        [] => None,
        ["src"] if stem == "lib" => Some(vec![krate.lib.clone()]),
        ["src"] if stem == "main" => Some(vec![krate.package.clone()]),
        ["src", "bin"] => Some(vec![crate_ident(stem)]),
        ["src", "bin", bin] if stem == "main" => Some(vec![crate_ident(bin)]),
        ["src", "bin", ..] => None,
        ["src", modules @ ..] => {
            let mut path = vec![krate.lib.clone()];
            path.extend(modules.iter().map(|m| m.to_string()));
            if stem != "mod" {
                path.push(stem.to_string());
            }
            Some(path)
        }
        ["tests" | "benches" | "examples"] => Some(vec![crate_ident(stem)]),
        _ => None,
    }
}
