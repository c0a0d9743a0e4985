//! Architectural Contract Test: Startup Model Discovery
//!
//! This test verifies that the scanner finds exactly the models that embed
//! the audit marker, and that it degrades gracefully on bad input.
//!
//! Constraints verified:
//! - Marker fields are recognized directly, qualified and behind one pointer
//! - Type identities match `type_identity` for the same declaration
//! - Excluded prefixes are never read
//! - A broken directory is reported and skipped, never fatal
//! - The registry is always sealed by `scan_and_seal`
//!
//! If this test fails, eligible models are silently not audited.

use docaudit_core::{Error, ModelRegistry, ScanConfig, Scanner};
use std::path::Path;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

/// A small application crate with a mix of eligible and ineligible types
fn fixture() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();

    write(
        root,
        "Cargo.toml",
        r#"
[package]
name = "shop-app"
version = "0.1.0"
edition = "2024"
"#,
    );
    write(
        root,
        "src/lib.rs",
        r#"
//! Shop application
pub mod models;
pub mod billing;

use docaudit::AuditMarker;

/// Not audited: no marker
pub struct Settings {
    pub theme: String,
}

mod inline {
    pub struct Draft<'a> {
        marker: &'a docaudit::AuditMarker,
        body: &'a str,
    }
}
"#,
    );
    write(
        root,
        "src/models/mod.rs",
        r#"
pub mod order;

use docaudit_core::AuditMarker;
use std::sync::Arc;

#[derive(Debug, serde::Serialize)]
pub struct Customer {
    #[serde(skip)]
    audit: AuditMarker,
    pub name: String,
}

pub struct Shared {
    audit: Arc<AuditMarker>,
}

// struct Commented { audit: AuditMarker }
pub struct Tuple(AuditMarker);
pub struct Unit;
pub struct Nested {
    audit: Option<AuditMarker>,
}
pub struct Foreign {
    audit: other_crate::AuditMarker,
}
"#,
    );
    write(
        root,
        "src/models/order.rs",
        r#"
pub struct Order<T: Clone> where T: Default {
    pub _audit: crate::AuditMarker,
    pub lines: Vec<T>,
}

impl<T: Clone + Default> Order<T> {
    pub fn new() -> Self {
        struct Scratch { audit: AuditMarker }
        todo!()
    }
}
"#,
    );
    write(
        root,
        "src/billing.rs",
        r#"
pub struct Invoice {
    pub audit: Box<docaudit_core::model::AuditMarker>,
    pub amount: u64,
}
"#,
    );
    write(
        root,
        "src/bin/tool.rs",
        "struct Hidden { audit: AuditMarker }\nfn main() {}\n",
    );
    write(
        root,
        "target/debug/build/generated.rs",
        "struct Generated { audit: AuditMarker }\n",
    );
    write(
        root,
        "tests/api.rs",
        "struct Fixture { audit: docaudit::AuditMarker }\n",
    );

    temp
}

#[test]
fn scanner_finds_marked_models_only() {
    let temp = fixture();
    let registry = ModelRegistry::new();

    let report = Scanner::new(ScanConfig::with_root(temp.path())).scan_and_seal(&registry);

    assert!(report.is_clean(), "unexpected errors: {:?}", report.errors);
    assert_eq!(
        report.registered,
        vec![
            "api::Fixture",
            "shop_app::billing::Invoice",
            "shop_app::inline::Draft",
            "shop_app::models::Customer",
            "shop_app::models::Shared",
        ]
    );
    assert!(registry.is_ready());
    assert_eq!(registry.list(), report.registered);

    for negative in [
        "shop_app::Settings",
        "shop_app::models::Tuple",
        "shop_app::models::Unit",
        "shop_app::models::Nested",
        "shop_app::models::Foreign",
        "shop_app::models::Commented",
        "tool::Hidden",
        "shop_app::models::order::Scratch",
    ] {
        assert!(!registry.contains(negative), "{} must not be registered", negative);
    }
}

#[test]
fn crate_qualified_marker_resolves_against_own_crate() {
    let temp = fixture();
    let config = ScanConfig {
        marker_namespaces: vec!["shop_app".to_string()],
        ..ScanConfig::with_root(temp.path())
    };
    let registry = ModelRegistry::new();

    let report = Scanner::new(config).scan(&registry).unwrap();

    assert!(report.registered.contains(&"shop_app::models::order::Order".to_string()));
    assert!(!report.registered.contains(&"shop_app::billing::Invoice".to_string()));
    assert!(!registry.is_ready(), "scan alone does not seal");
}

#[test]
fn excluded_prefixes_are_not_scanned() {
    let temp = fixture();
    let config = ScanConfig {
        exclude_prefixes: vec!["src/models".to_string(), "tests".to_string()],
        ..ScanConfig::with_root(temp.path())
    };
    let registry = ModelRegistry::new();

    let report = Scanner::new(config).scan(&registry).unwrap();

    // src/bin and target are no longer excluded
    assert!(registry.contains("tool::Hidden"));
    assert!(!registry.contains("shop_app::models::Customer"));
    assert!(!registry.contains("api::Fixture"));
    assert!(report.registered.iter().all(|m| !m.starts_with("shop_app::models")));
}

#[test]
fn broken_directory_is_reported_and_skipped() {
    let temp = fixture();
    write(
        temp.path(),
        "src/broken/mod.rs",
        "pub struct Half { audit: AuditMarker,\n",
    );
    let registry = ModelRegistry::new();

    let report = Scanner::new(ScanConfig::with_root(temp.path())).scan_and_seal(&registry);

    assert_eq!(report.errors.len(), 1);
    match &report.errors[0] {
        Error::Scan { path, .. } => assert!(path.ends_with("src/broken/mod.rs")),
        other => panic!("expected a scan error, got {:?}", other),
    }
    // Everything else is still found
    assert!(registry.contains("shop_app::models::Customer"));
    assert!(registry.contains("api::Fixture"));
}

#[test]
fn unresolvable_root_seals_empty_registry() {
    let temp = TempDir::new().unwrap();
    let registry = ModelRegistry::new();

    let report = Scanner::new(ScanConfig::with_root(temp.path().join("missing")))
        .scan_and_seal(&registry);

    assert_eq!(report.errors.len(), 1);
    assert!(report.registered.is_empty());
    assert!(registry.is_ready());
    assert!(registry.is_empty());
}

#[test]
fn custom_marker_name() {
    let temp = TempDir::new().unwrap();
    write(
        temp.path(),
        "Cargo.toml",
        "[package]\nname = \"ledger\"\nversion = \"0.1.0\"\n",
    );
    write(
        temp.path(),
        "src/lib.rs",
        "pub struct Entry { t: Tracked }\npub struct Other { a: AuditMarker }\n",
    );
    let config = ScanConfig {
        marker_type: "Tracked".to_string(),
        ..ScanConfig::with_root(temp.path())
    };
    let registry = ModelRegistry::new();

    let report = Scanner::new(config).scan(&registry).unwrap();

    assert_eq!(report.registered, vec!["ledger::Entry"]);
}
