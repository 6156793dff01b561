use annogen_core::{AnnogenError, Environment, ImportSpec, ScanConfig};
use annogen_parser::{collect_go_files, scan_files, ModuleResolver, PackageNameSniffer};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

fn write_file<P: AsRef<Path>>(p: P, content: &str) {
    fs::create_dir_all(p.as_ref().parent().unwrap()).unwrap();
    fs::write(p, content).unwrap();
}

const APP_GO_MOD: &str = r#"module example.com/app

go 1.22

require (
	github.com/acme/foo-bar v1.0.0
	github.com/Acme/Widgets v0.2.0
	example.com/local v0.0.0
)

replace example.com/local => ../local
"#;

/// Lays out a project, a fake module cache, a local replacement and a fake GOROOT.
fn fixture() -> (TempDir, Arc<PackageNameSniffer>) {
    let dir = tempdir().unwrap();
    let root = dir.path();

    write_file(root.join("app/go.mod"), APP_GO_MOD);
    write_file(
        root.join("app/main.go"),
        "package main\n\nimport (\n\t\"github.com/acme/foo-bar\"\n\tw \"github.com/Acme/Widgets\"\n)\n",
    );
    write_file(root.join("app/internal/store/store.go"), "package storage\n");
    write_file(root.join("app/vendor/github.com/v/vend/v.go"), "package vendy\n");

    let cache = root.join("modcache");
    write_file(
        cache.join("github.com/acme/foo-bar@v1.0.0/go.mod"),
        "module github.com/acme/foo-bar\n",
    );
    write_file(
        cache.join("github.com/acme/foo-bar@v1.0.0/baz.go"),
        "// Package baz is not named after its directory.\npackage baz\n",
    );
    write_file(
        cache.join("github.com/!acme/!widgets@v0.2.0/go.mod"),
        "module github.com/Acme/Widgets\n",
    );
    write_file(
        cache.join("github.com/!acme/!widgets@v0.2.0/a_test.go"),
        "package widgets_test\n",
    );

    write_file(root.join("local/go.mod"), "module example.com/local\n");
    write_file(root.join("local/util/util.go"), "package helpers\n");

    let goroot = root.join("goroot");
    write_file(goroot.join("src/net/http/server.go"), "package http\n");

    let env = Environment::from_parts(root.join("app"), Some(cache), Some(goroot));
    let resolver = Arc::new(ModuleResolver::new(Arc::new(env)));
    (dir, Arc::new(PackageNameSniffer::new(resolver)))
}

#[test]
fn sniffed_name_beats_directory_name() {
    let (dir, sniffer) = fixture();
    let current = sniffer
        .resolver()
        .module_for_dir(&dir.path().join("app"))
        .unwrap();
    assert_eq!(current.path, "example.com/app");

    let name = sniffer
        .package_name(&current, "github.com/acme/foo-bar")
        .unwrap();
    assert_eq!(name, "baz");
}

#[test]
fn test_package_suffix_is_normalized() {
    let (dir, sniffer) = fixture();
    let current = sniffer
        .resolver()
        .module_for_dir(&dir.path().join("app"))
        .unwrap();
    assert_eq!(
        sniffer
            .package_name(&current, "github.com/Acme/Widgets")
            .unwrap(),
        "widgets"
    );
}

#[test]
fn resolves_own_subpackages_replacements_vendor_and_stdlib() {
    let (dir, sniffer) = fixture();
    let current = sniffer
        .resolver()
        .module_for_dir(&dir.path().join("app/internal/store"))
        .unwrap();

    assert_eq!(
        sniffer
            .package_name(&current, "example.com/app/internal/store")
            .unwrap(),
        "storage"
    );
    assert_eq!(
        sniffer
            .package_name(&current, "example.com/local/util")
            .unwrap(),
        "helpers"
    );
    assert_eq!(
        sniffer
            .package_name(&current, "github.com/v/vend")
            .unwrap(),
        "vendy"
    );
    assert_eq!(sniffer.package_name(&current, "net/http").unwrap(), "http");
}

#[test]
fn missing_module_falls_back_to_heuristic() {
    let (dir, sniffer) = fixture();
    let current = sniffer
        .resolver()
        .module_for_dir(&dir.path().join("app"))
        .unwrap();

    let err = sniffer
        .resolver()
        .find(&current, "github.com/missing/go-thing")
        .unwrap_err();
    assert!(matches!(err, AnnogenError::ModuleNotFound(_)));

    assert_eq!(
        sniffer
            .package_name(&current, "github.com/missing/go-thing")
            .unwrap(),
        "go_thing"
    );
}

#[test]
fn explicit_alias_is_returned_verbatim() {
    let (dir, sniffer) = fixture();
    let current = sniffer
        .resolver()
        .module_for_dir(&dir.path().join("app"))
        .unwrap();

    let spec = ImportSpec::aliased("fb", "github.com/acme/foo-bar");
    assert_eq!(sniffer.resolve_local_name(&current, &spec).unwrap(), "fb");

    let imports = vec![
        ImportSpec::new("github.com/acme/foo-bar"),
        ImportSpec::aliased("w", "github.com/Acme/Widgets"),
    ];
    assert_eq!(
        sniffer
            .find_import_by_alias(&current, &imports, "baz")
            .unwrap()
            .as_deref(),
        Some("github.com/acme/foo-bar")
    );
    assert_eq!(
        sniffer
            .find_import_by_alias(&current, &imports, "w")
            .unwrap()
            .as_deref(),
        Some("github.com/Acme/Widgets")
    );
    assert!(sniffer
        .find_import_by_alias(&current, &imports, "foo_bar")
        .unwrap()
        .is_none());
}

#[test]
fn sniff_reads_a_file_of_the_package_itself() {
    let (dir, sniffer) = fixture();
    write_file(dir.path().join("app/models/main.go"), "package models\n");
    let current = sniffer
        .resolver()
        .module_for_dir(&dir.path().join("app"))
        .unwrap();

    assert_eq!(
        sniffer
            .package_name(&current, "example.com/app/models")
            .unwrap(),
        "models"
    );
    assert_eq!(sniffer.package_name(&current, "example.com/app").unwrap(), "main");
}

#[test]
fn nested_modules_own_their_packages() {
    let (dir, sniffer) = fixture();
    write_file(
        dir.path().join("app/tools/go.mod"),
        "module example.com/app/tools\n",
    );
    write_file(dir.path().join("app/tools/gen/gen.go"), "package generator\n");
    let current = sniffer
        .resolver()
        .module_for_dir(&dir.path().join("app"))
        .unwrap();
    assert!(!current.files().iter().any(|f| f.starts_with("tools/")));

    let module = sniffer
        .resolver()
        .find(&current, "example.com/app/tools/gen")
        .unwrap();
    assert_eq!(module.path, "example.com/app/tools");
    assert_eq!(
        sniffer
            .package_name(&current, "example.com/app/tools/gen")
            .unwrap(),
        "generator"
    );
}

#[test]
fn unparsable_sniff_target_is_a_name_resolution_error() {
    let (dir, sniffer) = fixture();
    write_file(dir.path().join("app/broken/b.go"), "// no clause here\n");
    let current = sniffer
        .resolver()
        .module_for_dir(&dir.path().join("app"))
        .unwrap();

    let err = sniffer
        .package_name(&current, "example.com/app/broken")
        .unwrap_err();
    assert!(matches!(err, AnnogenError::NameResolution { .. }));
}

#[test]
fn scanning_assigns_lexical_ordinals() {
    let (dir, sniffer) = fixture();
    let app = dir.path().join("app");
    let files = collect_go_files(&app, &ScanConfig::default()).unwrap();
    let scanned = scan_files(&files, sniffer.resolver()).unwrap();

    let packages: Vec<_> = scanned.iter().map(|f| f.package.as_str()).collect();
    assert_eq!(packages, vec!["storage", "main"]);
    assert_eq!(scanned[1].imports.len(), 2);
    assert!(scanned
        .iter()
        .all(|f| f.nodes.iter().all(|n| n.meta.module.path == "example.com/app")));
}
