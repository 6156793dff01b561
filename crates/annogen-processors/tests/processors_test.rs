use annogen_core::{AggregateError, AnnogenError, Environment, OutputConfig, Result, ScanConfig};
use annogen_parser::{collect_go_files, scan_files, ModuleResolver, PackageNameSniffer};
use annogen_processors::builtin_registry;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

fn write_file<P: AsRef<Path>>(p: P, content: &str) {
    fs::create_dir_all(p.as_ref().parent().unwrap()).unwrap();
    fs::write(p, content).unwrap();
}

/// Scans a throwaway `example.com/app` module and runs every node through
/// the built-in processors, optionally in reverse discovery order.
fn run(files: &[(&str, &str)], reverse: bool) -> (TempDir, Result<BTreeMap<PathBuf, Vec<u8>>>) {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write_file(root.join("go.mod"), "module example.com/app\n\ngo 1.22\n");
    for (path, content) in files {
        write_file(root.join(path), content);
    }

    let env = Environment::from_parts(root, None, None);
    let resolver = Arc::new(ModuleResolver::new(Arc::new(env)));
    let sniffer = Arc::new(PackageNameSniffer::new(resolver.clone()));
    let registry = builtin_registry(sniffer, &OutputConfig::default());

    let paths = collect_go_files(root, &ScanConfig::default()).unwrap();
    let scanned = scan_files(&paths, &resolver).unwrap();
    let mut nodes: Vec<_> = scanned.into_iter().flat_map(|f| f.nodes).collect();
    if reverse {
        nodes.reverse();
    }

    let mut errors = AggregateError::new();
    for node in &nodes {
        errors.record(registry.dispatch(node));
    }
    let result = errors.into_result().and_then(|_| registry.output());
    (dir, result)
}

fn text(out: &BTreeMap<PathBuf, Vec<u8>>, path: PathBuf) -> String {
    String::from_utf8(out.get(&path).cloned().expect("artifact present")).unwrap()
}

const WIDGET: &str = r#"package shop

// @Constructor
// @Optional
type Widget struct {
	Name  string
	count int
}
"#;

#[test]
fn constructor_and_optional_share_one_artifact_without_imports() {
    let (dir, out) = run(&[("shop/widget.go", WIDGET)], false);
    let out = out.unwrap();
    assert_eq!(out.len(), 1);

    let text = text(&out, dir.path().join("shop/constructor.gen.go"));
    assert!(text.starts_with("// Code generated by annogen. DO NOT EDIT.\n\npackage shop\n\n"));
    assert!(!text.contains("import"));

    let constructor = "func NewWidget(name string, count int) *Widget {\n\
                       \treturnValue := &Widget{\n\
                       \t\tName: name,\n\
                       \t\tcount: count,\n\
                       \t}\n\
                       \treturn returnValue\n\
                       }\n";
    assert!(text.contains(constructor), "{}", text);
    assert!(text.contains("type WidgetOption func(*Widget)\n"));
    assert!(text.contains("func WidgetWithCount(count int) WidgetOption {\n"));
    assert!(text.contains("func NewWidgetWithOptions(opts ...WidgetOption) *Widget {\n"));
    assert!(text.find("func NewWidget(").unwrap() < text.find("type WidgetOption").unwrap());
}

#[test]
fn post_construct_hooks_are_spliced_regardless_of_dispatch_order() {
    let files = [
        (
            "shop/a_hooks.go",
            "package shop\n\n// @PostConstruct\nfunc (w *Widget) validate() error { return nil }\n\n// @PostConstruct\nfunc (w *Widget) warm() {}\n",
        ),
        (
            "shop/b_widget.go",
            "package shop\n\n// @Builder\ntype Widget struct {\n\tName string\n}\n",
        ),
    ];

    let (dir, forward) = run(&files, false);
    let (_dir2, backward) = run(&files, true);
    let path = dir.path().join("shop/constructor.gen.go");
    let forward = text(&forward.unwrap(), path.clone());
    let backward_out = backward.unwrap();
    let backward = String::from_utf8(backward_out.values().next().unwrap().clone()).unwrap();
    assert_eq!(forward, backward);

    let build = "func (b *WidgetBuilder) Build() (*Widget, error) {\n\
                 \treturnValue := b.target\n\
                 \tif err := returnValue.validate(); err != nil {\n\
                 \t\treturn nil, err\n\
                 \t}\n\
                 \treturnValue.warm()\n\
                 \treturn returnValue, nil\n\
                 }\n";
    assert!(forward.contains(build), "{}", forward);
    assert!(forward.contains("func (b *WidgetBuilder) Name(name string) *WidgetBuilder {\n"));
}

#[test]
fn foreign_types_are_imported_under_their_sniffed_names() {
    let files = [
        ("models/user.go", "package model\n\ntype User struct{}\n"),
        (
            "shop/order.go",
            r#"package shop

import (
	"time"

	m "example.com/app/models"
)

// @Constructor(name="MakeOrder")
type Order struct {
	// @Exclude
	id      int
	Buyer   *m.User
	// @Init(value="time.Now()")
	Created time.Time
}
"#,
        ),
    ];
    let (dir, out) = run(&files, false);
    let text = text(&out.unwrap(), dir.path().join("shop/constructor.gen.go"));

    assert!(text.contains("import (\n\t\"time\"\n\tmodel \"example.com/app/models\"\n)\n"), "{}", text);
    assert!(text.contains("func MakeOrder(buyer *model.User) *Order {\n"));
    assert!(text.contains("\t\tCreated: time.Now(),\n"));
    assert!(!text.contains("id:"));
    assert!(!text.contains("_imp_"));
}

#[test]
fn mapper_implements_the_interface() {
    let files = [(
        "conv/conv.go",
        r#"package conv

type User struct{ FullName string }
type UserDTO struct{ Name string }

// @Mapper
type Converter interface {
	// @Mapping(target="Name", source="FullName")
	ToDTO(u *User) (*UserDTO, error)
}
"#,
    )];
    let (dir, out) = run(&files, false);
    let text = text(&out.unwrap(), dir.path().join("conv/mappers.gen.go"));

    assert!(text.contains("type ConverterImpl struct{}\n"));
    assert!(text.contains("var _ Converter = (*ConverterImpl)(nil)\n"));
    let method = "func (m *ConverterImpl) ToDTO(u *User) (*UserDTO, error) {\n\
                  \tif u == nil {\n\
                  \t\treturn nil, nil\n\
                  \t}\n\
                  \tdst := &UserDTO{}\n\
                  \tdst.Name = u.FullName\n\
                  \treturn dst, nil\n\
                  }\n";
    assert!(text.contains(method), "{}", text);
}

#[test]
fn mapper_locals_do_not_shadow_imported_packages() {
    let files = [
        ("m/types.go", "package m\n\ntype User struct{ Name string }\ntype UserDTO struct{ Name string }\n"),
        (
            "conv/conv.go",
            r#"package conv

import "example.com/app/m"

// @Mapper
type Converter interface {
	// @Mapping(target="Name")
	ToDTO(src *m.User) *m.UserDTO
}
"#,
        ),
    ];
    let (dir, out) = run(&files, false);
    let text = text(&out.unwrap(), dir.path().join("conv/mappers.gen.go"));

    assert!(text.contains("import (\n\t_imp_1 \"example.com/app/m\"\n)\n"), "{}", text);
    assert!(text.contains("func (m *ConverterImpl) ToDTO(src *_imp_1.User) *_imp_1.UserDTO {\n"));
    assert!(text.contains("\tdst := &_imp_1.UserDTO{}\n"));
    assert!(!text.contains("m.UserDTO"));
}

#[test]
fn duplicate_singular_markers_report_the_count() {
    let files = [(
        "shop/w.go",
        "package shop\n\n// @Constructor\n// @Constructor(name=\"Other\")\ntype Widget struct{}\n",
    )];
    let (_dir, out) = run(&files, false);
    match out.unwrap_err() {
        AnnogenError::Cardinality { kind, count } => {
            assert_eq!(kind, "Constructor");
            assert_eq!(count, 2);
        }
        other => panic!("expected cardinality error, got {other}"),
    }
}

#[test]
fn misplaced_markers_are_aggregated() {
    let files = [(
        "shop/w.go",
        "package shop\n\n// @Mapper\ntype Widget struct{}\n\n// @Constructor\ntype Greeter interface{ Hello() }\n",
    )];
    let (_dir, out) = run(&files, false);
    let leaves = out.unwrap_err().into_leaves();
    assert_eq!(leaves.len(), 2);
    assert!(leaves
        .iter()
        .all(|e| matches!(e, AnnogenError::ShapeMismatch { .. })));
}

#[test]
fn unannotated_code_produces_nothing() {
    let files = [("shop/w.go", "package shop\n\n// Widget is plain.\ntype Widget struct{}\n")];
    let (_dir, out) = run(&files, false);
    assert!(out.unwrap().is_empty());
}
