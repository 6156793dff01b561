// ABOUTME: Go declaration scanner producing annotated nodes for dispatch
// ABOUTME: Extracts package, imports, struct/interface/method declarations and marker comments

use crate::language::create_go_parser;
use crate::markers::parse_marker;
use crate::module::ModuleResolver;
use annogen_core::{
    AggregateError, Annotation, AnnogenError, Declaration, DiscoveryOrder, Field, ImportSpec,
    InterfaceDecl, MethodDecl, MethodSpec, Module, Node, NodeMeta, Param, Result, StructDecl,
};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use tree_sitter::{Node as TsNode, Parser};

/// Everything the dispatcher needs from one source file.
#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub path: PathBuf,
    pub package: String,
    pub imports: Arc<Vec<ImportSpec>>,
    pub nodes: Vec<Node>,
}

/// Scans `paths` on the rayon pool. `paths` must already be in discovery
/// order: a file's index becomes its ordinal.
pub fn scan_files(paths: &[PathBuf], resolver: &ModuleResolver) -> Result<Vec<ScannedFile>> {
    let results: Vec<Result<ScannedFile>> = paths
        .par_iter()
        .enumerate()
        .map_init(create_go_parser, |parser, (ordinal, path)| {
            let parser = parser.as_mut().map_err(|e| AnnogenError::Parse(e.to_string()))?;
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            let module = resolver.module_for_dir(dir)?;
            scan_file(parser, path, module, ordinal)
        })
        .collect();

    let mut errors = AggregateError::new();
    let scanned: Vec<ScannedFile> = results
        .into_iter()
        .filter_map(|r| errors.record(r))
        .collect();
    errors.into_result()?;

    info!(
        "Scanned {} files, {} declarations",
        scanned.len(),
        scanned.iter().map(|f| f.nodes.len()).sum::<usize>()
    );
    Ok(scanned)
}

pub fn scan_file(
    parser: &mut Parser,
    path: &Path,
    module: Arc<Module>,
    ordinal: usize,
) -> Result<ScannedFile> {
    let source = std::fs::read_to_string(path)?;
    scan_source(parser, &source, path, module, ordinal)
}

pub fn scan_source(
    parser: &mut Parser,
    source: &str,
    path: &Path,
    module: Arc<Module>,
    ordinal: usize,
) -> Result<ScannedFile> {
    let tree = parser
        .parse(source, None)
        .ok_or_else(|| AnnogenError::Parse(format!("Failed to parse {}", path.display())))?;
    let root = tree.root_node();
    if root.has_error() {
        warn!("{} contains syntax errors; scanning what parsed", path.display());
    }

    let collector = Collector { source };
    let mut package = None;
    let mut imports = Vec::new();
    let mut pending: Vec<(Declaration, usize, Vec<Annotation>)> = Vec::new();

    for (child, markers) in collector.with_markers(root) {
        match child.kind() {
            "package_clause" => {
                let mut cursor = child.walk();
                package = child
                    .named_children(&mut cursor)
                    .find(|n| n.kind() == "package_identifier")
                    .map(|n| collector.text(&n));
            }
            "import_declaration" => collector.collect_imports(child, &mut imports),
            "type_declaration" => {
                let grouped = child.child(1).map_or(false, |c| c.kind() == "(");
                for (spec, inner) in collector.with_markers(child) {
                    let attached = if grouped { inner } else { markers.clone() };
                    if let Some(decl) = collector.type_declaration(spec) {
                        pending.push((decl, spec.start_byte(), attached));
                    }
                }
            }
            "method_declaration" => {
                if let Some(decl) = collector.method_declaration(child) {
                    pending.push((Declaration::Method(decl), child.start_byte(), markers));
                }
            }
            "function_declaration" => {
                if let Some(name) = child.child_by_field_name("name") {
                    let decl = Declaration::Function {
                        name: collector.text(&name),
                    };
                    pending.push((decl, child.start_byte(), markers));
                }
            }
            _ => {}
        }
    }

    let package = package.ok_or_else(|| {
        AnnogenError::Parse(format!("{} has no package clause", path.display()))
    })?;
    let imports = Arc::new(imports);
    let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

    let nodes = pending
        .into_iter()
        .map(|(declaration, offset, annotations)| {
            let meta = NodeMeta {
                dir: dir.clone(),
                package: package.clone(),
                module: module.clone(),
                file: path.to_path_buf(),
                imports: imports.clone(),
                order: DiscoveryOrder::new(ordinal, offset),
            };
            Node::new(declaration, meta, annotations)
        })
        .collect::<Vec<_>>();

    debug!(
        "{}: package {}, {} imports, {} declarations",
        path.display(),
        package,
        imports.len(),
        nodes.len()
    );

    Ok(ScannedFile {
        path: path.to_path_buf(),
        package,
        imports,
        nodes,
    })
}

struct Collector<'a> {
    source: &'a str,
}

impl<'a> Collector<'a> {
    fn text(&self, node: &TsNode) -> String {
        node.utf8_text(self.source.as_bytes())
            .unwrap_or("")
            .to_string()
    }

    /// Named children of `parent` paired with the markers of the comment block
    /// ending on the line right above each of them. Trailing comments on the
    /// previous element's last line never attach.
    fn with_markers<'t>(&self, parent: TsNode<'t>) -> Vec<(TsNode<'t>, Vec<Annotation>)> {
        let mut out = Vec::new();
        let mut block: Vec<TsNode<'t>> = Vec::new();
        let mut prev_end_row = None;

        let mut cursor = parent.walk();
        for child in parent.named_children(&mut cursor) {
            let row = child.start_position().row;
            if child.kind() == "comment" {
                if prev_end_row == Some(row) {
                    continue;
                }
                if let Some(last) = block.last() {
                    if row > last.end_position().row + 1 {
                        block.clear();
                    }
                }
                block.push(child);
                continue;
            }

            let markers = match block.last() {
                Some(last) if last.end_position().row + 1 == row => block
                    .iter()
                    .filter_map(|c| parse_marker(&self.text(c)))
                    .collect(),
                _ => Vec::new(),
            };
            block.clear();
            prev_end_row = Some(child.end_position().row);
            out.push((child, markers));
        }
        out
    }

    fn collect_imports(&self, decl: TsNode, imports: &mut Vec<ImportSpec>) {
        let mut cursor = decl.walk();
        for child in decl.named_children(&mut cursor) {
            match child.kind() {
                "import_spec" => imports.extend(self.import_spec(child)),
                "import_spec_list" => self.collect_imports(child, imports),
                _ => {}
            }
        }
    }

    fn import_spec(&self, spec: TsNode) -> Option<ImportSpec> {
        let path = spec.child_by_field_name("path")?;
        let path = self.text(&path);
        let path = path.trim_matches(|c| c == '"' || c == '`').to_string();
        if path.is_empty() {
            return None;
        }
        let alias = spec.child_by_field_name("name").map(|n| self.text(&n));
        Some(ImportSpec { alias, path })
    }

    fn type_declaration(&self, spec: TsNode) -> Option<Declaration> {
        let name = self.text(&spec.child_by_field_name("name")?);
        let ty = spec.child_by_field_name("type")?;
        let type_params = spec
            .child_by_field_name("type_parameters")
            .map(|n| self.text(&n));

        if spec.kind() == "type_alias" {
            return Some(Declaration::Type {
                name,
                type_expr: self.text(&ty),
            });
        }

        let decl = match ty.kind() {
            "struct_type" => Declaration::Struct(StructDecl {
                name,
                type_params,
                fields: self.struct_fields(ty),
            }),
            "interface_type" => Declaration::Interface(InterfaceDecl {
                name,
                type_params,
                methods: self.interface_methods(ty),
            }),
            _ => Declaration::Type {
                name,
                type_expr: self.text(&ty),
            },
        };
        Some(decl)
    }

    fn struct_fields(&self, struct_type: TsNode) -> Vec<Field> {
        let mut cursor = struct_type.walk();
        let Some(list) = struct_type
            .named_children(&mut cursor)
            .find(|n| n.kind() == "field_declaration_list")
        else {
            return Vec::new();
        };

        let mut fields = Vec::new();
        for (decl, markers) in self.with_markers(list) {
            if decl.kind() != "field_declaration" {
                continue;
            }
            let Some(ty) = decl.child_by_field_name("type") else {
                continue;
            };
            let tag = decl.child_by_field_name("tag").map(|n| self.text(&n));

            let mut cursor = decl.walk();
            let names: Vec<String> = decl
                .children_by_field_name("name", &mut cursor)
                .map(|n| self.text(&n))
                .collect();

            if names.is_empty() {
                let mut cursor = decl.walk();
                let pointer = decl.children(&mut cursor).any(|c| c.kind() == "*");
                let type_expr = format!("{}{}", if pointer { "*" } else { "" }, self.text(&ty));
                fields.push(Field {
                    name: None,
                    type_expr,
                    tag,
                    annotations: markers,
                });
                continue;
            }

            let type_expr = self.text(&ty);
            for name in names {
                fields.push(Field {
                    name: Some(name),
                    type_expr: type_expr.clone(),
                    tag: tag.clone(),
                    annotations: markers.clone(),
                });
            }
        }
        fields
    }

    fn interface_methods(&self, interface_type: TsNode) -> Vec<MethodSpec> {
        self.with_markers(interface_type)
            .into_iter()
            .filter(|(elem, _)| matches!(elem.kind(), "method_elem" | "method_spec"))
            .filter_map(|(elem, annotations)| {
                let name = self.text(&elem.child_by_field_name("name")?);
                Some(MethodSpec {
                    name,
                    params: self.params(elem.child_by_field_name("parameters")),
                    results: self.results(elem.child_by_field_name("result")),
                    annotations,
                })
            })
            .collect()
    }

    fn method_declaration(&self, decl: TsNode) -> Option<MethodDecl> {
        let name = self.text(&decl.child_by_field_name("name")?);
        let receiver_list = decl.child_by_field_name("receiver")?;
        let receiver = self.params(Some(receiver_list)).into_iter().next()?;

        let pointer_receiver = receiver.type_expr.starts_with('*');
        let base = receiver.type_expr.trim_start_matches('*').trim();
        let base = base.split('[').next().unwrap_or(base).trim().to_string();

        Some(MethodDecl {
            receiver: base,
            pointer_receiver,
            name,
            params: self.params(decl.child_by_field_name("parameters")),
            results: self.results(decl.child_by_field_name("result")),
        })
    }

    fn params(&self, list: Option<TsNode>) -> Vec<Param> {
        let Some(list) = list else {
            return Vec::new();
        };
        let mut params = Vec::new();
        let mut cursor = list.walk();
        for decl in list.named_children(&mut cursor) {
            let variadic = match decl.kind() {
                "parameter_declaration" => false,
                "variadic_parameter_declaration" => true,
                _ => continue,
            };
            let Some(ty) = decl.child_by_field_name("type") else {
                continue;
            };
            let type_expr = if variadic {
                format!("...{}", self.text(&ty))
            } else {
                self.text(&ty)
            };

            let mut name_cursor = decl.walk();
            let names: Vec<String> = decl
                .children_by_field_name("name", &mut name_cursor)
                .map(|n| self.text(&n))
                .collect();
            if names.is_empty() {
                params.push(Param {
                    name: None,
                    type_expr,
                });
            } else {
                params.extend(names.into_iter().map(|name| Param {
                    name: Some(name),
                    type_expr: type_expr.clone(),
                }));
            }
        }
        params
    }

    fn results(&self, result: Option<TsNode>) -> Vec<Param> {
        match result {
            None => Vec::new(),
            Some(node) if node.kind() == "parameter_list" => self.params(Some(node)),
            Some(node) => vec![Param {
                name: None,
                type_expr: self.text(&node),
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(src: &str) -> ScannedFile {
        let mut parser = create_go_parser().unwrap();
        let module = Arc::new(Module::new("/m", "example.com/m", vec![]));
        scan_source(&mut parser, src, Path::new("/m/shop/widget.go"), module, 3).unwrap()
    }

    const SOURCE: &str = r#"package shop

import (
	"time"
	m "example.com/m/models"
	_ "embed"
)

import "fmt"

// Widget is a thing.
// @Constructor(name="MakeWidget")
// @Optional
type Widget struct {
	// @Exclude
	id      int
	Name, Label string `json:"name"`
	*m.Base
	Created time.Time // @Init(value="time.Now()")
}

// @Mapper
type Converter interface {
	// @Mapping(target="Name", source="FullName")
	ToDTO(src *m.User) (*UserDTO, error)
	Reset()
}

type (
	// @Builder
	Gadget struct{ size int }

	Plain struct{}
)

// @PostConstruct
func (w *Widget) init() error { return nil }

// unrelated comment

type Loose struct{}

func helper(args ...string) {}
"#;

    #[test]
    fn collects_package_and_imports() {
        let file = scan(SOURCE);
        assert_eq!(file.package, "shop");
        assert_eq!(
            *file.imports,
            vec![
                ImportSpec::new("time"),
                ImportSpec::aliased("m", "example.com/m/models"),
                ImportSpec::aliased("_", "embed"),
                ImportSpec::new("fmt"),
            ]
        );
    }

    #[test]
    fn attaches_markers_to_the_following_declaration() {
        let file = scan(SOURCE);
        let by_name = |name: &str| file.nodes.iter().find(|n| n.name() == name).unwrap();

        let widget = by_name("Widget");
        let kinds: Vec<_> = widget.annotations.iter().map(|a| a.kind.as_str()).collect();
        assert_eq!(kinds, vec!["Constructor", "Optional"]);
        assert_eq!(widget.annotations[0].param("name"), Some("MakeWidget"));
        assert_eq!(widget.meta.dir, PathBuf::from("/m/shop"));
        assert_eq!(widget.meta.order.file, 3);

        assert_eq!(by_name("Converter").annotations[0].kind, "Mapper");
        assert_eq!(by_name("Gadget").annotations[0].kind, "Builder");
        assert!(by_name("Plain").annotations.is_empty());
        assert!(by_name("Loose").annotations.is_empty());
        assert_eq!(by_name("init").annotations[0].kind, "PostConstruct");
    }

    #[test]
    fn extracts_struct_fields() {
        let file = scan(SOURCE);
        let widget = file.nodes.iter().find(|n| n.name() == "Widget").unwrap();
        let Declaration::Struct(decl) = &widget.declaration else {
            panic!("Widget should be a struct");
        };

        let names: Vec<_> = decl.fields.iter().map(|f| f.effective_name()).collect();
        assert_eq!(names, vec!["id", "Name", "Label", "Base", "Created"]);
        assert!(decl.fields[0].has_annotation("Exclude"));
        assert_eq!(decl.fields[2].tag.as_deref(), Some("`json:\"name\"`"));
        assert_eq!(decl.fields[3].type_expr, "*m.Base");
        assert_eq!(decl.fields[4].type_expr, "time.Time");
        // Trailing comments do not attach.
        assert!(decl.fields[4].annotations.is_empty());
    }

    #[test]
    fn extracts_interface_methods_and_receivers() {
        let file = scan(SOURCE);
        let converter = file.nodes.iter().find(|n| n.name() == "Converter").unwrap();
        let Declaration::Interface(decl) = &converter.declaration else {
            panic!("Converter should be an interface");
        };
        assert_eq!(decl.methods.len(), 2);
        let to_dto = &decl.methods[0];
        assert_eq!(to_dto.params, vec![Param::new(Some("src"), "*m.User")]);
        assert_eq!(
            to_dto.results,
            vec![Param::new(None, "*UserDTO"), Param::new(None, "error")]
        );
        assert_eq!(to_dto.annotations[0].param("source"), Some("FullName"));

        let init = file.nodes.iter().find(|n| n.name() == "init").unwrap();
        let Declaration::Method(method) = &init.declaration else {
            panic!("init should be a method");
        };
        assert_eq!(method.receiver, "Widget");
        assert!(method.pointer_receiver);
        assert!(method.returns_only_error());

        let helper = file.nodes.iter().find(|n| n.name() == "helper").unwrap();
        assert!(matches!(helper.declaration, Declaration::Function { .. }));
    }

    #[test]
    fn missing_package_clause_is_an_error() {
        let mut parser = create_go_parser().unwrap();
        let module = Arc::new(Module::new("/m", "example.com/m", vec![]));
        let result = scan_source(&mut parser, "type X struct{}", Path::new("/m/x.go"), module, 0);
        assert!(matches!(result, Err(AnnogenError::Parse(_))));
    }
}
