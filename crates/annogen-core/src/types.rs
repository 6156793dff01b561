use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A structured marker value (`@Kind(key="value")`) attached to a declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub kind: String,
    pub params: BTreeMap<String, String>,
}

impl Annotation {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn is(&self, kind: &str) -> bool {
        self.kind == kind
    }
}

/// All annotations of `kind` in declaration order.
pub fn find_annotations<'a>(annotations: &'a [Annotation], kind: &str) -> Vec<&'a Annotation> {
    annotations.iter().filter(|a| a.is(kind)).collect()
}

/// One import line of a scanned source file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImportSpec {
    /// Explicit local name, including `_` and `.`.
    pub alias: Option<String>,
    pub path: String,
}

impl ImportSpec {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            alias: None,
            path: path.into(),
        }
    }

    pub fn aliased(alias: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            alias: Some(alias.into()),
            path: path.into(),
        }
    }
}

/// One import line of a generated artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Import {
    pub alias: Option<String>,
    pub path: String,
}

impl Import {
    pub fn new(alias: Option<String>, path: impl Into<String>) -> Self {
        Self {
            alias,
            path: path.into(),
        }
    }
}

impl fmt::Display for Import {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.alias {
            Some(alias) => write!(f, "{} \"{}\"", alias, self.path),
            None => write!(f, "\"{}\"", self.path),
        }
    }
}

/// A Go module: root directory, declared import-path prefix and its source files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub root: PathBuf,
    pub path: String,
    /// Module-relative, `/`-separated `.go` paths in lexical order.
    pub files: Vec<String>,
}

impl Module {
    pub fn new(root: impl Into<PathBuf>, path: impl Into<String>, mut files: Vec<String>) -> Self {
        files.sort();
        files.dedup();
        Self {
            root: root.into(),
            path: path.into(),
            files,
        }
    }

    /// Whether `import_path` names this module's root package or one of its subpackages.
    pub fn owns(&self, import_path: &str) -> bool {
        self.package_dir(import_path).is_some()
    }

    /// Module-relative directory of the package `import_path`, `""` for the root package.
    pub fn package_dir<'a>(&self, import_path: &'a str) -> Option<&'a str> {
        if import_path == self.path {
            return Some("");
        }
        import_path
            .strip_prefix(self.path.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn absolute(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }
}

/// Position of a declaration in the deterministic discovery order of a run:
/// lexical file ordinal first, byte offset within the file second.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DiscoveryOrder {
    pub file: usize,
    pub offset: usize,
}

impl DiscoveryOrder {
    pub fn new(file: usize, offset: usize) -> Self {
        Self { file, offset }
    }
}

/// Output unit: every declaration of one package in one directory merges
/// into a single generated artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitKey {
    pub dir: PathBuf,
    pub package: String,
}

impl UnitKey {
    pub fn new(dir: impl Into<PathBuf>, package: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            package: package.into(),
        }
    }
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.dir.display(), self.package)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: Option<String>,
    pub type_expr: String,
}

impl Param {
    pub fn new(name: Option<&str>, type_expr: impl Into<String>) -> Self {
        Self {
            name: name.map(str::to_string),
            type_expr: type_expr.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// `None` for embedded fields.
    pub name: Option<String>,
    pub type_expr: String,
    pub tag: Option<String>,
    pub annotations: Vec<Annotation>,
}

impl Field {
    pub fn new(name: Option<&str>, type_expr: impl Into<String>) -> Self {
        Self {
            name: name.map(str::to_string),
            type_expr: type_expr.into(),
            tag: None,
            annotations: Vec::new(),
        }
    }

    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// Declared name, or the type name for embedded fields (`*pkg.Base` -> `Base`).
    pub fn effective_name(&self) -> &str {
        match &self.name {
            Some(name) => name,
            None => {
                let base = self.type_expr.trim_start_matches('*');
                let base = base.split('[').next().unwrap_or(base);
                base.rsplit('.').next().unwrap_or(base)
            }
        }
    }

    pub fn annotation(&self, kind: &str) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.is(kind))
    }

    pub fn has_annotation(&self, kind: &str) -> bool {
        self.annotation(kind).is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructDecl {
    pub name: String,
    pub type_params: Option<String>,
    pub fields: Vec<Field>,
}

/// Method element of an interface type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSpec {
    pub name: String,
    pub params: Vec<Param>,
    pub results: Vec<Param>,
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceDecl {
    pub name: String,
    pub type_params: Option<String>,
    pub methods: Vec<MethodSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDecl {
    /// Receiver type name without pointer or type arguments.
    pub receiver: String,
    pub pointer_receiver: bool,
    pub name: String,
    pub params: Vec<Param>,
    pub results: Vec<Param>,
}

impl MethodDecl {
    pub fn returns_only_error(&self) -> bool {
        self.results.len() == 1 && self.results[0].type_expr == "error"
    }
}

/// Parsed declaration a node stands for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Declaration {
    Struct(StructDecl),
    Interface(InterfaceDecl),
    Method(MethodDecl),
    Function { name: String },
    /// Any other type spec (`type ID string`, aliases, ...).
    Type { name: String, type_expr: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeclarationShape {
    Struct,
    Interface,
    Method,
    Function,
    Type,
}

impl fmt::Display for DeclarationShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeclarationShape::Struct => "struct type",
            DeclarationShape::Interface => "interface type",
            DeclarationShape::Method => "method",
            DeclarationShape::Function => "function",
            DeclarationShape::Type => "type",
        };
        write!(f, "{}", s)
    }
}

impl Declaration {
    pub fn name(&self) -> &str {
        match self {
            Declaration::Struct(s) => &s.name,
            Declaration::Interface(i) => &i.name,
            Declaration::Method(m) => &m.name,
            Declaration::Function { name } => name,
            Declaration::Type { name, .. } => name,
        }
    }

    pub fn shape(&self) -> DeclarationShape {
        match self {
            Declaration::Struct(_) => DeclarationShape::Struct,
            Declaration::Interface(_) => DeclarationShape::Interface,
            Declaration::Method(_) => DeclarationShape::Method,
            Declaration::Function { .. } => DeclarationShape::Function,
            Declaration::Type { .. } => DeclarationShape::Type,
        }
    }
}

/// Where a declaration lives: directory, package, module, file and the
/// imports visible from that file.
#[derive(Debug, Clone)]
pub struct NodeMeta {
    pub dir: PathBuf,
    pub package: String,
    pub module: Arc<Module>,
    pub file: PathBuf,
    pub imports: Arc<Vec<ImportSpec>>,
    pub order: DiscoveryOrder,
}

impl NodeMeta {
    pub fn unit_key(&self) -> UnitKey {
        UnitKey::new(self.dir.clone(), self.package.clone())
    }

    pub fn file(&self) -> &Path {
        &self.file
    }
}

/// A parsed declaration with positional metadata and its attached annotations.
#[derive(Debug, Clone)]
pub struct Node {
    pub declaration: Declaration,
    pub meta: NodeMeta,
    pub annotations: Vec<Annotation>,
}

impl Node {
    pub fn new(declaration: Declaration, meta: NodeMeta, annotations: Vec<Annotation>) -> Self {
        Self {
            declaration,
            meta,
            annotations,
        }
    }

    pub fn annotations_of(&self, kind: &str) -> Vec<&Annotation> {
        find_annotations(&self.annotations, kind)
    }

    pub fn name(&self) -> &str {
        self.declaration.name()
    }

    pub fn unit_key(&self) -> UnitKey {
        self.meta.unit_key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_dir_respects_segment_boundaries() {
        let module = Module::new("/src/shop", "example.com/shop", vec![]);
        assert_eq!(module.package_dir("example.com/shop"), Some(""));
        assert_eq!(module.package_dir("example.com/shop/orders"), Some("orders"));
        assert_eq!(module.package_dir("example.com/shopping"), None);
        assert!(!module.owns("example.com/other"));
    }

    #[test]
    fn embedded_field_name_uses_type_tail() {
        assert_eq!(Field::new(None, "*base.Entity").effective_name(), "Entity");
        assert_eq!(Field::new(None, "List[int]").effective_name(), "List");
        assert_eq!(Field::new(Some("id"), "int").effective_name(), "id");
    }

    #[test]
    fn discovery_order_sorts_by_file_then_offset() {
        let mut orders = vec![
            DiscoveryOrder::new(1, 10),
            DiscoveryOrder::new(0, 400),
            DiscoveryOrder::new(1, 2),
        ];
        orders.sort();
        assert_eq!(
            orders,
            vec![
                DiscoveryOrder::new(0, 400),
                DiscoveryOrder::new(1, 2),
                DiscoveryOrder::new(1, 10)
            ]
        );
    }
}
