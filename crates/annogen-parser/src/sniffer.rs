use crate::language::create_go_parser;
use crate::module::ModuleResolver;
use annogen_core::{AnnogenError, ImportSpec, Module, Result};
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

const TEST_PACKAGE_SUFFIX: &str = "_test";

/// Recovers the identifier an import binds in a Go file.
///
/// The package clause of an actual source file is authoritative: module
/// directories and import-path tails often differ from the declared name
/// (`github.com/acme/go-widgets` declaring `package widgets`).
pub struct PackageNameSniffer {
    resolver: Arc<ModuleResolver>,
    names: DashMap<(PathBuf, String), String>,
}

impl PackageNameSniffer {
    pub fn new(resolver: Arc<ModuleResolver>) -> Self {
        Self {
            resolver,
            names: DashMap::new(),
        }
    }

    pub fn resolver(&self) -> &ModuleResolver {
        &self.resolver
    }

    /// Local name `spec` binds inside a file of `current`.
    pub fn resolve_local_name(&self, current: &Arc<Module>, spec: &ImportSpec) -> Result<String> {
        if let Some(alias) = &spec.alias {
            return Ok(alias.clone());
        }
        self.package_name(current, &spec.path)
    }

    /// Declared package name of `import_path`, ignoring any alias.
    pub fn package_name(&self, current: &Arc<Module>, import_path: &str) -> Result<String> {
        let key = (current.root.clone(), import_path.to_string());
        if let Some(name) = self.names.get(&key) {
            return Ok(name.clone());
        }

        let name = self.sniff(current, import_path)?;
        self.names.insert(key, name.clone());
        Ok(name)
    }

    fn sniff(&self, current: &Arc<Module>, import_path: &str) -> Result<String> {
        let module = match self.resolver.find(current, import_path) {
            Ok(module) => module,
            Err(e) if e.is_module_not_found() => {
                debug!("{}; falling back to path heuristic", e);
                return Ok(heuristic_name(import_path));
            }
            Err(e) => return Err(e),
        };

        // Listed in the module's canonical order; the first one decides.
        let package_files = ModuleResolver::files_in_package(&module, import_path);
        let Some(candidate) = package_files.first() else {
            warn!(
                "No Go files for {} in module {}; falling back to path heuristic",
                import_path, module.path
            );
            return Ok(heuristic_name(import_path));
        };

        let file = module.absolute(candidate);
        let name = sniff_package_clause(&file).map_err(|reason| AnnogenError::NameResolution {
            import_path: import_path.to_string(),
            file: file.display().to_string(),
            reason,
        })?;
        Ok(normalize_package_name(&name).to_string())
    }

    /// Import path whose local name in a file with `imports` equals `alias`.
    pub fn find_import_by_alias(
        &self,
        current: &Arc<Module>,
        imports: &[ImportSpec],
        alias: &str,
    ) -> Result<Option<String>> {
        for spec in imports {
            if self.resolve_local_name(current, spec)? == alias {
                return Ok(Some(spec.path.clone()));
            }
        }
        Ok(None)
    }
}

/// Fallback when no module provides a path: last element, `-` mapped to `_`.
pub fn heuristic_name(import_path: &str) -> String {
    let last = import_path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(import_path);
    last.replace('-', "_")
}

/// External test packages (`package widgets_test`) bind the tested package's name.
pub fn normalize_package_name(name: &str) -> &str {
    name.strip_suffix(TEST_PACKAGE_SUFFIX)
        .filter(|base| !base.is_empty())
        .unwrap_or(name)
}

/// Reads the package clause of `path`.
fn sniff_package_clause(path: &Path) -> std::result::Result<String, String> {
    let source = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    package_clause(&source).ok_or_else(|| "no package clause".to_string())
}

/// Package identifier declared by `source`, looking no further than the clause.
pub fn package_clause(source: &str) -> Option<String> {
    let mut parser = create_go_parser().ok()?;
    let tree = parser.parse(source, None)?;
    let root = tree.root_node();

    let mut cursor = root.walk();
    let clause = root
        .named_children(&mut cursor)
        .find(|n| n.kind() == "package_clause")?;

    let mut clause_cursor = clause.walk();
    let ident = clause
        .named_children(&mut clause_cursor)
        .find(|n| n.kind() == "package_identifier")?;
    ident
        .utf8_text(source.as_bytes())
        .ok()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heuristic_uses_last_segment() {
        assert_eq!(heuristic_name("github.com/acme/foo-bar"), "foo_bar");
        assert_eq!(heuristic_name("fmt"), "fmt");
        assert_eq!(heuristic_name("net/http/"), "http");
    }

    #[test]
    fn test_suffix_is_stripped() {
        assert_eq!(normalize_package_name("widgets_test"), "widgets");
        assert_eq!(normalize_package_name("widgets"), "widgets");
        assert_eq!(normalize_package_name("_test"), "_test");
    }

    #[test]
    fn reads_package_clause_after_comments() {
        let src = "// Package baz does things.\n//go:build linux\n\npackage baz\n\nimport \"fmt\"\n";
        assert_eq!(package_clause(src).as_deref(), Some("baz"));
        assert_eq!(package_clause("func main() {}"), None);
    }
}
