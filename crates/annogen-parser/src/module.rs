// ABOUTME: Locates the Go module that supplies an import path and lists its package files.
// ABOUTME: Checks the current module, go.mod requirements/replacements, vendor/ and GOROOT in order.
use crate::language::is_go_source;
use annogen_core::{find_manifest, AnnogenError, Environment, Module, Result};
use dashmap::DashMap;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// One `require` line of a `go.mod`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub path: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplaceTarget {
    /// `=> ../local/dir`
    Local(PathBuf),
    /// `=> example.com/fork v1.2.3`
    Module { path: String, version: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub path: String,
    pub version: Option<String>,
    pub target: ReplaceTarget,
}

/// The parts of a `go.mod` the resolver needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub module_path: String,
    pub requires: Vec<Requirement>,
    pub replaces: Vec<Replacement>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Block {
    None,
    Require,
    Replace,
    Other,
}

impl Manifest {
    pub fn parse(content: &str) -> Result<Self> {
        let mut manifest = Manifest::default();
        let mut block = Block::None;

        for (lineno, raw) in content.lines().enumerate() {
            let line = strip_comment(raw).trim();
            if line.is_empty() {
                continue;
            }

            if block != Block::None {
                if line == ")" {
                    block = Block::None;
                    continue;
                }
                match block {
                    Block::Require => manifest.push_require(line, lineno)?,
                    Block::Replace => manifest.push_replace(line, lineno)?,
                    _ => {}
                }
                continue;
            }

            let (directive, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
            let rest = rest.trim();
            match (directive, rest) {
                ("module", path) => manifest.module_path = unquote(path).to_string(),
                ("require", "(") => block = Block::Require,
                ("replace", "(") => block = Block::Replace,
                ("require", spec) => manifest.push_require(spec, lineno)?,
                ("replace", spec) => manifest.push_replace(spec, lineno)?,
                (_, "(") => block = Block::Other,
                _ => {}
            }
        }

        if manifest.module_path.is_empty() {
            return Err(AnnogenError::Parse(
                "go.mod has no module directive".to_string(),
            ));
        }
        Ok(manifest)
    }

    fn push_require(&mut self, spec: &str, lineno: usize) -> Result<()> {
        let mut parts = spec.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some(path), Some(version)) => {
                self.requires.push(Requirement {
                    path: unquote(path).to_string(),
                    version: version.to_string(),
                });
                Ok(())
            }
            _ => Err(AnnogenError::Parse(format!(
                "go.mod line {}: malformed require {:?}",
                lineno + 1,
                spec
            ))),
        }
    }

    fn push_replace(&mut self, spec: &str, lineno: usize) -> Result<()> {
        let malformed = || {
            AnnogenError::Parse(format!(
                "go.mod line {}: malformed replace {:?}",
                lineno + 1,
                spec
            ))
        };
        let (old, new) = spec.split_once("=>").ok_or_else(malformed)?;

        let mut old_parts = old.split_whitespace();
        let path = unquote(old_parts.next().ok_or_else(malformed)?).to_string();
        let version = old_parts.next().map(str::to_string);

        let mut new_parts = new.split_whitespace();
        let target_path = unquote(new_parts.next().ok_or_else(malformed)?);
        let target = match new_parts.next() {
            Some(v) => ReplaceTarget::Module {
                path: target_path.to_string(),
                version: v.to_string(),
            },
            None => ReplaceTarget::Local(PathBuf::from(target_path)),
        };

        self.replaces.push(Replacement {
            path,
            version,
            target,
        });
        Ok(())
    }

    /// The required module supplying `import_path`, longest module path first.
    pub fn best_requirement(&self, import_path: &str) -> Option<&Requirement> {
        self.requires
            .iter()
            .filter(|r| provides(&r.path, import_path))
            .max_by_key(|r| r.path.len())
    }

    /// A replacement for `path`, preferring one pinned to `version`.
    pub fn replacement_for(&self, path: &str, version: &str) -> Option<&Replacement> {
        self.replaces
            .iter()
            .filter(|r| r.path == path)
            .find(|r| r.version.as_deref() == Some(version))
            .or_else(|| {
                self.replaces
                    .iter()
                    .find(|r| r.path == path && r.version.is_none())
            })
    }

    /// Replacements without a matching `require` still name modules (workspace-style setups).
    fn best_replacement(&self, import_path: &str) -> Option<&Replacement> {
        self.replaces
            .iter()
            .filter(|r| provides(&r.path, import_path))
            .max_by_key(|r| r.path.len())
    }
}

fn provides(module_path: &str, import_path: &str) -> bool {
    import_path == module_path
        || import_path
            .strip_prefix(module_path)
            .map_or(false, |rest| rest.starts_with('/'))
}

fn strip_comment(line: &str) -> &str {
    match line.find("//") {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn unquote(value: &str) -> &str {
    value.trim_matches(|c| c == '"' || c == '`')
}

/// Go's module cache case-encoding: `Azure` -> `!azure`.
pub fn escape_module_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        if c.is_ascii_uppercase() {
            out.push('!');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Finds modules for import paths and lists their package files.
///
/// Loaded modules and parsed manifests are memoized; every lookup after the
/// first is a read.
pub struct ModuleResolver {
    env: Arc<Environment>,
    modules: DashMap<PathBuf, Arc<Module>>,
    manifests: DashMap<PathBuf, Option<Arc<Manifest>>>,
}

impl ModuleResolver {
    pub fn new(env: Arc<Environment>) -> Self {
        Self {
            env,
            modules: DashMap::new(),
            manifests: DashMap::new(),
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// The module containing `dir`, found through the nearest `go.mod`.
    pub fn module_for_dir(&self, dir: &Path) -> Result<Arc<Module>> {
        let manifest_path = find_manifest(dir).ok_or_else(|| {
            AnnogenError::ModuleNotFound(format!("no go.mod at or above {}", dir.display()))
        })?;
        let root = manifest_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        self.load_module(&root)
    }

    /// Loads the module rooted at `root`, reading its declared path from `go.mod`.
    pub fn load_module(&self, root: &Path) -> Result<Arc<Module>> {
        if let Some(module) = self.modules.get(root) {
            return Ok(module.clone());
        }
        let manifest = self.manifest(root)?.ok_or_else(|| {
            AnnogenError::ModuleNotFound(format!("no go.mod in {}", root.display()))
        })?;
        Ok(self.load_tree(root, &manifest.module_path, true))
    }

    /// Resolves the module supplying `import_path`, as seen from `current`.
    pub fn find(&self, current: &Arc<Module>, import_path: &str) -> Result<Arc<Module>> {
        if let Some(dir) = current.package_dir(import_path) {
            match self.nested_module(current, dir)? {
                None => return Ok(current.clone()),
                Some(nested) if nested.owns(import_path) => {
                    debug!("Resolved {} through nested module {}", import_path, nested.path);
                    return Ok(nested);
                }
                // A nested go.mod cuts the directory out of `current`.
                Some(_) => {}
            }
        }

        if let Some(module) = self.find_dependency(current, import_path)? {
            return Ok(module);
        }

        let vendored = current.root.join("vendor").join(import_path);
        if vendored.is_dir() {
            debug!("Resolved {} through vendor directory", import_path);
            return Ok(self.load_tree(&vendored, import_path, false));
        }

        if is_standard_library(import_path) {
            if let Some(goroot) = self.env.toolchain_root() {
                let std_dir = goroot.join("src").join(import_path);
                if std_dir.is_dir() {
                    return Ok(self.load_tree(&std_dir, import_path, false));
                }
            }
        }

        Err(AnnogenError::ModuleNotFound(import_path.to_string()))
    }

    /// Innermost module nested in `current` that encloses the package directory `dir`.
    fn nested_module(&self, current: &Module, dir: &str) -> Result<Option<Arc<Module>>> {
        if dir.is_empty() {
            return Ok(None);
        }
        let mut candidate = dir;
        loop {
            let root = current.root.join(candidate);
            if root.join("go.mod").is_file() {
                return self.load_module(&root).map(Some);
            }
            match candidate.rsplit_once('/') {
                Some((parent, _)) => candidate = parent,
                None => return Ok(None),
            }
        }
    }

    fn find_dependency(&self, current: &Module, import_path: &str) -> Result<Option<Arc<Module>>> {
        let Some(manifest) = self.manifest(&current.root)? else {
            return Ok(None);
        };

        if let Some(req) = manifest.best_requirement(import_path) {
            let dir = match manifest.replacement_for(&req.path, &req.version) {
                Some(replacement) => self.replacement_dir(current, replacement),
                None => self.cache_dir(&req.path, &req.version),
            };
            if let Some(dir) = dir.filter(|d| d.is_dir()) {
                return Ok(Some(self.load_tree(&dir, &req.path, true)));
            }
            debug!(
                "Module {}@{} is required but not present on disk",
                req.path, req.version
            );
        }

        if let Some(replacement) = manifest.best_replacement(import_path) {
            if let Some(dir) = self
                .replacement_dir(current, replacement)
                .filter(|d| d.is_dir())
            {
                return Ok(Some(self.load_tree(&dir, &replacement.path, true)));
            }
        }

        Ok(None)
    }

    fn replacement_dir(&self, current: &Module, replacement: &Replacement) -> Option<PathBuf> {
        match &replacement.target {
            ReplaceTarget::Local(dir) if dir.is_absolute() => Some(dir.clone()),
            ReplaceTarget::Local(dir) => Some(current.root.join(dir)),
            ReplaceTarget::Module { path, version } => self.cache_dir(path, version),
        }
    }

    fn cache_dir(&self, module_path: &str, version: &str) -> Option<PathBuf> {
        let cache = self.env.module_cache_root()?;
        Some(cache.join(format!("{}@{}", escape_module_path(module_path), version)))
    }

    fn manifest(&self, root: &Path) -> Result<Option<Arc<Manifest>>> {
        if let Some(cached) = self.manifests.get(root) {
            return Ok(cached.clone());
        }
        let path = root.join("go.mod");
        let manifest = if path.is_file() {
            let content = std::fs::read_to_string(&path)?;
            let manifest = Manifest::parse(&content).map_err(|e| {
                AnnogenError::Parse(format!("{}: {}", path.display(), e))
            })?;
            Some(Arc::new(manifest))
        } else {
            None
        };
        self.manifests.insert(root.to_path_buf(), manifest.clone());
        Ok(manifest)
    }

    /// Lists `.go` files below `root`. Whole modules are walked recursively and
    /// stop at nested modules; vendored and standard-library packages only
    /// list their own directory.
    fn load_tree(&self, root: &Path, import_path: &str, recursive: bool) -> Arc<Module> {
        self.modules
            .entry(root.to_path_buf())
            .or_insert_with(|| {
                let files = list_go_files(root, recursive);
                debug!(
                    "Loaded module {} at {} ({} files)",
                    import_path,
                    root.display(),
                    files.len()
                );
                Arc::new(Module::new(root, import_path, files))
            })
            .clone()
    }

    /// Files of `module` located directly in the package directory of `import_path`.
    pub fn files_in_package(module: &Module, import_path: &str) -> Vec<String> {
        let Some(dir) = module.package_dir(import_path) else {
            return Vec::new();
        };
        module
            .files()
            .iter()
            .filter(|f| parent_dir(f) == dir)
            .cloned()
            .collect()
    }
}

fn parent_dir(relative: &str) -> &str {
    relative.rsplit_once('/').map_or("", |(dir, _)| dir)
}

/// Standard-library import paths have no dot in their first element.
pub fn is_standard_library(import_path: &str) -> bool {
    let first = import_path.split('/').next().unwrap_or(import_path);
    !first.contains('.')
}

fn list_go_files(root: &Path, recursive: bool) -> Vec<String> {
    let root_buf = root.to_path_buf();
    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .max_depth(if recursive { None } else { Some(1) })
        .filter_entry(move |entry| {
            let path = entry.path();
            if path == root_buf || !entry.file_type().map_or(false, |t| t.is_dir()) {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            // Directories the go tool ignores, plus nested modules.
            !(name.starts_with('.')
                || name.starts_with('_')
                || name == "testdata"
                || name == "vendor"
                || path.join("go.mod").is_file())
        })
        .build();

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("Walker error: {}", e);
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().map_or(false, |t| t.is_file()) || !is_go_source(path) {
            continue;
        }
        if let Ok(relative) = path.strip_prefix(root) {
            files.push(relative.to_string_lossy().replace('\\', "/"));
        }
    }
    files.sort();
    files
}
