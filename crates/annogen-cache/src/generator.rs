use crate::alias_cache::AliasCache;
use annogen_core::{DiscoveryOrder, Import, Module, NodeMeta, Result, UnitKey};
use annogen_parser::PackageNameSniffer;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::Arc;

static QUALIFIED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([A-Za-z_][A-Za-z0-9_]*)\.([A-Za-z_][A-Za-z0-9_]*)").expect("qualified name pattern")
});

/// Source text produced by one generator plus the imports it needs verbatim.
///
/// Foreign packages referenced through [`GenerationContext::reserve`] or
/// [`GenerationContext::qualify`] do not need to be listed here. A verbatim
/// import of an already reserved path is merged into that reservation.
///
/// `bindings` lists the identifiers the code declares locally (receivers,
/// parameters, variables). No import of the unit is renamed to one of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    pub code: String,
    pub imports: Vec<Import>,
    pub bindings: Vec<String>,
}

impl Fragment {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Self::default()
        }
    }

    pub fn with_import(mut self, import: Import) -> Self {
        self.imports.push(import);
        self
    }

    pub fn with_bindings<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bindings.extend(names.into_iter().map(Into::into));
        self
    }
}

/// One generator per annotated declaration. Built during dispatch, run once
/// at finalize, after every node of the run has been dispatched.
pub trait Generator: Send + Sync {
    fn name(&self) -> &str;

    fn generate(&self, ctx: &mut GenerationContext<'_>) -> Result<Fragment>;
}

/// A post-construction method registered for a receiver type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostConstructHook {
    pub method: String,
    pub returns_error: bool,
    pub order: DiscoveryOrder,
}

/// What a generator sees of its unit while generating.
pub struct GenerationContext<'a> {
    unit: &'a UnitKey,
    aliases: &'a mut AliasCache,
    hooks: &'a HashMap<String, Vec<PostConstructHook>>,
    sniffer: &'a PackageNameSniffer,
}

impl<'a> GenerationContext<'a> {
    pub fn new(
        unit: &'a UnitKey,
        aliases: &'a mut AliasCache,
        hooks: &'a HashMap<String, Vec<PostConstructHook>>,
        sniffer: &'a PackageNameSniffer,
    ) -> Self {
        Self {
            unit,
            aliases,
            hooks,
            sniffer,
        }
    }

    pub fn unit(&self) -> &UnitKey {
        self.unit
    }

    pub fn aliases(&mut self) -> &mut AliasCache {
        &mut *self.aliases
    }

    pub fn sniffer(&self) -> &PackageNameSniffer {
        self.sniffer
    }

    /// Post-construct hooks of `receiver` in discovery order.
    pub fn hooks_for(&self, receiver: &str) -> &[PostConstructHook] {
        self.hooks
            .get(receiver)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Reserves an alias for `import_path` as seen from `current`.
    pub fn reserve(&mut self, current: &Arc<Module>, import_path: &str) -> Result<String> {
        if let Some(alias) = self.aliases.alias_for(import_path) {
            return Ok(alias.to_string());
        }
        let natural = self.sniffer.package_name(current, import_path)?;
        Ok(self.aliases.reserve(import_path, natural))
    }

    /// Rewrites `pkg.Ident` references of a type expression written in the
    /// file described by `meta` into references through reserved aliases.
    ///
    /// Qualifiers that do not name an import of that file are left alone.
    pub fn qualify(&mut self, expr: &str, meta: &NodeMeta) -> Result<String> {
        let mut resolved: HashMap<String, Option<String>> = HashMap::new();
        for caps in QUALIFIED.captures_iter(expr) {
            let qualifier = &caps[1];
            if resolved.contains_key(qualifier) {
                continue;
            }
            let path = self
                .sniffer
                .find_import_by_alias(&meta.module, &meta.imports, qualifier)?;
            let alias = match path {
                Some(path) => Some(self.reserve(&meta.module, &path)?),
                None => None,
            };
            resolved.insert(qualifier.to_string(), alias);
        }

        Ok(QUALIFIED
            .replace_all(expr, |caps: &Captures| match resolved.get(&caps[1]) {
                Some(Some(alias)) => format!("{}.{}", alias, &caps[2]),
                _ => caps[0].to_string(),
            })
            .into_owned())
    }
}
