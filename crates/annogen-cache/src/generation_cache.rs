use crate::alias_cache::{substitute, AliasCache};
use crate::generator::{Fragment, GenerationContext, Generator, PostConstructHook};
use annogen_core::{AggregateError, DiscoveryOrder, Import, Result, UnitKey};
use annogen_parser::{heuristic_name, PackageNameSniffer};
use dashmap::DashMap;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

pub const GENERATED_HEADER: &str = "// Code generated by annogen. DO NOT EDIT.";

struct RegisteredGenerator {
    order: DiscoveryOrder,
    name: String,
    generator: Box<dyn Generator>,
}

struct UnitEntry {
    generators: Vec<RegisteredGenerator>,
    aliases: AliasCache,
}

type HookTable = HashMap<String, Vec<PostConstructHook>>;

/// Collects generators per output unit and merges their fragments into one
/// artifact per unit.
///
/// Writers only ever lock a single unit's entry, so dispatch workers touching
/// different units never contend. `finalize` must only run once every node of
/// the run has been dispatched: hooks registered late would be missed.
pub struct GenerationCache {
    sniffer: Arc<PackageNameSniffer>,
    units: DashMap<UnitKey, UnitEntry>,
    hooks: DashMap<UnitKey, HookTable>,
}

impl GenerationCache {
    pub fn new(sniffer: Arc<PackageNameSniffer>) -> Self {
        Self {
            sniffer,
            units: DashMap::new(),
            hooks: DashMap::new(),
        }
    }

    pub fn add_generator(
        &self,
        unit: UnitKey,
        name: impl Into<String>,
        order: DiscoveryOrder,
        generator: Box<dyn Generator>,
    ) {
        let name = name.into();
        debug!("Registering {} for {} at {:?}", name, unit, order);
        // The entry guard serializes writers of one unit.
        self.units
            .entry(unit)
            .or_insert_with(|| UnitEntry {
                generators: Vec::new(),
                aliases: AliasCache::new(),
            })
            .generators
            .push(RegisteredGenerator {
                order,
                name,
                generator,
            });
    }

    pub fn add_post_construct_hook(
        &self,
        unit: UnitKey,
        receiver: impl Into<String>,
        hook: PostConstructHook,
    ) {
        self.hooks
            .entry(unit)
            .or_default()
            .entry(receiver.into())
            .or_default()
            .push(hook);
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Drains every unit and renders one `file_name` artifact per unit.
    ///
    /// Units finalize in parallel; generators within a unit run in discovery
    /// order. Every failure is collected and nothing is returned unless all
    /// units succeed. Units whose generators produce no code emit nothing.
    pub fn finalize(&self, file_name: &str) -> Result<BTreeMap<PathBuf, Vec<u8>>> {
        let keys: Vec<UnitKey> = self.units.iter().map(|e| e.key().clone()).collect();
        let mut units: Vec<(UnitKey, UnitEntry)> = keys
            .into_iter()
            .filter_map(|key| self.units.remove(&key))
            .collect();
        units.sort_by(|a, b| a.0.cmp(&b.0));

        let hook_keys: Vec<UnitKey> = self.hooks.iter().map(|e| e.key().clone()).collect();
        let hooks: HashMap<UnitKey, HookTable> = hook_keys
            .into_iter()
            .filter_map(|key| self.hooks.remove(&key))
            .map(|(key, mut table)| {
                for list in table.values_mut() {
                    list.sort_by_key(|h| h.order);
                }
                (key, table)
            })
            .collect();

        info!("Finalizing {} unit(s) into {}", units.len(), file_name);

        let empty = HookTable::new();
        let results: Vec<Result<Option<(PathBuf, Vec<u8>)>>> = units
            .into_par_iter()
            .map(|(key, entry)| {
                let table = hooks.get(&key).unwrap_or(&empty);
                self.finalize_unit(key, entry, table, file_name)
            })
            .collect();

        let mut errors = AggregateError::new();
        let mut out = BTreeMap::new();
        for result in results {
            if let Some(Some((path, data))) = errors.record(result) {
                out.insert(path, data);
            }
        }
        errors.into_result()?;
        Ok(out)
    }

    fn finalize_unit(
        &self,
        key: UnitKey,
        mut entry: UnitEntry,
        hooks: &HookTable,
        file_name: &str,
    ) -> Result<Option<(PathBuf, Vec<u8>)>> {
        entry.generators.sort_by_key(|g| g.order);

        let mut errors = AggregateError::new();
        let mut fragments: Vec<Fragment> = Vec::with_capacity(entry.generators.len());
        for registered in &entry.generators {
            let mut ctx = GenerationContext::new(&key, &mut entry.aliases, hooks, &self.sniffer);
            match registered.generator.generate(&mut ctx) {
                Ok(fragment) => fragments.push(fragment),
                Err(e) => {
                    debug!("{} failed for {}: {}", registered.name, key, e);
                    errors.push(e);
                }
            }
        }
        errors.into_result()?;

        let mut body = String::new();
        let mut extra: BTreeSet<Import> = BTreeSet::new();
        let mut taken: BTreeSet<String> = BTreeSet::new();
        for fragment in fragments {
            let code = fragment.code.trim_end();
            if code.is_empty() {
                continue;
            }
            if !body.is_empty() {
                body.push('\n');
            }
            body.push_str(code);
            body.push('\n');
            extra.extend(fragment.imports);
            taken.extend(fragment.bindings);
        }
        if body.is_empty() {
            debug!("{} produced no code", key);
            return Ok(None);
        }

        let mut aliases = entry.aliases;
        aliases.retain_used(&body);
        let verbatim = fold_verbatim(&mut aliases, extra);
        taken.extend(
            verbatim
                .iter()
                .filter_map(|i| match i.alias.as_deref() {
                    Some("_") | Some(".") => None,
                    Some(alias) => Some(alias.to_string()),
                    None => Some(heuristic_name(&i.path)),
                }),
        );
        let replace = aliases.build_replace_map(&taken);
        let body = substitute(&body, &replace);

        let mut imports = aliases.resolved_imports(&replace);
        imports.extend(verbatim);

        let path = key.dir.join(file_name);
        debug!(
            "Rendered {} ({} import(s), {} collapsed)",
            path.display(),
            imports.len(),
            replace.len()
        );
        Ok(Some((path, render(&key.package, &imports, &body).into_bytes())))
    }
}

/// Merges verbatim imports of reserved paths into their reservation and
/// returns the rest.
///
/// The body already refers to such a path by the verbatim name, so the
/// reservation is pinned to it. A blank import adds nothing to a live
/// reservation. Dot imports bind no name and are kept as they are.
fn fold_verbatim(aliases: &mut AliasCache, extra: BTreeSet<Import>) -> Vec<Import> {
    let mut verbatim = Vec::new();
    for import in extra {
        let folded = match import.alias.as_deref() {
            Some("_") => aliases.alias_for(&import.path).is_some(),
            Some(".") => false,
            Some(name) => aliases.pin(&import.path, name),
            None => match aliases.reservation(&import.path).map(|r| r.natural.clone()) {
                Some(natural) => aliases.pin(&import.path, &natural),
                None => false,
            },
        };
        if !folded {
            verbatim.push(import);
        }
    }
    verbatim
}

/// Header, package clause, import block (omitted when empty), body.
pub fn render(package: &str, imports: &[Import], body: &str) -> String {
    let mut out = String::with_capacity(body.len() + 128);
    let _ = writeln!(out, "{}", GENERATED_HEADER);
    out.push('\n');
    let _ = writeln!(out, "package {}", package);
    out.push('\n');
    if !imports.is_empty() {
        out.push_str("import (\n");
        for import in imports {
            let _ = writeln!(out, "\t{}", import);
        }
        out.push_str(")\n\n");
    }
    out.push_str(body);
    out
}
