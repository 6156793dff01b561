use annogen_core::Import;
use annogen_parser::heuristic_name;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// Synthetic aliases are `_imp_1`, `_imp_2`, ...
pub const ALIAS_PREFIX: &str = "_imp_";

const GO_KEYWORDS: &[&str] = &[
    "break",
    "case",
    "chan",
    "const",
    "continue",
    "default",
    "defer",
    "else",
    "fallthrough",
    "for",
    "func",
    "go",
    "goto",
    "if",
    "import",
    "interface",
    "map",
    "package",
    "range",
    "return",
    "select",
    "struct",
    "switch",
    "type",
    "var",
];

/// A synthetic alias handed out for one import path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub alias: String,
    pub path: String,
    /// Sniffed package name the alias may collapse to.
    pub natural: String,
    /// Set when a fragment already refers to the path by `natural`; the
    /// alias then always collapses.
    pub pinned: bool,
}

/// Unit-scoped alias table.
///
/// Aliases come from a fixed prefix and a counter starting at 1, so the
/// same sequence of reservations always yields the same aliases. Reserving
/// a path twice returns the first alias.
#[derive(Debug, Clone)]
pub struct AliasCache {
    counter: usize,
    reservations: Vec<Reservation>,
    by_path: HashMap<String, usize>,
}

impl Default for AliasCache {
    fn default() -> Self {
        Self::new()
    }
}

impl AliasCache {
    pub fn new() -> Self {
        Self {
            counter: 0,
            reservations: Vec::new(),
            by_path: HashMap::new(),
        }
    }

    /// Alias for `path`, minting the next one on first request.
    pub fn reserve(&mut self, path: &str, natural: impl Into<String>) -> String {
        if let Some(&idx) = self.by_path.get(path) {
            return self.reservations[idx].alias.clone();
        }
        self.counter += 1;
        let alias = format!("{}{}", ALIAS_PREFIX, self.counter);
        self.by_path.insert(path.to_string(), self.reservations.len());
        self.reservations.push(Reservation {
            alias: alias.clone(),
            path: path.to_string(),
            natural: natural.into(),
            pinned: false,
        });
        alias
    }

    /// Fixes the local name of the reservation for `path` to `name`.
    ///
    /// Returns `false` when `path` has no reservation.
    pub fn pin(&mut self, path: &str, name: &str) -> bool {
        let Some(&idx) = self.by_path.get(path) else {
            return false;
        };
        let reservation = &mut self.reservations[idx];
        debug!(
            "Pinning {} ({}) to {}",
            reservation.alias, reservation.path, name
        );
        reservation.natural = name.to_string();
        reservation.pinned = true;
        true
    }

    pub fn alias_for(&self, path: &str) -> Option<&str> {
        self.reservation(path).map(|r| r.alias.as_str())
    }

    pub fn reservation(&self, path: &str) -> Option<&Reservation> {
        self.by_path.get(path).map(|&idx| &self.reservations[idx])
    }

    pub fn reservations(&self) -> &[Reservation] {
        &self.reservations
    }

    pub fn len(&self) -> usize {
        self.reservations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reservations.is_empty()
    }

    /// Reservations as aliased imports, in first-requested order.
    pub fn build_imports(&self) -> Vec<Import> {
        self.reservations
            .iter()
            .map(|r| Import::new(Some(r.alias.clone()), r.path.clone()))
            .collect()
    }

    /// Drops every reservation whose alias does not occur as a word in `body`.
    pub fn retain_used(&mut self, body: &str) {
        let before = self.reservations.len();
        self.reservations.retain(|r| contains_word(body, &r.alias));
        if self.reservations.len() != before {
            debug!(
                "Dropped {} unused import alias(es)",
                before - self.reservations.len()
            );
        }
        self.by_path = self
            .reservations
            .iter()
            .enumerate()
            .map(|(idx, r)| (r.path.clone(), idx))
            .collect();
    }

    /// Alias -> natural name for every reservation that can collapse.
    ///
    /// A natural name collapses when it is a non-keyword identifier that no
    /// other reservation and no name in `taken` already binds. Pinned
    /// reservations always collapse.
    pub fn build_replace_map(&self, taken: &BTreeSet<String>) -> BTreeMap<String, String> {
        let mut uses: HashMap<&str, usize> = HashMap::new();
        for r in &self.reservations {
            *uses.entry(r.natural.as_str()).or_default() += 1;
        }

        let collapses = |r: &Reservation| {
            uses.get(r.natural.as_str()) == Some(&1)
                && is_identifier(&r.natural)
                && !is_keyword(&r.natural)
                && r.natural != "_"
                && !taken.contains(&r.natural)
                && !self.reservations.iter().any(|o| o.alias == r.natural)
        };

        self.reservations
            .iter()
            .filter(|r| r.pinned || collapses(r))
            .map(|r| (r.alias.clone(), r.natural.clone()))
            .collect()
    }

    /// Imports after collapsing: collapsed entries carry no alias when the
    /// natural name is what Go would infer from the path anyway.
    pub fn resolved_imports(&self, replace: &BTreeMap<String, String>) -> Vec<Import> {
        self.reservations
            .iter()
            .map(|r| match replace.get(&r.alias) {
                Some(natural) if *natural == heuristic_name(&r.path) => {
                    Import::new(None, r.path.clone())
                }
                Some(natural) => Import::new(Some(natural.clone()), r.path.clone()),
                None => Import::new(Some(r.alias.clone()), r.path.clone()),
            })
            .collect()
    }
}

/// Literal whole-word substitution of every alias in `replace`.
pub fn substitute(body: &str, replace: &BTreeMap<String, String>) -> String {
    if replace.is_empty() {
        return body.to_string();
    }
    let alternation = replace
        .keys()
        .map(|alias| regex::escape(alias))
        .collect::<Vec<_>>()
        .join("|");
    let Ok(re) = Regex::new(&format!(r"\b(?:{})\b", alternation)) else {
        return body.to_string();
    };
    re.replace_all(body, |caps: &regex::Captures| {
        replace
            .get(&caps[0])
            .cloned()
            .unwrap_or_else(|| caps[0].to_string())
    })
    .into_owned()
}

fn contains_word(body: &str, word: &str) -> bool {
    Regex::new(&format!(r"\b{}\b", regex::escape(word)))
        .map(|re| re.is_match(body))
        .unwrap_or_else(|_| body.contains(word))
}

pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

pub fn is_keyword(name: &str) -> bool {
    GO_KEYWORDS.contains(&name)
}
