use annogen_cache::is_keyword;

/// Name, type-parameter list and type-argument list of a possibly generic type.
///
/// `Box[K comparable, V any]` declares `[K comparable, V any]` and is
/// instantiated as `Box[K, V]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    pub name: String,
    pub params: String,
    pub args: String,
}

impl TypeInfo {
    pub fn new(name: &str, type_params: Option<&str>) -> Self {
        let params = type_params.unwrap_or("").trim().to_string();
        let args = type_args(&params);
        Self {
            name: name.to_string(),
            params,
            args,
        }
    }

    /// `Box[K, V]`
    pub fn instance(&self) -> String {
        format!("{}{}", self.name, self.args)
    }

    /// `NewBox[K comparable, V any]` style declaration of a derived name.
    pub fn declare(&self, derived: &str) -> String {
        format!("{}{}", derived, self.params)
    }

    /// Instantiation of a derived generic type: `BoxBuilder[K, V]`.
    pub fn derived_instance(&self, derived: &str) -> String {
        format!("{}{}", derived, self.args)
    }
}

fn type_args(params: &str) -> String {
    let inner = params
        .strip_prefix('[')
        .and_then(|p| p.strip_suffix(']'))
        .unwrap_or("")
        .trim();
    if inner.is_empty() {
        return String::new();
    }
    let names: Vec<&str> = inner
        .split(',')
        .filter_map(|part| part.split_whitespace().next())
        .collect();
    format!("[{}]", names.join(", "))
}

pub fn upper_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn lower_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) => c.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Local variable name for a field; keywords get a trailing underscore.
pub fn param_name(field: &str) -> String {
    let name = lower_first(field);
    if is_keyword(&name) {
        format!("{}_", name)
    } else {
        name
    }
}
