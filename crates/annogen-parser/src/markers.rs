use annogen_core::Annotation;
use once_cell::sync::Lazy;
use regex::Regex;

static MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^@([A-Za-z_][A-Za-z0-9_]*)\s*(?:\((.*)\))?\s*$").expect("marker pattern")
});

static PARAM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([A-Za-z_][A-Za-z0-9_]*)\s*=\s*(?:"((?:[^"\\]|\\.)*)"|([^,\s)]+))"#)
        .expect("marker parameter pattern")
});

/// Reads a single line comment (`// @Kind(key="value")`) as an annotation.
///
/// Block comments and comments that do not start with `@` are not markers.
pub fn parse_marker(comment: &str) -> Option<Annotation> {
    let body = comment.trim().strip_prefix("//")?.trim();
    let caps = MARKER.captures(body)?;

    let mut annotation = Annotation::new(&caps[1]);
    if let Some(args) = caps.get(2) {
        for param in PARAM.captures_iter(args.as_str()) {
            let value = match (param.get(2), param.get(3)) {
                (Some(quoted), _) => unescape(quoted.as_str()),
                (None, Some(bare)) => bare.as_str().to_string(),
                (None, None) => String::new(),
            };
            annotation.params.insert(param[1].to_string(), value);
        }
    }
    Some(annotation)
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}
