// ABOUTME: Go grammar registration for the scanner and the package-name sniffer.
// ABOUTME: Builds configured tree-sitter parsers and recognizes Go source paths.
use annogen_core::{AnnogenError, Result};
use std::path::Path;
use tree_sitter::Parser;

pub const GO_EXTENSION: &str = "go";

pub fn go_language() -> tree_sitter::Language {
    tree_sitter_go::LANGUAGE.into()
}

/// Parsers are not `Sync`; build one per worker or per call.
pub fn create_go_parser() -> Result<Parser> {
    let mut parser = Parser::new();
    parser
        .set_language(&go_language())
        .map_err(|e| AnnogenError::Parse(format!("Failed to load Go grammar: {}", e)))?;
    Ok(parser)
}

pub fn is_go_source(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(GO_EXTENSION)
}

pub fn is_go_test_source(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map_or(false, |n| n.ends_with("_test.go"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tree_sitter::{LANGUAGE_VERSION, MIN_COMPATIBLE_LANGUAGE_VERSION};

    #[test]
    fn go_grammar_uses_supported_version() {
        let version = go_language().abi_version();
        assert!(
            (MIN_COMPATIBLE_LANGUAGE_VERSION..=LANGUAGE_VERSION).contains(&version),
            "Go grammar uses incompatible Tree-sitter version {} (supported {}..={})",
            version,
            MIN_COMPATIBLE_LANGUAGE_VERSION,
            LANGUAGE_VERSION
        );
    }

    #[test]
    fn recognizes_go_paths() {
        assert!(is_go_source(Path::new("a/b/widget.go")));
        assert!(!is_go_source(Path::new("a/b/go.mod")));
        assert!(is_go_test_source(Path::new("widget_test.go")));
        assert!(!is_go_test_source(Path::new("widget.go")));
    }
}
