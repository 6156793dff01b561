use annogen_core::{AnnogenConfig, ConfigError, ConfigManager};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_project_config_file_is_loaded() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join(".annogen.toml"),
        r#"
[scan]
include_tests = true
exclude_patterns = ["**/internal/legacy/**"]

[output]
constructor_file = "ctor.gen.go"
dry_run = true
"#,
    )
    .unwrap();

    let manager = ConfigManager::load(dir.path(), None).unwrap();
    let config = manager.config();
    assert_eq!(manager.config_path(), Some(dir.path().join(".annogen.toml").as_path()));
    assert!(config.scan.include_tests);
    assert_eq!(config.scan.exclude_patterns, vec!["**/internal/legacy/**".to_string()]);
    assert_eq!(config.output.constructor_file, "ctor.gen.go");
    // Unset keys keep their defaults.
    assert_eq!(config.output.mapper_file, "mappers.gen.go");
    assert_eq!(config.scan.generated_suffix, ".gen.go");
}

#[test]
fn test_explicit_config_must_exist() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.toml");
    match ConfigManager::load(dir.path(), Some(&missing)) {
        Err(ConfigError::NotFound(path)) => assert!(path.ends_with("nope.toml")),
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("missing explicit config should fail"),
    }
}

#[test]
fn test_invalid_toml_is_a_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    fs::write(&path, "[output\nconstructor_file = 1").unwrap();
    assert!(matches!(
        ConfigManager::read_toml_file(&path),
        Err(ConfigError::ParseError(_))
    ));
}

#[test]
fn test_config_serialization() {
    let config = AnnogenConfig::default();
    let text = toml::to_string_pretty(&config).unwrap();
    let parsed: AnnogenConfig = toml::from_str(&text).unwrap();
    assert_eq!(parsed.output.constructor_file, config.output.constructor_file);
    assert_eq!(parsed.scan.exclude_patterns, config.scan.exclude_patterns);
}

#[test]
fn test_output_names_must_carry_the_generated_suffix() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join(".annogen.toml"),
        "[output]\nconstructor_file = \"ctor_gen.go\"\n",
    )
    .unwrap();

    match ConfigManager::load(dir.path(), None) {
        Err(ConfigError::ValidationError(msg)) => {
            assert!(msg.contains("output.constructor_file"), "{}", msg);
            assert!(msg.contains(".gen.go"), "{}", msg);
        }
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("output name without the generated suffix should be rejected"),
    }

    let mut config = AnnogenConfig::default();
    config.scan.generated_suffix = "_gen.go".to_string();
    config.output.constructor_file = "ctor_gen.go".to_string();
    config.output.mapper_file = "map_gen.go".to_string();
    assert!(ConfigManager::validate_config(&config).is_ok());
}
