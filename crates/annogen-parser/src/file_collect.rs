use crate::language::{is_go_source, is_go_test_source};
use annogen_core::{AnnogenError, Result, ScanConfig};
use ignore::{overrides::OverrideBuilder, WalkBuilder};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Collects the Go sources under `dir` that may carry markers.
///
/// The result is sorted lexically; its index is the file ordinal of the
/// discovery order, so the same tree always yields the same sequence.
pub fn collect_go_files(dir: &Path, config: &ScanConfig) -> Result<Vec<PathBuf>> {
    info!("Collecting Go sources from: {:?}", dir);

    let mut ovr = OverrideBuilder::new(dir);

    for exclude in &config.exclude_patterns {
        let pattern = format!("!{}", exclude.trim_start_matches('!'));
        ovr.add(&pattern)
            .map_err(|e| AnnogenError::Parse(format!("Invalid exclude pattern {}: {}", exclude, e)))?;
        debug!("Added exclude pattern: {}", exclude);
    }

    // Overrides are whitelists: once any include is present everything else is skipped,
    // so only add them when the user asked for it.
    for include in &config.include_patterns {
        ovr.add(include)
            .map_err(|e| AnnogenError::Parse(format!("Invalid include pattern {}: {}", include, e)))?;
        debug!("Added include pattern: {}", include);
    }

    let overrides = ovr
        .build()
        .map_err(|e| AnnogenError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;

    let walker = WalkBuilder::new(dir)
        .hidden(true)
        .git_ignore(true)
        .git_exclude(true)
        .ignore(true)
        .overrides(overrides)
        .build();

    let mut paths = Vec::new();
    let mut total_files = 0;

    for dent in walker {
        let dent = match dent {
            Ok(d) => d,
            Err(e) => {
                warn!("Walker error: {}", e);
                continue;
            }
        };

        let path = dent.path();
        if !path.is_file() {
            continue;
        }
        total_files += 1;

        if !is_go_source(path) {
            continue;
        }
        if !config.include_tests && is_go_test_source(path) {
            continue;
        }
        let generated = path
            .file_name()
            .and_then(|n| n.to_str())
            .map_or(false, |n| n.ends_with(&config.generated_suffix));
        if generated {
            continue;
        }

        paths.push(path.to_path_buf());
    }

    paths.sort();

    info!(
        "File collection complete: {} files seen, {} Go sources selected",
        total_files,
        paths.len()
    );

    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "package x\n").unwrap();
    }

    #[test]
    fn skips_tests_generated_and_vendor() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "b/widget.go");
        touch(dir.path(), "a/model.go");
        touch(dir.path(), "a/model_test.go");
        touch(dir.path(), "a/constructor.gen.go");
        touch(dir.path(), "vendor/github.com/x/y/y.go");
        touch(dir.path(), "README.md");

        let files = collect_go_files(dir.path(), &ScanConfig::default()).unwrap();
        let rel: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(rel, vec!["a/model.go", "b/widget.go"]);
    }

    #[test]
    fn includes_tests_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a/model.go");
        touch(dir.path(), "a/model_test.go");

        let config = ScanConfig {
            include_tests: true,
            ..ScanConfig::default()
        };
        let files = collect_go_files(dir.path(), &config).unwrap();
        assert_eq!(files.len(), 2);
    }
}
