// ABOUTME: One-shot probe of the Go toolchain environment (module cache, manifest, GOROOT).
// ABOUTME: Populated from `go env -json` with environment-variable fallbacks; read-only afterwards.
use crate::{AnnogenError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};

const MOD_CACHE_SUB_PATH: &str = "pkg/mod";

/// Toolchain paths discovered once per run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Environment {
    #[serde(rename = "GOMOD", default)]
    pub go_mod: String,
    #[serde(rename = "GOMODCACHE", default)]
    pub go_mod_cache: String,
    #[serde(rename = "GOROOT", default)]
    pub go_root: String,
    #[serde(rename = "GOPATH", default)]
    pub go_path: String,
    #[serde(rename = "GOVERSION", default)]
    pub go_version: String,
    #[serde(rename = "GOFLAGS", default)]
    pub go_flags: String,
    #[serde(rename = "GOWORK", default)]
    pub go_work: String,
    #[serde(skip)]
    pub project_root: PathBuf,
}

impl Environment {
    /// Queries `go env -json` in `project_root`, falling back to process
    /// environment variables when the toolchain is unavailable.
    pub fn probe(project_root: &Path) -> Result<Self> {
        let mut env = match Self::query_toolchain(project_root) {
            Ok(env) => env,
            Err(e) => {
                warn!("Unable to query go toolchain, using environment variables: {}", e);
                Environment::default()
            }
        };
        env.project_root = project_root.to_path_buf();

        if env.go_root.is_empty() {
            env.apply_env_fallbacks();
        } else {
            debug!("Environment preloaded from toolchain: {:?}", env);
        }

        if env.go_mod.is_empty() {
            if let Some(manifest) = find_manifest(project_root) {
                env.go_mod = manifest.to_string_lossy().to_string();
            }
        }

        info!(
            "Go environment: version={} modcache={} goroot={}",
            if env.go_version.is_empty() {
                "unknown"
            } else {
                env.go_version.as_str()
            },
            env.go_mod_cache,
            env.go_root
        );
        Ok(env)
    }

    /// Builds an environment without consulting the toolchain.
    pub fn from_parts(
        project_root: impl Into<PathBuf>,
        module_cache_root: Option<PathBuf>,
        toolchain_root: Option<PathBuf>,
    ) -> Self {
        let project_root = project_root.into();
        let go_mod = find_manifest(&project_root)
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default();
        Self {
            go_mod,
            go_mod_cache: path_string(module_cache_root),
            go_root: path_string(toolchain_root),
            project_root,
            ..Self::default()
        }
    }

    fn query_toolchain(project_root: &Path) -> Result<Self> {
        let output = Command::new("go")
            .args(["env", "-json"])
            .current_dir(project_root)
            .output()?;

        if !output.status.success() {
            return Err(AnnogenError::Environment(format!(
                "go env exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(serde_json::from_slice(&output.stdout)?)
    }

    fn apply_env_fallbacks(&mut self) {
        if let Ok(root) = std::env::var("GOROOT") {
            if !root.is_empty() {
                self.go_root = root;
            }
        }

        if let Ok(path) = std::env::var("GOPATH") {
            if !path.is_empty() {
                self.go_path = path;
            }
        }
        if self.go_path.is_empty() {
            if let Some(home) = dirs::home_dir() {
                self.go_path = home.join("go").to_string_lossy().to_string();
            }
        }

        match std::env::var("GOMODCACHE") {
            Ok(cache) if !cache.is_empty() => self.go_mod_cache = cache,
            _ if !self.go_path.is_empty() => {
                // GOPATH may list several entries; the module cache lives under the first.
                let first = std::env::split_paths(&self.go_path).next();
                if let Some(first) = first {
                    self.go_mod_cache = first.join(MOD_CACHE_SUB_PATH).to_string_lossy().to_string();
                }
            }
            _ => {}
        }
    }

    pub fn module_cache_root(&self) -> Option<&Path> {
        non_empty(&self.go_mod_cache)
    }

    pub fn module_manifest_path(&self) -> Option<&Path> {
        // `go env` reports os.DevNull when modules are disabled.
        non_empty(&self.go_mod).filter(|p| p.file_name().map_or(false, |n| n == "go.mod"))
    }

    pub fn toolchain_root(&self) -> Option<&Path> {
        non_empty(&self.go_root)
    }
}

fn non_empty(value: &str) -> Option<&Path> {
    if value.is_empty() {
        None
    } else {
        Some(Path::new(value))
    }
}

fn path_string(path: Option<PathBuf>) -> String {
    path.map(|p| p.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Nearest `go.mod` at or above `dir`.
pub fn find_manifest(dir: &Path) -> Option<PathBuf> {
    dir.ancestors()
        .map(|d| d.join("go.mod"))
        .find(|candidate| candidate.is_file())
}
