//! Layered per-cell configuration: file ⊃ environment ⊃ code defaults (§4.2,
//! §6.3). Grounded on `mofa_kernel::config::{load_config, substitute_env_vars}`:
//! `${VAR}`/`$VAR` interpolation inside the file's raw text, then the `config`
//! crate layers an `Environment` source (which wins on conflict — see
//! `CELLORG_DATA_ROOT` overriding `vfs_root` in §6.3) over the parsed file,
//! with code-supplied defaults applied last by the caller via `AgentConfig`.

use cellorg_kernel::agent::ConfigSource as KernelConfigSource;
use config::{Config, Environment, File};
use regex::Regex;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("failed to build layered config: {0}")]
    Build(#[from] config::ConfigError),
}

/// Two-pass substitution: `${VAR}` (braced) first, then bare `$VAR`. A
/// missing variable leaves the original placeholder text untouched rather
/// than failing the load.
pub fn substitute_env_vars(content: &str) -> String {
    let braced = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();
    let after_braced = braced.replace_all(content, |caps: &regex::Captures| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    });

    let bare = Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)").unwrap();
    bare.replace_all(&after_braced, |caps: &regex::Captures| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}

/// Builds the layered config for one cell. `path`, if given, is read,
/// env-substituted, then parsed as TOML; the process environment (prefixed
/// `CELLORG__`, e.g. `CELLORG__VFS_ROOT`) is layered on top and wins on key
/// conflicts.
pub fn load_cell_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut builder = Config::builder();

    if let Some(path) = path {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let substituted = substitute_env_vars(&raw);
        builder = builder.add_source(File::from_str(&substituted, config::FileFormat::Toml));
    }

    builder = builder.add_source(Environment::with_prefix("CELLORG").separator("__"));

    Ok(builder.build()?)
}

/// Bridges a built `config::Config` into the kernel's narrow `ConfigSource`
/// port so agents never depend on the `config` crate directly.
pub struct LayeredConfigSource(pub Config);

impl KernelConfigSource for LayeredConfigSource {
    fn get_string(&self, key: &str) -> Option<String> {
        self.0.get_string(key).ok()
    }

    fn get_int(&self, key: &str) -> Option<i64> {
        self.0.get_int(key).ok()
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get_bool(key).ok()
    }

    fn get_float(&self, key: &str) -> Option<f64> {
        self.0.get_float(key).ok()
    }
}
