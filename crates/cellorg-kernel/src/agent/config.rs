//! Typed config access with defaults (§4.2: "typed config getters with
//! defaults"). `ConfigSource` is the narrow port kernel code depends on;
//! the layered file-⊃-env-⊃-default loader lives in `cellorg-runtime`
//! (grounded on `mofa_kernel::config::load_config`) since it needs the
//! `config` crate, which kernel deliberately does not depend on.

use std::sync::Arc;

pub trait ConfigSource: Send + Sync {
    fn get_string(&self, key: &str) -> Option<String>;
    fn get_int(&self, key: &str) -> Option<i64>;
    fn get_bool(&self, key: &str) -> Option<bool>;
    fn get_float(&self, key: &str) -> Option<f64>;
}

#[derive(Clone)]
pub struct AgentConfig {
    source: Arc<dyn ConfigSource>,
}

impl AgentConfig {
    pub fn new(source: Arc<dyn ConfigSource>) -> Self {
        Self { source }
    }

    pub fn get_string(&self, key: &str, default: &str) -> String {
        self.source.get_string(key).unwrap_or_else(|| default.to_string())
    }

    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        self.source.get_int(key).unwrap_or(default)
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.source.get_bool(key).unwrap_or(default)
    }

    pub fn get_float(&self, key: &str, default: f64) -> f64 {
        self.source.get_float(key).unwrap_or(default)
    }
}
