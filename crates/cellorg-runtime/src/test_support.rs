//! Shared test fixtures used by the agent unit tests in this crate.

use crate::bus::InProcessBus;
use crate::config::LayeredConfigSource;
use cellorg_kernel::agent::{AgentBase, AgentConfig};
use std::sync::Arc;

pub fn test_base() -> AgentBase {
    let bus = Arc::new(InProcessBus::new());
    let config = AgentConfig::new(Arc::new(LayeredConfigSource(
        config::Config::builder().build().expect("empty config builds"),
    )));
    AgentBase::new(bus, config)
}
