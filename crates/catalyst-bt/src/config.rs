//! Per-tree runtime configuration.

use serde::{Deserialize, Serialize};

/// Runtime knobs for a tree instance, carried by the template and copied on bind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// How many times one `evaluate` call may re-run the root after servicing interrupts
    #[serde(default = "default_max_interrupt_passes")]
    pub max_interrupt_passes: u32,

    /// Restart from the top on the tick after the root completes; otherwise hold the result
    /// until `reset`
    #[serde(default = "default_restart_on_completion")]
    pub restart_on_completion: bool,
}

fn default_max_interrupt_passes() -> u32 {
    4
}

fn default_restart_on_completion() -> bool {
    true
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_interrupt_passes: default_max_interrupt_passes(),
            restart_on_completion: default_restart_on_completion(),
        }
    }
}
