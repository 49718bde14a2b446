//! Host-facing engine configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Tunables for opening a composition pipeline.
///
/// Deserializable so hosts can keep it in their own configuration files.
/// Every field has a default; `..Default::default()` is the expected way to
/// set just one of them.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Media controller device carrying the blend graph.
    pub media_device: PathBuf,
    /// Media controller device carrying the scaler graph, when the hardware
    /// has one.
    pub scaler_device: Option<PathBuf>,
    /// Input ports to drive per pass. `None` selects the hardware default
    /// of four; any value is clamped to the range the resolved graph
    /// supports.
    pub max_inputs: Option<u32>,
    /// View budget for frame planning. `None` leaves the view count
    /// unchecked.
    pub max_compose: Option<u32>,
    /// Whether to resolve and use the scaler graph.
    pub scaler_enable: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            media_device: PathBuf::from("/dev/media0"),
            scaler_device: None,
            max_inputs: None,
            max_compose: None,
            scaler_enable: false,
        }
    }
}
