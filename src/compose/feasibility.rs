//! Whole-frame admission: decide up front whether the hardware can take a
//! scene, so the host can fall back to another renderer before touching any
//! port state.

use serde::{Deserialize, Serialize};

/// How much of a view's bounds its opaque region covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpaqueCoverage {
    /// No opaque pixels.
    Empty,
    /// An opaque region smaller than the view bounds.
    Partial,
    /// The opaque region is exactly the view bounds.
    Full,
}

/// Per-view facts the host derives from its scene graph.
///
/// The blend unit composes axis-aligned rectangles only, and the port
/// opacity control applies to the whole layer. Anything the hardware cannot
/// express has to be visible here so [`plan_frame`] can refuse the frame.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ViewPlan {
    /// Whole-view opacity in `[0, 1]`.
    pub alpha: f32,
    /// Coverage of the view bounds by its opaque region.
    pub opaque_coverage: OpaqueCoverage,
    /// Any rotation component in the view or buffer transform.
    pub rotated: bool,
    /// Net horizontal scale from buffer to output.
    pub scale_x: f32,
    /// Net vertical scale from buffer to output.
    pub scale_y: f32,
}

/// Outcome of [`plan_frame`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "path")]
pub enum CompositionPath {
    /// Every view fits the fixed-function pipeline.
    Hardware,
    /// At least one view cannot be composed; the whole frame falls back.
    Software {
        /// The first disqualifying condition found.
        reason: String,
    },
}

impl CompositionPath {
    fn software(reason: String) -> Self {
        CompositionPath::Software { reason }
    }
}

/// Checks a whole scene against the hardware's abilities.
///
/// A translucent view is only composable when its opaque region is empty or
/// covers it exactly: the port opacity control scales the whole layer, so a
/// partial opaque region would be dimmed along with the rest. Rotation has
/// no fixed-function path at all. Scaling is available per-view when a
/// resizer is attached and both factors are positive; without one, any
/// non-unit factor disqualifies the frame.
pub fn plan_frame(
    views: &[ViewPlan],
    view_budget: Option<u32>,
    scaler_available: bool,
) -> CompositionPath {
    let count = u32::try_from(views.len()).unwrap_or(u32::MAX);
    if let Some(budget) = view_budget {
        if budget > 0 && count > budget {
            return CompositionPath::software(format!(
                "{count} views exceed the configured budget of {budget}"
            ));
        }
    }

    for (index, view) in views.iter().enumerate() {
        if view.alpha < 1.0 && view.opaque_coverage == OpaqueCoverage::Partial {
            return CompositionPath::software(format!(
                "view {index} is translucent with a partial opaque region"
            ));
        }
        if view.rotated {
            return CompositionPath::software(format!("view {index} is rotated"));
        }
        if scaler_available && view.scale_x > 0.0 && view.scale_y > 0.0 {
            continue;
        }
        if view.scale_x != 1.0 || view.scale_y != 1.0 {
            return CompositionPath::software(format!(
                "view {index} is scaled ({:.3}x{:.3}) and the resizer cannot take it",
                view.scale_x, view.scale_y
            ));
        }
    }

    CompositionPath::Hardware
}

#[cfg(test)]
#[path = "../../tests/unit/feasibility.rs"]
mod tests;
