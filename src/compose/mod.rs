//! The composition layer: frame feasibility, request admission, the
//! resizer pre-pass, and the engine that schedules hardware passes.

pub mod engine;
pub mod feasibility;
pub(crate) mod ports;
pub mod scaler;
