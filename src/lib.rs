//! Planeweave is a batch scheduler and pipeline-topology controller for
//! fixed-function composition hardware.
//!
//! The hardware model is a crossbar compositor driven through the Linux
//! media-controller and V4L2 multi-planar streaming APIs: a bounded set of
//! input ports (each with its own format and crop stage) feeds a single
//! blend unit, which writes the composed frame to a dmabuf through one
//! writeback port. An optional fixed-function resizer lives on a separate
//! media graph and is time-shared between draws that need scaling.
//!
//! # Pass lifecycle
//!
//! 1. **Resolve**: [`TopologyLayout`] + a media device node ->
//!    [`ResolvedPipeline`] (typed entity handles, once at startup)
//! 2. **Plan**: `&[ViewPlan] -> CompositionPath` (whole-frame
//!    hardware-or-software decision, before any port is touched)
//! 3. **Compose**: [`BlendEngine::begin_compose`], any number of
//!    [`BlendEngine::draw_view`] calls, [`BlendEngine::finish_compose`].
//!    When the port budget fills mid-frame the engine flushes a pass and
//!    re-submits the partial result as the next pass's background.
//!
//! The key design constraints:
//!
//! - **Synchronous passes**: every hardware pass queues, streams, and
//!   dequeues to completion before returning.
//! - **No pixel storage**: all image buffers are host-provided dmabufs.
//!   The one crate-managed allocation, resizer scratch, is delegated to a
//!   host [`ScratchAllocator`].
//! - **`unsafe` confined to the kernel boundary**: only the `ioctl`
//!   wrappers in [`device::kernel`] use it.
//!
//! For a hardware-free harness, enable the `testing` feature and drive
//! [`BlendEngine`] with the scripted `device::fake::FakeBus`.
#![deny(unsafe_code)]
#![deny(missing_docs)]

pub mod compose;
pub mod config;
pub mod device;
pub mod format;
mod foundation;
pub mod surface;
pub mod topology;
pub(crate) mod wire;

pub use compose::engine::BlendEngine;
pub use compose::feasibility::{CompositionPath, OpaqueCoverage, ViewPlan, plan_frame};
pub use compose::scaler::{SCALER_MIN_PIXELS, ScratchAllocator, ScratchBuffer};
pub use config::PipelineConfig;
pub use foundation::error::{PlaneweaveError, PlaneweaveResult};
pub use foundation::geom::Rect;
pub use surface::{MAX_DIMENSION, OutputTarget, PlaneDesc, SurfaceState};
pub use topology::{PipelinePort, ResolvedPipeline, ScalerPipeline, TopologyLayout};
