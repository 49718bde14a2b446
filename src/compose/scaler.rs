//! Time-shared resizer pre-pass.
//!
//! The resizer lives on its own media graph and cannot scale in-place
//! during a blend pass. Draws that need scaling are first run through it
//! into a crate-managed scratch buffer, then the draw request is rewritten
//! to read the scratch buffer at 1:1 and joins the blend batch like any
//! other. One frame can use each resizer unit once; when the pool is
//! exhausted the engine flushes the pending pass early to free it.

use tracing::debug;

use crate::device::{
    MAX_PLANES, MediaBus, PadFormat, PixFormat, QueuedPlane, SelectionTarget, StreamDirection,
    queue,
};
use crate::format;
use crate::foundation::error::{PlaneweaveError, PlaneweaveResult};
use crate::foundation::geom::Rect;
use crate::topology::ScalerPipeline;
use crate::wire::video;

use super::ports::DrawRequest;

/// Smallest source edge the resizer accepts.
pub const SCALER_MIN_PIXELS: u32 = 4;

/// Scratch width alignment required by the scan-out allocator family the
/// hardware shares buffers with.
const SCRATCH_ALIGN: u32 = 32;

/// A dmabuf the resizer writes scaled output into.
///
/// Produced by a [`ScratchAllocator`] and handed back through
/// [`ScratchAllocator::release`] when the engine regrows or shuts down.
#[derive(Clone, Copy, Debug)]
pub struct ScratchBuffer {
    /// dmabuf file descriptor, owned by the allocator.
    pub dmabuf: std::os::fd::RawFd,
    /// Row pitch in bytes chosen by the allocator.
    pub stride: u32,
}

/// Host-side dmabuf allocator for resizer scratch buffers.
///
/// Buffer allocation is platform business (GBM, KMS dumb buffers, a DRM
/// heap); the engine only dictates the size. Requested widths are already
/// aligned to the hardware's scan-out granularity.
pub trait ScratchAllocator {
    /// Allocates a 32-bit RGBA buffer of at least `width` x `height`.
    fn allocate(&mut self, width: u32, height: u32) -> PlaneweaveResult<ScratchBuffer>;
    /// Returns a buffer the engine no longer uses.
    fn release(&mut self, buffer: ScratchBuffer);
}

/// Whether a draw needs the resizer, and whether it can have it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ScaleDecision {
    /// Source and destination sizes match; the blend unit takes it as-is.
    Direct,
    /// Sizes differ and the source is large enough for the resizer.
    Scale,
    /// Sizes differ but the source is below the resizer's minimum; the
    /// draw cannot be composed and is dropped.
    TooSmall,
}

pub(crate) fn decide(src: &Rect, dst: &Rect) -> ScaleDecision {
    if src.width == dst.width && src.height == dst.height {
        return ScaleDecision::Direct;
    }
    if src.width < SCALER_MIN_PIXELS || src.height < SCALER_MIN_PIXELS {
        return ScaleDecision::TooSmall;
    }
    ScaleDecision::Scale
}

/// One resizer graph plus its scratch buffer.
struct ScalerUnit<B: MediaBus> {
    bus: B,
    pipeline: ScalerPipeline,
    scratch: Option<ScratchBuffer>,
    /// Grow-only maxima; the scratch buffer is never shrunk so earlier
    /// frames' sizes stay covered.
    width: u32,
    height: u32,
}

impl<B: MediaBus> ScalerUnit<B> {
    /// Grows the scratch buffer to cover `width` x `height` if it does not
    /// already. Old buffers are released before the larger one is
    /// requested.
    fn ensure_scratch(
        &mut self,
        allocator: &mut dyn ScratchAllocator,
        width: u32,
        height: u32,
    ) -> PlaneweaveResult<()> {
        if self.width >= width && self.height >= height && self.scratch.is_some() {
            return Ok(());
        }
        self.width = self.width.max(width);
        self.height = self.height.max(height);
        if let Some(old) = self.scratch.take() {
            allocator.release(old);
        }
        let aligned = self.width.next_multiple_of(SCRATCH_ALIGN);
        self.scratch = Some(allocator.allocate(aligned, self.height)?);
        debug!(width = aligned, height = self.height, "scratch buffer grown");
        Ok(())
    }

    /// Runs one scale pass and rewrites `req` to read the scratch buffer.
    ///
    /// The pad chain is programmed source-to-sink: input stage format and
    /// crop, then the cropped size into the resizer, the destination size
    /// out of it and into the writeback stage. Buffers are queued on both
    /// video nodes and the pass streams synchronously.
    fn apply(&mut self, req: &mut DrawRequest) -> PlaneweaveResult<()> {
        let scratch = self.scratch.ok_or_else(|| {
            PlaneweaveError::validation("resizer has no scratch buffer")
        })?;
        let bus = &mut self.bus;
        let p = self.pipeline;
        let (dst_w, dst_h) = (req.dst.width, req.dst.height);

        bus.set_subdev_format(
            p.input_subdev,
            0,
            &PadFormat {
                width: req.width,
                height: req.height,
                code: req.mbus,
            },
        )?;
        req.src = bus.set_subdev_selection(p.input_subdev, 0, SelectionTarget::Crop, req.src)?;

        let cropped = PadFormat {
            width: req.src.width,
            height: req.src.height,
            code: video::MEDIA_BUS_FMT_ARGB8888_1X32,
        };
        bus.set_subdev_format(p.input_subdev, 1, &cropped)?;
        bus.set_subdev_format(p.resizer, 0, &cropped)?;

        let scaled = PadFormat {
            width: dst_w,
            height: dst_h,
            code: video::MEDIA_BUS_FMT_ARGB8888_1X32,
        };
        bus.set_subdev_format(p.resizer, 1, &scaled)?;
        bus.set_subdev_format(p.output_subdev, 0, &scaled)?;

        bus.request_buffers(p.input_node, StreamDirection::Feed, 0)?;
        let (fourcc, premul) = format::effective_device_format(req.fourcc, req.opaque);
        bus.set_pix_format(
            p.input_node,
            StreamDirection::Feed,
            &PixFormat {
                width: req.width,
                height: req.height,
                fourcc,
                premul,
                num_planes: req.num_planes,
                strides: req.strides,
            },
        )?;
        bus.request_buffers(p.input_node, StreamDirection::Feed, 1)?;
        bus.queue_buffer(
            p.input_node,
            StreamDirection::Feed,
            &req.planes[..req.num_planes],
        )?;

        bus.request_buffers(p.output_node, StreamDirection::Drain, 0)?;
        bus.set_pix_format(
            p.output_node,
            StreamDirection::Drain,
            &PixFormat {
                width: dst_w,
                height: dst_h,
                fourcc: video::V4L2_PIX_FMT_ABGR32,
                premul: true,
                num_planes: 1,
                strides: [scratch.stride, 0, 0],
            },
        )?;
        bus.request_buffers(p.output_node, StreamDirection::Drain, 1)?;
        let out_plane = QueuedPlane {
            fd: scratch.dmabuf,
            length: scratch.stride * dst_h,
        };
        bus.queue_buffer(p.output_node, StreamDirection::Drain, &[out_plane])?;

        queue::stream_pass(bus, &[p.input_node], p.output_node, true)?;

        req.planes = [out_plane; MAX_PLANES];
        req.num_planes = 1;
        req.strides = [scratch.stride, 0, 0];
        req.width = dst_w;
        req.height = dst_h;
        req.fourcc = video::V4L2_PIX_FMT_ABGR32;
        req.mbus = video::MEDIA_BUS_FMT_ARGB8888_1X32;
        req.min_block = (1, 1);
        req.src = Rect::sized(dst_w, dst_h);
        Ok(())
    }
}

/// Pool of resizer units handed out within one blend pass.
pub(crate) struct ScalerArbiter<B: MediaBus> {
    units: Vec<ScalerUnit<B>>,
    allocator: Box<dyn ScratchAllocator>,
    in_use: usize,
}

impl<B: MediaBus> ScalerArbiter<B> {
    pub(crate) fn new(
        graphs: Vec<(B, ScalerPipeline)>,
        allocator: Box<dyn ScratchAllocator>,
    ) -> Self {
        Self {
            units: graphs
                .into_iter()
                .map(|(bus, pipeline)| ScalerUnit {
                    bus,
                    pipeline,
                    scratch: None,
                    width: 0,
                    height: 0,
                })
                .collect(),
            allocator,
            in_use: 0,
        }
    }

    /// Every unit is claimed; the pending pass must flush before the next
    /// scaled draw.
    pub(crate) fn exhausted(&self) -> bool {
        self.in_use == self.units.len()
    }

    /// Returns all units to the pool. Called when a pass flushes: the
    /// blend has consumed the scratch contents by then.
    pub(crate) fn reset(&mut self) {
        self.in_use = 0;
    }

    /// Grows every unit's scratch buffer to cover the output size.
    pub(crate) fn ensure_capacity(&mut self, width: u32, height: u32) -> PlaneweaveResult<()> {
        for unit in &mut self.units {
            unit.ensure_scratch(self.allocator.as_mut(), width, height)?;
        }
        Ok(())
    }

    /// Claims the next free unit and scales `req` through it.
    ///
    /// Callers check [`ScalerArbiter::exhausted`] first; claiming from an
    /// empty pool is a validation error.
    pub(crate) fn scale(&mut self, req: &mut DrawRequest) -> PlaneweaveResult<()> {
        let unit = self
            .units
            .get_mut(self.in_use)
            .ok_or_else(|| PlaneweaveError::validation("resizer pool exhausted"))?;
        unit.apply(req)?;
        self.in_use += 1;
        Ok(())
    }
}

impl<B: MediaBus> Drop for ScalerArbiter<B> {
    fn drop(&mut self) {
        for unit in &mut self.units {
            if let Some(buffer) = unit.scratch.take() {
                self.allocator.release(buffer);
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scaler.rs"]
mod tests;
