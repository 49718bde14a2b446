//! Request admission and per-port hardware programming.

use crate::device::{
    LinkInfo, MAX_PLANES, MediaBus, NodeHandle, PadFormat, PixFormat, QueuedPlane,
    SelectionTarget, StreamDirection,
};
use crate::format;
use crate::foundation::error::PlaneweaveResult;
use crate::foundation::geom::Rect;
use crate::surface::{BufferParams, MAX_DIMENSION};
use crate::topology::PipelinePort;
use crate::wire::video;

/// One admitted draw, carrying everything a port needs.
///
/// Built from the host surface state (or from the output target, for the
/// background re-submission) and owned by the batch until the flush that
/// consumes it. The scaler pre-pass rewrites it in place.
#[derive(Clone, Copy, Debug)]
pub(crate) struct DrawRequest {
    pub planes: [QueuedPlane; MAX_PLANES],
    pub num_planes: usize,
    pub strides: [u32; MAX_PLANES],
    /// Full dimensions of the backing buffer, not of the crop.
    pub width: u32,
    pub height: u32,
    pub fourcc: u32,
    pub mbus: u32,
    pub min_block: (u32, u32),
    pub src: Rect,
    pub dst: Rect,
    pub opaque: bool,
    pub alpha: f32,
}

impl DrawRequest {
    pub(crate) fn new(
        params: &BufferParams,
        src: Rect,
        dst: Rect,
        opaque: bool,
        alpha: f32,
    ) -> Self {
        Self {
            planes: params.planes,
            num_planes: params.num_planes,
            strides: params.strides,
            width: params.width,
            height: params.height,
            fourcc: params.device_fourcc,
            mbus: params.mbus,
            min_block: params.min_block,
            src,
            dst,
            opaque,
            alpha,
        }
    }
}

/// Why a request was refused a port. Refusals drop the single request,
/// never the batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Rejection {
    /// The visible source is smaller than the format's minimum block.
    Degenerate,
    /// The source exceeds what the hardware can address.
    Oversized,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Rejection::Degenerate => "degenerate source",
            Rejection::Oversized => "source exceeds the addressable range",
        })
    }
}

/// Folds a negative crop origin into the rectangle pair: the off-buffer
/// strip is cut from the source, and the destination origin advances by the
/// same amount so the surviving pixels keep their on-screen position.
pub(crate) fn clamp_request(src: &mut Rect, dst: &mut Rect) {
    if src.left < 0 {
        let cut = src.left.unsigned_abs().min(src.width);
        src.left = 0;
        src.width -= cut;
        dst.left = dst.left.saturating_add(i32::try_from(cut).unwrap_or(i32::MAX));
        dst.width = dst.width.saturating_sub(cut);
    }
    if src.top < 0 {
        let cut = src.top.unsigned_abs().min(src.height);
        src.top = 0;
        src.height -= cut;
        dst.top = dst.top.saturating_add(i32::try_from(cut).unwrap_or(i32::MAX));
        dst.height = dst.height.saturating_sub(cut);
    }
}

/// Clamps the request in place and decides whether a port can take it.
pub(crate) fn admit(req: &mut DrawRequest) -> Result<(), Rejection> {
    clamp_request(&mut req.src, &mut req.dst);
    let (min_w, min_h) = req.min_block;
    if req.src.width < min_w || req.src.height < min_h || req.dst.is_empty() {
        return Err(Rejection::Degenerate);
    }
    if req.src.width > MAX_DIMENSION || req.src.height > MAX_DIMENSION {
        return Err(Rejection::Oversized);
    }
    Ok(())
}

/// Opacity as the 8-bit port control value, rounded to nearest.
pub(crate) fn alpha_component(alpha: f32) -> i32 {
    (alpha.clamp(0.0, 1.0) * 255.0).round() as i32
}

/// Programs one port for a draw and queues its buffer.
///
/// Order matters to the drivers: route the link, set the node format and
/// the stage's sink pad, apply opacity, crop (keeping the rectangle the
/// driver actually selected in `req.src`), then carry the cropped size to
/// the stage's source pad and the blend pad, and point the blend pad's
/// compose window at the destination.
pub(crate) fn enable_port<B: MediaBus + ?Sized>(
    bus: &mut B,
    port: &PipelinePort,
    blend: NodeHandle,
    req: &mut DrawRequest,
) -> PlaneweaveResult<()> {
    bus.setup_link(&LinkInfo {
        enabled: true,
        ..port.link
    })?;
    bus.request_buffers(port.node, StreamDirection::Feed, 0)?;

    let (fourcc, premul) = format::effective_device_format(req.fourcc, req.opaque);
    bus.set_pix_format(
        port.node,
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
    bus.set_subdev_format(
        port.subdev,
        0,
        &PadFormat {
            width: req.width,
            height: req.height,
            code: req.mbus,
        },
    )?;
    bus.set_control(
        port.subdev,
        video::V4L2_CID_ALPHA_COMPONENT,
        alpha_component(req.alpha),
    )?;

    req.src = bus.set_subdev_selection(port.subdev, 0, SelectionTarget::Crop, req.src)?;

    // The cropped size rides the fixed 32-bit code from here to the blend.
    let cropped = PadFormat {
        width: req.src.width,
        height: req.src.height,
        code: video::MEDIA_BUS_FMT_ARGB8888_1X32,
    };
    let blend_pad = u32::from(port.link.sink.index);
    bus.set_subdev_format(port.subdev, 1, &cropped)?;
    bus.set_subdev_format(blend, blend_pad, &cropped)?;
    bus.set_subdev_selection(blend, blend_pad, SelectionTarget::Compose, req.dst)?;

    bus.request_buffers(port.node, StreamDirection::Feed, 1)?;
    bus.queue_buffer(
        port.node,
        StreamDirection::Feed,
        &req.planes[..req.num_planes],
    )
}

/// Detaches a port from the pass: link down, buffers released.
pub(crate) fn disable_port<B: MediaBus + ?Sized>(
    bus: &mut B,
    port: &PipelinePort,
) -> PlaneweaveResult<()> {
    bus.setup_link(&LinkInfo {
        enabled: false,
        ..port.link
    })?;
    bus.request_buffers(port.node, StreamDirection::Feed, 0)
}

#[cfg(test)]
#[path = "../../tests/unit/ports.rs"]
mod tests;
