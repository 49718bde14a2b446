//! Host-owned surface and output-target state.

use std::os::fd::RawFd;

use crate::device::{MAX_PLANES, QueuedPlane};
use crate::format::{self, DrmFourcc};
use crate::foundation::error::{PlaneweaveError, PlaneweaveResult};
use crate::foundation::geom::Rect;

/// Largest frame edge the pipeline hardware addresses.
pub const MAX_DIMENSION: u32 = 8190;

/// One plane of a dmabuf-backed image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaneDesc {
    /// dmabuf file descriptor. Borrowed for the lifetime of the attach; the
    /// crate never duplicates or closes it.
    pub dmabuf: RawFd,
    /// Line stride in bytes.
    pub stride: u32,
}

/// Per-buffer parameters derived once at attach time so the per-frame path
/// never consults the format table.
#[derive(Clone, Copy, Debug)]
pub(crate) struct BufferParams {
    pub width: u32,
    pub height: u32,
    pub device_fourcc: u32,
    pub mbus: u32,
    pub min_block: (u32, u32),
    pub num_planes: usize,
    pub planes: [QueuedPlane; MAX_PLANES],
    pub strides: [u32; MAX_PLANES],
}

/// Mutable per-surface state the host owns between frames.
///
/// Source rectangles are in buffer coordinates, destination rectangles in
/// output coordinates. The host updates them whenever the scene changes and
/// submits the surface with
/// [`BlendEngine::draw_view`](crate::BlendEngine::draw_view); a surface
/// without an attached buffer is skipped silently.
#[derive(Clone, Debug)]
pub struct SurfaceState {
    /// Source crop within the attached buffer.
    pub src_rect: Rect,
    /// Destination rectangle on the output.
    pub dst_rect: Rect,
    /// Bounding box of the opaque region, in buffer coordinates. Empty when
    /// the surface has no opaque pixels.
    pub opaque_src_rect: Rect,
    /// The opaque bounding box mapped to the output.
    pub opaque_dst_rect: Rect,
    /// Whole-surface opacity in `[0, 1]`.
    pub alpha: f32,
    params: Option<BufferParams>,
}

impl SurfaceState {
    /// Fresh state with no buffer attached and full opacity.
    pub fn new() -> Self {
        Self {
            src_rect: Rect::ZERO,
            dst_rect: Rect::ZERO,
            opaque_src_rect: Rect::ZERO,
            opaque_dst_rect: Rect::ZERO,
            alpha: 1.0,
            params: None,
        }
    }

    /// Validates and attaches a buffer, pre-computing the device parameters
    /// used every time the surface is drawn.
    ///
    /// The `planes` slice length must match the format's memory plane count
    /// exactly. Dimensions above [`MAX_DIMENSION`] are rejected here, not
    /// silently dropped at draw time, so the host can fall back to another
    /// path for the whole surface lifetime.
    pub fn attach_buffer(
        &mut self,
        planes: &[PlaneDesc],
        width: u32,
        height: u32,
        format: DrmFourcc,
    ) -> PlaneweaveResult<()> {
        if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(PlaneweaveError::validation(format!(
                "buffer {width}x{height} is outside the addressable range"
            )));
        }
        let info = format::lookup(format, planes.len()).ok_or_else(|| {
            PlaneweaveError::validation(format!(
                "unsupported pixel format {format} with {} plane(s)",
                planes.len()
            ))
        })?;

        let mut queued = [QueuedPlane { fd: -1, length: 0 }; MAX_PLANES];
        let mut strides = [0u32; MAX_PLANES];
        for (i, plane) in planes.iter().enumerate() {
            queued[i] = QueuedPlane {
                fd: plane.dmabuf,
                length: plane.stride * format::plane_height(info.device, i, height),
            };
            strides[i] = plane.stride;
        }

        self.params = Some(BufferParams {
            width,
            height,
            device_fourcc: info.device,
            mbus: info.mbus,
            min_block: info.min_block(),
            num_planes: planes.len(),
            planes: queued,
            strides,
        });
        Ok(())
    }

    /// Detaches the current buffer. Draws of this surface are skipped until
    /// a new one is attached.
    pub fn release_buffer(&mut self) {
        self.params = None;
    }

    /// Whether a buffer is currently attached.
    pub fn has_buffer(&self) -> bool {
        self.params.is_some()
    }

    pub(crate) fn params(&self) -> Option<&BufferParams> {
        self.params.as_ref()
    }
}

impl Default for SurfaceState {
    fn default() -> Self {
        Self::new()
    }
}

/// The composition target: fixed output dimensions plus the buffer the next
/// pass writes into.
///
/// The writeback format is the pipeline's fixed 32-bit layout; only the
/// buffer changes frame to frame, via [`OutputTarget::set_buffer`].
#[derive(Clone, Debug)]
pub struct OutputTarget {
    width: u32,
    height: u32,
    plane: Option<PlaneDesc>,
}

impl OutputTarget {
    /// A target of the given size. Fails above [`MAX_DIMENSION`].
    pub fn new(width: u32, height: u32) -> PlaneweaveResult<Self> {
        if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(PlaneweaveError::validation(format!(
                "output {width}x{height} is outside the addressable range"
            )));
        }
        Ok(Self {
            width,
            height,
            plane: None,
        })
    }

    /// Points the writeback at a buffer for the coming frame.
    pub fn set_buffer(&mut self, plane: PlaneDesc) {
        self.plane = Some(plane);
    }

    /// Output width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Output height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    pub(crate) fn plane(&self) -> Option<PlaneDesc> {
        self.plane
    }
}

#[cfg(test)]
#[path = "../tests/unit/surface.rs"]
mod tests;
