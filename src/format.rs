//! Pixel-format identity and the DRM-to-device conversion table.
//!
//! Hosts describe buffers with DRM fourcc codes. Each supported code maps to
//! the multi-planar device format the hardware consumes, the media-bus code
//! its port must be switched to, and the plane-count/sampling facts the
//! validation layer needs. Unlisted codes are unsupported.

use crate::wire::{self, video};

/// A DRM fourcc code identifying a buffer's pixel layout.
///
/// Construct one from the associated constants, or wrap a raw code received
/// from a buffer allocator. Unknown codes are representable but rejected at
/// [`attach time`](crate::surface::SurfaceState::attach_buffer).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DrmFourcc(pub u32);

impl DrmFourcc {
    /// 32-bit RGB with padding, `[B G R x]` in memory.
    pub const XRGB8888: DrmFourcc = DrmFourcc(wire::fourcc(b'X', b'R', b'2', b'4'));
    /// 32-bit RGB with alpha, `[B G R A]` in memory.
    pub const ARGB8888: DrmFourcc = DrmFourcc(wire::fourcc(b'A', b'R', b'2', b'4'));
    /// 32-bit RGB with padding, `[x R G B]` in memory.
    pub const BGRX8888: DrmFourcc = DrmFourcc(wire::fourcc(b'B', b'X', b'2', b'4'));
    /// 32-bit RGB with alpha, `[A R G B]` in memory.
    pub const BGRA8888: DrmFourcc = DrmFourcc(wire::fourcc(b'B', b'A', b'2', b'4'));
    /// 32-bit RGB with padding, `[R G B x]` in memory.
    pub const XBGR8888: DrmFourcc = DrmFourcc(wire::fourcc(b'X', b'B', b'2', b'4'));
    /// 32-bit RGB with alpha, `[R G B A]` in memory.
    pub const ABGR8888: DrmFourcc = DrmFourcc(wire::fourcc(b'A', b'B', b'2', b'4'));
    /// 24-bit RGB, `[B G R]` in memory.
    pub const RGB888: DrmFourcc = DrmFourcc(wire::fourcc(b'R', b'G', b'2', b'4'));
    /// 24-bit RGB, `[R G B]` in memory.
    pub const BGR888: DrmFourcc = DrmFourcc(wire::fourcc(b'B', b'G', b'2', b'4'));
    /// 16-bit RGB 5:6:5.
    pub const RGB565: DrmFourcc = DrmFourcc(wire::fourcc(b'R', b'G', b'1', b'6'));
    /// 8-bit RGB 3:3:2.
    pub const RGB332: DrmFourcc = DrmFourcc(wire::fourcc(b'R', b'G', b'B', b'8'));

    /// Packed 4:2:2 YUV, `[Y U Y V]` in memory.
    pub const YUYV: DrmFourcc = DrmFourcc(wire::fourcc(b'Y', b'U', b'Y', b'V'));
    /// Packed 4:2:2 YUV, `[Y V Y U]` in memory.
    pub const YVYU: DrmFourcc = DrmFourcc(wire::fourcc(b'Y', b'V', b'Y', b'U'));
    /// Packed 4:2:2 YUV, `[U Y V Y]` in memory.
    pub const UYVY: DrmFourcc = DrmFourcc(wire::fourcc(b'U', b'Y', b'V', b'Y'));
    /// Packed 4:2:2 YUV, `[V Y U Y]` in memory.
    pub const VYUY: DrmFourcc = DrmFourcc(wire::fourcc(b'V', b'Y', b'U', b'Y'));

    /// Two-plane 4:2:0 YUV, interleaved UV chroma.
    pub const NV12: DrmFourcc = DrmFourcc(wire::fourcc(b'N', b'V', b'1', b'2'));
    /// Two-plane 4:2:0 YUV, interleaved VU chroma.
    pub const NV21: DrmFourcc = DrmFourcc(wire::fourcc(b'N', b'V', b'2', b'1'));
    /// Two-plane 4:2:2 YUV, interleaved UV chroma.
    pub const NV16: DrmFourcc = DrmFourcc(wire::fourcc(b'N', b'V', b'1', b'6'));
    /// Two-plane 4:2:2 YUV, interleaved VU chroma.
    pub const NV61: DrmFourcc = DrmFourcc(wire::fourcc(b'N', b'V', b'6', b'1'));

    /// Three-plane 4:2:0 YUV, U then V.
    pub const YUV420: DrmFourcc = DrmFourcc(wire::fourcc(b'Y', b'U', b'1', b'2'));
    /// Three-plane 4:2:0 YUV, V then U.
    pub const YVU420: DrmFourcc = DrmFourcc(wire::fourcc(b'Y', b'V', b'1', b'2'));
    /// Three-plane 4:2:2 YUV, U then V.
    pub const YUV422: DrmFourcc = DrmFourcc(wire::fourcc(b'Y', b'U', b'1', b'6'));
    /// Three-plane 4:2:2 YUV, V then U.
    pub const YVU422: DrmFourcc = DrmFourcc(wire::fourcc(b'Y', b'V', b'1', b'6'));
    /// Three-plane 4:4:4 YUV, U then V.
    pub const YUV444: DrmFourcc = DrmFourcc(wire::fourcc(b'Y', b'U', b'2', b'4'));
    /// Three-plane 4:4:4 YUV, V then U.
    pub const YVU444: DrmFourcc = DrmFourcc(wire::fourcc(b'Y', b'V', b'2', b'4'));

    /// The raw fourcc value.
    pub const fn code(self) -> u32 {
        self.0
    }
}

impl std::fmt::Debug for DrmFourcc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DrmFourcc({})", wire::fourcc_string(self.0))
    }
}

impl std::fmt::Display for DrmFourcc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&wire::fourcc_string(self.0))
    }
}

/// One row of the conversion table.
pub(crate) struct FormatInfo {
    pub drm: DrmFourcc,
    /// Multi-planar V4L2 pixel format the port is programmed with.
    pub device: u32,
    /// Media-bus code for the port's pad formats.
    pub mbus: u32,
    pub planes: u8,
    /// Chroma-sampled formats read pixels in blocks and need at least a
    /// 2x2 source crop.
    pub subsampled: bool,
}

impl FormatInfo {
    /// Minimum usable source crop for this format.
    pub(crate) fn min_block(&self) -> (u32, u32) {
        if self.subsampled { (2, 2) } else { (1, 1) }
    }
}

#[rustfmt::skip]
static FORMATS: [FormatInfo; 24] = [
    FormatInfo { drm: DrmFourcc::XRGB8888, device: video::V4L2_PIX_FMT_XBGR32, mbus: video::MEDIA_BUS_FMT_ARGB8888_1X32, planes: 1, subsampled: false },
    FormatInfo { drm: DrmFourcc::ARGB8888, device: video::V4L2_PIX_FMT_ABGR32, mbus: video::MEDIA_BUS_FMT_ARGB8888_1X32, planes: 1, subsampled: false },
    FormatInfo { drm: DrmFourcc::BGRX8888, device: video::V4L2_PIX_FMT_XRGB32, mbus: video::MEDIA_BUS_FMT_ARGB8888_1X32, planes: 1, subsampled: false },
    FormatInfo { drm: DrmFourcc::BGRA8888, device: video::V4L2_PIX_FMT_ARGB32, mbus: video::MEDIA_BUS_FMT_ARGB8888_1X32, planes: 1, subsampled: false },
    FormatInfo { drm: DrmFourcc::XBGR8888, device: video::V4L2_PIX_FMT_XRGB32, mbus: video::MEDIA_BUS_FMT_ARGB8888_1X32, planes: 1, subsampled: false },
    FormatInfo { drm: DrmFourcc::ABGR8888, device: video::V4L2_PIX_FMT_ARGB32, mbus: video::MEDIA_BUS_FMT_ARGB8888_1X32, planes: 1, subsampled: false },
    FormatInfo { drm: DrmFourcc::RGB888,   device: video::V4L2_PIX_FMT_RGB24,  mbus: video::MEDIA_BUS_FMT_ARGB8888_1X32, planes: 1, subsampled: false },
    FormatInfo { drm: DrmFourcc::BGR888,   device: video::V4L2_PIX_FMT_BGR24,  mbus: video::MEDIA_BUS_FMT_ARGB8888_1X32, planes: 1, subsampled: false },
    FormatInfo { drm: DrmFourcc::RGB565,   device: video::V4L2_PIX_FMT_RGB565, mbus: video::MEDIA_BUS_FMT_ARGB8888_1X32, planes: 1, subsampled: false },
    FormatInfo { drm: DrmFourcc::RGB332,   device: video::V4L2_PIX_FMT_RGB332, mbus: video::MEDIA_BUS_FMT_ARGB8888_1X32, planes: 1, subsampled: false },

    FormatInfo { drm: DrmFourcc::YUYV, device: video::V4L2_PIX_FMT_YUYV, mbus: video::MEDIA_BUS_FMT_AYUV8_1X32, planes: 1, subsampled: true },
    FormatInfo { drm: DrmFourcc::YVYU, device: video::V4L2_PIX_FMT_YVYU, mbus: video::MEDIA_BUS_FMT_AYUV8_1X32, planes: 1, subsampled: true },
    FormatInfo { drm: DrmFourcc::UYVY, device: video::V4L2_PIX_FMT_UYVY, mbus: video::MEDIA_BUS_FMT_AYUV8_1X32, planes: 1, subsampled: true },
    FormatInfo { drm: DrmFourcc::VYUY, device: video::V4L2_PIX_FMT_VYUY, mbus: video::MEDIA_BUS_FMT_AYUV8_1X32, planes: 1, subsampled: true },

    FormatInfo { drm: DrmFourcc::NV12, device: video::V4L2_PIX_FMT_NV12M, mbus: video::MEDIA_BUS_FMT_AYUV8_1X32, planes: 2, subsampled: true },
    FormatInfo { drm: DrmFourcc::NV21, device: video::V4L2_PIX_FMT_NV21M, mbus: video::MEDIA_BUS_FMT_AYUV8_1X32, planes: 2, subsampled: true },
    FormatInfo { drm: DrmFourcc::NV16, device: video::V4L2_PIX_FMT_NV16M, mbus: video::MEDIA_BUS_FMT_AYUV8_1X32, planes: 2, subsampled: true },
    FormatInfo { drm: DrmFourcc::NV61, device: video::V4L2_PIX_FMT_NV61M, mbus: video::MEDIA_BUS_FMT_AYUV8_1X32, planes: 2, subsampled: true },

    FormatInfo { drm: DrmFourcc::YUV420, device: video::V4L2_PIX_FMT_YUV420M, mbus: video::MEDIA_BUS_FMT_AYUV8_1X32, planes: 3, subsampled: true },
    FormatInfo { drm: DrmFourcc::YVU420, device: video::V4L2_PIX_FMT_YVU420M, mbus: video::MEDIA_BUS_FMT_AYUV8_1X32, planes: 3, subsampled: true },
    FormatInfo { drm: DrmFourcc::YUV422, device: video::V4L2_PIX_FMT_YUV422M, mbus: video::MEDIA_BUS_FMT_AYUV8_1X32, planes: 3, subsampled: true },
    FormatInfo { drm: DrmFourcc::YVU422, device: video::V4L2_PIX_FMT_YVU422M, mbus: video::MEDIA_BUS_FMT_AYUV8_1X32, planes: 3, subsampled: true },
    FormatInfo { drm: DrmFourcc::YUV444, device: video::V4L2_PIX_FMT_YUV444M, mbus: video::MEDIA_BUS_FMT_AYUV8_1X32, planes: 3, subsampled: true },
    FormatInfo { drm: DrmFourcc::YVU444, device: video::V4L2_PIX_FMT_YVU444M, mbus: video::MEDIA_BUS_FMT_AYUV8_1X32, planes: 3, subsampled: true },
];

/// Finds the table row for `format`, requiring the buffer's plane count to
/// match the layout exactly.
pub(crate) fn lookup(format: DrmFourcc, planes: usize) -> Option<&'static FormatInfo> {
    FORMATS
        .iter()
        .find(|info| info.drm == format && usize::from(info.planes) == planes)
}

/// Whether a DRM fourcc with the given plane count can be fed to an input
/// port.
pub fn is_supported(format: DrmFourcc, planes: usize) -> bool {
    lookup(format, planes).is_some()
}

/// Resolves the device format actually programmed for a draw, swapping
/// alpha-carrying formats for their opaque siblings when the draw is opaque.
/// Returns the format and whether it must be flagged as premultiplied.
pub(crate) fn effective_device_format(device: u32, opaque: bool) -> (u32, bool) {
    match device {
        video::V4L2_PIX_FMT_ABGR32 if opaque => (video::V4L2_PIX_FMT_XBGR32, false),
        video::V4L2_PIX_FMT_ABGR32 => (video::V4L2_PIX_FMT_ABGR32, true),
        video::V4L2_PIX_FMT_ARGB32 if opaque => (video::V4L2_PIX_FMT_XRGB32, false),
        video::V4L2_PIX_FMT_ARGB32 => (video::V4L2_PIX_FMT_ARGB32, true),
        other => (other, false),
    }
}

/// Height in rows of `plane` for a surface `height` rows tall, following the
/// chroma layout of the device format. Returns 0 for planes the format does
/// not have.
pub(crate) fn plane_height(device: u32, plane: usize, height: u32) -> u32 {
    match plane {
        0 => height,
        1 => match device {
            video::V4L2_PIX_FMT_NV12M
            | video::V4L2_PIX_FMT_NV21M
            | video::V4L2_PIX_FMT_YUV420M
            | video::V4L2_PIX_FMT_YVU420M => height / 2,
            video::V4L2_PIX_FMT_NV16M
            | video::V4L2_PIX_FMT_NV61M
            | video::V4L2_PIX_FMT_YUV422M
            | video::V4L2_PIX_FMT_YVU422M
            | video::V4L2_PIX_FMT_YUV444M
            | video::V4L2_PIX_FMT_YVU444M => height,
            _ => 0,
        },
        2 => match device {
            video::V4L2_PIX_FMT_YUV420M | video::V4L2_PIX_FMT_YVU420M => height / 2,
            video::V4L2_PIX_FMT_YUV422M
            | video::V4L2_PIX_FMT_YVU422M
            | video::V4L2_PIX_FMT_YUV444M
            | video::V4L2_PIX_FMT_YVU444M => height,
            _ => 0,
        },
        _ => 0,
    }
}

#[cfg(test)]
#[path = "../tests/unit/format.rs"]
mod tests;
