//! V4L2 UAPI subset: multi-planar formats, buffer queueing, streaming, and
//! the sub-device pad configuration requests.

use super::{fourcc, ior, iow, iowr};

pub(crate) const VIDEO_MAX_PLANES: usize = 8;

pub(crate) const V4L2_BUF_TYPE_VIDEO_CAPTURE_MPLANE: u32 = 9;
pub(crate) const V4L2_BUF_TYPE_VIDEO_OUTPUT_MPLANE: u32 = 10;

pub(crate) const V4L2_MEMORY_DMABUF: u32 = 4;

pub(crate) const V4L2_FIELD_ANY: u32 = 0;

pub(crate) const V4L2_CAP_VIDEO_CAPTURE: u32 = 0x0000_0001;
pub(crate) const V4L2_CAP_VIDEO_OUTPUT: u32 = 0x0000_0002;
pub(crate) const V4L2_CAP_VIDEO_CAPTURE_MPLANE: u32 = 0x0000_1000;
pub(crate) const V4L2_CAP_VIDEO_OUTPUT_MPLANE: u32 = 0x0000_2000;
pub(crate) const V4L2_CAP_STREAMING: u32 = 0x0400_0000;

/// Pixel values are alpha-premultiplied.
pub(crate) const V4L2_PIX_FMT_FLAG_PREMUL_ALPHA: u32 = 0x0000_0001;

/// Global per-plane alpha control.
pub(crate) const V4L2_CID_ALPHA_COMPONENT: u32 = 0x0098_0929;

pub(crate) const V4L2_SUBDEV_FORMAT_ACTIVE: u32 = 1;

pub(crate) const V4L2_SEL_TGT_CROP: u32 = 0x0000;
pub(crate) const V4L2_SEL_TGT_COMPOSE: u32 = 0x0100;

pub(crate) const MEDIA_BUS_FMT_ARGB8888_1X32: u32 = 0x100d;
pub(crate) const MEDIA_BUS_FMT_AYUV8_1X32: u32 = 0x2005;

// Packed RGB, single plane.
pub(crate) const V4L2_PIX_FMT_XRGB32: u32 = fourcc(b'B', b'X', b'2', b'4');
pub(crate) const V4L2_PIX_FMT_ARGB32: u32 = fourcc(b'B', b'A', b'2', b'4');
pub(crate) const V4L2_PIX_FMT_XBGR32: u32 = fourcc(b'X', b'R', b'2', b'4');
pub(crate) const V4L2_PIX_FMT_ABGR32: u32 = fourcc(b'A', b'R', b'2', b'4');
pub(crate) const V4L2_PIX_FMT_RGB24: u32 = fourcc(b'R', b'G', b'B', b'3');
pub(crate) const V4L2_PIX_FMT_BGR24: u32 = fourcc(b'B', b'G', b'R', b'3');
pub(crate) const V4L2_PIX_FMT_RGB565: u32 = fourcc(b'R', b'G', b'B', b'P');
pub(crate) const V4L2_PIX_FMT_RGB332: u32 = fourcc(b'R', b'G', b'B', b'1');

// Packed YUV 4:2:2, single plane.
pub(crate) const V4L2_PIX_FMT_YUYV: u32 = fourcc(b'Y', b'U', b'Y', b'V');
pub(crate) const V4L2_PIX_FMT_YVYU: u32 = fourcc(b'Y', b'V', b'Y', b'U');
pub(crate) const V4L2_PIX_FMT_UYVY: u32 = fourcc(b'U', b'Y', b'V', b'Y');
pub(crate) const V4L2_PIX_FMT_VYUY: u32 = fourcc(b'V', b'Y', b'U', b'Y');

// Semi-planar YUV, two planes.
pub(crate) const V4L2_PIX_FMT_NV12M: u32 = fourcc(b'N', b'M', b'1', b'2');
pub(crate) const V4L2_PIX_FMT_NV21M: u32 = fourcc(b'N', b'M', b'2', b'1');
pub(crate) const V4L2_PIX_FMT_NV16M: u32 = fourcc(b'N', b'M', b'1', b'6');
pub(crate) const V4L2_PIX_FMT_NV61M: u32 = fourcc(b'N', b'M', b'6', b'1');

// Planar YUV, three planes.
pub(crate) const V4L2_PIX_FMT_YUV420M: u32 = fourcc(b'Y', b'M', b'1', b'2');
pub(crate) const V4L2_PIX_FMT_YVU420M: u32 = fourcc(b'Y', b'M', b'2', b'1');
pub(crate) const V4L2_PIX_FMT_YUV422M: u32 = fourcc(b'Y', b'M', b'1', b'6');
pub(crate) const V4L2_PIX_FMT_YVU422M: u32 = fourcc(b'Y', b'M', b'6', b'1');
pub(crate) const V4L2_PIX_FMT_YUV444M: u32 = fourcc(b'Y', b'M', b'2', b'4');
pub(crate) const V4L2_PIX_FMT_YVU444M: u32 = fourcc(b'Y', b'M', b'4', b'2');

#[repr(C)]
#[derive(Clone, Copy)]
pub(crate) struct V4l2Capability {
    pub driver: [u8; 16],
    pub card: [u8; 32],
    pub bus_info: [u8; 32],
    pub version: u32,
    pub capabilities: u32,
    pub device_caps: u32,
    pub reserved: [u32; 3],
}

impl V4l2Capability {
    pub(crate) const fn zeroed() -> Self {
        Self {
            driver: [0; 16],
            card: [0; 32],
            bus_info: [0; 32],
            version: 0,
            capabilities: 0,
            device_caps: 0,
            reserved: [0; 3],
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub(crate) struct V4l2PlanePixFormat {
    pub sizeimage: u32,
    pub bytesperline: u32,
    pub reserved: [u16; 6],
}

impl V4l2PlanePixFormat {
    pub(crate) const fn zeroed() -> Self {
        Self {
            sizeimage: 0,
            bytesperline: 0,
            reserved: [0; 6],
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub(crate) struct V4l2PixFormatMplane {
    pub width: u32,
    pub height: u32,
    pub pixelformat: u32,
    pub field: u32,
    pub colorspace: u32,
    pub plane_fmt: [V4l2PlanePixFormat; VIDEO_MAX_PLANES],
    pub num_planes: u8,
    pub flags: u8,
    pub ycbcr_enc: u8,
    pub quantization: u8,
    pub xfer_func: u8,
    pub reserved: [u8; 7],
}

impl V4l2PixFormatMplane {
    pub(crate) const fn zeroed() -> Self {
        Self {
            width: 0,
            height: 0,
            pixelformat: 0,
            field: 0,
            colorspace: 0,
            plane_fmt: [V4l2PlanePixFormat::zeroed(); VIDEO_MAX_PLANES],
            num_planes: 0,
            flags: 0,
            ycbcr_enc: 0,
            quantization: 0,
            xfer_func: 0,
            reserved: [0; 7],
        }
    }
}

// The kernel union behind `v4l2_format` is 8-byte aligned (it also holds
// pointer-bearing members this crate never uses), hence the hole after `typ`
// and the tail padding out to 200 bytes.
#[repr(C)]
#[derive(Clone, Copy)]
pub(crate) struct V4l2Format {
    pub typ: u32,
    pub _pad: u32,
    pub pix_mp: V4l2PixFormatMplane,
    pub _tail: [u8; 8],
}

impl V4l2Format {
    pub(crate) const fn zeroed() -> Self {
        Self {
            typ: 0,
            _pad: 0,
            pix_mp: V4l2PixFormatMplane::zeroed(),
            _tail: [0; 8],
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub(crate) struct V4l2Plane {
    pub bytesused: u32,
    pub length: u32,
    // Union: mem_offset / userptr / fd. DMABUF descriptors occupy the low
    // 32 bits.
    pub m: u64,
    pub data_offset: u32,
    pub reserved: [u32; 11],
}

impl V4l2Plane {
    pub(crate) const fn zeroed() -> Self {
        Self {
            bytesused: 0,
            length: 0,
            m: 0,
            data_offset: 0,
            reserved: [0; 11],
        }
    }
}

#[repr(C)]
pub(crate) struct V4l2Buffer {
    pub index: u32,
    pub typ: u32,
    pub bytesused: u32,
    pub flags: u32,
    pub field: u32,
    pub _pad0: u32,
    pub timestamp_sec: i64,
    pub timestamp_usec: i64,
    pub timecode: [u32; 4],
    pub sequence: u32,
    pub memory: u32,
    // Union: offset / userptr / planes pointer / fd. Multi-planar buffers
    // carry the plane array pointer here.
    pub m: u64,
    pub length: u32,
    pub reserved2: u32,
    pub request_fd: i32,
    pub _pad1: u32,
}

impl V4l2Buffer {
    pub(crate) const fn zeroed() -> Self {
        Self {
            index: 0,
            typ: 0,
            bytesused: 0,
            flags: 0,
            field: 0,
            _pad0: 0,
            timestamp_sec: 0,
            timestamp_usec: 0,
            timecode: [0; 4],
            sequence: 0,
            memory: 0,
            m: 0,
            length: 0,
            reserved2: 0,
            request_fd: 0,
            _pad1: 0,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub(crate) struct V4l2RequestBuffers {
    pub count: u32,
    pub typ: u32,
    pub memory: u32,
    pub capabilities: u32,
    pub flags: u8,
    pub reserved: [u8; 3],
}

impl V4l2RequestBuffers {
    pub(crate) const fn zeroed() -> Self {
        Self {
            count: 0,
            typ: 0,
            memory: 0,
            capabilities: 0,
            flags: 0,
            reserved: [0; 3],
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub(crate) struct V4l2Control {
    pub id: u32,
    pub value: i32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub(crate) struct V4l2MbusFramefmt {
    pub width: u32,
    pub height: u32,
    pub code: u32,
    pub field: u32,
    pub colorspace: u32,
    pub ycbcr_enc: u16,
    pub quantization: u16,
    pub xfer_func: u16,
    pub flags: u16,
    pub reserved: [u16; 10],
}

impl V4l2MbusFramefmt {
    pub(crate) const fn zeroed() -> Self {
        Self {
            width: 0,
            height: 0,
            code: 0,
            field: 0,
            colorspace: 0,
            ycbcr_enc: 0,
            quantization: 0,
            xfer_func: 0,
            flags: 0,
            reserved: [0; 10],
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub(crate) struct V4l2SubdevFormat {
    pub which: u32,
    pub pad: u32,
    pub format: V4l2MbusFramefmt,
    pub stream: u32,
    pub reserved: [u32; 7],
}

impl V4l2SubdevFormat {
    pub(crate) const fn zeroed() -> Self {
        Self {
            which: 0,
            pad: 0,
            format: V4l2MbusFramefmt::zeroed(),
            stream: 0,
            reserved: [0; 7],
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub(crate) struct V4l2Rect {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl V4l2Rect {
    pub(crate) const fn zeroed() -> Self {
        Self {
            left: 0,
            top: 0,
            width: 0,
            height: 0,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub(crate) struct V4l2SubdevSelection {
    pub which: u32,
    pub pad: u32,
    pub target: u32,
    pub flags: u32,
    pub r: V4l2Rect,
    pub stream: u32,
    pub reserved: [u32; 7],
}

impl V4l2SubdevSelection {
    pub(crate) const fn zeroed() -> Self {
        Self {
            which: 0,
            pad: 0,
            target: 0,
            flags: 0,
            r: V4l2Rect::zeroed(),
            stream: 0,
            reserved: [0; 7],
        }
    }
}

pub(crate) const VIDIOC_QUERYCAP: u32 = ior::<V4l2Capability>(b'V', 0);
pub(crate) const VIDIOC_S_FMT: u32 = iowr::<V4l2Format>(b'V', 5);
pub(crate) const VIDIOC_REQBUFS: u32 = iowr::<V4l2RequestBuffers>(b'V', 8);
pub(crate) const VIDIOC_QBUF: u32 = iowr::<V4l2Buffer>(b'V', 15);
pub(crate) const VIDIOC_DQBUF: u32 = iowr::<V4l2Buffer>(b'V', 17);
pub(crate) const VIDIOC_STREAMON: u32 = iow::<u32>(b'V', 18);
pub(crate) const VIDIOC_STREAMOFF: u32 = iow::<u32>(b'V', 19);
pub(crate) const VIDIOC_S_CTRL: u32 = iowr::<V4l2Control>(b'V', 28);

// Sub-device nodes share the 'V' ioctl namespace.
pub(crate) const VIDIOC_SUBDEV_S_FMT: u32 = iowr::<V4l2SubdevFormat>(b'V', 5);
pub(crate) const VIDIOC_SUBDEV_S_SELECTION: u32 = iowr::<V4l2SubdevSelection>(b'V', 62);
