use super::media::*;
use super::video::*;
use super::{fixed_string, fourcc, fourcc_string};

// Request codes pinned against the values the kernel headers produce on a
// 64-bit build. A drift here means a struct layout changed size.
#[test]
fn video_request_codes_match_kernel_abi() {
    assert_eq!(VIDIOC_QUERYCAP, 0x8068_5600);
    assert_eq!(VIDIOC_S_FMT, 0xc0d0_5605);
    assert_eq!(VIDIOC_REQBUFS, 0xc014_5608);
    assert_eq!(VIDIOC_QBUF, 0xc058_560f);
    assert_eq!(VIDIOC_DQBUF, 0xc058_5611);
    assert_eq!(VIDIOC_STREAMON, 0x4004_5612);
    assert_eq!(VIDIOC_STREAMOFF, 0x4004_5613);
    assert_eq!(VIDIOC_S_CTRL, 0xc008_561c);
    assert_eq!(VIDIOC_SUBDEV_S_FMT, 0xc058_5605);
    assert_eq!(VIDIOC_SUBDEV_S_SELECTION, 0xc040_563e);
}

#[test]
fn media_request_codes_match_kernel_abi() {
    assert_eq!(MEDIA_IOC_DEVICE_INFO, 0xc100_7c00);
    assert_eq!(MEDIA_IOC_ENUM_ENTITIES, 0xc100_7c01);
    assert_eq!(MEDIA_IOC_ENUM_LINKS, 0xc028_7c02);
    assert_eq!(MEDIA_IOC_SETUP_LINK, 0xc034_7c03);
}

#[cfg(target_pointer_width = "64")]
#[test]
fn struct_sizes_match_kernel_abi() {
    assert_eq!(size_of::<V4l2Capability>(), 104);
    assert_eq!(size_of::<V4l2PlanePixFormat>(), 20);
    assert_eq!(size_of::<V4l2PixFormatMplane>(), 192);
    assert_eq!(size_of::<V4l2Format>(), 208);
    assert_eq!(size_of::<V4l2Plane>(), 64);
    assert_eq!(size_of::<V4l2Buffer>(), 88);
    assert_eq!(size_of::<V4l2RequestBuffers>(), 20);
    assert_eq!(size_of::<V4l2Control>(), 8);
    assert_eq!(size_of::<V4l2MbusFramefmt>(), 48);
    assert_eq!(size_of::<V4l2SubdevFormat>(), 88);
    assert_eq!(size_of::<V4l2Rect>(), 16);
    assert_eq!(size_of::<V4l2SubdevSelection>(), 64);

    assert_eq!(size_of::<MediaDeviceInfo>(), 256);
    assert_eq!(size_of::<MediaEntityDesc>(), 256);
    assert_eq!(size_of::<MediaPadDesc>(), 20);
    assert_eq!(size_of::<MediaLinkDesc>(), 52);
    assert_eq!(size_of::<MediaLinksEnum>(), 40);
}

#[cfg(target_pointer_width = "64")]
#[test]
fn union_members_land_at_kernel_offsets() {
    use std::mem::offset_of;

    assert_eq!(offset_of!(V4l2Format, pix_mp), 8);
    assert_eq!(offset_of!(V4l2Plane, m), 8);
    assert_eq!(offset_of!(V4l2Buffer, timestamp_sec), 24);
    assert_eq!(offset_of!(V4l2Buffer, m), 64);
    assert_eq!(offset_of!(V4l2Buffer, length), 72);
    assert_eq!(offset_of!(MediaEntityDesc, dev_major), 72);
    assert_eq!(offset_of!(MediaLinksEnum, pads), 8);
}

#[test]
fn fourcc_encodes_little_endian() {
    assert_eq!(fourcc(b'X', b'R', b'2', b'4'), 0x3432_5258);
    assert_eq!(fourcc_string(V4L2_PIX_FMT_NV12M), "NM12");
    assert_eq!(fourcc_string(V4L2_PIX_FMT_ABGR32), "AR24");
}

#[test]
fn fixed_string_stops_at_nul() {
    let mut raw = [0u8; 16];
    raw[..4].copy_from_slice(b"vsp2");
    assert_eq!(fixed_string(&raw), "vsp2");
    assert_eq!(fixed_string(&[0u8; 8]), "");
    assert_eq!(fixed_string(b"full-length-here"), "full-length-here");
}
