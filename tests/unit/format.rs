use super::*;
use crate::wire::video;

#[test]
fn rgb_formats_map_to_swizzled_device_formats() {
    let info = lookup(DrmFourcc::XRGB8888, 1).unwrap();
    assert_eq!(info.device, video::V4L2_PIX_FMT_XBGR32);
    assert_eq!(info.mbus, video::MEDIA_BUS_FMT_ARGB8888_1X32);
    assert!(!info.subsampled);

    let info = lookup(DrmFourcc::BGRA8888, 1).unwrap();
    assert_eq!(info.device, video::V4L2_PIX_FMT_ARGB32);

    // Same-order formats keep their name across the boundary.
    let info = lookup(DrmFourcc::RGB888, 1).unwrap();
    assert_eq!(info.device, video::V4L2_PIX_FMT_RGB24);
}

#[test]
fn yuv_formats_use_the_yuv_bus_code_and_sampled_blocks() {
    for drm in [
        DrmFourcc::YUYV,
        DrmFourcc::NV12,
        DrmFourcc::YUV420,
        DrmFourcc::YUV444,
    ] {
        let planes = match drm {
            DrmFourcc::YUYV => 1,
            DrmFourcc::NV12 => 2,
            _ => 3,
        };
        let info = lookup(drm, planes).unwrap();
        assert_eq!(info.mbus, video::MEDIA_BUS_FMT_AYUV8_1X32, "{drm}");
        assert!(info.subsampled, "{drm}");
        assert_eq!(info.min_block(), (2, 2), "{drm}");
    }
    assert_eq!(lookup(DrmFourcc::ARGB8888, 1).unwrap().min_block(), (1, 1));
}

#[test]
fn plane_count_must_match_layout() {
    assert!(is_supported(DrmFourcc::NV12, 2));
    assert!(!is_supported(DrmFourcc::NV12, 1));
    assert!(!is_supported(DrmFourcc::NV12, 3));
    assert!(is_supported(DrmFourcc::YUV420, 3));
    assert!(!is_supported(DrmFourcc::YUV420, 2));
    assert!(is_supported(DrmFourcc::XRGB8888, 1));
    // Unknown fourcc.
    assert!(!is_supported(DrmFourcc(0), 1));
}

#[test]
fn opaque_draws_swap_to_alpha_free_siblings() {
    assert_eq!(
        effective_device_format(video::V4L2_PIX_FMT_ABGR32, true),
        (video::V4L2_PIX_FMT_XBGR32, false)
    );
    assert_eq!(
        effective_device_format(video::V4L2_PIX_FMT_ABGR32, false),
        (video::V4L2_PIX_FMT_ABGR32, true)
    );
    assert_eq!(
        effective_device_format(video::V4L2_PIX_FMT_ARGB32, true),
        (video::V4L2_PIX_FMT_XRGB32, false)
    );
    assert_eq!(
        effective_device_format(video::V4L2_PIX_FMT_ARGB32, false),
        (video::V4L2_PIX_FMT_ARGB32, true)
    );
    // Alpha-free formats pass through without the premultiplied flag.
    assert_eq!(
        effective_device_format(video::V4L2_PIX_FMT_RGB565, false),
        (video::V4L2_PIX_FMT_RGB565, false)
    );
}

#[test]
fn plane_heights_follow_chroma_layout() {
    // 4:2:0 halves the chroma rows.
    assert_eq!(plane_height(video::V4L2_PIX_FMT_NV12M, 0, 100), 100);
    assert_eq!(plane_height(video::V4L2_PIX_FMT_NV12M, 1, 100), 50);
    assert_eq!(plane_height(video::V4L2_PIX_FMT_YUV420M, 2, 100), 50);
    // 4:2:2 and 4:4:4 keep full-height chroma planes.
    assert_eq!(plane_height(video::V4L2_PIX_FMT_NV16M, 1, 100), 100);
    assert_eq!(plane_height(video::V4L2_PIX_FMT_YUV444M, 2, 100), 100);
    // Single-plane formats have no chroma planes.
    assert_eq!(plane_height(video::V4L2_PIX_FMT_ABGR32, 1, 100), 0);
    assert_eq!(plane_height(video::V4L2_PIX_FMT_YUYV, 1, 100), 0);
}

#[test]
fn fourcc_display_is_readable() {
    assert_eq!(DrmFourcc::NV12.to_string(), "NV12");
    assert_eq!(format!("{:?}", DrmFourcc::XRGB8888), "DrmFourcc(XR24)");
}
