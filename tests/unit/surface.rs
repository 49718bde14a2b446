use super::*;
use crate::wire::video;

fn plane(fd: RawFd, stride: u32) -> PlaneDesc {
    PlaneDesc { dmabuf: fd, stride }
}

#[test]
fn new_surface_is_fully_opaque_and_bufferless() {
    let surface = SurfaceState::new();
    assert_eq!(surface.alpha, 1.0);
    assert!(!surface.has_buffer());
    assert!(surface.src_rect.is_empty());
}

#[test]
fn attach_precomputes_single_plane_length() {
    let mut surface = SurfaceState::new();
    surface
        .attach_buffer(&[plane(7, 1024 * 4)], 1024, 768, DrmFourcc::ARGB8888)
        .unwrap();

    let params = surface.params().unwrap();
    assert_eq!(params.num_planes, 1);
    assert_eq!(params.device_fourcc, video::V4L2_PIX_FMT_ABGR32);
    assert_eq!(params.mbus, video::MEDIA_BUS_FMT_ARGB8888_1X32);
    assert_eq!(params.min_block, (1, 1));
    assert_eq!(params.planes[0].fd, 7);
    assert_eq!(params.planes[0].length, 1024 * 4 * 768);
}

#[test]
fn attach_halves_chroma_rows_for_two_plane_420() {
    let mut surface = SurfaceState::new();
    surface
        .attach_buffer(&[plane(3, 1920), plane(4, 1920)], 1920, 1080, DrmFourcc::NV12)
        .unwrap();

    let params = surface.params().unwrap();
    assert_eq!(params.min_block, (2, 2));
    assert_eq!(params.planes[0].length, 1920 * 1080);
    assert_eq!(params.planes[1].length, 1920 * 540);
}

#[test]
fn attach_halves_both_chroma_planes_for_three_plane_420() {
    let mut surface = SurfaceState::new();
    surface
        .attach_buffer(
            &[plane(3, 640), plane(4, 320), plane(5, 320)],
            640,
            480,
            DrmFourcc::YUV420,
        )
        .unwrap();

    let params = surface.params().unwrap();
    assert_eq!(params.planes[0].length, 640 * 480);
    assert_eq!(params.planes[1].length, 320 * 240);
    assert_eq!(params.planes[2].length, 320 * 240);
}

#[test]
fn attach_rejects_plane_count_mismatch() {
    let mut surface = SurfaceState::new();
    let err = surface
        .attach_buffer(&[plane(3, 1920), plane(4, 1920)], 1920, 1080, DrmFourcc::ARGB8888)
        .unwrap_err();
    assert!(err.to_string().contains("unsupported pixel format"), "{err}");
    assert!(!surface.has_buffer());
}

#[test]
fn attach_rejects_oversized_buffers() {
    let mut surface = SurfaceState::new();
    let err = surface
        .attach_buffer(&[plane(3, 8192 * 4)], 8191, 100, DrmFourcc::ARGB8888)
        .unwrap_err();
    assert!(err.to_string().contains("addressable range"), "{err}");
}

#[test]
fn release_detaches_without_touching_geometry() {
    let mut surface = SurfaceState::new();
    surface.dst_rect = Rect::sized(100, 100);
    surface
        .attach_buffer(&[plane(3, 256 * 4)], 256, 256, DrmFourcc::XRGB8888)
        .unwrap();
    surface.release_buffer();
    assert!(!surface.has_buffer());
    assert_eq!(surface.dst_rect, Rect::sized(100, 100));
}

#[test]
fn output_target_validates_dimensions() {
    assert!(OutputTarget::new(1920, 1080).is_ok());
    assert!(OutputTarget::new(0, 1080).is_err());
    assert!(OutputTarget::new(8191, 1080).is_err());
}

#[test]
fn output_target_carries_the_frame_buffer() {
    let mut output = OutputTarget::new(1920, 1080).unwrap();
    assert!(output.plane().is_none());
    output.set_buffer(plane(8, 1920 * 4));
    assert_eq!(output.plane().unwrap().dmabuf, 8);
}
