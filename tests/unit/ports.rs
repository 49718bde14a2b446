use super::*;
use crate::config::PipelineConfig;
use crate::device::fake::FakeBus;
use crate::topology::{self, ResolvedPipeline, TopologyLayout};

fn request(width: u32, height: u32) -> DrawRequest {
    DrawRequest {
        planes: [QueuedPlane {
            fd: 7,
            length: width * height * 4,
        }; MAX_PLANES],
        num_planes: 1,
        strides: [width * 4, 0, 0],
        width,
        height,
        fourcc: video::V4L2_PIX_FMT_ABGR32,
        mbus: video::MEDIA_BUS_FMT_ARGB8888_1X32,
        min_block: (1, 1),
        src: Rect::sized(width, height),
        dst: Rect::new(10, 20, width, height),
        opaque: false,
        alpha: 1.0,
    }
}

fn resolved(bus: &mut FakeBus) -> ResolvedPipeline {
    let pipeline = topology::resolve(bus, &TopologyLayout::vsp2(), &PipelineConfig::default())
        .unwrap();
    bus.clear_calls();
    pipeline
}

#[test]
fn clamp_shifts_and_shrinks_the_destination() {
    let mut src = Rect::new(-5, -3, 20, 15);
    let mut dst = Rect::new(100, 200, 20, 15);
    clamp_request(&mut src, &mut dst);

    assert_eq!(src, Rect::new(0, 0, 15, 12));
    assert_eq!(dst, Rect::new(105, 203, 15, 12));
}

#[test]
fn clamp_leaves_on_buffer_rectangles_alone() {
    let mut src = Rect::new(4, 6, 20, 15);
    let mut dst = Rect::new(100, 200, 20, 15);
    clamp_request(&mut src, &mut dst);

    assert_eq!(src, Rect::new(4, 6, 20, 15));
    assert_eq!(dst, Rect::new(100, 200, 20, 15));
}

#[test]
fn fully_offscreen_source_is_degenerate() {
    let mut req = request(64, 64);
    req.src = Rect::new(-80, 0, 64, 64);

    assert_eq!(admit(&mut req), Err(Rejection::Degenerate));
    assert_eq!(req.src.width, 0);
}

#[test]
fn sub_block_source_is_degenerate_for_subsampled_formats() {
    let mut req = request(64, 64);
    req.min_block = (2, 2);
    req.src = Rect::new(0, 0, 1, 8);

    assert_eq!(admit(&mut req), Err(Rejection::Degenerate));
}

#[test]
fn source_beyond_the_addressable_range_is_rejected() {
    let mut req = request(MAX_DIMENSION + 1, 32);
    req.src = Rect::sized(MAX_DIMENSION + 1, 32);

    assert_eq!(admit(&mut req), Err(Rejection::Oversized));

    let mut widest = request(MAX_DIMENSION, 32);
    widest.src = Rect::sized(MAX_DIMENSION, 32);
    assert_eq!(admit(&mut widest), Ok(()));
}

#[test]
fn alpha_component_rounds_to_nearest_and_clamps() {
    assert_eq!(alpha_component(1.0), 255);
    assert_eq!(alpha_component(0.5), 128);
    assert_eq!(alpha_component(0.0), 0);
    assert_eq!(alpha_component(-0.5), 0);
    assert_eq!(alpha_component(1.5), 255);
}

#[test]
fn enable_port_programs_in_driver_order() {
    let mut bus = FakeBus::blend_graph(2);
    let pipeline = resolved(&mut bus);
    let mut req = request(256, 128);

    enable_port(&mut bus, &pipeline.ports[0], pipeline.blend, &mut req).unwrap();

    assert_eq!(
        bus.calls,
        vec![
            "link rpf.0:1->bru:0 on",
            "reqbufs rpf.0 input feed 0",
            "s_fmt rpf.0 input feed 256x128 AR24 premul",
            "pad_fmt rpf.0:0 256x128 code=0x100d",
            "ctrl rpf.0 id=0x980929 val=255",
            "crop rpf.0:0 256x128@(0,0)",
            "pad_fmt rpf.0:1 256x128 code=0x100d",
            "pad_fmt bru:0 256x128 code=0x100d",
            "compose bru:0 256x128@(10,20)",
            "reqbufs rpf.0 input feed 1",
            "qbuf rpf.0 input feed n=1 fd=7 len=131072",
        ],
    );
    assert!(bus.link_enabled("rpf.0", "bru"));
}

#[test]
fn opaque_draws_use_the_alphaless_variant() {
    let mut bus = FakeBus::blend_graph(2);
    let pipeline = resolved(&mut bus);
    let mut req = request(256, 128);
    req.opaque = true;

    enable_port(&mut bus, &pipeline.ports[0], pipeline.blend, &mut req).unwrap();

    assert_eq!(
        bus.matching("s_fmt"),
        vec!["s_fmt rpf.0 input feed 256x128 XR24"],
    );
}

#[test]
fn driver_adjusted_crop_feeds_the_downstream_pads() {
    let mut bus = FakeBus::blend_graph(2);
    let pipeline = resolved(&mut bus);
    let mut req = request(256, 128);
    req.src = Rect::new(3, 1, 200, 100);
    bus.adjust_next_crop(Rect::new(2, 0, 202, 102));

    enable_port(&mut bus, &pipeline.ports[0], pipeline.blend, &mut req).unwrap();

    assert_eq!(req.src, Rect::new(2, 0, 202, 102));
    assert_eq!(
        bus.matching("pad_fmt rpf.0:1"),
        vec!["pad_fmt rpf.0:1 202x102 code=0x100d"],
    );
    assert_eq!(
        bus.matching("pad_fmt bru:0"),
        vec!["pad_fmt bru:0 202x102 code=0x100d"],
    );
}

#[test]
fn second_port_lands_on_its_own_blend_pad() {
    let mut bus = FakeBus::blend_graph(2);
    let pipeline = resolved(&mut bus);
    let mut req = request(64, 64);
    req.dst = Rect::new(-8, 4, 64, 64);

    enable_port(&mut bus, &pipeline.ports[1], pipeline.blend, &mut req).unwrap();

    assert_eq!(
        bus.matching("compose"),
        vec!["compose bru:1 64x64@(-8,4)"],
    );
}

#[test]
fn disable_port_detaches_link_and_releases_buffers() {
    let mut bus = FakeBus::blend_graph(2);
    let pipeline = resolved(&mut bus);
    let mut req = request(64, 64);
    enable_port(&mut bus, &pipeline.ports[0], pipeline.blend, &mut req).unwrap();
    bus.clear_calls();

    disable_port(&mut bus, &pipeline.ports[0]).unwrap();

    assert_eq!(
        bus.calls,
        vec!["link rpf.0:1->bru:0 off", "reqbufs rpf.0 input feed 0"],
    );
    assert!(!bus.link_enabled("rpf.0", "bru"));
}
