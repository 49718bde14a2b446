use super::*;
use crate::compose::feasibility::OpaqueCoverage;
use crate::compose::scaler::ScratchBuffer;
use crate::device::fake::FakeBus;
use crate::format::DrmFourcc;
use crate::surface::PlaneDesc;

struct StaticAllocator;

impl ScratchAllocator for StaticAllocator {
    fn allocate(&mut self, width: u32, _height: u32) -> PlaneweaveResult<ScratchBuffer> {
        Ok(ScratchBuffer {
            dmabuf: 33,
            stride: width * 4,
        })
    }

    fn release(&mut self, _buffer: ScratchBuffer) {}
}

struct FailingAllocator;

impl ScratchAllocator for FailingAllocator {
    fn allocate(&mut self, _width: u32, _height: u32) -> PlaneweaveResult<ScratchBuffer> {
        Err(PlaneweaveError::validation("out of scratch memory"))
    }

    fn release(&mut self, _buffer: ScratchBuffer) {}
}

fn engine(inputs: usize) -> BlendEngine<FakeBus> {
    let mut engine = BlendEngine::with_bus(
        FakeBus::blend_graph(inputs),
        &PipelineConfig::default(),
        &TopologyLayout::vsp2(),
    )
    .unwrap();
    engine.bus.clear_calls();
    engine
}

fn scaled_engine(inputs: usize) -> BlendEngine<FakeBus> {
    let mut engine = engine(inputs);
    engine
        .attach_scaler(
            FakeBus::scaler_graph(),
            &TopologyLayout::vsp2(),
            Box::new(StaticAllocator),
        )
        .unwrap();
    engine
}

fn opaque_surface(width: u32, height: u32, dst: Rect) -> SurfaceState {
    let mut surface = SurfaceState::new();
    surface
        .attach_buffer(
            &[PlaneDesc {
                dmabuf: 7,
                stride: width * 4,
            }],
            width,
            height,
            DrmFourcc::ARGB8888,
        )
        .unwrap();
    surface.src_rect = Rect::sized(width, height);
    surface.dst_rect = dst;
    surface.opaque_src_rect = surface.src_rect;
    surface.opaque_dst_rect = dst;
    surface
}

fn target(width: u32, height: u32) -> OutputTarget {
    let mut output = OutputTarget::new(width, height).unwrap();
    output.set_buffer(PlaneDesc {
        dmabuf: 9,
        stride: width * 4,
    });
    output
}

#[test]
fn draw_outside_a_pass_is_a_validation_error() {
    let mut engine = engine(5);
    let surface = opaque_surface(64, 64, Rect::sized(64, 64));

    let err = engine.draw_view(&surface).unwrap_err();
    assert!(err.to_string().contains("validation"));
}

#[test]
fn begin_requires_an_output_buffer() {
    let mut engine = engine(5);
    let bare = OutputTarget::new(640, 480).unwrap();

    assert!(engine.begin_compose(&bare).is_err());
}

#[test]
fn output_format_is_programmed_once_per_geometry() {
    let mut engine = engine(5);
    let output = target(640, 480);

    engine.begin_compose(&output).unwrap();
    engine.finish_compose().unwrap();
    engine.begin_compose(&output).unwrap();
    engine.finish_compose().unwrap();
    assert_eq!(engine.bus.count_matching("s_fmt wpf.0 output drain"), 1);

    let mut wider_rows = OutputTarget::new(640, 480).unwrap();
    wider_rows.set_buffer(PlaneDesc {
        dmabuf: 9,
        stride: 4096,
    });
    engine.begin_compose(&wider_rows).unwrap();
    assert_eq!(engine.bus.count_matching("s_fmt wpf.0 output drain"), 2);
}

#[test]
fn bufferless_surfaces_are_skipped() {
    let mut engine = engine(5);
    engine.begin_compose(&target(640, 480)).unwrap();

    engine.draw_view(&SurfaceState::new()).unwrap();
    engine.finish_compose().unwrap();

    assert_eq!(engine.bus.count_matching("qbuf"), 0);
    assert_eq!(engine.bus.count_matching("dqbuf"), 0);
}

#[test]
fn degenerate_and_oversized_draws_produce_no_pass() {
    let mut engine = engine(5);
    engine.begin_compose(&target(640, 480)).unwrap();

    let mut offscreen = opaque_surface(64, 64, Rect::new(5, 5, 64, 64));
    offscreen.src_rect = Rect::new(-100, 0, 64, 64);
    offscreen.opaque_src_rect = offscreen.src_rect;
    engine.draw_view(&offscreen).unwrap();

    engine.finish_compose().unwrap();
    assert_eq!(engine.bus.count_matching("dqbuf"), 0);
}

#[test]
fn scaled_draw_without_a_resizer_is_dropped() {
    let mut engine = engine(5);
    engine.begin_compose(&target(640, 480)).unwrap();

    let surface = opaque_surface(64, 64, Rect::new(0, 0, 128, 128));
    engine.draw_view(&surface).unwrap();
    engine.finish_compose().unwrap();

    assert_eq!(engine.bus.count_matching("dqbuf"), 0);
}

#[test]
fn opaque_and_translucent_regions_split_into_two_draws() {
    let mut engine = engine(5);
    engine.begin_compose(&target(640, 480)).unwrap();

    let mut surface = opaque_surface(128, 128, Rect::new(0, 0, 128, 128));
    surface.opaque_src_rect = Rect::new(0, 0, 128, 64);
    surface.opaque_dst_rect = Rect::new(0, 0, 128, 64);
    engine.draw_view(&surface).unwrap();
    engine.finish_compose().unwrap();

    assert_eq!(engine.bus.count_matching("qbuf rpf"), 2);
    assert_eq!(
        engine.bus.matching("s_fmt rpf.0 input feed"),
        vec!["s_fmt rpf.0 input feed 128x128 AR24 premul"],
    );
    assert_eq!(
        engine.bus.matching("s_fmt rpf.1 input feed"),
        vec!["s_fmt rpf.1 input feed 128x128 XR24"],
    );
}

#[test]
fn fully_opaque_surfaces_draw_once() {
    let mut engine = engine(5);
    engine.begin_compose(&target(640, 480)).unwrap();

    engine
        .draw_view(&opaque_surface(64, 64, Rect::sized(64, 64)))
        .unwrap();
    engine.finish_compose().unwrap();

    assert_eq!(engine.bus.count_matching("qbuf rpf"), 1);
    assert_eq!(engine.bus.count_matching("dqbuf wpf.0 output"), 1);
}

#[test]
fn budget_overflow_flushes_and_resubmits_the_output() {
    let mut engine = engine(2);
    engine.begin_compose(&target(640, 480)).unwrap();

    engine
        .draw_view(&opaque_surface(64, 64, Rect::new(0, 0, 64, 64)))
        .unwrap();
    engine
        .draw_view(&opaque_surface(64, 64, Rect::new(64, 0, 64, 64)))
        .unwrap();
    // Budget reached: the first pass has already streamed.
    assert_eq!(engine.bus.count_matching("dqbuf wpf.0 output"), 1);

    engine
        .draw_view(&opaque_surface(64, 64, Rect::new(0, 64, 64, 64)))
        .unwrap();
    engine.finish_compose().unwrap();
    assert_eq!(engine.bus.count_matching("dqbuf wpf.0 output"), 2);

    // The second pass reads the composed output back through port 0.
    let port0_feeds = engine.bus.matching("qbuf rpf.0");
    assert_eq!(port0_feeds.len(), 2);
    assert!(port0_feeds[1].contains("fd=9"));
}

#[test]
fn window_translation_is_uniform_across_ports() {
    let mut engine = engine(2);
    engine.begin_compose(&target(640, 480)).unwrap();

    engine
        .draw_view(&opaque_surface(50, 50, Rect::new(100, 100, 50, 50)))
        .unwrap();
    engine
        .draw_view(&opaque_surface(50, 50, Rect::new(200, 200, 50, 50)))
        .unwrap();

    assert_eq!(
        engine.bus.matching("compose bru"),
        vec![
            "compose bru:0 50x50@(0,0)",
            "compose bru:1 50x50@(100,100)",
        ],
    );
    assert_eq!(
        engine.bus.matching("compose wpf.0:1"),
        vec!["compose wpf.0:1 150x150@(100,100)"],
    );
    assert_eq!(
        engine.bus.matching("pad_fmt bru:5"),
        vec!["pad_fmt bru:5 150x150 code=0x100d"],
    );
}

#[test]
fn background_is_cropped_to_the_new_window() {
    let mut engine = engine(2);
    engine.begin_compose(&target(640, 480)).unwrap();

    engine
        .draw_view(&opaque_surface(64, 64, Rect::new(0, 0, 64, 64)))
        .unwrap();
    engine
        .draw_view(&opaque_surface(64, 64, Rect::new(64, 0, 64, 64)))
        .unwrap();
    engine
        .draw_view(&opaque_surface(64, 64, Rect::new(32, 32, 64, 64)))
        .unwrap();
    engine.finish_compose().unwrap();

    // Second pass: the background reads only the dirty window and lands at
    // the window origin; the third surface shares that origin.
    assert_eq!(
        engine.bus.matching("crop rpf.0"),
        vec!["crop rpf.0:0 64x64@(0,0)", "crop rpf.0:0 64x64@(32,32)"],
    );
    assert_eq!(
        engine.bus.matching("compose bru:0"),
        vec!["compose bru:0 64x64@(0,0)", "compose bru:0 64x64@(0,0)"],
    );
    assert_eq!(
        engine.bus.matching("compose wpf.0:1"),
        vec![
            "compose wpf.0:1 128x64@(0,0)",
            "compose wpf.0:1 64x64@(32,32)",
        ],
    );
}

#[test]
fn scratch_failure_disables_the_resizer() {
    let mut engine = engine(5);
    engine
        .attach_scaler(
            FakeBus::scaler_graph(),
            &TopologyLayout::vsp2(),
            Box::new(FailingAllocator),
        )
        .unwrap();
    assert!(engine.scaler_attached());

    engine.begin_compose(&target(640, 480)).unwrap();
    assert!(!engine.scaler_attached());
}

#[test]
fn scaler_exhaustion_flushes_before_widening_the_window() {
    let mut engine = scaled_engine(5);
    engine.begin_compose(&target(640, 480)).unwrap();

    engine
        .draw_view(&opaque_surface(64, 64, Rect::new(0, 0, 128, 128)))
        .unwrap();
    engine
        .draw_view(&opaque_surface(64, 64, Rect::new(128, 0, 128, 128)))
        .unwrap();
    engine.finish_compose().unwrap();

    // Two passes: the single resizer unit forces an early flush whose
    // window covers only the first draw.
    assert_eq!(engine.bus.count_matching("dqbuf wpf.0 output"), 2);
    assert_eq!(
        engine.bus.matching("compose wpf.0:1"),
        vec![
            "compose wpf.0:1 128x128@(0,0)",
            "compose wpf.0:1 128x128@(128,0)",
        ],
    );

    // Scaled draws feed from the scratch buffer; the background from the
    // output buffer.
    assert!(engine.bus.matching("qbuf rpf.0")[0].contains("fd=33"));
    assert!(engine.bus.matching("qbuf rpf.0")[1].contains("fd=9"));
    assert!(engine.bus.matching("qbuf rpf.1")[0].contains("fd=33"));
}

#[test]
fn finish_reports_a_failed_pass_but_returns_to_idle() {
    let mut engine = engine(5);
    engine.begin_compose(&target(640, 480)).unwrap();
    engine
        .draw_view(&opaque_surface(64, 64, Rect::sized(64, 64)))
        .unwrap();
    engine.bus.fail_next_matching("dqbuf wpf.0");

    assert!(engine.finish_compose().is_err());

    // The engine is idle and reusable.
    let surface = opaque_surface(64, 64, Rect::sized(64, 64));
    assert!(engine.draw_view(&surface).is_err());
    engine.begin_compose(&target(640, 480)).unwrap();
    engine.draw_view(&surface).unwrap();
    engine.finish_compose().unwrap();
}

#[test]
fn plan_frame_reflects_the_attached_resizer() {
    let engine_plain = engine(5);
    let scaled = ViewPlan {
        alpha: 1.0,
        opaque_coverage: OpaqueCoverage::Full,
        rotated: false,
        scale_x: 0.5,
        scale_y: 0.5,
    };
    assert!(matches!(
        engine_plain.plan_frame(&[scaled]),
        CompositionPath::Software { .. }
    ));

    let engine_scaled = scaled_engine(5);
    assert_eq!(engine_scaled.plan_frame(&[scaled]), CompositionPath::Hardware);
}

#[test]
fn capabilities_are_empty() {
    assert_eq!(engine(5).capabilities(), 0);
}
