use std::cell::RefCell;
use std::os::fd::RawFd;
use std::rc::Rc;

use super::*;
use crate::device::MAX_PLANES;
use crate::device::fake::FakeBus;
use crate::topology::{self, TopologyLayout};

#[derive(Default)]
struct AllocLog {
    allocations: Vec<(u32, u32)>,
    released: Vec<RawFd>,
    handed_out: RawFd,
}

struct TestAllocator {
    log: Rc<RefCell<AllocLog>>,
}

impl ScratchAllocator for TestAllocator {
    fn allocate(&mut self, width: u32, height: u32) -> PlaneweaveResult<ScratchBuffer> {
        let mut log = self.log.borrow_mut();
        log.allocations.push((width, height));
        log.handed_out += 1;
        Ok(ScratchBuffer {
            dmabuf: 32 + log.handed_out,
            stride: width * 4,
        })
    }

    fn release(&mut self, buffer: ScratchBuffer) {
        self.log.borrow_mut().released.push(buffer.dmabuf);
    }
}

struct FailingAllocator;

impl ScratchAllocator for FailingAllocator {
    fn allocate(&mut self, _width: u32, _height: u32) -> PlaneweaveResult<ScratchBuffer> {
        Err(PlaneweaveError::validation("out of scratch memory"))
    }

    fn release(&mut self, _buffer: ScratchBuffer) {}
}

fn arbiter_with_log() -> (ScalerArbiter<FakeBus>, Rc<RefCell<AllocLog>>) {
    let mut bus = FakeBus::scaler_graph();
    let pipeline = topology::resolve_scaler(&mut bus, &TopologyLayout::vsp2()).unwrap();
    bus.clear_calls();
    let log = Rc::new(RefCell::new(AllocLog::default()));
    let allocator = TestAllocator {
        log: Rc::clone(&log),
    };
    (
        ScalerArbiter::new(vec![(bus, pipeline)], Box::new(allocator)),
        log,
    )
}

fn request(width: u32, height: u32, dst: Rect) -> DrawRequest {
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
        dst,
        opaque: false,
        alpha: 1.0,
    }
}

#[test]
fn matching_sizes_go_direct() {
    let src = Rect::sized(640, 480);
    let dst = Rect::new(10, 10, 640, 480);
    assert_eq!(decide(&src, &dst), ScaleDecision::Direct);
}

#[test]
fn size_change_needs_the_resizer() {
    let src = Rect::sized(640, 480);
    assert_eq!(decide(&src, &Rect::sized(320, 240)), ScaleDecision::Scale);
    assert_eq!(decide(&src, &Rect::sized(1280, 480)), ScaleDecision::Scale);
}

#[test]
fn sources_below_the_resizer_minimum_cannot_scale() {
    let dst = Rect::sized(64, 64);
    assert_eq!(decide(&Rect::sized(3, 64), &dst), ScaleDecision::TooSmall);
    assert_eq!(decide(&Rect::sized(64, 3), &dst), ScaleDecision::TooSmall);
    assert_eq!(decide(&Rect::sized(4, 4), &dst), ScaleDecision::Scale);
}

#[test]
fn scratch_grows_to_aligned_maxima_and_never_shrinks() {
    let (mut arbiter, log) = arbiter_with_log();

    arbiter.ensure_capacity(1920, 1080).unwrap();
    arbiter.ensure_capacity(1000, 500).unwrap();
    assert_eq!(log.borrow().allocations, vec![(1920, 1080)]);

    // Growing one axis keeps the other axis' maximum and realigns the width.
    arbiter.ensure_capacity(2000, 600).unwrap();
    assert_eq!(
        log.borrow().allocations,
        vec![(1920, 1080), (2016, 1080)],
    );
    assert_eq!(log.borrow().released, vec![33]);
}

#[test]
fn allocation_failure_surfaces() {
    let mut bus = FakeBus::scaler_graph();
    let pipeline = topology::resolve_scaler(&mut bus, &TopologyLayout::vsp2()).unwrap();
    let mut arbiter = ScalerArbiter::new(vec![(bus, pipeline)], Box::new(FailingAllocator));

    assert!(arbiter.ensure_capacity(1920, 1080).is_err());
}

#[test]
fn apply_programs_the_resizer_chain_in_order() {
    let (mut arbiter, _log) = arbiter_with_log();
    arbiter.ensure_capacity(1920, 1080).unwrap();
    let mut req = request(256, 128, Rect::new(10, 20, 128, 64));

    arbiter.scale(&mut req).unwrap();

    assert_eq!(
        arbiter.units[0].bus.calls,
        vec![
            "pad_fmt rpf.0:0 256x128 code=0x100d",
            "crop rpf.0:0 256x128@(0,0)",
            "pad_fmt rpf.0:1 256x128 code=0x100d",
            "pad_fmt uds.0:0 256x128 code=0x100d",
            "pad_fmt uds.0:1 128x64 code=0x100d",
            "pad_fmt wpf.0:0 128x64 code=0x100d",
            "reqbufs rpf.0 input feed 0",
            "s_fmt rpf.0 input feed 256x128 AR24 premul",
            "reqbufs rpf.0 input feed 1",
            "qbuf rpf.0 input feed n=1 fd=7 len=131072",
            "reqbufs wpf.0 output drain 0",
            "s_fmt wpf.0 output drain 128x64 AR24 premul",
            "reqbufs wpf.0 output drain 1",
            "qbuf wpf.0 output drain n=1 fd=33 len=491520",
            "stream_on rpf.0 input feed",
            "stream_on wpf.0 output drain",
            "dqbuf wpf.0 output drain",
            "stream_off wpf.0 output drain",
            "stream_off rpf.0 input feed",
        ],
    );
}

#[test]
fn apply_rewrites_the_request_onto_the_scratch_buffer() {
    let (mut arbiter, _log) = arbiter_with_log();
    arbiter.ensure_capacity(1920, 1080).unwrap();
    let mut req = request(256, 128, Rect::new(10, 20, 128, 64));
    req.opaque = true;
    req.alpha = 0.5;

    arbiter.scale(&mut req).unwrap();

    assert_eq!(req.width, 128);
    assert_eq!(req.height, 64);
    assert_eq!(req.num_planes, 1);
    assert_eq!(req.planes[0].fd, 33);
    assert_eq!(req.strides[0], 1920 * 4);
    assert_eq!(req.fourcc, video::V4L2_PIX_FMT_ABGR32);
    assert_eq!(req.src, Rect::sized(128, 64));
    assert_eq!(req.dst, Rect::new(10, 20, 128, 64));
    assert_eq!(req.min_block, (1, 1));
    assert!(req.opaque);
    assert_eq!(req.alpha, 0.5);
}

#[test]
fn feed_failures_abort_the_scale_pass() {
    let (mut arbiter, _log) = arbiter_with_log();
    arbiter.ensure_capacity(1920, 1080).unwrap();
    let mut req = request(256, 128, Rect::new(0, 0, 512, 256));
    arbiter.units[0].bus.fail_next_matching("stream_on rpf.0 input");

    assert!(arbiter.scale(&mut req).is_err());
    assert_eq!(arbiter.units[0].bus.count_matching("stream_off"), 0);
    assert!(!arbiter.exhausted());
}

#[test]
fn pool_exhausts_after_one_use_and_resets_on_flush() {
    let (mut arbiter, _log) = arbiter_with_log();
    arbiter.ensure_capacity(1920, 1080).unwrap();
    let mut req = request(256, 128, Rect::new(0, 0, 512, 256));

    assert!(!arbiter.exhausted());
    arbiter.scale(&mut req).unwrap();
    assert!(arbiter.exhausted());

    arbiter.reset();
    assert!(!arbiter.exhausted());
}

#[test]
fn dropping_the_pool_returns_scratch_to_the_allocator() {
    let (mut arbiter, log) = arbiter_with_log();
    arbiter.ensure_capacity(640, 480).unwrap();

    drop(arbiter);
    assert_eq!(log.borrow().released, vec![33]);
}
