//! Device access seam.
//!
//! Everything the engine does to hardware goes through [`MediaBus`]: one
//! trait covering the media-controller graph requests and the per-node V4L2
//! requests. [`kernel::KernelBus`] implements it with real `ioctl`s; the
//! `testing` feature adds a scripted in-memory implementation with an
//! ordered call journal.

use std::os::fd::RawFd;

use crate::foundation::error::PlaneweaveResult;
use crate::foundation::geom::Rect;
use crate::wire::video;

pub mod kernel;
pub(crate) mod queue;

#[cfg(any(test, feature = "testing"))]
pub mod fake;

/// Largest plane count across the supported buffer layouts.
pub const MAX_PLANES: usize = 3;

/// Opaque handle to an opened device node, valid for the bus that issued it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeHandle(u32);

impl NodeHandle {
    pub(crate) const fn new(index: u32) -> Self {
        Self(index)
    }

    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Which half of a memory-to-memory node a request addresses.
///
/// `Feed` is the buffer direction userspace fills (device reads), `Drain`
/// the direction the device writes back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamDirection {
    /// Userspace-to-device buffers.
    Feed,
    /// Device-to-userspace buffers.
    Drain,
}

impl StreamDirection {
    pub(crate) const fn buf_type(self) -> u32 {
        match self {
            StreamDirection::Feed => video::V4L2_BUF_TYPE_VIDEO_OUTPUT_MPLANE,
            StreamDirection::Drain => video::V4L2_BUF_TYPE_VIDEO_CAPTURE_MPLANE,
        }
    }
}

impl std::fmt::Display for StreamDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            StreamDirection::Feed => "feed",
            StreamDirection::Drain => "drain",
        })
    }
}

/// Identity block of a media device.
#[derive(Clone, Debug)]
pub struct DeviceInfo {
    /// Driver name.
    pub driver: String,
    /// Hardware model string, used to match the expected pipeline family.
    pub model: String,
    /// Serial number, if the driver reports one.
    pub serial: String,
    /// Bus location string.
    pub bus_info: String,
    /// Media API version the kernel speaks.
    pub media_version: u32,
}

/// Coarse classification of a media entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityKind {
    /// A V4L2 video device node that can stream buffers.
    VideoNode,
    /// A V4L2 sub-device exposing pad configuration.
    Subdev,
    /// Anything else in the graph.
    Other,
}

/// One entity discovered in the media graph.
#[derive(Clone, Debug)]
pub struct EntityInfo {
    /// Graph-unique entity id.
    pub id: u32,
    /// Entity name as reported by the driver.
    pub name: String,
    /// Coarse entity classification.
    pub kind: EntityKind,
    /// Backing character device numbers, when the entity has a node.
    pub dev: Option<(u32, u32)>,
    /// Number of pads.
    pub pads: u16,
    /// Number of outbound links.
    pub links: u16,
}

/// A pad addressed by entity id and pad index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PadRef {
    /// Entity id.
    pub entity: u32,
    /// Pad index within the entity.
    pub index: u16,
}

/// A directed link between two pads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinkInfo {
    /// Source pad.
    pub source: PadRef,
    /// Sink pad.
    pub sink: PadRef,
    /// Whether the link currently carries data.
    pub enabled: bool,
    /// Immutable links cannot be changed and are skipped during resets.
    pub immutable: bool,
}

/// Capability bits of a video node.
#[derive(Clone, Copy, Debug)]
pub struct NodeCaps {
    /// Raw capability dword.
    pub capabilities: u32,
}

impl NodeCaps {
    /// Node accepts multi-planar buffers in the feed direction.
    pub fn mplane_feed(&self) -> bool {
        self.capabilities & (video::V4L2_CAP_VIDEO_OUTPUT_MPLANE | video::V4L2_CAP_VIDEO_OUTPUT)
            != 0
    }

    /// Node produces multi-planar buffers in the drain direction.
    pub fn mplane_drain(&self) -> bool {
        self.capabilities & (video::V4L2_CAP_VIDEO_CAPTURE_MPLANE | video::V4L2_CAP_VIDEO_CAPTURE)
            != 0
    }

    /// Node supports streaming I/O.
    pub fn streaming(&self) -> bool {
        self.capabilities & video::V4L2_CAP_STREAMING != 0
    }
}

/// Multi-planar pixel format programmed on a video node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixFormat {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Device (V4L2) pixel format code.
    pub fourcc: u32,
    /// Whether pixel values are alpha-premultiplied.
    pub premul: bool,
    /// Number of memory planes.
    pub num_planes: usize,
    /// Line stride per plane, in bytes.
    pub strides: [u32; MAX_PLANES],
}

/// Media-bus frame format programmed on a sub-device pad.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PadFormat {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Media-bus pixel code.
    pub code: u32,
}

/// Selection rectangle targets on a sub-device pad.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionTarget {
    /// Source crop applied on a sink pad.
    Crop,
    /// Composition window applied on a source pad.
    Compose,
}

impl SelectionTarget {
    pub(crate) const fn wire_target(self) -> u32 {
        match self {
            SelectionTarget::Crop => video::V4L2_SEL_TGT_CROP,
            SelectionTarget::Compose => video::V4L2_SEL_TGT_COMPOSE,
        }
    }
}

impl std::fmt::Display for SelectionTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SelectionTarget::Crop => "crop",
            SelectionTarget::Compose => "compose",
        })
    }
}

/// One plane of a dmabuf-backed buffer, ready to queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueuedPlane {
    /// dmabuf file descriptor. Borrowed for the duration of the pass; the
    /// crate never duplicates or closes it.
    pub fd: RawFd,
    /// Plane payload size in bytes.
    pub length: u32,
}

/// Uniform access to a media device and the V4L2 nodes hanging off it.
///
/// One instance covers one media graph. Handles returned by
/// [`open_node`](MediaBus::open_node) stay valid for the lifetime of the
/// bus. All methods are synchronous; `dequeue_buffer` blocks until the
/// device finishes the pass.
pub trait MediaBus {
    /// Reads the device identity block.
    fn device_info(&mut self) -> PlaneweaveResult<DeviceInfo>;

    /// Returns the entity following `after` in enumeration order, or the
    /// first entity when `after` is `None`. `Ok(None)` marks the end.
    fn next_entity(&mut self, after: Option<u32>) -> PlaneweaveResult<Option<EntityInfo>>;

    /// Lists the outbound links of an entity.
    fn entity_links(&mut self, entity: &EntityInfo) -> PlaneweaveResult<Vec<LinkInfo>>;

    /// Applies the `enabled` flag of `link` to the device graph.
    fn setup_link(&mut self, link: &LinkInfo) -> PlaneweaveResult<()>;

    /// Opens the character device behind an entity.
    fn open_node(&mut self, entity: &EntityInfo) -> PlaneweaveResult<NodeHandle>;

    /// Queries the capability bits of a video node.
    fn node_capabilities(&mut self, node: NodeHandle) -> PlaneweaveResult<NodeCaps>;

    /// Programs the pixel format of one direction of a video node.
    fn set_pix_format(
        &mut self,
        node: NodeHandle,
        dir: StreamDirection,
        fmt: &PixFormat,
    ) -> PlaneweaveResult<()>;

    /// Sets the buffer count of one direction of a video node. Count 0
    /// releases previously allocated buffer slots.
    fn request_buffers(
        &mut self,
        node: NodeHandle,
        dir: StreamDirection,
        count: u32,
    ) -> PlaneweaveResult<()>;

    /// Queues buffer slot 0 with the given planes.
    fn queue_buffer(
        &mut self,
        node: NodeHandle,
        dir: StreamDirection,
        planes: &[QueuedPlane],
    ) -> PlaneweaveResult<()>;

    /// Dequeues buffer slot 0, blocking until the device is done with it.
    fn dequeue_buffer(&mut self, node: NodeHandle, dir: StreamDirection) -> PlaneweaveResult<()>;

    /// Starts streaming one direction of a video node.
    fn stream_on(&mut self, node: NodeHandle, dir: StreamDirection) -> PlaneweaveResult<()>;

    /// Stops streaming one direction of a video node.
    fn stream_off(&mut self, node: NodeHandle, dir: StreamDirection) -> PlaneweaveResult<()>;

    /// Programs the active frame format on a sub-device pad and returns the
    /// format the driver actually selected.
    fn set_subdev_format(
        &mut self,
        node: NodeHandle,
        pad: u32,
        fmt: &PadFormat,
    ) -> PlaneweaveResult<PadFormat>;

    /// Programs a selection rectangle on a sub-device pad and returns the
    /// rectangle the driver actually selected.
    fn set_subdev_selection(
        &mut self,
        node: NodeHandle,
        pad: u32,
        target: SelectionTarget,
        rect: Rect,
    ) -> PlaneweaveResult<Rect>;

    /// Sets a control value on a sub-device.
    fn set_control(&mut self, node: NodeHandle, ctrl: u32, value: i32) -> PlaneweaveResult<()>;
}
