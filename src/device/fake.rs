//! Scripted in-memory [`MediaBus`] with an ordered call journal.
//!
//! Built for driving the engine without hardware: tests assemble a media
//! graph with the `add_*` helpers (or the canonical [`FakeBus::blend_graph`]
//! and [`FakeBus::scaler_graph`] constructors), run the engine against it,
//! and assert on the journal of mutating requests in [`FakeBus::calls`].
//! Read-only requests (identity, enumeration, capabilities) are not
//! journaled.

use std::io;

use crate::foundation::error::{PlaneweaveError, PlaneweaveResult};
use crate::foundation::geom::Rect;
use crate::wire::fourcc_string;

use super::{
    DeviceInfo, EntityInfo, EntityKind, LinkInfo, MediaBus, NodeCaps, NodeHandle, PadFormat,
    PadRef, PixFormat, QueuedPlane, SelectionTarget, StreamDirection,
};

/// In-memory [`MediaBus`] double.
pub struct FakeBus {
    info: DeviceInfo,
    entities: Vec<EntityInfo>,
    links: Vec<LinkInfo>,
    opened: Vec<u32>,
    next_id: u32,
    /// Ordered journal of every mutating request, in a stable text form.
    pub calls: Vec<String>,
    fail_next: Option<String>,
    crop_override: Option<Rect>,
    pad_code_override: Option<u32>,
}

impl FakeBus {
    /// An empty graph whose device model matches the default layout family.
    pub fn new() -> Self {
        Self {
            info: DeviceInfo {
                driver: "planeweave-fake".into(),
                model: "VSP2".into(),
                serial: String::new(),
                bus_info: "platform:fake".into(),
                media_version: 0x0004_0000,
            },
            entities: Vec::new(),
            links: Vec::new(),
            opened: Vec::new(),
            next_id: 1,
            calls: Vec::new(),
            fail_next: None,
            crop_override: None,
            pad_code_override: None,
        }
    }

    /// Overrides the reported hardware model string.
    pub fn set_model(&mut self, model: &str) {
        self.info.model = model.to_owned();
    }

    /// Adds a video device node entity and returns its id.
    pub fn add_video_node(&mut self, name: &str) -> u32 {
        self.add_entity(name, EntityKind::VideoNode, 4)
    }

    /// Adds a sub-device entity with `pads` pads and returns its id.
    pub fn add_subdev(&mut self, name: &str, pads: u16) -> u32 {
        self.add_entity(name, EntityKind::Subdev, pads)
    }

    fn add_entity(&mut self, name: &str, kind: EntityKind, pads: u16) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.entities.push(EntityInfo {
            id,
            name: name.to_owned(),
            kind,
            dev: Some((81, id)),
            pads,
            links: 0,
        });
        id
    }

    /// Adds a directed link between `(entity, pad)` endpoints.
    pub fn add_link(&mut self, source: (u32, u16), sink: (u32, u16), enabled: bool, immutable: bool) {
        self.links.push(LinkInfo {
            source: PadRef {
                entity: source.0,
                index: source.1,
            },
            sink: PadRef {
                entity: sink.0,
                index: sink.1,
            },
            enabled,
            immutable,
        });
        if let Some(entity) = self.entities.iter_mut().find(|e| e.id == source.0) {
            entity.links += 1;
        }
    }

    /// The canonical blend graph: `inputs` input ports (up to the hardware's
    /// five) feeding a six-pad blend unit with a writeback output.
    pub fn blend_graph(inputs: usize) -> Self {
        assert!(inputs <= 5, "the canonical blend unit has five sink pads");
        let mut bus = Self::new();
        let mut ports = Vec::new();
        for i in 0..inputs {
            let video = bus.add_video_node(&format!("rpf.{i} input"));
            let subdev = bus.add_subdev(&format!("rpf.{i}"), 2);
            bus.add_link((video, 0), (subdev, 0), true, true);
            ports.push(subdev);
        }
        let blend = bus.add_subdev("bru", 6);
        for (i, &port) in ports.iter().enumerate() {
            bus.add_link((port, 1), (blend, i as u16), false, false);
        }
        let writeback = bus.add_subdev("wpf.0", 2);
        bus.add_link((blend, 5), (writeback, 0), false, false);
        let writeback_video = bus.add_video_node("wpf.0 output");
        bus.add_link((writeback, 1), (writeback_video, 0), true, true);
        bus
    }

    /// The canonical scaler graph: one input port, a resizer, a writeback
    /// output.
    pub fn scaler_graph() -> Self {
        let mut bus = Self::new();
        let video = bus.add_video_node("rpf.0 input");
        let port = bus.add_subdev("rpf.0", 2);
        bus.add_link((video, 0), (port, 0), true, true);
        let resizer = bus.add_subdev("uds.0", 2);
        bus.add_link((port, 1), (resizer, 0), false, false);
        let writeback = bus.add_subdev("wpf.0", 2);
        bus.add_link((resizer, 1), (writeback, 0), false, false);
        let writeback_video = bus.add_video_node("wpf.0 output");
        bus.add_link((writeback, 1), (writeback_video, 0), true, true);
        bus
    }

    /// Journal entries containing `needle`, in order.
    pub fn matching(&self, needle: &str) -> Vec<&str> {
        self.calls
            .iter()
            .filter(|line| line.contains(needle))
            .map(String::as_str)
            .collect()
    }

    /// Number of journal entries containing `needle`.
    pub fn count_matching(&self, needle: &str) -> usize {
        self.matching(needle).len()
    }

    /// Drops the journal, keeping the graph state.
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Fails the next journaled request whose text contains `needle`.
    pub fn fail_next_matching(&mut self, needle: &str) {
        self.fail_next = Some(needle.to_owned());
    }

    /// Makes the next crop request return `rect` instead of echoing the
    /// requested rectangle, imitating driver alignment.
    pub fn adjust_next_crop(&mut self, rect: Rect) {
        self.crop_override = Some(rect);
    }

    /// Makes the next pad format request return `code`, imitating a pad
    /// that rejects the requested media-bus code.
    pub fn force_next_pad_code(&mut self, code: u32) {
        self.pad_code_override = Some(code);
    }

    /// Whether the unique link from `source_name` to `sink_name` is
    /// currently enabled. Panics if no such link exists.
    pub fn link_enabled(&self, source_name: &str, sink_name: &str) -> bool {
        let source = self.id_of(source_name);
        let sink = self.id_of(sink_name);
        self.links
            .iter()
            .find(|l| l.source.entity == source && l.sink.entity == sink)
            .unwrap_or_else(|| panic!("no link {source_name} -> {sink_name}"))
            .enabled
    }

    fn id_of(&self, name: &str) -> u32 {
        self.entities
            .iter()
            .find(|e| e.name == name)
            .unwrap_or_else(|| panic!("no entity named {name}"))
            .id
    }

    fn entity_name(&self, id: u32) -> &str {
        self.entities
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.name.as_str())
            .unwrap_or("?")
    }

    fn node_label(&self, node: NodeHandle) -> String {
        self.opened
            .get(node.index())
            .map(|&id| self.entity_name(id).to_owned())
            .unwrap_or_else(|| "?".to_owned())
    }

    fn record(&mut self, line: String) -> PlaneweaveResult<()> {
        self.calls.push(line.clone());
        if let Some(needle) = &self.fail_next {
            if line.contains(needle.as_str()) {
                self.fail_next = None;
                return Err(PlaneweaveError::device(
                    "scripted fault",
                    io::Error::other(line),
                ));
            }
        }
        Ok(())
    }
}

impl Default for FakeBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaBus for FakeBus {
    fn device_info(&mut self) -> PlaneweaveResult<DeviceInfo> {
        Ok(self.info.clone())
    }

    fn next_entity(&mut self, after: Option<u32>) -> PlaneweaveResult<Option<EntityInfo>> {
        let next = match after {
            None => self.entities.first(),
            Some(id) => {
                let pos = self.entities.iter().position(|e| e.id == id);
                match pos {
                    Some(pos) => self.entities.get(pos + 1),
                    None => None,
                }
            }
        };
        Ok(next.cloned())
    }

    fn entity_links(&mut self, entity: &EntityInfo) -> PlaneweaveResult<Vec<LinkInfo>> {
        Ok(self
            .links
            .iter()
            .filter(|l| l.source.entity == entity.id)
            .copied()
            .collect())
    }

    fn setup_link(&mut self, link: &LinkInfo) -> PlaneweaveResult<()> {
        let line = format!(
            "link {}:{}->{}:{} {}",
            self.entity_name(link.source.entity),
            link.source.index,
            self.entity_name(link.sink.entity),
            link.sink.index,
            if link.enabled { "on" } else { "off" },
        );
        self.record(line)?;
        let existing = self
            .links
            .iter_mut()
            .find(|l| l.source == link.source && l.sink == link.sink)
            .ok_or_else(|| {
                PlaneweaveError::device("setup link", io::Error::other("no such link"))
            })?;
        if existing.immutable && existing.enabled != link.enabled {
            return Err(PlaneweaveError::device(
                "setup link",
                io::Error::other("link is immutable"),
            ));
        }
        existing.enabled = link.enabled;
        Ok(())
    }

    fn open_node(&mut self, entity: &EntityInfo) -> PlaneweaveResult<NodeHandle> {
        let line = format!("open {}", entity.name);
        self.record(line)?;
        if !self.entities.iter().any(|e| e.id == entity.id) {
            return Err(PlaneweaveError::device(
                "open",
                io::Error::other("no such entity"),
            ));
        }
        self.opened.push(entity.id);
        Ok(NodeHandle::new((self.opened.len() - 1) as u32))
    }

    fn node_capabilities(&mut self, node: NodeHandle) -> PlaneweaveResult<NodeCaps> {
        let id = self
            .opened
            .get(node.index())
            .copied()
            .ok_or_else(|| PlaneweaveError::validation("stale device node handle"))?;
        let kind = self
            .entities
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.kind)
            .unwrap_or(EntityKind::Other);
        let capabilities = match kind {
            EntityKind::VideoNode => {
                crate::wire::video::V4L2_CAP_VIDEO_CAPTURE_MPLANE
                    | crate::wire::video::V4L2_CAP_VIDEO_OUTPUT_MPLANE
                    | crate::wire::video::V4L2_CAP_STREAMING
            }
            _ => 0,
        };
        Ok(NodeCaps { capabilities })
    }

    fn set_pix_format(
        &mut self,
        node: NodeHandle,
        dir: StreamDirection,
        fmt: &PixFormat,
    ) -> PlaneweaveResult<()> {
        let line = format!(
            "s_fmt {} {} {}x{} {}{}",
            self.node_label(node),
            dir,
            fmt.width,
            fmt.height,
            fourcc_string(fmt.fourcc),
            if fmt.premul { " premul" } else { "" },
        );
        self.record(line)
    }

    fn request_buffers(
        &mut self,
        node: NodeHandle,
        dir: StreamDirection,
        count: u32,
    ) -> PlaneweaveResult<()> {
        let line = format!("reqbufs {} {} {}", self.node_label(node), dir, count);
        self.record(line)
    }

    fn queue_buffer(
        &mut self,
        node: NodeHandle,
        dir: StreamDirection,
        planes: &[QueuedPlane],
    ) -> PlaneweaveResult<()> {
        let line = format!(
            "qbuf {} {} n={} fd={} len={}",
            self.node_label(node),
            dir,
            planes.len(),
            planes.first().map(|p| p.fd).unwrap_or(-1),
            planes.first().map(|p| p.length).unwrap_or(0),
        );
        self.record(line)
    }

    fn dequeue_buffer(&mut self, node: NodeHandle, dir: StreamDirection) -> PlaneweaveResult<()> {
        let line = format!("dqbuf {} {}", self.node_label(node), dir);
        self.record(line)
    }

    fn stream_on(&mut self, node: NodeHandle, dir: StreamDirection) -> PlaneweaveResult<()> {
        let line = format!("stream_on {} {}", self.node_label(node), dir);
        self.record(line)
    }

    fn stream_off(&mut self, node: NodeHandle, dir: StreamDirection) -> PlaneweaveResult<()> {
        let line = format!("stream_off {} {}", self.node_label(node), dir);
        self.record(line)
    }

    fn set_subdev_format(
        &mut self,
        node: NodeHandle,
        pad: u32,
        fmt: &PadFormat,
    ) -> PlaneweaveResult<PadFormat> {
        let line = format!(
            "pad_fmt {}:{} {}x{} code={:#x}",
            self.node_label(node),
            pad,
            fmt.width,
            fmt.height,
            fmt.code,
        );
        self.record(line)?;
        let code = self.pad_code_override.take().unwrap_or(fmt.code);
        Ok(PadFormat { code, ..*fmt })
    }

    fn set_subdev_selection(
        &mut self,
        node: NodeHandle,
        pad: u32,
        target: SelectionTarget,
        rect: Rect,
    ) -> PlaneweaveResult<Rect> {
        let line = format!(
            "{} {}:{} {}x{}@({},{})",
            target,
            self.node_label(node),
            pad,
            rect.width,
            rect.height,
            rect.left,
            rect.top,
        );
        self.record(line)?;
        if target == SelectionTarget::Crop {
            if let Some(adjusted) = self.crop_override.take() {
                return Ok(adjusted);
            }
        }
        Ok(rect)
    }

    fn set_control(&mut self, node: NodeHandle, ctrl: u32, value: i32) -> PlaneweaveResult<()> {
        let line = format!(
            "ctrl {} id={:#x} val={}",
            self.node_label(node),
            ctrl,
            value,
        );
        self.record(line)
    }
}
