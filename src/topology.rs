//! Media graph resolution.
//!
//! The engine does not hard-code entity ids: a [`TopologyLayout`] names the
//! pipeline roles by entity-name fragment, and [`resolve`] walks the media
//! graph to find them, reset stale routing, and open the device nodes. The
//! result is a [`ResolvedPipeline`] of opaque node handles the composition
//! engine programs per frame.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::device::{
    EntityInfo, EntityKind, LinkInfo, MediaBus, NodeHandle, PadFormat, SelectionTarget,
};
use crate::foundation::error::{PlaneweaveError, PlaneweaveResult};
use crate::foundation::geom::Rect;
use crate::wire::video;

/// Hardware bound on simultaneously driven input ports.
pub const PORT_MAX: u32 = 5;
/// Ports driven when the configuration does not pick a count.
pub const PORT_DEFAULT: u32 = 4;
/// Fewest ports worth batching over.
pub const PORT_MIN: u32 = 2;

/// Name fragments locating one streamable port: the video node buffers are
/// queued on, and the sub-device stage in front of it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PortNames {
    /// Video device node fragment.
    pub node: String,
    /// Sub-device fragment.
    pub subdev: String,
}

impl PortNames {
    fn new(node: &str, subdev: &str) -> Self {
        Self {
            node: node.to_owned(),
            subdev: subdev.to_owned(),
        }
    }
}

/// One blend unit candidate.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlendNames {
    /// Sub-device fragment.
    pub subdev: String,
    /// Source pad feeding the writeback stage.
    pub source_pad: u16,
}

/// Name fragments locating the scaler graph roles.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScalerNames {
    /// Read port feeding the resizer.
    pub input: PortNames,
    /// Resizer sub-device fragment.
    pub resizer: String,
    /// Writeback port behind the resizer.
    pub output: PortNames,
}

/// Role-to-entity-name descriptor of a pipeline family.
///
/// Matching is by substring, the way media drivers suffix entity names with
/// the function block. [`TopologyLayout::vsp2`] is the canonical layout for
/// the supported hardware; hosts with renamed entities can deserialize
/// their own descriptor instead.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TopologyLayout {
    /// Required prefix of the reported hardware model string.
    pub model_prefix: String,
    /// Input ports, in blend sink pad order.
    pub ports: Vec<PortNames>,
    /// Blend unit candidates; the first one present in the graph wins.
    pub blend: Vec<BlendNames>,
    /// Writeback output port.
    pub output: PortNames,
    /// Scaler graph roles, resolved on their own media device.
    pub scaler: ScalerNames,
}

impl TopologyLayout {
    /// The canonical layout: five read ports into a blend unit (the
    /// five-input `bru`, falling back to the two-input `brs` on parts that
    /// only have that) and a single writeback, plus a separate one-port
    /// resizer graph.
    pub fn vsp2() -> Self {
        Self {
            model_prefix: "VSP".to_owned(),
            ports: (0..PORT_MAX)
                .map(|i| PortNames::new(&format!("rpf.{i} input"), &format!("rpf.{i}")))
                .collect(),
            blend: vec![
                BlendNames {
                    subdev: "bru".to_owned(),
                    source_pad: 5,
                },
                BlendNames {
                    subdev: "brs".to_owned(),
                    source_pad: 2,
                },
            ],
            output: PortNames::new("wpf.0 output", "wpf.0"),
            scaler: ScalerNames {
                input: PortNames::new("rpf.0 input", "rpf.0"),
                resizer: "uds.0".to_owned(),
                output: PortNames::new("wpf.0 output", "wpf.0"),
            },
        }
    }
}

/// One resolved input port.
#[derive(Clone, Debug)]
pub struct PipelinePort {
    /// Sub-device entity name, for diagnostics.
    pub name: String,
    /// Video node buffers are queued on.
    pub node: NodeHandle,
    /// Crop and format stage in front of the blend unit.
    pub subdev: NodeHandle,
    /// Link from this port into the blend unit; its sink index is the
    /// blend pad the port feeds.
    pub link: LinkInfo,
}

/// The resolved blend graph, ready for per-frame programming.
#[derive(Clone, Debug)]
pub struct ResolvedPipeline {
    /// Hardware model string reported by the media device.
    pub model: String,
    /// Input ports, one per budgeted blend pad.
    pub ports: Vec<PipelinePort>,
    /// Blend unit sub-device.
    pub blend: NodeHandle,
    /// Entity name of the blend unit actually found.
    pub blend_name: String,
    /// Blend source pad facing the writeback stage.
    pub blend_source_pad: u32,
    /// Video node the composed output is dequeued from.
    pub output_node: NodeHandle,
    /// Writeback sub-device stage.
    pub output_subdev: NodeHandle,
    /// Whether the writeback stage accepts a compose window, enabling
    /// partial-update passes.
    pub partial_writeback: bool,
}

impl ResolvedPipeline {
    /// Number of ports a single pass can drive.
    pub fn port_budget(&self) -> usize {
        self.ports.len()
    }
}

/// The resolved scaler graph.
#[derive(Clone, Copy, Debug)]
pub struct ScalerPipeline {
    /// Video node the source buffer is queued on.
    pub input_node: NodeHandle,
    /// Crop and format stage in front of the resizer.
    pub input_subdev: NodeHandle,
    /// Resizer sub-device.
    pub resizer: NodeHandle,
    /// Video node the scaled result is dequeued from.
    pub output_node: NodeHandle,
    /// Writeback sub-device stage.
    pub output_subdev: NodeHandle,
}

/// Everything learned in one enumeration pass over a media graph.
struct Scan {
    entities: Vec<EntityInfo>,
    input_count: u32,
}

impl Scan {
    fn find(&self, fragment: &str, kind: EntityKind) -> Option<&EntityInfo> {
        self.entities
            .iter()
            .find(|e| e.kind == kind && e.name.contains(fragment))
    }

    fn require(
        &self,
        fragment: &str,
        kind: EntityKind,
        role: &str,
    ) -> PlaneweaveResult<EntityInfo> {
        self.find(fragment, kind).cloned().ok_or_else(|| {
            PlaneweaveError::topology(format!(
                "{role} '{fragment}' not present in the media graph"
            ))
        })
    }
}

/// Walks every entity once: resets all mutable links to disabled so stale
/// routing from a previous user cannot leak into a pass, and counts the
/// read ports the hardware actually has.
fn scan_and_reset<B: MediaBus + ?Sized>(bus: &mut B) -> PlaneweaveResult<Scan> {
    let mut entities = Vec::new();
    let mut input_count = 0;
    let mut cursor = None;
    while let Some(entity) = bus.next_entity(cursor)? {
        cursor = Some(entity.id);
        for link in bus.entity_links(&entity)? {
            if link.immutable {
                continue;
            }
            let reset = LinkInfo {
                enabled: false,
                ..link
            };
            if let Err(err) = bus.setup_link(&reset) {
                warn!(entity = %entity.name, error = %err, "link reset failed, continuing");
            }
        }
        if entity.name.contains("input") {
            input_count += 1;
        }
        entities.push(entity);
    }
    Ok(Scan {
        entities,
        input_count,
    })
}

/// Opens a video node and verifies it can stream in the direction the role
/// needs.
fn open_video_node<B: MediaBus + ?Sized>(
    bus: &mut B,
    entity: &EntityInfo,
    drain: bool,
    role: &str,
) -> PlaneweaveResult<NodeHandle> {
    let node = bus.open_node(entity)?;
    let caps = bus.node_capabilities(node)?;
    let direction_ok = if drain {
        caps.mplane_drain()
    } else {
        caps.mplane_feed()
    };
    if !direction_ok || !caps.streaming() {
        return Err(PlaneweaveError::topology(format!(
            "{role} '{}' cannot stream in the required direction",
            entity.name
        )));
    }
    debug!(entity = %entity.name, caps = format_args!("{:#x}", caps.capabilities), "node opened");
    Ok(node)
}

fn link_between<B: MediaBus + ?Sized>(
    bus: &mut B,
    source: &EntityInfo,
    sink_id: u32,
    source_pad: Option<u16>,
) -> PlaneweaveResult<LinkInfo> {
    bus.entity_links(source)?
        .into_iter()
        .find(|l| l.sink.entity == sink_id && source_pad.is_none_or(|pad| l.source.index == pad))
        .ok_or_else(|| {
            PlaneweaveError::topology(format!(
                "'{}' has no link towards entity {sink_id}",
                source.name
            ))
        })
}

/// Resolves the blend graph on `bus` against `layout`.
///
/// On success the device is left with all stale routing cleared, the blend
/// output path enabled, and the in-budget blend pads set to the fixed
/// 32-bit bus code. The port budget is the configured count clamped to
/// [`PORT_MIN`]..=[`PORT_MAX`] and to the number of read ports found.
#[tracing::instrument(skip_all)]
pub fn resolve<B: MediaBus + ?Sized>(
    bus: &mut B,
    layout: &TopologyLayout,
    config: &PipelineConfig,
) -> PlaneweaveResult<ResolvedPipeline> {
    let device = bus.device_info()?;
    if !device.model.starts_with(&layout.model_prefix) {
        return Err(PlaneweaveError::topology(format!(
            "device model '{}' is not in the '{}' family",
            device.model, layout.model_prefix
        )));
    }

    let scan = scan_and_reset(bus)?;

    let mut budget = config.max_inputs.unwrap_or(PORT_DEFAULT);
    if budget < PORT_MIN {
        budget = PORT_MIN;
    }
    let layout_max = (layout.ports.len() as u32).min(PORT_MAX);
    if budget > layout_max {
        budget = layout_max;
    }
    if budget > scan.input_count {
        budget = scan.input_count;
    }
    info!(model = %device.model, ports = budget, "resolving blend graph");

    let (blend_entity, blend_names) = layout
        .blend
        .iter()
        .find_map(|candidate| {
            scan.find(&candidate.subdev, EntityKind::Subdev)
                .map(|entity| (entity.clone(), candidate))
        })
        .ok_or_else(|| {
            PlaneweaveError::topology(format!(
                "no blend unit in the media graph (tried {})",
                layout
                    .blend
                    .iter()
                    .map(|c| c.subdev.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })?;
    let blend = bus.open_node(&blend_entity)?;

    let mut ports = Vec::with_capacity(budget as usize);
    for names in layout.ports.iter().take(budget as usize) {
        let node_entity = scan.require(&names.node, EntityKind::VideoNode, "input port node")?;
        let subdev_entity = scan.require(&names.subdev, EntityKind::Subdev, "input port stage")?;
        let link = link_between(bus, &subdev_entity, blend_entity.id, None)?;
        let node = open_video_node(bus, &node_entity, false, "input port")?;
        let subdev = bus.open_node(&subdev_entity)?;
        ports.push(PipelinePort {
            name: subdev_entity.name.clone(),
            node,
            subdev,
            link,
        });
    }

    // Blend inputs default to the fixed 32-bit code; a pad that substitutes
    // another code cannot carry composition traffic.
    for port in &ports {
        let request = PadFormat {
            width: 256,
            height: 256,
            code: video::MEDIA_BUS_FMT_ARGB8888_1X32,
        };
        let fixed = bus.set_subdev_format(blend, u32::from(port.link.sink.index), &request)?;
        if fixed.code != request.code {
            return Err(PlaneweaveError::topology(format!(
                "blend pad {} rejected the ARGB bus code",
                port.link.sink.index
            )));
        }
    }

    let output_node_entity =
        scan.require(&layout.output.node, EntityKind::VideoNode, "output node")?;
    let output_subdev_entity =
        scan.require(&layout.output.subdev, EntityKind::Subdev, "output stage")?;

    let blend_link = link_between(
        bus,
        &blend_entity,
        output_subdev_entity.id,
        Some(blend_names.source_pad),
    )?;
    bus.setup_link(&LinkInfo {
        enabled: true,
        ..blend_link
    })?;

    let output_node = open_video_node(bus, &output_node_entity, true, "output node")?;
    let output_subdev = bus.open_node(&output_subdev_entity)?;
    let partial_writeback = probe_partial_writeback(bus, output_subdev);
    info!(
        blend = %blend_entity.name,
        partial_writeback,
        "blend graph resolved"
    );

    Ok(ResolvedPipeline {
        model: device.model,
        ports,
        blend,
        blend_name: blend_entity.name,
        blend_source_pad: u32::from(blend_link.source.index),
        output_node,
        output_subdev,
        partial_writeback,
    })
}

/// Whether the writeback stage takes a compose window, which gates
/// partial-update passes. Probed with a throwaway format so the selection
/// request is well-defined.
fn probe_partial_writeback<B: MediaBus + ?Sized>(bus: &mut B, output_subdev: NodeHandle) -> bool {
    let fmt = PadFormat {
        width: 256,
        height: 256,
        code: video::MEDIA_BUS_FMT_ARGB8888_1X32,
    };
    if bus.set_subdev_format(output_subdev, 1, &fmt).is_err() {
        return false;
    }
    bus.set_subdev_selection(
        output_subdev,
        1,
        SelectionTarget::Compose,
        Rect::new(16, 16, 16, 16),
    )
    .is_ok()
}

/// Resolves the scaler graph on its own media bus and routes its fixed
/// read port -> resizer -> writeback chain.
#[tracing::instrument(skip_all)]
pub fn resolve_scaler<B: MediaBus + ?Sized>(
    bus: &mut B,
    layout: &TopologyLayout,
) -> PlaneweaveResult<ScalerPipeline> {
    let scan = scan_and_reset(bus)?;
    let names = &layout.scaler;

    let input_node_entity =
        scan.require(&names.input.node, EntityKind::VideoNode, "scaler input node")?;
    let input_subdev_entity =
        scan.require(&names.input.subdev, EntityKind::Subdev, "scaler input stage")?;
    let resizer_entity = scan.require(&names.resizer, EntityKind::Subdev, "resizer")?;
    let output_node_entity = scan.require(
        &names.output.node,
        EntityKind::VideoNode,
        "scaler output node",
    )?;
    let output_subdev_entity = scan.require(
        &names.output.subdev,
        EntityKind::Subdev,
        "scaler output stage",
    )?;

    let feed_link = link_between(bus, &input_subdev_entity, resizer_entity.id, None)?;
    bus.setup_link(&LinkInfo {
        enabled: true,
        ..feed_link
    })?;
    let drain_link = link_between(bus, &resizer_entity, output_subdev_entity.id, None)?;
    bus.setup_link(&LinkInfo {
        enabled: true,
        ..drain_link
    })?;

    let input_node = open_video_node(bus, &input_node_entity, false, "scaler input node")?;
    let input_subdev = bus.open_node(&input_subdev_entity)?;
    let resizer = bus.open_node(&resizer_entity)?;
    let output_node = open_video_node(bus, &output_node_entity, true, "scaler output node")?;
    let output_subdev = bus.open_node(&output_subdev_entity)?;
    info!(resizer = %resizer_entity.name, "scaler graph resolved");

    Ok(ScalerPipeline {
        input_node,
        input_subdev,
        resizer,
        output_node,
        output_subdev,
    })
}

#[cfg(test)]
#[path = "../tests/unit/topology.rs"]
mod tests;
