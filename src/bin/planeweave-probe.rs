use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use serde::Serialize;

use planeweave::device::kernel::KernelBus;
use planeweave::device::{EntityInfo, EntityKind, MediaBus};
use planeweave::{PipelineConfig, TopologyLayout, topology};

#[derive(Parser, Debug)]
#[command(name = "planeweave-probe", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the media device identity block.
    Info(InfoArgs),
    /// List every entity in the media graph.
    Entities(EntitiesArgs),
    /// List every link in the media graph with its flags.
    Links(LinksArgs),
    /// Dry-run topology resolution against the canonical layout.
    ///
    /// This resets mutable links and programs probe formats, the same way
    /// engine construction does.
    Resolve(ResolveArgs),
}

#[derive(Parser, Debug)]
struct InfoArgs {
    /// Media device node, e.g. /dev/media0.
    device: PathBuf,
}

#[derive(Parser, Debug)]
struct EntitiesArgs {
    /// Media device node, e.g. /dev/media0.
    device: PathBuf,

    /// Emit the report as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Parser, Debug)]
struct LinksArgs {
    /// Media device node, e.g. /dev/media0.
    device: PathBuf,
}

#[derive(Parser, Debug)]
struct ResolveArgs {
    /// Media device node carrying the blend graph.
    device: PathBuf,

    /// Port budget to request (clamped to what the hardware has).
    #[arg(long)]
    inputs: Option<u32>,

    /// Also resolve the scaler graph on this media device.
    #[arg(long)]
    scaler_device: Option<PathBuf>,

    /// Emit the report as JSON.
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Info(args) => cmd_info(args),
        Command::Entities(args) => cmd_entities(args),
        Command::Links(args) => cmd_links(args),
        Command::Resolve(args) => cmd_resolve(args),
    }
}

fn open_bus(device: &PathBuf) -> anyhow::Result<KernelBus> {
    KernelBus::open(device).with_context(|| format!("open media device '{}'", device.display()))
}

fn walk_entities(bus: &mut KernelBus) -> anyhow::Result<Vec<EntityInfo>> {
    let mut entities = Vec::new();
    let mut cursor = None;
    while let Some(entity) = bus.next_entity(cursor)? {
        cursor = Some(entity.id);
        entities.push(entity);
    }
    Ok(entities)
}

fn kind_str(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::VideoNode => "video",
        EntityKind::Subdev => "subdev",
        EntityKind::Other => "other",
    }
}

fn cmd_info(args: InfoArgs) -> anyhow::Result<()> {
    let mut bus = open_bus(&args.device)?;
    let info = bus.device_info()?;
    println!("driver:        {}", info.driver);
    println!("model:         {}", info.model);
    println!("serial:        {}", info.serial);
    println!("bus info:      {}", info.bus_info);
    println!(
        "media version: {}.{}.{}",
        (info.media_version >> 16) & 0xff,
        (info.media_version >> 8) & 0xff,
        info.media_version & 0xff
    );
    Ok(())
}

#[derive(Serialize)]
struct EntityReport {
    id: u32,
    name: String,
    kind: &'static str,
    dev: Option<(u32, u32)>,
    pads: u16,
    links: u16,
}

fn cmd_entities(args: EntitiesArgs) -> anyhow::Result<()> {
    let mut bus = open_bus(&args.device)?;
    let entities = walk_entities(&mut bus)?;

    if args.json {
        let report: Vec<EntityReport> = entities
            .into_iter()
            .map(|e| EntityReport {
                id: e.id,
                name: e.name,
                kind: kind_str(e.kind),
                dev: e.dev,
                pads: e.pads,
                links: e.links,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for e in &entities {
        let dev = match e.dev {
            Some((major, minor)) => format!(", dev {major}:{minor}"),
            None => String::new(),
        };
        println!(
            "entity {}: {} ({}{}, {} pads, {} links)",
            e.id,
            e.name,
            kind_str(e.kind),
            dev,
            e.pads,
            e.links
        );
    }
    Ok(())
}

fn cmd_links(args: LinksArgs) -> anyhow::Result<()> {
    let mut bus = open_bus(&args.device)?;
    let entities = walk_entities(&mut bus)?;
    let names: HashMap<u32, &str> = entities.iter().map(|e| (e.id, e.name.as_str())).collect();

    for entity in &entities {
        for link in bus.entity_links(entity)? {
            let sink = names
                .get(&link.sink.entity)
                .copied()
                .unwrap_or("<unknown entity>");
            let mut flags = Vec::new();
            if link.enabled {
                flags.push("enabled");
            }
            if link.immutable {
                flags.push("immutable");
            }
            println!(
                "{}:{} -> {}:{} [{}]",
                entity.name,
                link.source.index,
                sink,
                link.sink.index,
                flags.join(",")
            );
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct ResolveReport {
    model: String,
    blend: String,
    blend_source_pad: u32,
    ports: Vec<PortReport>,
    partial_writeback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    scaler: Option<String>,
}

#[derive(Serialize)]
struct PortReport {
    name: String,
    blend_pad: u16,
}

fn cmd_resolve(args: ResolveArgs) -> anyhow::Result<()> {
    let layout = TopologyLayout::vsp2();
    let config = PipelineConfig {
        media_device: args.device.clone(),
        max_inputs: args.inputs,
        ..PipelineConfig::default()
    };

    let mut bus = open_bus(&args.device)?;
    let pipeline = topology::resolve(&mut bus, &layout, &config)
        .with_context(|| format!("resolve blend graph on '{}'", args.device.display()))?;

    // Scaler failure is reported, not fatal: the engine treats the scaler
    // graph as best-effort too.
    let scaler = match &args.scaler_device {
        Some(path) => Some(match open_bus(path) {
            Ok(mut scaler_bus) => match topology::resolve_scaler(&mut scaler_bus, &layout) {
                Ok(_) => "resolved".to_owned(),
                Err(err) => format!("failed: {err}"),
            },
            Err(err) => format!("failed: {err:#}"),
        }),
        None => None,
    };

    let report = ResolveReport {
        model: pipeline.model.clone(),
        blend: pipeline.blend_name.clone(),
        blend_source_pad: pipeline.blend_source_pad,
        ports: pipeline
            .ports
            .iter()
            .map(|port| PortReport {
                name: port.name.clone(),
                blend_pad: port.link.sink.index,
            })
            .collect(),
        partial_writeback: pipeline.partial_writeback,
        scaler,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("model:  {}", report.model);
    println!(
        "blend:  {} (source pad {})",
        report.blend, report.blend_source_pad
    );
    for port in &report.ports {
        println!("port:   {} -> blend pad {}", port.name, port.blend_pad);
    }
    println!(
        "output: partial writeback {}",
        if report.partial_writeback {
            "supported"
        } else {
            "unsupported"
        }
    );
    if let Some(scaler) = &report.scaler {
        println!("scaler: {scaler}");
    }
    Ok(())
}
