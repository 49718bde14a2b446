//! Frame lifecycle and pass scheduling.
//!
//! A frame runs `begin_compose`, any number of `draw_view` calls, then
//! `finish_compose`. Draws accumulate into a batch of at most one request
//! per input port; when the batch fills mid-frame the engine flushes a
//! hardware pass immediately and re-submits the partially composed output
//! as the background layer of the next pass, so later draws stack on top
//! of earlier ones.

use tracing::{debug, error, info, warn};

use crate::config::PipelineConfig;
use crate::device::kernel::KernelBus;
use crate::device::{
    MAX_PLANES, MediaBus, NodeHandle, PadFormat, PixFormat, QueuedPlane, SelectionTarget,
    StreamDirection, queue,
};
use crate::foundation::error::{PlaneweaveError, PlaneweaveResult};
use crate::foundation::geom::Rect;
use crate::surface::{OutputTarget, SurfaceState};
use crate::topology::{self, ResolvedPipeline, TopologyLayout};
use crate::wire::video;

use super::feasibility::{self, CompositionPath, ViewPlan};
use super::ports::{self, DrawRequest, Rejection};
use super::scaler::{ScaleDecision, ScalerArbiter, ScratchAllocator, decide};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EngineState {
    Idle,
    Starting,
    Composing,
}

/// Output geometry and buffer captured at `begin_compose`.
#[derive(Clone, Copy)]
struct OutputFrame {
    width: u32,
    height: u32,
    stride: u32,
    plane: QueuedPlane,
}

/// Key for the output pad geometry. Programming the three output-side pads
/// is skipped while neither the output size nor the window size changes;
/// the window position only matters to the compose selection, which is set
/// on every pass.
#[derive(Clone, Copy, PartialEq, Eq)]
struct WindowKey {
    out_width: u32,
    out_height: u32,
    window_width: u32,
    window_height: u32,
}

/// The composition engine: owns the resolved blend graph, the optional
/// resizer, and all per-frame scheduling state.
pub struct BlendEngine<B: MediaBus> {
    bus: B,
    pipeline: ResolvedPipeline,
    scaler: Option<ScalerArbiter<B>>,
    view_budget: Option<u32>,
    state: EngineState,
    batch: Vec<DrawRequest>,
    /// Union of the destinations drawn so far this frame, in output
    /// coordinates. Drives the writeback window when the hardware supports
    /// partial passes.
    dirty: Rect,
    /// The first batch entry is the re-submitted previous pass and must be
    /// cropped to the window at flush time.
    background_pending: bool,
    output: Option<OutputFrame>,
    wpf_format: Option<PixFormat>,
    window_cache: Option<WindowKey>,
}

impl BlendEngine<KernelBus> {
    /// Opens the media device named by `config` and resolves `layout` on it.
    ///
    /// The resizer is best-effort: when enabled in `config` it additionally
    /// needs `config.scaler_device` and a scratch `allocator`, and any
    /// failure along that path logs a warning and leaves scaling disabled
    /// rather than failing the open.
    #[tracing::instrument(skip_all)]
    pub fn open(
        config: &PipelineConfig,
        layout: &TopologyLayout,
        allocator: Option<Box<dyn ScratchAllocator>>,
    ) -> PlaneweaveResult<Self> {
        let mut bus = KernelBus::open(&config.media_device)?;
        let pipeline = topology::resolve(&mut bus, layout, config)?;
        let mut engine = Self::assemble(bus, pipeline, config);

        if config.scaler_enable {
            match (config.scaler_device.as_deref(), allocator) {
                (Some(path), Some(allocator)) => {
                    let resolved = KernelBus::open(path).and_then(|mut scaler_bus| {
                        topology::resolve_scaler(&mut scaler_bus, layout)
                            .map(|pipeline| (scaler_bus, pipeline))
                    });
                    match resolved {
                        Ok(graph) => {
                            engine.scaler =
                                Some(ScalerArbiter::new(vec![graph], allocator));
                            info!("resizer attached");
                        }
                        Err(err) => {
                            warn!(error = %err, "resizer unavailable, scaling disabled");
                        }
                    }
                }
                (None, _) => warn!("no scaler device configured, scaling disabled"),
                (_, None) => warn!("no scratch allocator supplied, scaling disabled"),
            }
        }
        Ok(engine)
    }
}

impl<B: MediaBus> BlendEngine<B> {
    /// Resolves `layout` on an already-open bus. The engine starts without
    /// a resizer; attach one with [`BlendEngine::attach_scaler`].
    pub fn with_bus(
        mut bus: B,
        config: &PipelineConfig,
        layout: &TopologyLayout,
    ) -> PlaneweaveResult<Self> {
        let pipeline = topology::resolve(&mut bus, layout, config)?;
        Ok(Self::assemble(bus, pipeline, config))
    }

    fn assemble(bus: B, pipeline: ResolvedPipeline, config: &PipelineConfig) -> Self {
        Self {
            bus,
            pipeline,
            scaler: None,
            view_budget: config.max_compose,
            state: EngineState::Idle,
            batch: Vec::new(),
            dirty: Rect::ZERO,
            background_pending: false,
            output: None,
            wpf_format: None,
            window_cache: None,
        }
    }

    /// Resolves a resizer graph on its own bus and attaches it.
    pub fn attach_scaler(
        &mut self,
        mut bus: B,
        layout: &TopologyLayout,
        allocator: Box<dyn ScratchAllocator>,
    ) -> PlaneweaveResult<()> {
        let pipeline = topology::resolve_scaler(&mut bus, layout)?;
        self.scaler = Some(ScalerArbiter::new(vec![(bus, pipeline)], allocator));
        Ok(())
    }

    /// The resolved blend graph.
    pub fn pipeline(&self) -> &ResolvedPipeline {
        &self.pipeline
    }

    /// Direct access to the underlying bus, for tests that script faults
    /// and assert on the request journal.
    #[cfg(any(test, feature = "testing"))]
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Whether a resizer is currently available for scaled draws.
    pub fn scaler_attached(&self) -> bool {
        self.scaler.is_some()
    }

    /// Renderer capability flags. This hardware rotates and filters
    /// nothing, so the set is empty.
    pub fn capabilities(&self) -> u32 {
        0
    }

    /// Checks a whole scene against the engine's current abilities; see
    /// [`feasibility::plan_frame`].
    pub fn plan_frame(&self, views: &[ViewPlan]) -> CompositionPath {
        feasibility::plan_frame(views, self.view_budget, self.scaler.is_some())
    }

    /// Starts a frame targeting `output`.
    ///
    /// The output must have a buffer attached. The writeback node format is
    /// reprogrammed only when the geometry or stride changed since the last
    /// frame; resizer scratch is grown to cover the output before any draw
    /// can commit to the scaled path, and a failure to grow it disables the
    /// resizer for good.
    #[tracing::instrument(skip_all)]
    pub fn begin_compose(&mut self, output: &OutputTarget) -> PlaneweaveResult<()> {
        let plane = output.plane().ok_or_else(|| {
            PlaneweaveError::validation("output target has no buffer attached")
        })?;
        let frame = OutputFrame {
            width: output.width(),
            height: output.height(),
            stride: plane.stride,
            plane: QueuedPlane {
                fd: plane.dmabuf,
                length: plane.stride * output.height(),
            },
        };

        if let Some(scaler) = &mut self.scaler {
            if let Err(err) = scaler.ensure_capacity(frame.width, frame.height) {
                warn!(error = %err, "scratch growth failed, disabling the resizer");
                self.scaler = None;
            }
        }

        let fmt = PixFormat {
            width: frame.width,
            height: frame.height,
            fourcc: video::V4L2_PIX_FMT_ABGR32,
            premul: true,
            num_planes: 1,
            strides: [frame.stride, 0, 0],
        };
        if self.wpf_format == Some(fmt) {
            debug!("output format unchanged, keeping the programmed node state");
        } else {
            self.bus
                .request_buffers(self.pipeline.output_node, StreamDirection::Drain, 0)?;
            self.bus
                .set_pix_format(self.pipeline.output_node, StreamDirection::Drain, &fmt)?;
            self.bus
                .request_buffers(self.pipeline.output_node, StreamDirection::Drain, 1)?;
            self.wpf_format = Some(fmt);
        }

        self.state = EngineState::Starting;
        self.batch.clear();
        self.dirty = Rect::ZERO;
        self.background_pending = false;
        self.output = Some(frame);
        debug!(width = frame.width, height = frame.height, "pass begun");
        Ok(())
    }

    /// Schedules one surface into the current frame.
    ///
    /// A surface whose opaque region covers a different rectangle than its
    /// bounds is drawn twice: the translucent remainder first, then the
    /// opaque box on top with blending disabled. Surfaces without a buffer
    /// are skipped. May flush a full pass as a side effect.
    #[tracing::instrument(skip_all)]
    pub fn draw_view(&mut self, surface: &SurfaceState) -> PlaneweaveResult<()> {
        if self.state == EngineState::Idle {
            return Err(PlaneweaveError::validation(
                "draw_view called outside begin_compose/finish_compose",
            ));
        }
        let Some(params) = surface.params() else {
            debug!("surface has no buffer, skipping");
            return Ok(());
        };

        if surface.dst_rect != surface.opaque_dst_rect {
            let translucent = DrawRequest::new(
                params,
                surface.src_rect,
                surface.dst_rect,
                false,
                surface.alpha,
            );
            self.submit(translucent)?;
        }
        let opaque = DrawRequest::new(
            params,
            surface.opaque_src_rect,
            surface.opaque_dst_rect,
            true,
            surface.alpha,
        );
        self.submit(opaque)
    }

    /// Flushes whatever is pending and returns the engine to idle.
    ///
    /// Cleanup runs even when the final pass fails, so the next
    /// `begin_compose` starts from a known state; the failure is still
    /// reported.
    #[tracing::instrument(skip_all)]
    pub fn finish_compose(&mut self) -> PlaneweaveResult<()> {
        let result = if self.batch.is_empty() {
            Ok(())
        } else {
            self.flush()
        };
        self.state = EngineState::Idle;
        self.output = None;
        debug!("pass finished");
        result
    }

    fn submit(&mut self, mut req: DrawRequest) -> PlaneweaveResult<()> {
        if let Err(rejection) = ports::admit(&mut req) {
            match rejection {
                Rejection::Degenerate => debug!(%rejection, "dropping draw"),
                Rejection::Oversized => warn!(
                    width = req.src.width,
                    height = req.src.height,
                    %rejection,
                    "dropping draw"
                ),
            }
            return Ok(());
        }

        let decision = decide(&req.src, &req.dst);
        if decision != ScaleDecision::Direct {
            if self.scaler.is_none() {
                warn!(
                    src = ?req.src,
                    dst = ?req.dst,
                    "scaled draw with no resizer attached, dropping"
                );
                return Ok(());
            }
            if decision == ScaleDecision::TooSmall {
                warn!(
                    width = req.src.width,
                    height = req.src.height,
                    "source below the resizer minimum, dropping draw"
                );
                return Ok(());
            }
        }

        match self.state {
            EngineState::Starting => self.state = EngineState::Composing,
            EngineState::Composing => {
                if self.batch.is_empty() {
                    self.resubmit_output_as_background()?;
                }
            }
            EngineState::Idle => {
                return Err(PlaneweaveError::validation("draw outside an active pass"));
            }
        }

        // Out of resizer units: flush the pending pass to recycle them,
        // then take this draw from the top. The flushed window must not
        // cover a destination nothing in that pass drew to, so the union
        // below comes after this check.
        if decision == ScaleDecision::Scale {
            let exhausted = self
                .scaler
                .as_ref()
                .is_some_and(|scaler| scaler.exhausted());
            if exhausted {
                self.flush()?;
                return self.submit(req);
            }
        }

        if self.pipeline.partial_writeback
            && !(self.background_pending && self.batch.is_empty())
        {
            self.dirty = self.dirty.union(&req.dst);
        }

        if decision == ScaleDecision::Scale {
            if let Some(scaler) = &mut self.scaler {
                scaler.scale(&mut req)?;
            }
        }

        self.batch.push(req);
        if self.batch.len() == self.pipeline.port_budget() {
            return self.flush();
        }
        Ok(())
    }

    /// Queues the current output contents as the bottom layer of the next
    /// pass. Runs when a draw arrives after a mid-frame flush: the new pass
    /// starts from what the previous one composed. The re-submission itself
    /// never widens the dirty window.
    fn resubmit_output_as_background(&mut self) -> PlaneweaveResult<()> {
        let output = self
            .output
            .ok_or_else(|| PlaneweaveError::validation("no output bound to the pass"))?;
        debug!("re-submitting composed output as background");
        self.state = EngineState::Starting;
        if self.pipeline.partial_writeback {
            self.background_pending = true;
            self.dirty = Rect::ZERO;
        }

        let full = Rect::sized(output.width, output.height);
        let background = DrawRequest {
            planes: [output.plane; MAX_PLANES],
            num_planes: 1,
            strides: [output.stride, 0, 0],
            width: output.width,
            height: output.height,
            fourcc: video::V4L2_PIX_FMT_ABGR32,
            mbus: video::MEDIA_BUS_FMT_ARGB8888_1X32,
            min_block: (1, 1),
            src: full,
            dst: full,
            opaque: false,
            alpha: 1.0,
        };
        self.submit(background)
    }

    /// Runs one hardware pass over the pending batch.
    #[tracing::instrument(skip_all, fields(draws = self.batch.len()))]
    fn flush(&mut self) -> PlaneweaveResult<()> {
        if let Some(scaler) = &mut self.scaler {
            scaler.reset();
        }
        let result = self.flush_inner();
        if let Err(err) = &result {
            error!(error = %err, "pass aborted");
        }
        self.batch.clear();
        result
    }

    fn flush_inner(&mut self) -> PlaneweaveResult<()> {
        let output = self
            .output
            .ok_or_else(|| PlaneweaveError::validation("no output bound to the pass"))?;
        let window = if self.pipeline.partial_writeback && !self.dirty.is_empty() {
            self.dirty
        } else {
            Rect::sized(output.width, output.height)
        };
        debug!(
            window_width = window.width,
            window_height = window.height,
            left = window.left,
            top = window.top,
            "flushing pass"
        );

        self.program_output_window(&output, &window)?;
        if self.pipeline.partial_writeback {
            self.bus.set_subdev_selection(
                self.pipeline.output_subdev,
                1,
                SelectionTarget::Compose,
                window,
            )?;
        }

        let mut batch = std::mem::take(&mut self.batch);
        if self.background_pending {
            if let Some(first) = batch.first_mut() {
                first.src = window;
                first.dst = window;
            }
            self.background_pending = false;
        }

        // Destinations move into window coordinates; a port that refuses
        // its draw is detached so the pass runs without that layer.
        for (port, req) in self.pipeline.ports.iter().zip(batch.iter_mut()) {
            req.dst = req
                .dst
                .translated(window.left.saturating_neg(), window.top.saturating_neg());
            if let Err(err) = ports::enable_port(&mut self.bus, port, self.pipeline.blend, req)
            {
                warn!(port = %port.name, error = %err, "port setup failed, dropping its draw");
                ports::disable_port(&mut self.bus, port)?;
            }
        }
        for port in &self.pipeline.ports[batch.len()..] {
            ports::disable_port(&mut self.bus, port)?;
        }

        self.bus.queue_buffer(
            self.pipeline.output_node,
            StreamDirection::Drain,
            &[output.plane],
        )?;
        let feeds: Vec<NodeHandle> = self.pipeline.ports[..batch.len()]
            .iter()
            .map(|port| port.node)
            .collect();
        queue::stream_pass(&mut self.bus, &feeds, self.pipeline.output_node, false)
    }

    /// Programs the three output-side pads for the pass geometry, skipping
    /// the requests when nothing changed since the previous pass.
    fn program_output_window(
        &mut self,
        output: &OutputFrame,
        window: &Rect,
    ) -> PlaneweaveResult<()> {
        let key = WindowKey {
            out_width: output.width,
            out_height: output.height,
            window_width: window.width,
            window_height: window.height,
        };
        if self.window_cache == Some(key) {
            return Ok(());
        }

        let windowed = PadFormat {
            width: window.width,
            height: window.height,
            code: video::MEDIA_BUS_FMT_ARGB8888_1X32,
        };
        self.bus
            .set_subdev_format(self.pipeline.blend, self.pipeline.blend_source_pad, &windowed)?;
        self.bus
            .set_subdev_format(self.pipeline.output_subdev, 0, &windowed)?;
        let full = PadFormat {
            width: output.width,
            height: output.height,
            code: video::MEDIA_BUS_FMT_ARGB8888_1X32,
        };
        self.bus
            .set_subdev_format(self.pipeline.output_subdev, 1, &full)?;
        self.window_cache = Some(key);
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/engine.rs"]
mod tests;
