//! Session lifecycle controller.
//!
//! Owns one active mirroring session at a time: starts it, stops it,
//! and atomically restarts it for manual preset switches, automatic
//! downgrades and surface-resize reconciliation. All state mutation
//! happens inside a single controller task fed by one message
//! channel, so commands from the host, monitor ticks, resize notices
//! and pipe exits can never interleave.
//!
//! ```text
//!  host ──► SessionHandle ──► Msg ──► controller task
//!                                       │ provision / open streams
//!                                       ├── frame pipe task ──► Renderer
//!                                       ├── clipboard listener task
//!                                       └── PerfMonitor ──► Msg::Degrade
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::desktop::desktop_geometry;
use crate::error::SessionError;
use crate::events::{SessionEvent, SessionPhase, SessionStatus};
use crate::input::{InputBridge, InputRoute};
use crate::monitor::{MonitorSignal, PerfMonitor};
use crate::quality::{PresetId, QualityLadder};
use crate::render::{OverlaySource, OverlaySpec, Renderer};
use crate::surface::{SizeF, SizePx, Surface};
use crate::transport::{
    ClipboardStream, DeviceConnection, DeviceController, FrameStream, ProvisionRequest, Transport,
};

// ── StartRequest ─────────────────────────────────────────────────

/// Everything a session start needs from the host.
pub struct StartRequest {
    /// Preset name from the UI; `None` or an unknown name falls back
    /// to the ladder's default.
    pub preset: Option<String>,
    /// The drawing surface frames are rendered into.
    pub surface: Box<dyn Surface>,
    /// The host container's on-screen size.
    pub container: SizeF,
    /// Mirror a created virtual display instead of the physical
    /// screen (desktop mode).
    pub desktop: bool,
    /// Optional picture-in-picture overlay.
    pub overlay: Option<(OverlaySpec, Box<dyn OverlaySource>)>,
}

// ── Messages ─────────────────────────────────────────────────────

enum Msg {
    Start(StartRequest),
    Stop,
    /// Stop and terminate the controller task.
    Shutdown,
    SelectPreset(String),
    Resize(SizeF),
    SetAutoAdapt(bool),
    StopClipboardSync,
    /// From the performance monitor. Tagged with the session epoch so
    /// a signal from an already-disposed monitor is discarded.
    Degrade { epoch: u64 },
    /// Periodic fps sample from the performance monitor.
    FpsSample { epoch: u64, fps: f64 },
    /// From the frame pipe: the stream ended or errored on its own.
    PipeDown {
        epoch: u64,
        error: Option<SessionError>,
    },
}

/// Why a restart is happening; decides bit rate and notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RestartReason {
    Degrade,
    Resize,
    PresetSwitch,
}

// ── SessionHandle ────────────────────────────────────────────────

/// Cloneable host-facing handle. Commands are fire-and-forget; state
/// is observed through the status watch and the event channel.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<Msg>,
    status_rx: watch::Receiver<SessionStatus>,
    input: InputBridge,
}

impl SessionHandle {
    /// Request a session start. Rejected (logged, dropped) while a
    /// session is already live.
    pub fn start(&self, request: StartRequest) {
        let _ = self.tx.send(Msg::Start(request));
    }

    /// Tear the session down to `Stopped`.
    pub fn stop(&self) {
        let _ = self.tx.send(Msg::Stop);
    }

    /// Stop the session and terminate the controller task. The
    /// handle is inert afterwards; call this when the hosting view
    /// goes away for good.
    pub fn shutdown(&self) {
        let _ = self.tx.send(Msg::Shutdown);
    }

    /// Switch to a preset by name (unknown names fall back to the
    /// default preset). Disables automatic adaptation.
    pub fn select_preset(&self, name: &str) {
        let _ = self.tx.send(Msg::SelectPreset(name.to_string()));
    }

    /// Report a new host-container size.
    pub fn resize(&self, container: SizeF) {
        let _ = self.tx.send(Msg::Resize(container));
    }

    /// Enable or disable the automatic degradation policy.
    pub fn set_auto_adapt(&self, enabled: bool) {
        let _ = self.tx.send(Msg::SetAutoAdapt(enabled));
    }

    /// Cancel the device-to-host clipboard listener without touching
    /// the rest of the session.
    pub fn stop_clipboard_sync(&self) {
        let _ = self.tx.send(Msg::StopClipboardSync);
    }

    /// Current status snapshot.
    pub fn status(&self) -> SessionStatus {
        self.status_rx.borrow().clone()
    }

    /// Watch channel carrying status snapshots.
    pub fn status_watch(&self) -> watch::Receiver<SessionStatus> {
        self.status_rx.clone()
    }

    /// The input injection surface.
    pub fn input(&self) -> InputBridge {
        self.input.clone()
    }
}

// ── SessionController ────────────────────────────────────────────

/// Spawns the controller task for one device.
pub struct SessionController;

impl SessionController {
    /// Spawn a controller over `transport`. Returns the host handle
    /// and the event notification channel.
    pub fn spawn(
        transport: Arc<dyn Transport>,
        config: SessionConfig,
    ) -> (SessionHandle, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(SessionStatus::default());
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (route_tx, route_rx) = watch::channel(None);

        let auto_adapt = config.auto_adapt;
        let controller = Controller {
            transport,
            config,
            ladder: QualityLadder::default(),
            tx: tx.clone(),
            status_tx,
            event_tx,
            route_tx,
            phase: SessionPhase::Idle,
            preset: QualityLadder::default().default_preset().id,
            auto_adapt,
            desktop: false,
            container: SizeF::default(),
            last_start_container: SizeF::default(),
            geometry: SizePx::default(),
            fps: 0.0,
            adapting: false,
            epoch: 0,
            live: None,
            parked_surface: None,
            parked_overlay: None,
            resize_target: None,
            resize_deadline: None,
            restart_in_flight: false,
            resize_in_flight: false,
        };
        tokio::spawn(controller.run(rx));

        let handle = SessionHandle {
            tx,
            status_rx,
            input: InputBridge::new(route_rx),
        };
        (handle, event_rx)
    }
}

/// Per-session resources, exclusively owned, discarded on stop.
struct Live {
    connection: Box<dyn DeviceConnection>,
    controller: Arc<dyn DeviceController>,
    pipe_cancel: CancellationToken,
    pipe_task: JoinHandle<RendererParts>,
    clipboard_cancel: CancellationToken,
    clipboard_task: JoinHandle<()>,
    monitor: PerfMonitor,
}

type RendererParts = (Box<dyn Surface>, Option<(OverlaySpec, Box<dyn OverlaySource>)>);

struct Controller {
    transport: Arc<dyn Transport>,
    config: SessionConfig,
    ladder: QualityLadder,
    /// Self-sender for the monitor callback and the frame pipe.
    tx: mpsc::UnboundedSender<Msg>,
    status_tx: watch::Sender<SessionStatus>,
    event_tx: mpsc::UnboundedSender<SessionEvent>,
    route_tx: watch::Sender<Option<InputRoute>>,

    phase: SessionPhase,
    preset: PresetId,
    auto_adapt: bool,
    desktop: bool,
    /// Latest host-container size.
    container: SizeF,
    /// Container size at the last successful start; resize deltas are
    /// measured against this.
    last_start_container: SizeF,
    /// Authoritative device-reported geometry.
    geometry: SizePx,
    fps: f64,
    adapting: bool,

    /// Bumped on every start; stale monitor/pipe messages carry an
    /// older value and are discarded.
    epoch: u64,
    live: Option<Live>,
    parked_surface: Option<Box<dyn Surface>>,
    parked_overlay: Option<(OverlaySpec, Box<dyn OverlaySource>)>,

    resize_target: Option<SizeF>,
    resize_deadline: Option<Instant>,
    restart_in_flight: bool,
    resize_in_flight: bool,
}

impl Controller {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Msg>) {
        loop {
            let deadline = self.resize_deadline;

            tokio::select! {
                msg = rx.recv() => match msg {
                    Some(Msg::Shutdown) | None => {
                        self.teardown(SessionPhase::Stopped).await;
                        break;
                    }
                    Some(msg) => self.handle(msg).await,
                },
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)),
                    if deadline.is_some() =>
                {
                    self.resize_deadline_elapsed().await;
                }
            }
        }
    }

    async fn handle(&mut self, msg: Msg) {
        match msg {
            Msg::Start(request) => self.handle_start(request).await,
            Msg::Stop => self.teardown(SessionPhase::Stopped).await,
            // Handled in the run loop; listed here for exhaustiveness.
            Msg::Shutdown => {}
            Msg::SelectPreset(name) => self.handle_select_preset(&name).await,
            Msg::Resize(container) => self.handle_resize(container),
            Msg::SetAutoAdapt(enabled) => {
                self.auto_adapt = enabled;
            }
            Msg::StopClipboardSync => {
                if let Some(live) = &self.live {
                    live.clipboard_cancel.cancel();
                }
            }
            Msg::Degrade { epoch } => self.handle_degrade(epoch).await,
            Msg::FpsSample { epoch, fps } => {
                if epoch == self.epoch {
                    self.fps = fps;
                    self.publish_status();
                }
            }
            Msg::PipeDown { epoch, error } => self.handle_pipe_down(epoch, error).await,
        }
    }

    // ── Command handlers ─────────────────────────────────────────

    async fn handle_start(&mut self, request: StartRequest) {
        if self.phase.is_live() {
            warn!(phase = %self.phase, "start rejected: session already live");
            return;
        }

        self.desktop = request.desktop;
        self.container = request.container;
        self.parked_surface = Some(request.surface);
        // A fresh start never inherits the previous session's overlay.
        self.parked_overlay = request.overlay;
        self.preset = self.ladder.resolve(request.preset.as_deref()).id;
        self.auto_adapt = self.config.auto_adapt;

        self.start_session(None).await;
    }

    async fn handle_select_preset(&mut self, name: &str) {
        let target = self.ladder.resolve(Some(name)).id;
        // Explicit choice must not be silently overridden.
        self.auto_adapt = false;

        if self.phase == SessionPhase::Active {
            self.restart(target, RestartReason::PresetSwitch).await;
        } else {
            self.preset = target;
            self.publish_status();
        }
    }

    fn handle_resize(&mut self, container: SizeF) {
        self.container = container;
        if self.phase != SessionPhase::Active {
            return;
        }

        let dx = (container.width - self.last_start_container.width).abs();
        let dy = (container.height - self.last_start_container.height).abs();
        let threshold = self.config.resize.threshold_px as f64;
        if dx < threshold && dy < threshold {
            return;
        }

        // Each qualifying observation re-arms the debounce window.
        self.resize_target = Some(container);
        self.resize_deadline =
            Some(Instant::now() + Duration::from_millis(self.config.resize.debounce_ms));
    }

    async fn resize_deadline_elapsed(&mut self) {
        self.resize_deadline = None;
        let Some(target) = self.resize_target.take() else {
            return;
        };
        if self.restart_in_flight {
            debug!("resize restart dropped: another restart in flight");
            return;
        }
        if self.phase != SessionPhase::Active {
            return;
        }

        self.resize_in_flight = true;
        self.container = target;
        self.restart(self.preset, RestartReason::Resize).await;
        self.resize_in_flight = false;
    }

    async fn handle_degrade(&mut self, epoch: u64) {
        if epoch != self.epoch {
            debug!("degradation signal from a disposed session ignored");
            return;
        }
        if !self.auto_adapt {
            return;
        }
        if self.phase != SessionPhase::Active || self.restart_in_flight || self.resize_in_flight {
            return;
        }

        match self.ladder.next_lower(self.preset) {
            Some(lower) => {
                let target = lower.id;
                self.restart(target, RestartReason::Degrade).await;
            }
            None => {
                // No-op at the floor.
                info!(preset = %self.preset, "degradation at minimum quality");
                self.emit(SessionEvent::AlreadyAtMinimum);
            }
        }
    }

    async fn handle_pipe_down(&mut self, epoch: u64, error: Option<SessionError>) {
        if epoch != self.epoch || !self.phase.is_live() {
            return;
        }
        let error = error.unwrap_or(SessionError::StreamEnded);
        warn!(error = %error, "video stream went down");
        self.teardown(SessionPhase::Failed).await;
        self.emit(SessionEvent::Failed(error.to_string()));
    }

    // ── Start / stop / restart ───────────────────────────────────

    /// Run the start algorithm. On any provisioning or protocol error
    /// the session lands in `Failed` with all partial resources
    /// released.
    async fn start_session(&mut self, bit_rate_override: Option<u32>) {
        self.epoch += 1;
        let epoch = self.epoch;
        self.set_phase(SessionPhase::Starting);

        let preset = *self.ladder.get(self.preset);
        let request = if self.desktop {
            let geometry = desktop_geometry(self.container, &self.config.desktop);
            geometry.provision_request(preset.bit_rate, preset.max_frame_rate)
        } else {
            ProvisionRequest::Mirror {
                max_dimension: preset.max_dimension,
                bit_rate: preset.bit_rate,
                max_frame_rate: preset.max_frame_rate,
            }
        };
        let request = match bit_rate_override {
            Some(rate) => request.with_bit_rate(rate),
            None => request,
        };

        let mut connection = match self.transport.provision(&request).await {
            Ok(connection) => connection,
            Err(e) => return self.fail_start(e),
        };
        let (metadata, frames) = match connection.open_video().await {
            Ok(opened) => opened,
            Err(e) => return self.fail_start(e),
        };
        if metadata.width == 0 || metadata.height == 0 {
            return self.fail_start(SessionError::Protocol("zero stream dimensions"));
        }
        let controller = match connection.open_controller().await {
            Ok(controller) => controller,
            Err(e) => return self.fail_start(e),
        };
        let clipboard = match connection.open_clipboard().await {
            Ok(clipboard) => clipboard,
            Err(e) => return self.fail_start(e),
        };
        let Some(surface) = self.parked_surface.take() else {
            return self.fail_start(SessionError::NoSurface);
        };

        // The device is authoritative on geometry.
        let geometry = SizePx::new(metadata.width, metadata.height);

        let tx = self.tx.clone();
        let monitor = PerfMonitor::start(self.config.monitor.clone(), move |signal| {
            let msg = match signal {
                MonitorSignal::Sample(fps) => Msg::FpsSample { epoch, fps },
                MonitorSignal::Degrade => Msg::Degrade { epoch },
            };
            let _ = tx.send(msg);
        });

        let mut renderer = Renderer::bind(
            surface,
            geometry,
            monitor.probe(),
            self.config.watermark.clone(),
        );
        if let Some((spec, source)) = self.parked_overlay.take() {
            renderer.set_overlay(spec, source);
        }

        let pipe_cancel = CancellationToken::new();
        let pipe_task =
            spawn_frame_pipe(renderer, frames, pipe_cancel.clone(), self.tx.clone(), epoch);
        let clipboard_cancel = CancellationToken::new();
        let clipboard_task =
            spawn_clipboard_listener(clipboard, clipboard_cancel.clone(), self.event_tx.clone());

        let _ = self.route_tx.send(Some(InputRoute {
            controller: Arc::clone(&controller),
            device: geometry,
        }));

        self.live = Some(Live {
            connection,
            controller,
            pipe_cancel,
            pipe_task,
            clipboard_cancel,
            clipboard_task,
            monitor,
        });
        self.geometry = geometry;
        self.fps = 0.0;
        self.last_start_container = self.container;
        self.set_phase(SessionPhase::Active);
        info!(
            preset = %self.preset,
            width = geometry.width,
            height = geometry.height,
            codec = %metadata.codec,
            desktop = self.desktop,
            "session active"
        );
    }

    fn fail_start(&mut self, error: SessionError) {
        warn!(error = %error, "session start failed");
        let _ = self.route_tx.send(None);
        self.set_phase(SessionPhase::Failed);
        self.emit(SessionEvent::Failed(error.to_string()));
    }

    /// Tear down in the mandated order: frame pipe first, then the
    /// recurring timers, then controller/clipboard channels, then the
    /// transport handle, then the surface binding is parked for the
    /// next start.
    async fn teardown(&mut self, next: SessionPhase) {
        self.resize_target = None;
        self.resize_deadline = None;
        let _ = self.route_tx.send(None);

        if let Some(live) = self.live.take() {
            live.pipe_cancel.cancel();
            match live.pipe_task.await {
                Ok((surface, overlay)) => {
                    self.parked_surface = Some(surface);
                    self.parked_overlay = overlay;
                }
                Err(e) => warn!(error = %e, "frame pipe task failed to join"),
            }

            live.monitor.stop();

            live.clipboard_cancel.cancel();
            let _ = live.clipboard_task.await;

            drop(live.controller);
            drop(live.connection);
        }

        self.fps = 0.0;
        self.set_phase(next);
    }

    /// Stop the current stream and bring it back up with `target`.
    async fn restart(&mut self, target: PresetId, reason: RestartReason) {
        self.restart_in_flight = true;
        self.adapting = true;
        self.emit(SessionEvent::Adapting(true));

        self.teardown(SessionPhase::Adapting).await;

        let from = self.preset;
        self.preset = target;
        let bit_rate_override = match reason {
            // Shorter visual disruption while the user is dragging;
            // the next explicit action restores the preset's rate.
            RestartReason::Resize => Some(self.config.transition_bit_rate),
            RestartReason::Degrade | RestartReason::PresetSwitch => None,
        };
        self.start_session(bit_rate_override).await;

        if self.phase == SessionPhase::Active && reason == RestartReason::Degrade {
            info!(from = %from, to = %target, "quality degraded");
            self.emit(SessionEvent::QualityDegraded { from, to: target });
        }

        self.adapting = false;
        self.emit(SessionEvent::Adapting(false));
        self.restart_in_flight = false;
        self.publish_status();
    }

    // ── Status plumbing ──────────────────────────────────────────

    fn set_phase(&mut self, phase: SessionPhase) {
        if self.phase != phase {
            debug!(from = %self.phase, to = %phase, "phase transition");
            self.phase = phase;
            self.emit(SessionEvent::PhaseChanged(phase));
        }
        self.publish_status();
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.event_tx.send(event);
    }

    fn publish_status(&self) {
        let _ = self.status_tx.send(SessionStatus {
            phase: self.phase,
            preset: self.preset,
            fps: self.fps,
            adapting: self.adapting,
            width: self.geometry.width,
            height: self.geometry.height,
        });
    }
}

// ── Worker tasks ─────────────────────────────────────────────────

/// Pipe frames into the renderer until cancelled or the stream ends.
///
/// Frames are drawn or dropped immediately, never queued. Errors
/// caused by our own teardown are swallowed; anything else is
/// reported so the controller can fail the session.
fn spawn_frame_pipe(
    mut renderer: Renderer,
    mut frames: FrameStream,
    cancel: CancellationToken,
    tx: mpsc::UnboundedSender<Msg>,
    epoch: u64,
) -> JoinHandle<RendererParts> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                item = frames.next() => match item {
                    Some(Ok(frame)) => renderer.render(&frame),
                    Some(Err(e)) if e.is_expected_cancellation() => break,
                    Some(Err(e)) => {
                        let _ = tx.send(Msg::PipeDown { epoch, error: Some(e) });
                        break;
                    }
                    None => {
                        if !cancel.is_cancelled() {
                            let _ = tx.send(Msg::PipeDown { epoch, error: None });
                        }
                        break;
                    }
                },
            }
        }
        renderer.into_parts()
    })
}

/// Forward device clipboard changes until cancelled. Cancellable
/// independently of the rest of the session.
fn spawn_clipboard_listener(
    mut clipboard: ClipboardStream,
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<SessionEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                item = clipboard.next() => match item {
                    Some(Ok(text)) => {
                        let _ = events.send(SessionEvent::ClipboardFromDevice(text));
                    }
                    Some(Err(e)) if e.is_expected_cancellation() => break,
                    Some(Err(e)) => {
                        warn!(error = %e, "clipboard listener error");
                        break;
                    }
                    None => break,
                },
            }
        }
    })
}
