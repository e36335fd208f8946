//! Frame-rate performance monitor.
//!
//! Decides, without any knowledge of presets or transport, whether
//! frame delivery is unacceptably and persistently low. Each rendered
//! frame bumps a counter; on a fixed interval the monitor derives the
//! effective fps, tracks a consecutive-slow-window streak, and fires a
//! one-shot degradation callback once the streak reaches the
//! configured count.
//!
//! The window arithmetic is a pure type ([`PerformanceWindow`]) fed
//! explicit frame counts and elapsed time, so the policy is testable
//! without timers; the timer task is a thin loop around it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::MonitorConfig;

// ── Sampling outcome ─────────────────────────────────────────────

/// Outcome of one sampling window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    /// Zero frames or zero elapsed time; excluded from the streak
    /// rather than counted as slow.
    Empty,
    /// At or above the threshold; the streak was reset.
    Healthy(f64),
    /// Below the threshold; the streak grew but has not fired.
    Slow { fps: f64, streak: u32 },
    /// The streak reached the configured count. Fired once; the
    /// streak is reset so it cannot fire again immediately.
    Degrade(f64),
}

// ── PerformanceWindow ────────────────────────────────────────────

/// Mutable per-session sampling state. Recreated on every session
/// start so nothing leaks across sessions.
#[derive(Debug, Default)]
pub struct PerformanceWindow {
    consecutive_slow: u32,
    last_fps: Option<f64>,
}

impl PerformanceWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one window of `frames` over `elapsed` into the streak.
    pub fn sample(&mut self, frames: u64, elapsed: Duration, cfg: &MonitorConfig) -> Sample {
        if frames == 0 || elapsed.is_zero() {
            return Sample::Empty;
        }

        let fps = frames as f64 / elapsed.as_secs_f64();
        self.last_fps = Some(fps);

        if fps >= cfg.threshold_fps {
            self.consecutive_slow = 0;
            return Sample::Healthy(fps);
        }

        self.consecutive_slow += 1;
        if self.consecutive_slow >= cfg.slow_window_count {
            self.consecutive_slow = 0;
            Sample::Degrade(fps)
        } else {
            Sample::Slow {
                fps,
                streak: self.consecutive_slow,
            }
        }
    }

    /// Most recently computed fps, for passive display.
    pub fn last_fps(&self) -> Option<f64> {
        self.last_fps
    }
}

// ── FrameProbe ───────────────────────────────────────────────────

/// Cloneable counter handle the renderer bumps once per presented
/// frame. The sole producer is the renderer's draw path, so the
/// monitor only sees frames that actually reached the surface.
#[derive(Debug, Clone, Default)]
pub struct FrameProbe {
    frames: Arc<AtomicU64>,
}

impl FrameProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one presented frame.
    pub fn record_frame(&self) {
        self.frames.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn take(&self) -> u64 {
        self.frames.swap(0, Ordering::Relaxed)
    }
}

// ── PerfMonitor ──────────────────────────────────────────────────

/// Signals the sampling task hands to its owner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MonitorSignal {
    /// A non-empty window completed with this fps.
    Sample(f64),
    /// Sustained degradation: drop one quality step.
    Degrade,
}

/// Running monitor for one session.
///
/// Stopping cancels the interval task, which owns the signal
/// callback — no post-stop signal can reach a disposed session.
pub struct PerfMonitor {
    probe: FrameProbe,
    fps_rx: watch::Receiver<f64>,
    cancel: CancellationToken,
}

impl PerfMonitor {
    /// Spawn the sampling task. `on_signal` receives one
    /// [`MonitorSignal::Sample`] per non-empty window and at most one
    /// [`MonitorSignal::Degrade`] per completed slow streak.
    pub fn start<F>(cfg: MonitorConfig, on_signal: F) -> Self
    where
        F: Fn(MonitorSignal) + Send + 'static,
    {
        let probe = FrameProbe::new();
        let (fps_tx, fps_rx) = watch::channel(0.0);
        let cancel = CancellationToken::new();

        let task_probe = probe.clone();
        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            let mut window = PerformanceWindow::new();
            let mut ticker = tokio::time::interval(Duration::from_millis(cfg.interval_ms));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; consume it so the
            // first real window spans a full interval.
            ticker.tick().await;
            let mut last = Instant::now();

            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    tick = ticker.tick() => {
                        let elapsed = tick.duration_since(last);
                        last = tick;
                        let frames = task_probe.take();
                        match window.sample(frames, elapsed, &cfg) {
                            Sample::Empty => {}
                            Sample::Healthy(fps) => {
                                let _ = fps_tx.send(fps);
                                on_signal(MonitorSignal::Sample(fps));
                            }
                            Sample::Slow { fps, streak } => {
                                debug!(fps, streak, "slow sampling window");
                                let _ = fps_tx.send(fps);
                                on_signal(MonitorSignal::Sample(fps));
                            }
                            Sample::Degrade(fps) => {
                                debug!(fps, "sustained degradation");
                                let _ = fps_tx.send(fps);
                                on_signal(MonitorSignal::Sample(fps));
                                on_signal(MonitorSignal::Degrade);
                            }
                        }
                    }
                }
            }
        });

        Self {
            probe,
            fps_rx,
            cancel,
        }
    }

    /// Counter handle for the renderer.
    pub fn probe(&self) -> FrameProbe {
        self.probe.clone()
    }

    /// Last computed fps (0.0 until the first non-empty window).
    pub fn fps(&self) -> f64 {
        *self.fps_rx.borrow()
    }

    /// Watch channel carrying the latest fps.
    pub fn fps_watch(&self) -> watch::Receiver<f64> {
        self.fps_rx.clone()
    }

    /// Cancel the sampling task and drop the callback.
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Drop for PerfMonitor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(5);

    fn cfg() -> MonitorConfig {
        MonitorConfig::default()
    }

    /// Feed a window at the given fps (5-second windows).
    fn feed(window: &mut PerformanceWindow, fps: u64, cfg: &MonitorConfig) -> Sample {
        window.sample(fps * 5, WINDOW, cfg)
    }

    #[test]
    fn four_slow_windows_fire_once() {
        let cfg = cfg();
        let mut w = PerformanceWindow::new();

        assert!(matches!(feed(&mut w, 10, &cfg), Sample::Slow { streak: 1, .. }));
        assert!(matches!(feed(&mut w, 10, &cfg), Sample::Slow { streak: 2, .. }));
        assert!(matches!(feed(&mut w, 10, &cfg), Sample::Slow { streak: 3, .. }));
        assert!(matches!(feed(&mut w, 10, &cfg), Sample::Degrade(_)));

        // Streak was reset; the next slow window starts over.
        assert!(matches!(feed(&mut w, 10, &cfg), Sample::Slow { streak: 1, .. }));
    }

    #[test]
    fn healthy_window_resets_streak() {
        let cfg = cfg();
        let mut w = PerformanceWindow::new();

        feed(&mut w, 10, &cfg);
        assert!(matches!(feed(&mut w, 20, &cfg), Sample::Healthy(_)));
        feed(&mut w, 10, &cfg);
        feed(&mut w, 10, &cfg);
        // Only three slow windows since the reset: no degrade.
        assert!(!matches!(feed(&mut w, 10, &cfg), Sample::Degrade(_)));
    }

    #[test]
    fn zero_frame_window_is_no_sample() {
        let cfg = cfg();
        let mut w = PerformanceWindow::new();

        feed(&mut w, 10, &cfg);
        feed(&mut w, 10, &cfg);
        feed(&mut w, 10, &cfg);
        // Stalled window: excluded, streak untouched, fps unchanged.
        assert_eq!(w.sample(0, WINDOW, &cfg), Sample::Empty);
        assert!(matches!(feed(&mut w, 10, &cfg), Sample::Degrade(_)));
    }

    #[test]
    fn zero_elapsed_is_no_sample() {
        let cfg = cfg();
        let mut w = PerformanceWindow::new();
        assert_eq!(w.sample(100, Duration::ZERO, &cfg), Sample::Empty);
    }

    #[test]
    fn last_fps_tracks_non_empty_windows() {
        let cfg = cfg();
        let mut w = PerformanceWindow::new();
        assert!(w.last_fps().is_none());

        feed(&mut w, 30, &cfg);
        assert_eq!(w.last_fps(), Some(30.0));

        w.sample(0, WINDOW, &cfg);
        assert_eq!(w.last_fps(), Some(30.0));
    }

    #[test]
    fn probe_drains_on_take() {
        let probe = FrameProbe::new();
        probe.record_frame();
        probe.record_frame();
        assert_eq!(probe.take(), 2);
        assert_eq!(probe.take(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_task_fires_after_sustained_slowness() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let monitor = PerfMonitor::start(cfg(), move |signal| {
            let _ = tx.send(signal);
        });
        let probe = monitor.probe();

        // Four windows at 10 fps (50 frames per 5 s window).
        for _ in 0..4 {
            for _ in 0..50 {
                probe.record_frame();
            }
            tokio::time::advance(Duration::from_millis(5_000)).await;
            tokio::task::yield_now().await;
        }

        let mut signals = Vec::new();
        while let Ok(s) = rx.try_recv() {
            signals.push(s);
        }
        let degrades = signals
            .iter()
            .filter(|s| matches!(s, MonitorSignal::Degrade))
            .count();
        assert_eq!(degrades, 1, "must fire exactly once");
        assert_eq!(
            signals
                .iter()
                .filter(|s| matches!(s, MonitorSignal::Sample(_)))
                .count(),
            4
        );
        assert!((monitor.fps() - 10.0).abs() < 0.5);

        monitor.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_monitor_never_signals() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let monitor = PerfMonitor::start(cfg(), move |signal| {
            let _ = tx.send(signal);
        });
        let probe = monitor.probe();

        monitor.stop();

        for _ in 0..8 {
            for _ in 0..50 {
                probe.record_frame();
            }
            tokio::time::advance(Duration::from_millis(5_000)).await;
            tokio::task::yield_now().await;
        }

        assert!(rx.try_recv().is_err());
    }
}
