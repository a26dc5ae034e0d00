use rand::Rng;
use std::sync::{Arc, Mutex};
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::ProgressPhases;

/// Receives simulated percentages for one task.
pub type ProgressSink = Arc<dyn Fn(f32) + Send + Sync>;

/// Completion smoothing: step count, step spacing, and the hold at 100%
/// before the task is finalized.
pub const SMOOTHING_STEPS: u32 = 8;
pub const SMOOTHING_STEP_MS: u64 = 25;
pub const COMPLETION_HOLD_MS: u64 = 500;

struct SimState {
    pct: f32,
    /// Tick loop runs while true.
    simulating: bool,
    /// Hard cutoff: once set, nothing is emitted, smoothing included.
    halted: bool,
}

/// Timer-driven fabricated progress for one in-flight transfer.
///
/// The transport exposes no byte-level progress, so a spawned task ticks out a
/// monotonically non-decreasing percentage: a fast ramp to
/// `fast_end_pct` in roughly 20 ticks, then small asymptotic steps toward
/// `slow_end_pct`, which is never exceeded. Emission and the halt flag share
/// one lock, so once `stop` returns no further value is reported, not even
/// from the completion smoothing ramp.
pub struct ProgressSimulator {
    state: Arc<Mutex<SimState>>,
}

impl ProgressSimulator {
    /// Spawn the tick loop. The simulator also halts when `cancel` fires, so
    /// cancelling a task needs no separate simulator teardown.
    pub fn start(phases: ProgressPhases, cancel: CancellationToken, sink: ProgressSink) -> Self {
        let state = Arc::new(Mutex::new(SimState {
            pct: 0.0,
            simulating: true,
            halted: false,
        }));

        let task_state = Arc::clone(&state);
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_millis(phases.tick_interval_ms));
            // The first tick of a tokio interval completes immediately.
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {}
                }

                let mut state = match task_state.lock() {
                    Ok(state) => state,
                    Err(e) => {
                        log::error!("Progress simulator state poisoned: {}", e);
                        break;
                    }
                };

                if !state.simulating || state.halted {
                    break;
                }

                let mut rng = rand::thread_rng();
                let fast_step = rng.gen::<f32>() * (phases.fast_end_pct / 10.0);

                let step = if state.pct + fast_step > phases.fast_end_pct {
                    // Slow phase: shrink to a small fraction of the remaining
                    // distance so the value approaches but never reaches the
                    // ceiling.
                    let remaining = phases.slow_end_pct - state.pct;
                    rng.gen_range(0.01..0.06) * remaining.max(0.0)
                } else {
                    fast_step
                };

                state.pct = (state.pct + step).min(phases.slow_end_pct);
                sink(state.pct);
            }
        });

        Self { state }
    }

    /// Last value handed to the sink; the smoothing ramp starts here.
    pub fn last_pct(&self) -> f32 {
        self.state.lock().map(|state| state.pct).unwrap_or(0.0)
    }

    /// End the simulated phase ahead of completion smoothing. The smoothing
    /// ramp may still emit; `stop` is the hard cutoff.
    pub fn finish(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.simulating = false;
        }
    }

    /// Halt all emission. Idempotent; after this returns the sink sees no
    /// further values, simulated or smoothed.
    pub fn stop(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.simulating = false;
            state.halted = true;
        }
    }

    /// Post-transfer ramp from the last simulated value to 100 in equal
    /// steps, then a short hold so the UI settles instead of jumping. Each
    /// step emits under the state lock and re-checks the halt flag, so a
    /// cancel landing mid-ramp cuts it off.
    pub async fn smooth_completion(&self, sink: &ProgressSink) {
        let from_pct = self.last_pct();

        for step in 1..=SMOOTHING_STEPS {
            tokio::time::sleep(Duration::from_millis(SMOOTHING_STEP_MS)).await;

            let mut state = match self.state.lock() {
                Ok(state) => state,
                Err(_) => return,
            };
            if state.halted {
                return;
            }

            let pct = from_pct + (100.0 - from_pct) * (step as f32 / SMOOTHING_STEPS as f32);
            state.pct = pct;
            sink(pct);
        }

        tokio::time::sleep(Duration::from_millis(COMPLETION_HOLD_MS)).await;
    }
}
