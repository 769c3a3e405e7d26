use std::time::Instant;

use tracing::debug;

/// Per-stage stopwatch for skybox builds. Compiles to a no-op without
/// `perf_timing`.
#[derive(Clone, Copy, Debug)]
pub struct Timing {
    started: Option<Instant>,
    last_lap: Option<Instant>,
}

impl Timing {
    #[inline]
    pub fn start() -> Self {
        #[cfg(feature = "perf_timing")]
        let now = Some(Instant::now());
        #[cfg(not(feature = "perf_timing"))]
        let now = None;
        Self {
            started: now,
            last_lap: now,
        }
    }

    /// Logs the time spent since the previous lap.
    pub fn lap(&mut self, stage: &'static str) {
        let Some(last) = self.last_lap else {
            return;
        };
        let now = Instant::now();
        debug!(stage, "{:.2} ms", (now - last).as_secs_f32() * 1000.0);
        self.last_lap = Some(now);
    }

    /// Total milliseconds since `start`, 0 when timing is compiled out.
    #[inline]
    pub fn ms(&self) -> f32 {
        self.started
            .map_or(0.0, |t| t.elapsed().as_secs_f32() * 1000.0)
    }
}
