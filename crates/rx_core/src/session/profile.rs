//! Per-stage timings, collected when profiling is on

use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};
use strum::IntoEnumIterator;
use strum_macros::{EnumIter, IntoStaticStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    Advance,
    Observe,
    Decompose,
    Grids,
    Scalars,
    Actions,
    Flush,
    Pace,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StageTiming {
    pub calls: u64,
    pub total: Duration,
}

impl StageTiming {
    pub fn mean(&self) -> Duration {
        match u32::try_from(self.calls) {
            Ok(0) => Duration::ZERO,
            Ok(calls) => self.total / calls,
            Err(_) => self.total.div_f64(self.calls as f64),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Stopwatch {
    enabled: bool,
    timings: Vec<StageTiming>,
}

impl Stopwatch {
    pub fn new(enabled: bool) -> Self {
        Self { enabled, timings: vec![StageTiming::default(); Stage::iter().len()] }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// `None` when disabled, so the clock is never read
    #[inline]
    pub fn start(&self) -> Option<Instant> {
        self.enabled.then(Instant::now)
    }

    #[inline]
    pub fn stop(&mut self, stage: Stage, started: Option<Instant>) {
        if let Some(started) = started {
            let timing = &mut self.timings[stage as usize];
            timing.calls += 1;
            timing.total += started.elapsed();
        }
    }

    pub fn timing(&self, stage: Stage) -> StageTiming {
        self.timings[stage as usize]
    }

    pub fn report(&self) -> ProfileReport {
        ProfileReport {
            stages: Stage::iter()
                .map(|s| (<&'static str>::from(s), self.timing(s)))
                .filter(|(_, t)| t.calls > 0)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileReport {
    pub stages: Vec<(&'static str, StageTiming)>,
}

impl fmt::Display for ProfileReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{:<10} {:>8} {:>12} {:>12}", "stage", "calls", "total", "mean")?;
        for (name, timing) in &self.stages {
            writeln!(
                f,
                "{:<10} {:>8} {:>12.3?} {:>12.3?}",
                name,
                timing.calls,
                timing.total,
                timing.mean()
            )?;
        }
        Ok(())
    }
}
