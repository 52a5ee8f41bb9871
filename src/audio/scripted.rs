use std::{collections::VecDeque, time::Instant};

use crate::error::AudioUnavailable;

use super::LevelSource;

/// Plays back a fixed list of levels, then keeps repeating `tail`.
pub(crate) struct ScriptedSource {
    levels: VecDeque<f64>,
    tail: Option<f64>,
}

impl ScriptedSource {
    pub(crate) fn new(levels: impl IntoIterator<Item = f64>, tail: Option<f64>) -> Self {
        Self {
            levels: levels.into_iter().collect(),
            tail,
        }
    }

    pub(crate) fn constant(level: f64) -> Self {
        Self::new([], Some(level))
    }
}

impl LevelSource for ScriptedSource {
    fn sample_level(&mut self) -> Result<f64, AudioUnavailable> {
        self.levels
            .pop_front()
            .or(self.tail)
            .ok_or_else(|| AudioUnavailable::new("script exhausted"))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Levels keyed to wall-clock time since the first read: each `(until_ms,
/// level)` segment applies until `until_ms`, then `tail` forever.
pub(crate) struct TimedSource {
    segments: Vec<(u64, f64)>,
    tail: f64,
    started: Option<Instant>,
}

impl TimedSource {
    pub(crate) fn new(segments: impl IntoIterator<Item = (u64, f64)>, tail: f64) -> Self {
        Self {
            segments: segments.into_iter().collect(),
            tail,
            started: None,
        }
    }
}

impl LevelSource for TimedSource {
    fn sample_level(&mut self) -> Result<f64, AudioUnavailable> {
        let elapsed_ms = self.started.get_or_insert_with(Instant::now).elapsed().as_millis() as u64;
        Ok(self
            .segments
            .iter()
            .find(|(until_ms, _)| elapsed_ms < *until_ms)
            .map_or(self.tail, |(_, level)| *level))
    }

    fn name(&self) -> &'static str {
        "timed"
    }
}
