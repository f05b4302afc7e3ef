use crate::core::solution::Solution;
use log::{debug, warn};
use std::fmt;
use std::io::Write;

/// Periodic progress output for a running optimizer.
///
/// Every `every` iterations the current best is logged at debug level and,
/// when a sink is attached, written as `> i = {i}: {best}`. The first
/// failed write detaches the sink.
pub(crate) struct Progress {
    sink: Option<Box<dyn Write + Send>>,
    every: usize,
}

impl Progress {
    pub(crate) fn new(sink: Option<Box<dyn Write + Send>>, every: usize) -> Self {
        Self {
            sink,
            every: every.max(1),
        }
    }

    pub(crate) fn report(&mut self, iteration: usize, best: &Solution) {
        if iteration % self.every != 0 {
            return;
        }
        debug!("iteration {}: best {}", iteration, best.value());
        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = writeln!(sink, "> i = {}: {}", iteration, best) {
                warn!("progress sink failed, disabling progress output: {}", e);
                self.sink = None;
            }
        }
    }

    pub(crate) fn finish(&mut self) {
        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = sink.flush() {
                warn!("failed to flush progress sink: {}", e);
            }
        }
    }
}

impl fmt::Debug for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Progress")
            .field("sink", &self.sink.is_some())
            .field("every", &self.every)
            .finish()
    }
}
