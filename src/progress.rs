use crate::error::RoomError;

/// Receives status updates from long running loops.
///
/// Returning `false` asks the running phase to stop as soon as possible.
pub trait Progress {
    /// Receive `status`; return `false` to cancel the running phase.
    fn report(&mut self, status: &str) -> bool;
}

impl<F> Progress for F
where
    F: FnMut(&str) -> bool,
{
    fn report(&mut self, status: &str) -> bool {
        self(status)
    }
}

/// A [`Progress`] that never cancels and discards every status.
#[derive(Copy, Clone, Debug, Default)]
pub struct Silent;

impl Progress for Silent {
    fn report(&mut self, _status: &str) -> bool {
        true
    }
}

/// Polls a [`Progress`] every `interval` iterations of one phase, starting with the first.
pub(crate) struct Ticker<'p> {
    progress: &'p mut dyn Progress,
    phase: &'static str,
    interval: u64,
    ticks: u64,
}

impl<'p> Ticker<'p> {
    pub(crate) fn new(progress: &'p mut dyn Progress, phase: &'static str, interval: u64) -> Self {
        Self {
            progress,
            phase,
            interval: interval.max(1),
            ticks: 0,
        }
    }

    /// Count one iteration; `processed` is reported in the status and in [`RoomError::Cancelled`].
    pub(crate) fn tick(&mut self, processed: usize) -> Result<(), RoomError> {
        let due = self.ticks % self.interval == 0;
        self.ticks += 1;

        if due && !self.progress.report(&format!("{}: {}", self.phase, processed)) {
            return Err(RoomError::Cancelled { phase: self.phase, processed });
        }
        Ok(())
    }

    /// Switch to another phase, restarting the poll schedule.
    pub(crate) fn enter(&mut self, phase: &'static str) {
        self.phase = phase;
        self.ticks = 0;
    }
}
