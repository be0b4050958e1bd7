use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use log::info;

use crate::distributor::Event;
use crate::grid::Cell;

/// Logs the alive cell count at most once per interval.
///
/// The check only runs when a new board arrives, so a paused run (which
/// produces no boards) stays silent.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    interval: Duration,
    last_report: Instant,
}

impl ProgressReporter {
    pub fn new(interval: Duration) -> Self {
        Self::starting_at(interval, Instant::now())
    }

    pub fn starting_at(interval: Duration, start: Instant) -> Self {
        ProgressReporter {
            interval,
            last_report: start,
        }
    }

    /// Called for every new board. Returns the count if it was reported.
    pub fn observe(&mut self, alive_count: usize) -> Option<usize> {
        self.observe_at(Instant::now(), alive_count)
    }

    pub fn observe_at(&mut self, now: Instant, alive_count: usize) -> Option<usize> {
        if now.saturating_duration_since(self.last_report) < self.interval {
            return None;
        }
        self.last_report = now;
        info!("Alive cells: {alive_count}");
        Some(alive_count)
    }

    /// Consume distributor events until the final turn. Returns the final
    /// alive cells, or `None` if the stream ended without one.
    pub fn follow(mut self, events: Receiver<Event>) -> Option<Vec<Cell>> {
        for event in events {
            match event {
                Event::TurnComplete { alive, .. } => {
                    self.observe(alive.len());
                }
                Event::TurnStarted { .. } => {}
                Event::StateChange { turn, state } => info!("turn {turn}: now {state:?}"),
                Event::ImageWritten { turn, filename } => info!("turn {turn}: image {filename} written"),
                Event::FinalTurnComplete { turn, alive } => {
                    info!("finished after {turn} turns with {} alive cells", alive.len());
                    return Some(alive);
                }
            }
        }
        None
    }
}
