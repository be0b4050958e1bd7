//! The distributor owns the board, farms each turn out to strip workers and
//! applies control requests between turns.

use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use log::{debug, error, info, warn};

use crate::config::Params;
use crate::error::GolError;
use crate::grid::{Cell, CellState, Grid};
use crate::io::IoHandle;
use crate::worker::{compute_strip, partition, StripView};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    Running,
    Paused,
    Terminating,
}

/// Requests the distributor handles at turn boundaries.
#[derive(Debug)]
pub enum Control {
    Pause,
    Resume,
    /// Write the current board without changing the control state.
    Snapshot,
    Terminate,
    /// Ask for the current turn, state and alive cells.
    Report(Sender<Report>),
    /// True when no turn is in flight and the io collaborator is idle.
    Idle(Sender<bool>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub turn: u64,
    pub state: ControlState,
    pub alive: Vec<Cell>,
}

/// What the distributor publishes while it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Workers for `turn` are about to be dispatched. Controls sent after
    /// this are applied once `turn` is complete.
    TurnStarted { turn: u64 },
    TurnComplete { turn: u64, alive: Vec<Cell> },
    StateChange { turn: u64, state: ControlState },
    ImageWritten { turn: u64, filename: String },
    FinalTurnComplete { turn: u64, alive: Vec<Cell> },
}

#[derive(Debug)]
pub enum StopReason {
    TurnLimit,
    Quit,
    /// A collaborator failed mid-run; the board is the last complete turn.
    Failed(GolError),
}

#[derive(Debug)]
pub struct FinalState {
    pub turns_completed: u64,
    pub alive: Vec<Cell>,
    pub reason: StopReason,
}

pub struct Distributor {
    params: Params,
    write_final_image: bool,
    io: IoHandle,
    controls: Receiver<Control>,
    events: Sender<Event>,
    state: ControlState,
    turn: u64,
}

impl Distributor {
    pub fn new(params: Params, io: IoHandle, controls: Receiver<Control>, events: Sender<Event>) -> Self {
        Distributor {
            params,
            write_final_image: true,
            io,
            controls,
            events,
            state: ControlState::Running,
            turn: 0,
        }
    }

    pub fn write_final_image(mut self, enabled: bool) -> Self {
        self.write_final_image = enabled;
        self
    }

    /// Load the initial board and run until the turn limit, a terminate
    /// request or a collaborator failure.
    ///
    /// Errors before the first turn are returned as `Err`; failures after that
    /// end the run with the last complete board in [`StopReason::Failed`].
    pub fn run(mut self) -> Result<FinalState, GolError> {
        self.params.validate()?;
        let mut grid = self
            .io
            .read_image(self.params.image_width, self.params.image_height)?;
        info!(
            "loaded {} with {} alive cells, {} workers",
            self.params.input_filename(),
            grid.alive_count(),
            self.params.threads
        );

        let reason = loop {
            if self.state == ControlState::Running {
                if self.params.turns.reached(self.turn) {
                    break StopReason::TurnLimit;
                }
                self.publish(Event::TurnStarted { turn: self.turn + 1 });
                grid = match next_turn(&grid, self.params.threads) {
                    Ok(next) => next,
                    Err(err) => break StopReason::Failed(err),
                };
                self.turn += 1;
                self.publish(Event::TurnComplete {
                    turn: self.turn,
                    alive: grid.alive_cells(),
                });
            }

            if let Err(err) = self.service_controls(&grid) {
                break StopReason::Failed(err);
            }
            if self.state == ControlState::Terminating {
                break StopReason::Quit;
            }
        };

        Ok(self.finish(grid, reason))
    }

    /// Apply pending controls. While paused this blocks until the run resumes
    /// or terminates.
    fn service_controls(&mut self, grid: &Grid) -> Result<(), GolError> {
        loop {
            let control = match self.state {
                ControlState::Running => match self.controls.try_recv() {
                    Ok(control) => control,
                    Err(TryRecvError::Empty | TryRecvError::Disconnected) => return Ok(()),
                },
                ControlState::Paused => match self.controls.recv() {
                    Ok(control) => control,
                    Err(_) => {
                        warn!("control source closed while paused");
                        self.transition(ControlState::Terminating);
                        return Ok(());
                    }
                },
                ControlState::Terminating => return Ok(()),
            };
            self.apply(control, grid)?;
        }
    }

    fn apply(&mut self, control: Control, grid: &Grid) -> Result<(), GolError> {
        match control {
            Control::Pause => {
                if self.state == ControlState::Running {
                    self.transition(ControlState::Paused);
                }
            }
            Control::Resume => {
                if self.state == ControlState::Paused {
                    self.transition(ControlState::Running);
                }
            }
            Control::Snapshot => self.write_image(grid)?,
            Control::Terminate => self.transition(ControlState::Terminating),
            Control::Report(reply) => {
                let _ = reply.send(Report {
                    turn: self.turn,
                    state: self.state,
                    alive: grid.alive_cells(),
                });
            }
            Control::Idle(reply) => {
                let idle = self.io.is_idle()?;
                let _ = reply.send(idle);
            }
        }
        Ok(())
    }

    fn transition(&mut self, state: ControlState) {
        info!("turn {}: {:?} -> {:?}", self.turn, self.state, state);
        self.state = state;
        self.publish(Event::StateChange { turn: self.turn, state });
    }

    fn write_image(&self, grid: &Grid) -> Result<(), GolError> {
        let filename = self.params.output_filename(self.turn);
        self.io.write_image(&filename, grid)?;
        info!("turn {}: saved {filename}", self.turn);
        self.publish(Event::ImageWritten {
            turn: self.turn,
            filename,
        });
        Ok(())
    }

    /// The io thread answers in order, so the idle reply only arrives once
    /// every earlier request has been handled.
    fn wait_for_io(&self) -> Result<(), GolError> {
        match self.io.is_idle()? {
            true => Ok(()),
            false => Err(GolError::unavailable("io")),
        }
    }

    fn finish(mut self, grid: Grid, reason: StopReason) -> FinalState {
        let reason = match reason {
            StopReason::Failed(err) => StopReason::Failed(err),
            done if self.write_final_image => match self.write_image(&grid).and_then(|()| self.wait_for_io()) {
                Ok(()) => done,
                Err(err) => StopReason::Failed(err),
            },
            done => done,
        };
        if let StopReason::Failed(err) = &reason {
            error!("run aborted after {} turns: {err}", self.turn);
        }

        if self.state != ControlState::Terminating {
            self.transition(ControlState::Terminating);
        }
        let alive = grid.alive_cells();
        self.publish(Event::FinalTurnComplete {
            turn: self.turn,
            alive: alive.clone(),
        });

        FinalState {
            turns_completed: self.turn,
            alive,
            reason,
        }
    }

    fn publish(&self, event: Event) {
        // Nobody listening is fine; the run does not wait on observers.
        let _ = self.events.send(event);
    }
}

/// Compute one turn: partition `grid` into `workers` strips, run each on its
/// own thread and reassemble the results in strip order.
pub fn next_turn(grid: &Grid, workers: usize) -> Result<Grid, GolError> {
    let strips = partition(grid.height(), workers);
    debug!("dispatching {} strips", strips.len());

    let (results, collected) = bounded(strips.len());
    let all_joined = thread::scope(|scope| {
        let handles: Vec<_> = strips
            .iter()
            .map(|&strip| {
                let results = results.clone();
                let view = StripView::of(grid, strip);
                scope.spawn(move || {
                    let _ = results.send((strip.index, compute_strip(&view)));
                })
            })
            .collect();

        // Barrier: every strip of this turn has returned before assembly.
        handles
            .into_iter()
            .fold(true, |ok, handle| handle.join().is_ok() && ok)
    });
    drop(results);
    if !all_joined {
        return Err(GolError::unavailable("worker"));
    }

    let mut parts: Vec<Option<Vec<Vec<CellState>>>> = vec![None; strips.len()];
    for (index, rows) in collected.try_iter() {
        parts[index] = Some(rows);
    }

    let mut rows = Vec::with_capacity(grid.height());
    for part in parts {
        rows.extend(part.ok_or_else(|| GolError::unavailable("worker"))?);
    }
    Ok(Grid::from_rows(grid.width(), rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TurnLimit;
    use crate::io::{spawn_io, ImageStore, MemoryStore};
    use crossbeam_channel::unbounded;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn glider() -> Vec<Cell> {
        vec![Cell::new(1, 0), Cell::new(2, 1), Cell::new(0, 2), Cell::new(1, 2), Cell::new(2, 2)]
    }

    fn params(turns: TurnLimit, threads: usize) -> Params {
        Params {
            turns,
            threads,
            image_width: 8,
            image_height: 8,
        }
    }

    fn start(params: Params, board: &Grid) -> (Distributor, MemoryStore, Sender<Control>, Receiver<Event>) {
        let store = MemoryStore::new();
        store.insert_grid(params.input_filename(), board);
        let (io, _thread) = spawn_io(store.clone()).unwrap();
        let (controls, control_rx) = unbounded();
        let (events_tx, events) = unbounded();
        let distributor = Distributor::new(params, io, control_rx, events_tx);
        (distributor, store, controls, events)
    }

    fn reference(board: &Grid, turns: u64) -> Grid {
        (0..turns).fold(board.clone(), |grid, _| grid.next_generation())
    }

    #[test]
    fn runs_to_the_turn_limit() {
        let board = Grid::with_alive(8, 8, &glider());
        let (distributor, store, _controls, events) = start(params(TurnLimit::Bounded(6), 3), &board);

        let outcome = distributor.run().unwrap();
        assert!(matches!(outcome.reason, StopReason::TurnLimit));
        assert_eq!(outcome.turns_completed, 6);
        assert_eq!(outcome.alive, reference(&board, 6).alive_cells());
        assert_eq!(store.get("8x8x6"), Some(reference(&board, 6).to_bytes()));

        let turns: Vec<u64> = events
            .try_iter()
            .filter_map(|event| match event {
                Event::TurnComplete { turn, .. } => Some(turn),
                _ => None,
            })
            .collect();
        assert_eq!(turns, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn zero_turns_returns_the_initial_board() {
        let board = Grid::with_alive(8, 8, &glider());
        let (distributor, _store, _controls, _events) = start(params(TurnLimit::Bounded(0), 1), &board);
        let outcome = distributor.write_final_image(false).run().unwrap();
        assert_eq!(outcome.turns_completed, 0);
        assert_eq!(outcome.alive, glider());
    }

    #[test]
    fn pause_freezes_the_board() {
        let board = Grid::with_alive(8, 8, &glider());
        let (distributor, store, controls, events) = start(params(TurnLimit::Unbounded, 2), &board);

        let (reply, report) = bounded(2);
        let (idle_reply, idle) = bounded(1);
        controls.send(Control::Pause).unwrap();
        controls.send(Control::Report(reply.clone())).unwrap();
        controls.send(Control::Report(reply)).unwrap();
        controls.send(Control::Snapshot).unwrap();
        controls.send(Control::Idle(idle_reply)).unwrap();
        controls.send(Control::Terminate).unwrap();

        let outcome = distributor.write_final_image(false).run().unwrap();

        // Controls are only read after a complete turn.
        let paused_at = reference(&board, 1);
        let first = report.recv().unwrap();
        let second = report.recv().unwrap();
        assert_eq!(first.state, ControlState::Paused);
        assert_eq!(first.turn, 1);
        assert_eq!(first, second);
        assert_eq!(first.alive, paused_at.alive_cells());
        assert_eq!(store.get("8x8x1"), Some(paused_at.to_bytes()));
        assert!(idle.recv().unwrap());

        assert!(matches!(outcome.reason, StopReason::Quit));
        assert_eq!(outcome.turns_completed, 1);
        assert_eq!(outcome.alive, paused_at.alive_cells());

        let states: Vec<ControlState> = events
            .try_iter()
            .filter_map(|event| match event {
                Event::StateChange { state, .. } => Some(state),
                _ => None,
            })
            .collect();
        assert_eq!(states, vec![ControlState::Paused, ControlState::Terminating]);
    }

    #[test]
    fn resume_continues_from_the_frozen_board() {
        let board = Grid::with_alive(8, 8, &glider());
        let (distributor, _store, controls, _events) = start(params(TurnLimit::Bounded(4), 4), &board);
        controls.send(Control::Pause).unwrap();
        controls.send(Control::Resume).unwrap();

        let outcome = distributor.run().unwrap();
        assert!(matches!(outcome.reason, StopReason::TurnLimit));
        assert_eq!(outcome.alive, reference(&board, 4).alive_cells());
    }

    #[test]
    fn terminate_waits_for_the_turn_in_flight() {
        let mut board = Grid::new(64, 64);
        board.randomize(&mut StdRng::seed_from_u64(3));
        let store = MemoryStore::new();
        store.insert_grid("64x64", &board);
        let (io, _thread) = spawn_io(store).unwrap();
        let (controls, control_rx) = unbounded();
        // Rendezvous: the distributor cannot move past an event until it is taken.
        let (events_tx, events) = bounded(0);
        let params = Params {
            turns: TurnLimit::Unbounded,
            threads: 16,
            image_width: 64,
            image_height: 64,
        };
        let distributor = Distributor::new(params, io, control_rx, events_tx).write_final_image(false);
        let run = thread::spawn(move || distributor.run());

        let mut completed = Vec::new();
        for event in events {
            match event {
                Event::TurnStarted { turn: 2 } => controls.send(Control::Terminate).unwrap(),
                Event::TurnComplete { turn, .. } => completed.push(turn),
                _ => {}
            }
        }
        let outcome = run.join().unwrap().unwrap();

        assert!(matches!(outcome.reason, StopReason::Quit));
        assert_eq!(completed, vec![1, 2]);
        assert_eq!(outcome.turns_completed, 2);
        assert_eq!(outcome.alive, reference(&board, 2).alive_cells());
    }

    #[test]
    fn closed_controls_while_paused_terminate() {
        let board = Grid::with_alive(8, 8, &glider());
        let (distributor, _store, controls, _events) = start(params(TurnLimit::Unbounded, 1), &board);
        controls.send(Control::Pause).unwrap();
        drop(controls);

        let outcome = distributor.write_final_image(false).run().unwrap();
        assert!(matches!(outcome.reason, StopReason::Quit));
        assert_eq!(outcome.turns_completed, 1);
    }

    struct ReadOnlyStore(MemoryStore);

    impl ImageStore for ReadOnlyStore {
        fn load(&mut self, filename: &str, width: usize, height: usize) -> Result<Vec<u8>, GolError> {
            self.0.load(filename, width, height)
        }

        fn save(&mut self, filename: &str, _width: usize, _height: usize, _pixels: &[u8]) -> Result<(), GolError> {
            Err(GolError::Storage {
                filename: filename.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read only"),
            })
        }
    }

    #[test]
    fn failed_snapshot_ends_the_run_with_the_last_board() {
        let board = Grid::with_alive(8, 8, &glider());
        let store = MemoryStore::new();
        store.insert_grid("8x8", &board);
        let (io, _thread) = spawn_io(ReadOnlyStore(store)).unwrap();
        let (controls, control_rx) = unbounded();
        let (events_tx, _events) = unbounded();
        controls.send(Control::Snapshot).unwrap();

        let outcome = Distributor::new(params(TurnLimit::Unbounded, 2), io, control_rx, events_tx)
            .run()
            .unwrap();
        assert!(matches!(outcome.reason, StopReason::Failed(GolError::Storage { .. })));
        assert_eq!(outcome.turns_completed, 1);
        assert_eq!(outcome.alive, reference(&board, 1).alive_cells());
    }

    #[test]
    fn missing_input_fails_before_the_first_turn() {
        let (io, _thread) = spawn_io(MemoryStore::new()).unwrap();
        let (_controls, control_rx) = unbounded();
        let (events_tx, _events) = unbounded();
        let result = Distributor::new(params(TurnLimit::Bounded(3), 2), io, control_rx, events_tx).run();
        assert!(matches!(result, Err(GolError::Storage { .. })));
    }

    #[test]
    fn too_many_workers_is_a_configuration_error() {
        let board = Grid::with_alive(8, 8, &glider());
        let (distributor, _store, _controls, _events) = start(params(TurnLimit::Bounded(1), 9), &board);
        assert!(matches!(distributor.run(), Err(GolError::Config(_))));
    }
}
