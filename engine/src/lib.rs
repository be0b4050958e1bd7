/**
* A live cell dies if it has fewer than two live neighbors.
* A live cell with two or three live neighbors lives on to the next generation.
* A live cell with more than three live neighbors dies.
* A dead cell will be brought back to live if it has exactly three live neighbors.
*
* The board wraps on both axes. Each turn is split into horizontal strips that
* are computed on their own threads and stitched back together in order.
*/

pub mod config;
pub mod distributor;
pub mod error;
pub mod grid;
pub mod io;
pub mod pgm;
pub mod reporter;
pub mod router;
pub mod worker;

use std::thread;

use crossbeam_channel::{unbounded, Receiver};

pub use config::{Params, SimulationOptions, TurnLimit};
pub use distributor::{Control, ControlState, Distributor, Event, FinalState, Report, StopReason};
pub use error::GolError;
pub use grid::{Cell, CellState, Grid};
pub use io::{spawn_io, ImageStore, IoHandle, MemoryStore};
pub use pgm::PgmDirectory;
pub use reporter::ProgressReporter;
pub use router::{spawn_router, Command, CommandRouter};

/// Run a whole simulation: start the io thread and the distributor, log
/// progress on the calling thread, and return how the run ended.
pub fn game_of_life<S>(
    params: Params,
    options: SimulationOptions,
    store: S,
    controls: Receiver<Control>,
) -> Result<FinalState, GolError>
where
    S: ImageStore + Send + 'static,
{
    params.validate()?;
    let (io, io_thread) = spawn_io(store)?;
    let (events, event_stream) = unbounded();

    let distributor =
        Distributor::new(params, io, controls, events).write_final_image(options.write_final_image);
    let distributor = thread::Builder::new()
        .name("gol-distributor".to_string())
        .spawn(move || distributor.run())
        .map_err(|_| GolError::unavailable("distributor"))?;

    ProgressReporter::new(options.report_interval).follow(event_stream);

    let outcome = distributor
        .join()
        .map_err(|_| GolError::unavailable("distributor"))?;
    // The distributor dropped its io handle on return, so this thread is done.
    io_thread.join().map_err(|_| GolError::unavailable("io"))?;
    outcome
}
