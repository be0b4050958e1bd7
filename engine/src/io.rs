//! The io collaborator: a thread that owns image storage and answers the
//! distributor's read, write and idle requests.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use log::debug;
use parking_lot::Mutex;

use crate::error::GolError;
use crate::grid::Grid;

/// Where images live. Pixels are row-major intensities, one byte per cell.
pub trait ImageStore {
    fn load(&mut self, filename: &str, width: usize, height: usize) -> Result<Vec<u8>, GolError>;

    fn save(&mut self, filename: &str, width: usize, height: usize, pixels: &[u8]) -> Result<(), GolError>;
}

/// Requests understood by the io thread. Each carries its own reply channel.
#[derive(Debug)]
pub enum IoCommand {
    Output {
        filename: String,
        width: usize,
        height: usize,
        pixels: Vec<u8>,
        done: Sender<Result<(), GolError>>,
    },
    Input {
        filename: String,
        width: usize,
        height: usize,
        reply: Sender<Result<Vec<u8>, GolError>>,
    },
    CheckIdle {
        reply: Sender<bool>,
    },
}

/// The distributor's side of the io boundary: it can only ask for reads,
/// writes and idleness.
#[derive(Debug, Clone)]
pub struct IoHandle {
    commands: Sender<IoCommand>,
}

impl IoHandle {
    /// Load the `{width}x{height}` image and interpret it as a board.
    pub fn read_image(&self, width: usize, height: usize) -> Result<Grid, GolError> {
        let filename = format!("{width}x{height}");
        let (reply, response) = bounded(1);
        self.send(IoCommand::Input {
            filename: filename.clone(),
            width,
            height,
            reply,
        })?;
        let pixels = response.recv().map_err(|_| GolError::unavailable("io"))??;

        let received = pixels.len();
        Grid::from_bytes(width, height, &pixels).ok_or_else(|| GolError::MalformedInput {
            filename,
            reason: format!("expected {} cells, got {received}", width * height),
        })
    }

    /// Persist `grid` and wait until the store acknowledges it.
    pub fn write_image(&self, filename: &str, grid: &Grid) -> Result<(), GolError> {
        let (done, response) = bounded(1);
        self.send(IoCommand::Output {
            filename: filename.to_string(),
            width: grid.width(),
            height: grid.height(),
            pixels: grid.to_bytes(),
            done,
        })?;
        response.recv().map_err(|_| GolError::unavailable("io"))?
    }

    pub fn is_idle(&self) -> Result<bool, GolError> {
        let (reply, response) = bounded(1);
        self.send(IoCommand::CheckIdle { reply })?;
        response.recv().map_err(|_| GolError::unavailable("io"))
    }

    fn send(&self, command: IoCommand) -> Result<(), GolError> {
        self.commands.send(command).map_err(|_| GolError::unavailable("io"))
    }
}

/// Start the io thread over `store`. It exits once every handle is dropped.
pub fn spawn_io<S>(store: S) -> Result<(IoHandle, JoinHandle<()>), GolError>
where
    S: ImageStore + Send + 'static,
{
    let (commands, requests) = unbounded();
    let thread = thread::Builder::new()
        .name("gol-io".to_string())
        .spawn(move || serve(store, requests))
        .map_err(|_| GolError::unavailable("io"))?;
    Ok((IoHandle { commands }, thread))
}

fn serve<S: ImageStore>(mut store: S, requests: Receiver<IoCommand>) {
    // Requests are handled one at a time, so reaching a CheckIdle means
    // everything sent before it has finished.
    for command in requests {
        match command {
            IoCommand::Output {
                filename,
                width,
                height,
                pixels,
                done,
            } => {
                debug!("writing {filename}");
                let _ = done.send(store.save(&filename, width, height, &pixels));
            }
            IoCommand::Input {
                filename,
                width,
                height,
                reply,
            } => {
                debug!("reading {filename}");
                let _ = reply.send(store.load(&filename, width, height));
            }
            IoCommand::CheckIdle { reply } => {
                let _ = reply.send(true);
            }
        }
    }
}

/// Images kept in memory. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    images: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, filename: impl Into<String>, pixels: Vec<u8>) {
        self.images.lock().insert(filename.into(), pixels);
    }

    pub fn insert_grid(&self, filename: impl Into<String>, grid: &Grid) {
        self.insert(filename, grid.to_bytes());
    }

    pub fn get(&self, filename: &str) -> Option<Vec<u8>> {
        self.images.lock().get(filename).cloned()
    }

    pub fn filenames(&self) -> Vec<String> {
        let mut names: Vec<String> = self.images.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

impl ImageStore for MemoryStore {
    fn load(&mut self, filename: &str, _width: usize, _height: usize) -> Result<Vec<u8>, GolError> {
        self.get(filename).ok_or_else(|| GolError::Storage {
            filename: filename.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such image"),
        })
    }

    fn save(&mut self, filename: &str, _width: usize, _height: usize, pixels: &[u8]) -> Result<(), GolError> {
        self.insert(filename, pixels.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Cell;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[test]
    fn reads_and_writes_through_the_thread() {
        let store = MemoryStore::new();
        let board = Grid::with_alive(4, 3, &[Cell::new(1, 1), Cell::new(3, 2)]);
        store.insert_grid("4x3", &board);

        let (io, thread) = spawn_io(store.clone()).unwrap();
        assert_eq!(io.read_image(4, 3).unwrap(), board);

        io.write_image("4x3x9", &board).unwrap();
        assert!(io.is_idle().unwrap());
        assert_eq!(store.get("4x3x9"), Some(board.to_bytes()));

        drop(io);
        thread.join().unwrap();
    }

    /// Holds every save until the test lets it through.
    struct GatedStore {
        started: Sender<()>,
        gate: Receiver<()>,
    }

    impl ImageStore for GatedStore {
        fn load(&mut self, filename: &str, _: usize, _: usize) -> Result<Vec<u8>, GolError> {
            Err(GolError::MalformedInput {
                filename: filename.to_string(),
                reason: "write only".to_string(),
            })
        }

        fn save(&mut self, _: &str, _: usize, _: usize, _: &[u8]) -> Result<(), GolError> {
            let _ = self.started.send(());
            self.gate.recv().map_err(|_| GolError::unavailable("gate"))
        }
    }

    #[test]
    fn idle_reply_waits_for_earlier_writes() {
        let (started_tx, started) = unbounded();
        let (open, gate) = unbounded();
        let (io, thread) = spawn_io(GatedStore {
            started: started_tx,
            gate,
        })
        .unwrap();

        let writer = io.clone();
        let write = std::thread::spawn(move || writer.write_image("2x2x1", &Grid::new(2, 2)));
        started.recv().unwrap();

        let (idle_tx, idle) = unbounded();
        let checker = io.clone();
        let check = std::thread::spawn(move || idle_tx.send(checker.is_idle()).unwrap());
        assert!(idle.recv_timeout(Duration::from_millis(100)).is_err());

        open.send(()).unwrap();
        assert!(idle.recv_timeout(Duration::from_secs(5)).unwrap().unwrap());
        write.join().unwrap().unwrap();
        check.join().unwrap();

        drop(io);
        thread.join().unwrap();
    }

    #[test]
    fn missing_image_is_a_storage_error() {
        let (io, _thread) = spawn_io(MemoryStore::new()).unwrap();
        assert!(matches!(io.read_image(8, 8), Err(GolError::Storage { .. })));
    }

    #[test]
    fn wrong_size_is_malformed() {
        let store = MemoryStore::new();
        store.insert("8x8", vec![0; 63]);
        let (io, _thread) = spawn_io(store).unwrap();
        match io.read_image(8, 8) {
            Err(GolError::MalformedInput { filename, .. }) => assert_eq!(filename, "8x8"),
            other => panic!("expected malformed input, got {other:?}"),
        }
    }
}
