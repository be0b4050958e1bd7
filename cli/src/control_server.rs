use std::io::{BufRead, BufReader};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::Context;
use crossbeam_channel::Sender;
use log::{debug, info, warn};

/// Accepts TCP connections and forwards each line as an admin command.
pub struct ControlServer {
    addr: SocketAddr,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ControlServer {
    pub fn start(addr: SocketAddr, admin: Sender<String>) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).with_context(|| format!("bind {addr}"))?;
        let addr = listener.local_addr().context("read bound address")?;
        info!("control server listening on {addr}");

        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let thread = thread::Builder::new()
            .name("gol-control".to_string())
            .spawn(move || accept(listener, admin, flag))
            .context("spawn control server thread")?;

        Ok(Self {
            addr,
            stop,
            thread: Some(thread),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn stop(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        // Wake the blocking accept.
        let _ = TcpStream::connect(self.local_addr());
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        info!("control server stopped");
    }
}

fn accept(listener: TcpListener, admin: Sender<String>, stop: Arc<AtomicBool>) {
    for stream in listener.incoming() {
        if stop.load(Ordering::Relaxed) {
            break;
        }
        match stream {
            Ok(stream) => {
                let admin = admin.clone();
                let spawned = thread::Builder::new()
                    .name("gol-control-conn".to_string())
                    .spawn(move || forward_lines(stream, admin));
                if let Err(err) = spawned {
                    warn!("dropping control connection: {err}");
                }
            }
            Err(err) => warn!("control connection failed: {err}"),
        }
    }
}

fn forward_lines(stream: TcpStream, admin: Sender<String>) {
    let peer = stream.peer_addr().ok();
    debug!("control client connected: {peer:?}");
    for line in BufReader::new(stream).lines() {
        let Ok(line) = line else { break };
        if admin.send(line).is_err() {
            break;
        }
    }
    debug!("control client gone: {peer:?}");
}
