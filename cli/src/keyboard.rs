use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::Context;
use crossbeam_channel::Sender;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Reads key presses in raw mode and forwards them as characters.
/// Dropping it stops the reader and restores the terminal.
pub struct Keyboard {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Keyboard {
    pub fn start(keys: Sender<char>) -> anyhow::Result<Self> {
        terminal::enable_raw_mode().context("enable raw mode")?;

        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let thread = thread::Builder::new()
            .name("gol-keyboard".to_string())
            .spawn(move || read_keys(keys, flag));

        match thread {
            Ok(thread) => Ok(Self {
                stop,
                thread: Some(thread),
            }),
            Err(err) => {
                let _ = terminal::disable_raw_mode();
                Err(err).context("spawn keyboard thread")
            }
        }
    }
}

fn read_keys(keys: Sender<char>, stop: Arc<AtomicBool>) {
    while !stop.load(Ordering::Relaxed) {
        match event::poll(POLL_INTERVAL) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(err) => {
                log::warn!("keyboard poll failed: {err}");
                return;
            }
        }

        let key = match event::read() {
            Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => key,
            Ok(_) => continue,
            Err(err) => {
                log::warn!("keyboard read failed: {err}");
                return;
            }
        };

        let code = match key.code {
            // Raw mode swallows SIGINT, so treat ctrl-c as quit.
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => 'q',
            KeyCode::Char(code) => code,
            _ => continue,
        };
        if keys.send(code).is_err() {
            return;
        }
    }
}

impl Drop for Keyboard {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        let _ = terminal::disable_raw_mode();
    }
}
