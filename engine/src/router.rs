//! Turns key presses and admin commands into distributor controls.

use std::io;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{never, select, Receiver, Sender};
use log::{debug, info};

use crate::distributor::Control;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Pause,
    Resume,
    Snapshot,
    Quit,
}

impl Command {
    pub fn from_key(key: char) -> Option<Self> {
        match key {
            'p' | 'P' => Some(Command::Pause),
            'r' | 'R' => Some(Command::Resume),
            's' | 'S' => Some(Command::Snapshot),
            'q' | 'Q' => Some(Command::Quit),
            _ => None,
        }
    }

    pub fn from_admin(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "pause" => Some(Command::Pause),
            "resume" => Some(Command::Resume),
            "save" | "snapshot" => Some(Command::Snapshot),
            "quit" | "stop" => Some(Command::Quit),
            _ => None,
        }
    }

    fn control(self) -> Control {
        match self {
            Command::Pause => Control::Pause,
            Command::Resume => Control::Resume,
            Command::Snapshot => Control::Snapshot,
            Command::Quit => Control::Terminate,
        }
    }
}

pub struct CommandRouter {
    controls: Sender<Control>,
    terminated: bool,
}

impl CommandRouter {
    pub fn new(controls: Sender<Control>) -> Self {
        CommandRouter {
            controls,
            terminated: false,
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn route_key(&mut self, key: char) {
        match Command::from_key(key) {
            Some(command) => self.route(command),
            None => debug!("ignoring key {key:?}"),
        }
    }

    pub fn route_admin(&mut self, line: &str) {
        match Command::from_admin(line) {
            Some(command) => self.route(command),
            None => debug!("ignoring admin command {line:?}"),
        }
    }

    /// Forward `command`. Everything after a quit is dropped.
    pub fn route(&mut self, command: Command) {
        if self.terminated {
            return;
        }
        if self.controls.send(command.control()).is_err() {
            // The distributor has already returned.
            self.terminated = true;
            return;
        }
        if command == Command::Quit {
            info!("quit requested");
            self.terminated = true;
        }
    }
}

enum Input {
    Key(Option<char>),
    Admin(Option<String>),
}

/// Route both sources on a dedicated thread until quit, until both close, or
/// until the distributor goes away.
pub fn spawn_router(
    keys: Receiver<char>,
    admin: Receiver<String>,
    controls: Sender<Control>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("gol-router".to_string())
        .spawn(move || {
            let mut router = CommandRouter::new(controls);
            let (mut keys, mut admin) = (keys, admin);
            let mut open = 2;

            while open > 0 && !router.is_terminated() {
                let input = select! {
                    recv(keys) -> key => Input::Key(key.ok()),
                    recv(admin) -> line => Input::Admin(line.ok()),
                };
                match input {
                    Input::Key(Some(key)) => router.route_key(key),
                    Input::Admin(Some(line)) => router.route_admin(&line),
                    Input::Key(None) => {
                        keys = never();
                        open -= 1;
                    }
                    Input::Admin(None) => {
                        admin = never();
                        open -= 1;
                    }
                }
            }
        })
}
