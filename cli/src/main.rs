use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{ArgAction, Parser};
use crossbeam_channel::{unbounded, Receiver};
use gol_engine::{
    game_of_life, spawn_router, Control, FinalState, GolError, ImageStore, Params, PgmDirectory,
    SimulationOptions, StopReason,
};

mod control_server;
mod keyboard;
mod random;

use control_server::ControlServer;
use keyboard::Keyboard;
use random::RandomStart;

/// Conway's Game of Life on a toroidal board, computed in parallel strips.
///
/// Keys while running: p pause, r resume, s save a snapshot, q quit.
#[derive(Parser, Debug)]
#[command(name = "gol", version, about, disable_help_flag = true)]
struct Args {
    /// Number of worker threads
    #[arg(short = 't', long, default_value_t = 8)]
    threads: usize,

    /// Width of the image
    #[arg(short = 'w', long, default_value_t = 512)]
    width: usize,

    /// Height of the image
    #[arg(short = 'h', long, default_value_t = 512)]
    height: usize,

    /// Stop after this many turns. Runs until quit when omitted.
    #[arg(long)]
    turns: Option<u64>,

    /// Directory holding `<width>x<height>.pgm`
    #[arg(long, default_value = "images")]
    images: PathBuf,

    /// Directory snapshots and the final board are written to
    #[arg(long, default_value = "out")]
    out: PathBuf,

    /// Milliseconds between alive cell reports
    #[arg(long, default_value_t = 2000)]
    report_interval_ms: u64,

    /// Listen for admin commands (pause, resume, save, quit) on this address
    #[arg(long)]
    control_addr: Option<SocketAddr>,

    /// Start from a random board with this seed instead of reading an image
    #[arg(long)]
    seed: Option<u64>,

    /// Do not read key presses from the terminal
    #[arg(long)]
    no_keyboard: bool,

    /// Print help
    #[allow(dead_code)]
    #[arg(long, action = ArgAction::Help)]
    help: Option<bool>,
}

impl Args {
    fn params(&self) -> Params {
        Params {
            turns: self.turns.into(),
            threads: self.threads,
            image_width: self.width,
            image_height: self.height,
        }
    }

    fn options(&self) -> SimulationOptions {
        SimulationOptions {
            report_interval: Duration::from_millis(self.report_interval_ms),
            write_final_image: true,
        }
    }
}

fn init_logger() {
    // Raw mode does not return the carriage on newline.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| writeln!(buf, "[{} {}] {}\r", record.level(), record.target(), record.args()))
        .init();
}

fn simulate<S>(args: &Args, store: S, controls: Receiver<Control>) -> Result<FinalState, GolError>
where
    S: ImageStore + Send + 'static,
{
    game_of_life(args.params(), args.options(), store, controls)
}

fn main() -> anyhow::Result<()> {
    init_logger();
    let args = Args::parse();
    args.params().validate()?;

    let (controls, control_rx) = unbounded();
    let (key_tx, keys) = unbounded();
    let (admin_tx, admin) = unbounded();

    let server = args
        .control_addr
        .map(|addr| ControlServer::start(addr, admin_tx.clone()))
        .transpose()
        .context("start control server")?;
    drop(admin_tx);

    let keyboard = if args.no_keyboard {
        drop(key_tx);
        None
    } else {
        Some(Keyboard::start(key_tx).context("read keyboard")?)
    };

    // The router stops on its own once the distributor has gone away.
    let _router = spawn_router(keys, admin, controls).context("start command router")?;

    let store = PgmDirectory::new(&args.images, &args.out);
    let outcome = match args.seed {
        Some(seed) => simulate(&args, RandomStart::new(seed, store), control_rx),
        None => simulate(&args, store, control_rx),
    };

    drop(keyboard);
    if let Some(server) = server {
        server.stop();
    }

    let state = outcome.context("simulation did not start")?;
    match state.reason {
        StopReason::Failed(err) => {
            Err(err).with_context(|| format!("simulation aborted after {} turns", state.turns_completed))
        }
        StopReason::TurnLimit | StopReason::Quit => {
            log::info!(
                "{} turns completed, {} cells alive",
                state.turns_completed,
                state.alive.len()
            );
            Ok(())
        }
    }
}
