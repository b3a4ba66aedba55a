//! # Prison Server
//!
//! Headless tick loop around [`prison::PrisonRuntime`].
//!
//! ```bash
//! # Run with the bundled mines
//! RUST_LOG=info ./prison_server config/mines.toml
//!
//! # Run 2000 ticks, keep counts in ./data
//! ./prison_server config/mines.toml --ticks 2000 --data data
//! ```
//!
//! Console lines on stdin are run as `mines` commands between ticks.

use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver};
use prison::mines::{Location, MineResult, MinesConfig, SystemClock};
use prison::world::{HostParts, TomlMineStore, WorkerMode};
use prison::PrisonRuntime;
use tracing::{error, info, warn};

/// Command line options.
struct Options {
    config: PathBuf,
    data_dir: PathBuf,
    max_ticks: Option<u64>,
    workers: usize,
}

impl Options {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self, String> {
        let mut options = Self {
            config: PathBuf::from("config/mines.toml"),
            data_dir: PathBuf::from("data/mines"),
            max_ticks: None,
            workers: 2,
        };
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--ticks" => {
                    let value = args.next().ok_or("--ticks needs a value")?;
                    options.max_ticks = Some(value.parse().map_err(|_| format!("bad tick count `{value}`"))?);
                }
                "--data" => options.data_dir = args.next().ok_or("--data needs a directory")?.into(),
                "--workers" => {
                    let value = args.next().ok_or("--workers needs a value")?;
                    options.workers = value.parse().map_err(|_| format!("bad worker count `{value}`"))?;
                }
                flag if flag.starts_with("--") => return Err(format!("unknown option `{flag}`")),
                path => options.config = path.into(),
            }
        }
        Ok(options)
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options = match Options::parse(std::env::args().skip(1)) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("   ✗ {e}");
            eprintln!("     usage: prison_server [CONFIG] [--ticks N] [--data DIR] [--workers N]");
            return ExitCode::FAILURE;
        }
    };

    println!("═══════════════════════════════════════════════════════════════════");
    println!("                    PRISON SERVER v{}", env!("CARGO_PKG_VERSION"));
    println!("                         HEADLESS MODE");
    println!("═══════════════════════════════════════════════════════════════════");
    println!();
    println!("  Config:   {}", options.config.display());
    println!("  Counts:   {}", options.data_dir.display());
    println!("  Workers:  {}", options.workers);
    println!();

    match run(&options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "server stopped");
            eprintln!("   ✗ FATAL: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(options: &Options) -> MineResult<()> {
    let config = MinesConfig::from_file(&options.config)?;
    let store = TomlMineStore::open(&options.data_dir)?;
    let mode = if options.workers == 0 {
        WorkerMode::Inline
    } else {
        WorkerMode::Pool(options.workers)
    };
    let host = HostParts::with(mode, Arc::new(store), Arc::new(SystemClock));

    // Named destinations resolve to the world spawn of the mine's world
    for def in &config.mines {
        if let Some(warp) = &def.tp_destination {
            host.players.set_warp(warp.clone(), Location::new(def.world.clone(), 0.5, 64.0, 0.5));
        }
    }

    let ticks_per_second = config.engine.ticks_per_second;
    let mut runtime = PrisonRuntime::new(host, &config)?;
    runtime.start();
    println!("   ✓ {} mines registered", runtime.engine().mine_names().len());

    let console = spawn_console_reader();

    println!();
    println!("═══════════════════════════════════════════════════════════════════");
    println!("                    SERVER RUNNING ({ticks_per_second} TPS)");
    println!("═══════════════════════════════════════════════════════════════════");
    println!();

    // === MAIN TICK LOOP ===
    let tick_duration = Duration::from_micros(1_000_000 / ticks_per_second);
    let mut last_stats_print = Instant::now();
    let server_start = Instant::now();

    loop {
        let tick_start = Instant::now();

        // === 1. CONSOLE ===
        for line in console.try_iter() {
            match runtime.execute_line(&line) {
                Ok(reply) => println!("   {reply}"),
                Err(e) => println!("   ⚠ {e}"),
            }
        }

        // === 2. TICK ===
        let report = runtime.tick();

        // === 3. STATS OUTPUT ===
        if last_stats_print.elapsed() > Duration::from_secs(30) {
            let world = runtime.host().worlds.stats();
            info!(
                tick = report.tick,
                queued = runtime.host().scheduler.pending(),
                writes = world.writes,
                uptime_secs = server_start.elapsed().as_secs(),
                "server status"
            );
            last_stats_print = Instant::now();
        }

        if options.max_ticks.is_some_and(|max| report.tick >= max) {
            break;
        }

        // === 4. TICK TIMING ===
        let elapsed = tick_start.elapsed();
        if elapsed < tick_duration {
            std::thread::sleep(tick_duration - elapsed);
        } else {
            warn!(tick = report.tick, elapsed_ms = elapsed.as_millis(), "tick overran its budget");
        }
    }

    runtime.shutdown();
    Ok(())
}

/// Forwards stdin lines to the tick loop.
fn spawn_console_reader() -> Receiver<String> {
    let (tx, rx) = unbounded();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if !line.trim().is_empty() && tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}
