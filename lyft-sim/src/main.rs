//! Run the desk controller against two simulated motors
//!
//! Set `RUST_LOG=info` (or `debug`) to see the controller log alongside the simulator output.
use std::path::PathBuf;

use clap::Parser;
use integration_tests::sim_bus::{SimBus, SimMotor};
use lyft_common::{DeskConfig, DeskMode, OperationPhase};
use lyft_controller::Desk;

#[derive(Parser, Debug)]
struct Args {
    /// Desk configuration TOML file. The defaults are used if omitted
    #[clap(long, short)]
    config: Option<PathBuf>,
    /// Position to move the desk to once discovery has finished
    #[clap(long, short, default_value = "2000")]
    target: u16,
    /// Position both motors start at
    #[clap(long, default_value = "1000")]
    start: u16,
    #[clap(long, default_value = "300")]
    lower_limit: u16,
    #[clap(long, default_value = "6500")]
    upper_limit: u16,
    /// Block the right motor when it reaches this position
    #[clap(long)]
    block_at: Option<u16>,
    /// Give up after this many ticks
    #[clap(long, default_value = "10000")]
    ticks: usize,
    /// Print every bus frame when done
    #[clap(long, short)]
    verbose: bool,
}

fn load_config(args: &Args) -> DeskConfig {
    match &args.config {
        Some(path) => match DeskConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                log::error!("Failed to load {}: {e}", path.display());
                std::process::exit(1);
            }
        },
        None => DeskConfig::default(),
    }
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    let config = load_config(&args);
    log::info!("Using {config:?}");

    let mut right = SimMotor::new(1, args.lower_limit, args.upper_limit, args.start);
    right.block_at = args.block_at;
    let motors = vec![
        SimMotor::new(0, args.lower_limit, args.upper_limit, args.start),
        right,
    ];
    let mut bus = SimBus::new(motors);
    let mut desk = Desk::new(config);
    desk.init(&mut bus, true);
    if let Err(e) = desk.start_discovery() {
        log::error!("Cannot start discovery: {e}");
        std::process::exit(1);
    }

    let normal = DeskMode::Operation(OperationPhase::Normal);
    let mut last_mode = desk.mode();
    let mut requested = false;
    let mut finished = false;
    println!("{:>6} mode 0x{:02x}", 0, last_mode.code());

    for tick in 0..args.ticks {
        bus.tick(&mut desk);

        let mode = desk.mode();
        if mode != last_mode {
            println!(
                "{:>6} mode 0x{:02x} position {} (left {}, right {}, drift {})",
                tick,
                mode.code(),
                desk.position(),
                desk.motor_position(0),
                desk.motor_position(1),
                desk.drift(),
            );
            last_mode = mode;
        }

        if mode != normal {
            continue;
        }
        if !requested {
            match desk.command_position(args.target) {
                Ok(()) => println!("{tick:>6} moving to {}", args.target),
                Err(e) => {
                    println!("{tick:>6} target {} rejected: {e}", args.target);
                    finished = true;
                    break;
                }
            }
            requested = true;
        } else if desk.target_position() == desk.position() {
            finished = true;
            break;
        }
    }

    if args.verbose {
        for frame in bus.frames() {
            println!("{frame}");
        }
    }

    if finished {
        println!(
            "Desk at rest at {} ({}..={})",
            desk.position(),
            desk.lower_limit(),
            desk.upper_limit()
        );
    } else {
        println!("Gave up after {} ticks in mode 0x{:02x}", args.ticks, desk.mode().code());
        std::process::exit(1);
    }
}
