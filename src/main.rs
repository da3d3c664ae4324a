//! Offboard waypoint-delivery controller with an in-process simulated
//! vehicle.
//!
//! Loads a JSON flight plan, builds the mission containers and the
//! flight state machine, then flies the plan against the simulated
//! vehicle at the configured tick rate.
//!
//! Usage:
//!   cargo run -- --plan <FILE> [OPTIONS]
//!
//! Options:
//!   --plan <FILE>         Flight plan JSON (required)
//!   --delivery            Perform the delivery sub-task at manifest stops
//!   --return-home         Return to the launch point before landing
//!   --operator            Wait for operator arm/mode instead of requesting
//!   --takeoff-alt <M>     Takeoff altitude in meters (default: 5.0)
//!   --speed <M/S>         Cruise tracking speed (default: 0.5)
//!   --rate <HZ>           Control loop rate (default: 10)
//!   --seed <N>            Deterministic simulation seed

use std::env;
use std::path::PathBuf;
use std::process;

use tracing::info;
use tracing_subscriber::EnvFilter;

use pelican::{shared, FlightPlan, MissionRuntime, RuntimeConfig, SimConfig, SimLink, SimVehicle};
use pelican_core::flight::{FlightConfig, FlightStateMachine};
use pelican_core::nav::Position;

struct Args {
    plan: PathBuf,
    delivery: bool,
    return_home: bool,
    operator: bool,
    takeoff_alt: f32,
    speed: f32,
    rate: u32,
    seed: Option<u64>,
}

fn parse_args() -> Args {
    let mut plan: Option<PathBuf> = None;
    let mut args = Args {
        plan: PathBuf::new(),
        delivery: false,
        return_home: false,
        operator: false,
        takeoff_alt: 5.0,
        speed: 0.5,
        rate: 10,
        seed: None,
    };

    let raw: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < raw.len() {
        match raw[i].as_str() {
            "--plan" => {
                i += 1;
                plan = Some(PathBuf::from(value_arg(&raw, i, "plan")));
            }
            "--delivery" => args.delivery = true,
            "--return-home" => args.return_home = true,
            "--operator" => args.operator = true,
            "--takeoff-alt" => {
                i += 1;
                args.takeoff_alt = parse_arg(&raw, i, "takeoff-alt");
            }
            "--speed" => {
                i += 1;
                args.speed = parse_arg(&raw, i, "speed");
            }
            "--rate" => {
                i += 1;
                args.rate = parse_arg(&raw, i, "rate");
            }
            "--seed" => {
                i += 1;
                args.seed = Some(parse_arg(&raw, i, "seed"));
            }
            "-h" | "--help" => {
                print_usage();
                process::exit(0);
            }
            other => {
                eprintln!("Unknown option: {other}");
                print_usage();
                process::exit(1);
            }
        }
        i += 1;
    }

    match plan {
        Some(path) => args.plan = path,
        None => {
            eprintln!("Error: --plan is required");
            print_usage();
            process::exit(1);
        }
    }
    if args.rate == 0 || args.rate > 1000 {
        eprintln!("Error: --rate must be between 1 and 1000 Hz");
        process::exit(1);
    }
    args
}

fn value_arg<'a>(raw: &'a [String], i: usize, name: &str) -> &'a str {
    raw.get(i).unwrap_or_else(|| {
        eprintln!("Error: --{name} requires a value");
        process::exit(1);
    })
}

fn parse_arg<T: std::str::FromStr>(raw: &[String], i: usize, name: &str) -> T {
    value_arg(raw, i, name).parse().unwrap_or_else(|_| {
        eprintln!("Error: invalid value for --{name}");
        process::exit(1);
    })
}

fn print_usage() {
    eprintln!(
        "Usage: pelican --plan <FILE> [OPTIONS]\n\
         \n\
         Options:\n\
         \x20 --plan <FILE>       Flight plan JSON (required)\n\
         \x20 --delivery          Perform the delivery sub-task at manifest stops\n\
         \x20 --return-home       Return to the launch point before landing\n\
         \x20 --operator          Wait for operator arm/mode instead of requesting\n\
         \x20 --takeoff-alt <M>   Takeoff altitude in meters (default: 5.0)\n\
         \x20 --speed <M/S>       Cruise tracking speed (default: 0.5)\n\
         \x20 --rate <HZ>         Control loop rate (default: 10)\n\
         \x20 --seed <N>          Deterministic simulation seed\n\
         \x20 -h, --help          Show this help"
    );
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = parse_args();

    let plan = match FlightPlan::from_file(&args.plan) {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };
    let (queue, manifest) = match plan.build_mission() {
        Ok(mission) => mission,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    let flight_config = FlightConfig {
        simulation_mode: !args.operator,
        delivery_mode: args.delivery,
        return_home_mode: args.return_home,
        takeoff_altitude: args.takeoff_alt,
        desired_speed: args.speed,
        ..FlightConfig::default()
    };
    let machine =
        match FlightStateMachine::new(queue, manifest, plan.target_error_m, flight_config) {
            Ok(machine) => machine,
            Err(e) => {
                eprintln!("Error: {e}");
                process::exit(1);
            }
        };

    info!(
        plan = %args.plan.display(),
        waypoints = plan.waypoints.len(),
        delivery = args.delivery,
        return_home = args.return_home,
        rate_hz = args.rate,
        "starting mission"
    );

    let sim_config = SimConfig {
        seed: args.seed,
        ..SimConfig::default()
    };
    let vehicle = shared(SimVehicle::new(Position::default(), sim_config));

    let runtime_config = RuntimeConfig {
        tick_hz: args.rate,
        ..RuntimeConfig::default()
    };
    let telemetry = pelican::spawn_telemetry(vehicle.clone(), runtime_config.sim_rate_hz);
    let runtime = MissionRuntime::new(machine, SimLink::new(vehicle), telemetry, runtime_config);

    let final_phase = runtime.run().await;
    info!(phase = final_phase.name(), "control loop stopped");
}
