//! End-to-end flights of the simulated vehicle through multi-waypoint
//! plans, covering all three mission-completion branches.

use std::io::Write;

use pelican::runtime::spawn_telemetry;
use pelican::sim::{shared, step_and_snapshot, SimConfig, SimLink, SimVehicle};
use pelican::{FlightPlan, MissionRuntime, PelicanError, RuntimeConfig};
use pelican_core::flight::{FlightConfig, FlightEvent, FlightPhase, FlightStateMachine};
use pelican_core::nav::Position;

const TICK_MS: u64 = 100;
const MAX_TICKS: usize = 2000;

fn test_flight_config() -> FlightConfig {
    FlightConfig {
        hover_ms: 200,
        unpack_ms: 200,
        ..FlightConfig::default()
    }
}

fn test_sim_config() -> SimConfig {
    SimConfig {
        seed: Some(7),
        ..SimConfig::default()
    }
}

struct FlightResult {
    final_phase: FlightPhase,
    events: Vec<FlightEvent>,
    final_position: Position,
}

/// Drive machine and vehicle in lockstep until the mission ends.
fn fly(plan: &FlightPlan, flight_config: FlightConfig, sim_config: SimConfig) -> FlightResult {
    let (queue, manifest) = plan.build_mission().unwrap();
    let mut machine =
        FlightStateMachine::new(queue, manifest, plan.target_error_m, flight_config).unwrap();

    let vehicle = shared(SimVehicle::new(Position::default(), sim_config));
    let mut link = SimLink::new(vehicle.clone());

    let mut events = Vec::new();
    let mut now_ms = 0;
    for _ in 0..MAX_TICKS {
        if !machine.is_running() {
            break;
        }
        now_ms += TICK_MS;
        let snapshot = step_and_snapshot(&vehicle, TICK_MS);
        events.extend(machine.update(&snapshot, &mut link, now_ms));
    }
    assert!(!machine.is_running(), "mission did not complete in time");

    let final_position = {
        let guard = vehicle.lock().unwrap();
        guard.position()
    };
    FlightResult {
        final_phase: machine.phase(),
        events,
        final_position,
    }
}

fn square_plan() -> FlightPlan {
    FlightPlan::from_json(
        r#"{
            "target_error_m": 0.2,
            "waypoints": [
                {"x": 5.0, "y": 0.0, "z": 5.0},
                {"x": 5.0, "y": 5.0, "z": 5.0},
                {"x": 0.0, "y": 5.0, "z": 5.0}
            ],
            "delivery_stops": [0, 1, 2]
        }"#,
    )
    .unwrap()
}

fn reached_seqs(events: &[FlightEvent]) -> Vec<u16> {
    events
        .iter()
        .filter_map(|e| match e {
            FlightEvent::WaypointReached { seq, .. } => Some(*seq),
            _ => None,
        })
        .collect()
}

fn visited_phases(events: &[FlightEvent]) -> Vec<FlightPhase> {
    events
        .iter()
        .filter_map(|e| match e {
            FlightEvent::PhaseChanged(p) => Some(*p),
            _ => None,
        })
        .collect()
}

#[test]
fn test_land_at_final_waypoint() {
    let result = fly(&square_plan(), test_flight_config(), test_sim_config());

    assert_eq!(result.final_phase, FlightPhase::Shutdown);
    assert_eq!(reached_seqs(&result.events), vec![0, 1, 2]);
    assert!(result.events.contains(&FlightEvent::TakeoffComplete));
    assert!(result.events.contains(&FlightEvent::LandDetected));
    assert!(result.events.contains(&FlightEvent::MissionComplete));
    assert!(!result.events.contains(&FlightEvent::ReturningHome));

    // Landed under the last waypoint
    assert!((result.final_position.x - 0.0).abs() < 0.5);
    assert!((result.final_position.y - 5.0).abs() < 0.5);
    assert!(result.final_position.z < 0.1);
}

#[test]
fn test_return_home_then_land() {
    let config = FlightConfig {
        return_home_mode: true,
        ..test_flight_config()
    };
    let result = fly(&square_plan(), config, test_sim_config());

    assert_eq!(result.final_phase, FlightPhase::Shutdown);
    assert!(result.events.contains(&FlightEvent::ReturningHome));
    assert!(visited_phases(&result.events).contains(&FlightPhase::ReturnHome));

    // Landed back at the launch point
    assert!(result.final_position.x.abs() < 0.5);
    assert!(result.final_position.y.abs() < 0.5);
    assert!(result.final_position.z < 0.1);
}

#[test]
fn test_delivery_at_every_stop_then_return_home() {
    let config = FlightConfig {
        delivery_mode: true,
        return_home_mode: true,
        ..test_flight_config()
    };
    let result = fly(&square_plan(), config, test_sim_config());

    assert_eq!(result.final_phase, FlightPhase::Shutdown);
    let delivered: Vec<u16> = result
        .events
        .iter()
        .filter_map(|e| match e {
            FlightEvent::DeliveryComplete { seq } => Some(*seq),
            _ => None,
        })
        .collect();
    assert_eq!(delivered, vec![0, 1, 2]);

    // Deliveries interleave with cruise: each stop is reached before
    // its delivery completes
    let phases = visited_phases(&result.events);
    assert!(phases.contains(&FlightPhase::Delivery));
    assert!(phases.contains(&FlightPhase::ReturnHome));

    assert!(result.final_position.x.abs() < 0.5);
    assert!(result.final_position.y.abs() < 0.5);
}

#[test]
fn test_single_waypoint_out_and_land() {
    let plan = FlightPlan::from_json(
        r#"{
            "target_error_m": 0.2,
            "waypoints": [{"x": 3.0, "y": 4.0, "z": 6.0}]
        }"#,
    )
    .unwrap();
    let result = fly(&plan, test_flight_config(), test_sim_config());

    assert_eq!(result.final_phase, FlightPhase::Shutdown);
    assert_eq!(reached_seqs(&result.events), vec![0]);
    assert!((result.final_position.x - 3.0).abs() < 0.5);
    assert!((result.final_position.y - 4.0).abs() < 0.5);
}

#[test]
fn test_pose_noise_does_not_break_the_flight() {
    let sim_config = SimConfig {
        pose_noise_m: 0.02,
        ..test_sim_config()
    };
    let result = fly(&square_plan(), test_flight_config(), sim_config);
    assert_eq!(result.final_phase, FlightPhase::Shutdown);
    assert_eq!(reached_seqs(&result.events), vec![0, 1, 2]);
}

#[test]
fn test_plan_round_trips_through_a_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "target_error_m": 0.25,
            "waypoints": [{{"x": 1.0, "y": 2.0, "z": 5.0}}],
            "delivery_stops": [0]
        }}"#
    )
    .unwrap();

    let plan = FlightPlan::from_file(file.path()).unwrap();
    assert_eq!(plan.waypoints.len(), 1);
    assert_eq!(plan.delivery_stops, vec![0]);
    assert!((plan.target_error_m - 0.25).abs() < 1e-6);
}

#[test]
fn test_missing_plan_file_is_io_error() {
    let err = FlightPlan::from_file(std::path::Path::new("/nonexistent/plan.json")).unwrap_err();
    assert!(matches!(err, PelicanError::Io(_)));
}

#[tokio::test(start_paused = true)]
async fn test_runtime_flies_plan_to_completion() {
    let plan = square_plan();
    let (queue, manifest) = plan.build_mission().unwrap();
    let machine = FlightStateMachine::new(
        queue,
        manifest,
        plan.target_error_m,
        test_flight_config(),
    )
    .unwrap();

    let vehicle = shared(SimVehicle::new(Position::default(), test_sim_config()));
    let config = RuntimeConfig::default();
    let telemetry = spawn_telemetry(vehicle.clone(), config.sim_rate_hz);
    let runtime = MissionRuntime::new(machine, SimLink::new(vehicle), telemetry, config);

    let final_phase = runtime.run().await;
    assert_eq!(final_phase, FlightPhase::Shutdown);
}
