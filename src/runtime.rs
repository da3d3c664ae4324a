//! Control loop and telemetry plumbing.
//!
//! Telemetry is a single-writer latest-value register: the vehicle task
//! steps the simulation and latches a snapshot into a watch channel at
//! its own rate; the control loop borrows the latest value once per
//! tick and never waits for a fresh one. The loop runs the flight state
//! machine at `tick_hz` until it reaches its terminal phase or a
//! Ctrl+C arrives.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{info, warn};

use pelican_core::flight::{FlightEvent, FlightPhase, FlightStateMachine, OffboardLink};
use pelican_core::telemetry::TelemetrySnapshot;

use crate::sim::{step_and_snapshot, SharedVehicle};

/// Loop rates for the runtime and the simulated vehicle.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    /// Control loop rate, Hz.
    pub tick_hz: u32,
    /// Simulated-vehicle step rate, Hz.
    pub sim_rate_hz: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_hz: 10,
            sim_rate_hz: 50,
        }
    }
}

impl RuntimeConfig {
    /// Control-loop period, clamped to at least 1 ms so a zero-length
    /// interval can never be constructed.
    pub fn tick(&self) -> Duration {
        period_ms(self.tick_hz)
    }
}

fn period_ms(rate_hz: u32) -> Duration {
    Duration::from_millis((1000 / rate_hz.max(1) as u64).max(1))
}

/// Spawn the vehicle task: step the simulation and latch a telemetry
/// snapshot at `sim_rate_hz`. The task exits once every receiver is
/// dropped.
pub fn spawn_telemetry(
    vehicle: SharedVehicle,
    sim_rate_hz: u32,
) -> watch::Receiver<TelemetrySnapshot> {
    let (tx, rx) = watch::channel(TelemetrySnapshot::default());
    let dt = period_ms(sim_rate_hz);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(dt);
        loop {
            interval.tick().await;
            let snapshot = step_and_snapshot(&vehicle, dt.as_millis() as u64);
            if tx.send(snapshot).is_err() {
                break;
            }
        }
    });
    rx
}

/// Drives one flight: machine, command link, telemetry register.
pub struct MissionRuntime<L: OffboardLink> {
    machine: FlightStateMachine,
    link: L,
    telemetry: watch::Receiver<TelemetrySnapshot>,
    tick: Duration,
}

impl<L: OffboardLink> MissionRuntime<L> {
    pub fn new(
        machine: FlightStateMachine,
        link: L,
        telemetry: watch::Receiver<TelemetrySnapshot>,
        config: RuntimeConfig,
    ) -> Self {
        Self {
            machine,
            link,
            telemetry,
            tick: config.tick(),
        }
    }

    /// Run the control loop until the mission ends or Ctrl+C.
    /// Returns the phase the machine stopped in.
    pub async fn run(mut self) -> FlightPhase {
        let started = Instant::now();
        let mut interval = tokio::time::interval(self.tick);
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        while self.machine.is_running() {
            tokio::select! {
                _ = &mut ctrl_c => {
                    warn!("shutdown requested, stopping control loop");
                    break;
                }
                _ = interval.tick() => {
                    let snapshot = self.telemetry.borrow().clone();
                    let now_ms = started.elapsed().as_millis() as u64;
                    let events = self.machine.update(&snapshot, &mut self.link, now_ms);
                    for event in events {
                        log_event(&event, &self.machine);
                    }
                }
            }
        }

        self.machine.phase()
    }
}

fn log_event(event: &FlightEvent, machine: &FlightStateMachine) {
    match event {
        FlightEvent::PhaseChanged(phase) => {
            info!(phase = phase.name(), "phase change");
        }
        FlightEvent::Connected => info!("vehicle connected"),
        FlightEvent::OffboardReady => info!("armed, offboard mode engaged"),
        FlightEvent::OdomReference => info!("odometry reference latched"),
        FlightEvent::TakeoffComplete => info!("takeoff altitude reached"),
        FlightEvent::WaypointReached { seq, final_waypoint } => {
            info!(
                seq,
                final_waypoint,
                remaining = machine.remaining_waypoints(),
                "waypoint reached"
            );
        }
        FlightEvent::DeliveryComplete { seq } => {
            info!(
                seq,
                pending = machine.pending_deliveries(),
                "delivery complete"
            );
        }
        FlightEvent::ReturningHome => info!("returning to launch point"),
        FlightEvent::LandDetected => info!("ground contact detected"),
        FlightEvent::MissionComplete => info!("landing mode accepted, mission complete"),
    }
}
