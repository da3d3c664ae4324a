//! Flight state machine for offboard waypoint delivery
//!
//! The machine owns the waypoint queue and delivery manifest, consumes
//! one telemetry snapshot per tick, and drives the vehicle through the
//! takeoff / cruise / hover / delivery / return-home / land sequence by
//! publishing position setpoints through the [`OffboardLink`] trait.
//!
//! The machine itself is pure: no transport, no clock, no logging. The
//! runtime supplies wall-clock milliseconds and a link implementation,
//! and logs the [`FlightEvent`]s returned from each tick.

mod machine;

pub use machine::{FlightStateMachine, MAX_FLIGHT_EVENTS, SETPOINT_WARMUP_TICKS};

use crate::nav::Position;

/// Current phase of the flight. Exactly one phase is live at any time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlightPhase {
    /// Waiting for the telemetry link to report a connected FCU
    AwaitConnection,
    /// Streaming warm-up setpoints before offboard engagement
    StreamSetpoints,
    /// Waiting for (or requesting) arm and offboard mode
    AwaitArmAndOffboard,
    /// Climbing to the takeoff altitude above the launch point
    TakeOff,
    /// Tracking toward the current waypoint
    Cruise,
    /// Holding a fixed setpoint for a wall-clock duration
    Hover,
    /// Descend / unpack / ascend sub-task at a delivery stop
    Delivery,
    /// Tracking back toward the launch point
    ReturnHome,
    /// Descending to the landing target
    Land,
    /// Terminal: landing mode accepted, mission over
    Shutdown,
}

impl FlightPhase {
    /// Phase name for logging and diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            FlightPhase::AwaitConnection => "AwaitConnection",
            FlightPhase::StreamSetpoints => "StreamSetpoints",
            FlightPhase::AwaitArmAndOffboard => "AwaitArmAndOffboard",
            FlightPhase::TakeOff => "TakeOff",
            FlightPhase::Cruise => "Cruise",
            FlightPhase::Hover => "Hover",
            FlightPhase::Delivery => "Delivery",
            FlightPhase::ReturnHome => "ReturnHome",
            FlightPhase::Land => "Land",
            FlightPhase::Shutdown => "Shutdown",
        }
    }
}

/// Static flight configuration, fixed before the machine is constructed.
#[derive(Clone, Copy, Debug)]
pub struct FlightConfig {
    /// Actively issue arm/offboard requests (simulation) instead of
    /// waiting for the operator's RC switch
    pub simulation_mode: bool,
    /// Perform the delivery sub-task at non-final waypoints
    pub delivery_mode: bool,
    /// Return to the launch point before landing
    pub return_home_mode: bool,
    /// Takeoff altitude above the launch point, meters
    pub takeoff_altitude: f32,
    /// Altitude for the delivery descend stage, meters
    pub delivery_altitude: f32,
    /// Arrival threshold while descending, meters
    pub land_error: f32,
    /// Hover duration at takeoff, waypoints, and return-home, ms
    pub hover_ms: u64,
    /// Unpack duration during delivery, ms
    pub unpack_ms: u64,
    /// Commanded tracking speed, m/s
    pub desired_speed: f32,
    /// Emit a one-shot odometry reference event after offboard engages
    pub publish_odom_reference: bool,
}

impl Default for FlightConfig {
    fn default() -> Self {
        Self {
            simulation_mode: true,
            delivery_mode: false,
            return_home_mode: false,
            takeoff_altitude: 5.0,
            delivery_altitude: 1.0,
            land_error: 0.3,
            hover_ms: 5000,
            unpack_ms: 5000,
            desired_speed: 0.5,
            publish_odom_reference: false,
        }
    }
}

/// Position setpoint published to the command sink each tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Setpoint {
    pub position: Position,
    pub timestamp_ms: u64,
}

/// Command-side collaborators of the flight state machine.
///
/// `publish_setpoint` is the tick-rate command sink; the request methods
/// are request/response services whose failures are recovered by
/// unconditional retry on the next tick, never surfaced as fatal.
pub trait OffboardLink {
    /// Publish one position setpoint. Called at most once per tick.
    fn publish_setpoint(&mut self, setpoint: Setpoint);

    /// Request arming (or disarming). Returns acceptance.
    fn request_arm(&mut self, arm: bool) -> bool;

    /// Request a flight-mode change. Returns acceptance.
    fn request_mode(&mut self, mode: &str) -> bool;
}

/// Events emitted by the state machine for the runtime to log.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FlightEvent {
    /// Phase transition
    PhaseChanged(FlightPhase),
    /// FCU connection established
    Connected,
    /// Armed with offboard mode engaged
    OffboardReady,
    /// One-shot odometry reference point after offboard engagement
    OdomReference,
    /// Takeoff altitude reached
    TakeoffComplete,
    /// A waypoint was reached
    WaypointReached { seq: u16, final_waypoint: bool },
    /// Delivery sub-task finished at a waypoint
    DeliveryComplete { seq: u16 },
    /// Heading back to the launch point
    ReturningHome,
    /// Ground contact reported by the vehicle while landing
    LandDetected,
    /// Landing mode accepted, flight is over
    MissionComplete,
}
