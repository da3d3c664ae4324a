//! Vehicle state and pose snapshot types
//!
//! The telemetry collaborator owns these values and latches the most
//! recent snapshot into a single-writer register; the flight state
//! machine reads exactly one snapshot per tick and never blocks for a
//! fresh one.

use heapless::String;

use crate::nav::Position;

/// Maximum length of a flight-mode name.
pub const MODE_NAME_LEN: usize = 16;

/// Offboard flight mode requested before takeoff.
pub const OFFBOARD_MODE: &str = "OFFBOARD";

/// Native landing mode requested once landing is detected.
pub const LAND_MODE: &str = "AUTO.LAND";

/// Build a bounded mode name from a str, truncating past
/// [`MODE_NAME_LEN`] on a character boundary. The name arrives from
/// the external telemetry feed and is not guaranteed to be ASCII.
pub fn mode_name(s: &str) -> String<MODE_NAME_LEN> {
    let mut out = String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

/// Downstream autopilot system status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VehicleStatus {
    #[default]
    Uninit,
    Boot,
    Calibrating,
    /// On ground, motors idle
    Standby,
    Active,
    Critical,
    Emergency,
    Poweroff,
}

impl VehicleStatus {
    /// Decode the wire status code; unknown codes map to `Uninit`.
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => VehicleStatus::Boot,
            2 => VehicleStatus::Calibrating,
            3 => VehicleStatus::Standby,
            4 => VehicleStatus::Active,
            5 => VehicleStatus::Critical,
            6 => VehicleStatus::Emergency,
            7 => VehicleStatus::Poweroff,
            _ => VehicleStatus::Uninit,
        }
    }

    /// Landing-phase ground detection.
    ///
    /// Both ground predicates currently map to `Standby`; they are kept
    /// as separate names because the downstream autopilot may report
    /// delivery touchdown differently from final landing.
    pub fn is_on_ground(self) -> bool {
        self == VehicleStatus::Standby
    }

    /// Delivery-phase touchdown detection.
    pub fn touchdown_for_delivery(self) -> bool {
        self == VehicleStatus::Standby
    }
}

/// Read-only snapshot of the vehicle's link and mode state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VehicleState {
    pub connected: bool,
    pub armed: bool,
    pub mode: String<MODE_NAME_LEN>,
    pub status: VehicleStatus,
}

impl VehicleState {
    /// Armed with the offboard mode engaged.
    pub fn offboard_ready(&self) -> bool {
        self.armed && self.mode.as_str() == OFFBOARD_MODE
    }
}

/// Read-only snapshot of the vehicle's pose.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Pose {
    pub position: Position,
    pub timestamp_ms: u64,
}

/// The single value the state machine reads each tick. Possibly one or
/// more ticks stale; always internally consistent.
#[derive(Clone, Debug, Default)]
pub struct TelemetrySnapshot {
    pub state: VehicleState,
    pub pose: Pose,
}
