//! Offboard waypoint-delivery flight controller.
//!
//! The pure control logic (waypoint queue, velocity tracking, flight
//! state machine) lives in `pelican_core`; this crate adds the plan
//! loader, an in-process simulated vehicle, and the tokio control loop
//! that ties them together.

pub mod error;
pub mod plan;
pub mod runtime;
pub mod sim;

pub use error::PelicanError;
pub use plan::FlightPlan;
pub use runtime::{spawn_telemetry, MissionRuntime, RuntimeConfig};
pub use sim::{shared, SimConfig, SimLink, SimVehicle};
