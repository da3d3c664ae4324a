//! pelican_core - Pure no_std flight logic for the pelican offboard controller
//!
//! This crate contains the waypoint-sequencing state machine and its
//! supporting algorithms, free of any transport or runtime dependency so
//! the whole flight logic can be tested on host.
//!
//! # Design Principles
//!
//! - **Pure no_std**: no std library dependencies
//! - **One tick, one snapshot**: the state machine reads a single
//!   [`telemetry::TelemetrySnapshot`] per tick and publishes at most one
//!   setpoint through the [`flight::OffboardLink`] trait
//! - **Bounded storage**: waypoints and the delivery manifest live in
//!   fixed-capacity containers that signal capacity errors instead of
//!   overwriting entries
//!
//! # Modules
//!
//! - [`nav`]: ENU position/velocity math, tracking law, arrival test
//! - [`mission`]: waypoint queue and delivery manifest
//! - [`telemetry`]: vehicle state and pose snapshot types
//! - [`flight`]: flight state machine, phases, events, link trait

#![no_std]

pub mod flight;
pub mod mission;
pub mod nav;
pub mod telemetry;
