//! Pre-flight plan files.
//!
//! A plan is a JSON document supplied by the operator before flight:
//! the waypoint list, the cruise arrival threshold, and the indices of
//! waypoints that take a delivery stop. Validation happens here, before
//! the mission containers are built, so a bad plan never reaches the
//! control loop.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use pelican_core::mission::{DeliveryManifest, Waypoint, WaypointQueue, MAX_WAYPOINTS};
use pelican_core::nav::Position;

use crate::error::PelicanError;

/// One waypoint entry in a plan file, ENU meters.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PlanWaypoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Operator-supplied flight plan.
#[derive(Debug, Clone, Deserialize)]
pub struct FlightPlan {
    /// Arrival threshold while cruising, meters
    pub target_error_m: f32,
    /// Targets in visit order
    pub waypoints: Vec<PlanWaypoint>,
    /// Indices into `waypoints` that take a delivery stop
    #[serde(default)]
    pub delivery_stops: Vec<u16>,
}

impl FlightPlan {
    /// Load and validate a plan from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, PelicanError> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parse and validate a plan from JSON text.
    pub fn from_json(text: &str) -> Result<Self, PelicanError> {
        let plan: FlightPlan = serde_json::from_str(text)?;
        plan.validate()?;
        Ok(plan)
    }

    fn validate(&self) -> Result<(), PelicanError> {
        if self.waypoints.is_empty() {
            return Err(PelicanError::InvalidPlan(
                "plan has no waypoints".to_string(),
            ));
        }
        if self.waypoints.len() > MAX_WAYPOINTS {
            return Err(PelicanError::InvalidPlan(format!(
                "{} waypoints exceeds the maximum of {}",
                self.waypoints.len(),
                MAX_WAYPOINTS
            )));
        }
        if !self.target_error_m.is_finite() || self.target_error_m <= 0.0 {
            return Err(PelicanError::InvalidPlan(format!(
                "target error {} must be a positive number of meters",
                self.target_error_m
            )));
        }
        for (i, wp) in self.waypoints.iter().enumerate() {
            if !(wp.x.is_finite() && wp.y.is_finite() && wp.z.is_finite()) {
                return Err(PelicanError::InvalidPlan(format!(
                    "waypoint {} has a non-finite coordinate",
                    i
                )));
            }
            if wp.z < 0.0 {
                return Err(PelicanError::InvalidPlan(format!(
                    "waypoint {} altitude {} is below ground",
                    i, wp.z
                )));
            }
        }
        for &stop in &self.delivery_stops {
            if stop as usize >= self.waypoints.len() {
                return Err(PelicanError::InvalidPlan(format!(
                    "delivery stop {} is out of range ({} waypoints)",
                    stop,
                    self.waypoints.len()
                )));
            }
        }
        Ok(())
    }

    /// Build the mission containers the flight state machine consumes.
    pub fn build_mission(&self) -> Result<(WaypointQueue, DeliveryManifest), PelicanError> {
        let mut queue = WaypointQueue::new(self.waypoints.len())?;
        for (i, wp) in self.waypoints.iter().enumerate() {
            queue.enqueue(Waypoint::new(
                i as u16,
                Position::new(wp.x, wp.y, wp.z),
            ))?;
        }
        let mut manifest = DeliveryManifest::new(self.waypoints.len())?;
        for &stop in &self.delivery_stops {
            manifest.push(stop)?;
        }
        Ok((queue, manifest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_plan() {
        let plan = FlightPlan::from_json(
            r#"{
                "target_error_m": 0.2,
                "waypoints": [
                    {"x": 0.0, "y": 0.0, "z": 5.0},
                    {"x": 5.0, "y": 0.0, "z": 5.0}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(plan.waypoints.len(), 2);
        assert!(plan.delivery_stops.is_empty());

        let (queue, manifest) = plan.build_mission().unwrap();
        assert_eq!(queue.len(), 2);
        assert!(manifest.is_empty());
    }

    #[test]
    fn test_parse_plan_with_delivery_stops() {
        let plan = FlightPlan::from_json(
            r#"{
                "target_error_m": 0.2,
                "waypoints": [
                    {"x": 5.0, "y": 0.0, "z": 5.0},
                    {"x": 5.0, "y": 5.0, "z": 5.0},
                    {"x": 0.0, "y": 5.0, "z": 5.0}
                ],
                "delivery_stops": [0, 2]
            }"#,
        )
        .unwrap();

        let (queue, manifest) = plan.build_mission().unwrap();
        assert_eq!(queue.len(), 3);
        assert_eq!(manifest.len(), 2);
    }

    #[test]
    fn test_empty_waypoint_list_rejected() {
        let err = FlightPlan::from_json(r#"{"target_error_m": 0.2, "waypoints": []}"#)
            .unwrap_err();
        assert!(matches!(err, PelicanError::InvalidPlan(_)));
    }

    #[test]
    fn test_out_of_range_delivery_stop_rejected() {
        let err = FlightPlan::from_json(
            r#"{
                "target_error_m": 0.2,
                "waypoints": [{"x": 1.0, "y": 0.0, "z": 5.0}],
                "delivery_stops": [1]
            }"#,
        )
        .unwrap_err();
        assert!(matches!(err, PelicanError::InvalidPlan(_)));
    }

    #[test]
    fn test_non_positive_target_error_rejected() {
        let err = FlightPlan::from_json(
            r#"{"target_error_m": 0.0, "waypoints": [{"x": 1.0, "y": 0.0, "z": 5.0}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, PelicanError::InvalidPlan(_)));
    }

    #[test]
    fn test_negative_altitude_rejected() {
        let err = FlightPlan::from_json(
            r#"{"target_error_m": 0.2, "waypoints": [{"x": 1.0, "y": 0.0, "z": -2.0}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, PelicanError::InvalidPlan(_)));
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let err = FlightPlan::from_json("{not json").unwrap_err();
        assert!(matches!(err, PelicanError::Parse(_)));
    }
}
