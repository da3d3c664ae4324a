//! Navigation math for ENU position tracking
//!
//! Pure functions and value types used by the flight state machine:
//! straight-line velocity tracking toward a target position and the
//! Euclidean arrival test that gates phase transitions.

use libm::sqrtf;

/// Displacement below which a target counts as already reached by the
/// tracking law. Guards the unit-vector division against zero distance.
pub const TRACK_EPSILON: f32 = 1e-4;

/// Position in the local East-North-Up frame, meters.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Same horizontal position at a different altitude.
    pub fn at_altitude(&self, z: f32) -> Self {
        Self { z, ..*self }
    }

    /// Position offset by one tick's worth of commanded velocity.
    pub fn offset_by(&self, v: Velocity) -> Self {
        Self {
            x: self.x + v.vx,
            y: self.y + v.vy,
            z: self.z + v.vz,
        }
    }
}

/// Commanded velocity vector, m/s in ENU axes.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Velocity {
    pub vx: f32,
    pub vy: f32,
    pub vz: f32,
}

impl Velocity {
    pub const ZERO: Self = Self {
        vx: 0.0,
        vy: 0.0,
        vz: 0.0,
    };

    pub fn magnitude(&self) -> f32 {
        sqrtf(self.vx * self.vx + self.vy * self.vy + self.vz * self.vz)
    }
}

/// Euclidean distance between two ENU positions, meters.
pub fn distance_between(a: Position, b: Position) -> f32 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let dz = b.z - a.z;
    sqrtf(dx * dx + dy * dy + dz * dz)
}

/// Proportional velocity-vector tracking law.
///
/// Open loop: the downstream controller integrates the returned velocity
/// into the next position setpoint and the command is republished every
/// tick. No acceleration limiting, no feedback beyond direction.
#[derive(Clone, Copy, Debug)]
pub struct VelocityTracker {
    desired_speed: f32,
}

impl VelocityTracker {
    pub const fn new(desired_speed: f32) -> Self {
        Self { desired_speed }
    }

    pub fn desired_speed(&self) -> f32 {
        self.desired_speed
    }

    /// Velocity vector of magnitude `desired_speed` pointing from
    /// `current` toward `target`, or zero when the displacement is
    /// degenerate (target already reached).
    pub fn compute(&self, current: Position, target: Position) -> Velocity {
        let dx = target.x - current.x;
        let dy = target.y - current.y;
        let dz = target.z - current.z;
        let d = sqrtf(dx * dx + dy * dy + dz * dz);

        if d < TRACK_EPSILON {
            return Velocity::ZERO;
        }

        Velocity {
            vx: (dx / d) * self.desired_speed,
            vy: (dy / d) * self.desired_speed,
            vz: (dz / d) * self.desired_speed,
        }
    }
}

/// Euclidean-distance arrival test.
///
/// The caller selects the threshold per phase: the tighter target error
/// while cruising, the looser land error while descending.
pub struct ArrivalDetector;

impl ArrivalDetector {
    /// True iff `distance(current, target) < error_threshold`.
    /// Boundary exclusive: a distance exactly equal to the threshold is
    /// not an arrival.
    pub fn reached(error_threshold: f32, current: Position, target: Position) -> bool {
        distance_between(current, target) < error_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_between_axis_aligned() {
        let a = Position::new(0.0, 0.0, 5.0);
        let b = Position::new(10.0, 0.0, 5.0);
        assert!((distance_between(a, b) - 10.0).abs() < 1e-5);
    }

    #[test]
    fn test_distance_between_diagonal() {
        let a = Position::new(0.0, 0.0, 0.0);
        let b = Position::new(3.0, 4.0, 0.0);
        assert!((distance_between(a, b) - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_tracker_axis_aligned() {
        let tracker = VelocityTracker::new(2.0);
        let v = tracker.compute(Position::new(0.0, 0.0, 5.0), Position::new(10.0, 0.0, 5.0));
        assert!((v.vx - 2.0).abs() < 1e-5);
        assert!(v.vy.abs() < 1e-5);
        assert!(v.vz.abs() < 1e-5);
    }

    #[test]
    fn test_tracker_magnitude_is_desired_speed() {
        let tracker = VelocityTracker::new(1.5);
        let cases = [
            (Position::new(0.0, 0.0, 0.0), Position::new(7.0, -3.0, 2.0)),
            (Position::new(1.0, 1.0, 1.0), Position::new(-4.0, 8.0, 0.5)),
            (Position::new(-2.0, 5.0, 9.0), Position::new(-2.0, 5.0, 0.0)),
        ];
        for (current, target) in cases {
            let v = tracker.compute(current, target);
            assert!(
                (v.magnitude() - 1.5).abs() < 1e-4,
                "magnitude {} for {:?} -> {:?}",
                v.magnitude(),
                current,
                target
            );
        }
    }

    #[test]
    fn test_tracker_parallel_to_displacement() {
        let tracker = VelocityTracker::new(3.0);
        let current = Position::new(1.0, 2.0, 3.0);
        let target = Position::new(5.0, -6.0, 11.0);
        let v = tracker.compute(current, target);

        // Cross product of velocity and displacement must vanish
        let (dx, dy, dz) = (target.x - current.x, target.y - current.y, target.z - current.z);
        let cx = v.vy * dz - v.vz * dy;
        let cy = v.vz * dx - v.vx * dz;
        let cz = v.vx * dy - v.vy * dx;
        assert!(cx.abs() < 1e-3 && cy.abs() < 1e-3 && cz.abs() < 1e-3);

        // And point the same way
        assert!(v.vx * dx + v.vy * dy + v.vz * dz > 0.0);
    }

    #[test]
    fn test_tracker_zero_distance_returns_zero_vector() {
        let tracker = VelocityTracker::new(2.0);
        let p = Position::new(4.0, 4.0, 4.0);
        assert_eq!(tracker.compute(p, p), Velocity::ZERO);
    }

    #[test]
    fn test_tracker_sub_epsilon_returns_zero_vector() {
        let tracker = VelocityTracker::new(2.0);
        let p = Position::new(1.0, 1.0, 1.0);
        let q = Position::new(1.0 + 1e-5, 1.0, 1.0);
        assert_eq!(tracker.compute(p, q), Velocity::ZERO);
    }

    #[test]
    fn test_arrival_inside_threshold() {
        let a = Position::new(0.0, 0.0, 0.0);
        let b = Position::new(0.05, 0.0, 0.0);
        assert!(ArrivalDetector::reached(0.1, a, b));
    }

    #[test]
    fn test_arrival_boundary_exclusive() {
        let a = Position::new(0.0, 0.0, 0.0);
        let b = Position::new(0.1, 0.0, 0.0);
        assert!(!ArrivalDetector::reached(0.1, a, b));
    }

    #[test]
    fn test_arrival_outside_threshold() {
        let a = Position::new(0.0, 0.0, 0.0);
        let b = Position::new(1.0, 1.0, 1.0);
        assert!(!ArrivalDetector::reached(0.5, a, b));
    }

    #[test]
    fn test_arrival_idempotent() {
        let a = Position::new(0.0, 0.0, 0.0);
        let b = Position::new(0.2, 0.1, 0.0);
        let first = ArrivalDetector::reached(0.3, a, b);
        for _ in 0..10 {
            assert_eq!(ArrivalDetector::reached(0.3, a, b), first);
        }
    }

    #[test]
    fn test_offset_by_adds_one_tick_of_velocity() {
        let p = Position::new(1.0, 2.0, 3.0);
        let v = Velocity {
            vx: 0.5,
            vy: -0.5,
            vz: 0.1,
        };
        let next = p.offset_by(v);
        assert!((next.x - 1.5).abs() < 1e-6);
        assert!((next.y - 1.5).abs() < 1e-6);
        assert!((next.z - 3.1).abs() < 1e-6);
    }

    #[test]
    fn test_at_altitude_keeps_horizontal() {
        let p = Position::new(7.0, -2.0, 9.0).at_altitude(0.0);
        assert_eq!(p, Position::new(7.0, -2.0, 0.0));
    }
}
