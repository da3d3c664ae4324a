//! In-process simulated vehicle.
//!
//! A point-mass vehicle that chases the most recent position setpoint,
//! with configurable acceptance delays on the arm and mode-change
//! services (to exercise the control loop's retry behavior) and
//! optional Gaussian pose noise with a deterministic seed for CI.

use std::sync::{Arc, Mutex, MutexGuard};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use pelican_core::flight::{OffboardLink, Setpoint};
use pelican_core::nav::{distance_between, Position};
use pelican_core::telemetry::{mode_name, Pose, TelemetrySnapshot, VehicleState, VehicleStatus};

/// Configuration for the simulated vehicle.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Maximum chase speed toward the commanded setpoint, m/s.
    pub max_speed: f32,
    /// Steps before the telemetry link reports connected.
    pub connect_after_steps: u64,
    /// Arm requests rejected before one is accepted.
    pub accept_arm_after: u32,
    /// Mode requests rejected before one is accepted.
    pub accept_mode_after: u32,
    /// Reported-pose noise standard deviation, meters.
    pub pose_noise_m: f32,
    /// RNG seed for deterministic runs. None = random.
    pub seed: Option<u64>,
    /// Altitude at or below which the vehicle reports standby, meters.
    pub ground_epsilon: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            max_speed: 3.0,
            connect_after_steps: 3,
            accept_arm_after: 2,
            accept_mode_after: 2,
            pose_noise_m: 0.0,
            seed: None,
            ground_epsilon: 0.05,
        }
    }
}

/// Point-mass simulated vehicle.
///
/// Motors only act when armed with the offboard mode engaged; until
/// then commanded setpoints are stored but not chased. Altitude is
/// clamped at ground level and drives the standby/active status.
pub struct SimVehicle {
    config: SimConfig,
    position: Position,
    setpoint: Option<Position>,
    mode: String,
    armed: bool,
    arm_requests: u32,
    mode_requests: u32,
    rng: StdRng,
    step_count: u64,
    time_ms: u64,
}

impl SimVehicle {
    pub fn new(start: Position, config: SimConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            position: start,
            setpoint: None,
            mode: "POSCTL".to_string(),
            armed: false,
            arm_requests: 0,
            mode_requests: 0,
            rng,
            step_count: 0,
            time_ms: 0,
        }
    }

    /// Advance the physics by `dt_ms` of simulated time.
    pub fn step(&mut self, dt_ms: u64) {
        self.step_count += 1;
        self.time_ms += dt_ms;

        if !self.motors_live() {
            return;
        }
        let Some(target) = self.setpoint else {
            return;
        };

        let dt = dt_ms as f32 / 1000.0;
        let reach = self.config.max_speed * dt;
        let dist = distance_between(self.position, target);
        if dist <= reach {
            self.position = target;
        } else {
            let scale = reach / dist;
            self.position = Position::new(
                self.position.x + (target.x - self.position.x) * scale,
                self.position.y + (target.y - self.position.y) * scale,
                self.position.z + (target.z - self.position.z) * scale,
            );
        }
        // The ground is at z = 0
        if self.position.z < 0.0 {
            self.position = self.position.at_altitude(0.0);
        }
    }

    fn motors_live(&self) -> bool {
        self.armed && self.mode == pelican_core::telemetry::OFFBOARD_MODE
    }

    fn connected(&self) -> bool {
        self.step_count >= self.config.connect_after_steps
    }

    fn status(&self) -> VehicleStatus {
        if self.position.z <= self.config.ground_epsilon {
            VehicleStatus::Standby
        } else {
            VehicleStatus::Active
        }
    }

    /// Latch the current telemetry. Pose noise applies to the reported
    /// position only, never the true state.
    pub fn snapshot(&mut self) -> TelemetrySnapshot {
        let reported = Position::new(
            self.position.x + self.gaussian_noise(),
            self.position.y + self.gaussian_noise(),
            self.position.z + self.gaussian_noise(),
        );
        TelemetrySnapshot {
            state: VehicleState {
                connected: self.connected(),
                armed: self.armed,
                mode: mode_name(&self.mode),
                status: self.status(),
            },
            pose: Pose {
                position: reported,
                timestamp_ms: self.time_ms,
            },
        }
    }

    /// True position, without reporting noise.
    pub fn position(&self) -> Position {
        self.position
    }

    pub fn apply_setpoint(&mut self, setpoint: Setpoint) {
        self.setpoint = Some(setpoint.position);
    }

    /// Arm service; rejects the first `accept_arm_after` requests.
    pub fn request_arm(&mut self, arm: bool) -> bool {
        self.arm_requests += 1;
        if self.arm_requests > self.config.accept_arm_after {
            self.armed = arm;
            true
        } else {
            false
        }
    }

    /// Mode-change service; rejects the first `accept_mode_after`
    /// requests.
    pub fn request_mode(&mut self, mode: &str) -> bool {
        self.mode_requests += 1;
        if self.mode_requests > self.config.accept_mode_after {
            self.mode = mode.to_string();
            true
        } else {
            false
        }
    }

    /// Gaussian noise via the Box-Muller transform.
    fn gaussian_noise(&mut self) -> f32 {
        let stddev = self.config.pose_noise_m;
        if stddev == 0.0 {
            return 0.0;
        }
        let u1: f32 = self.rng.gen::<f32>().max(f32::EPSILON);
        let u2: f32 = self.rng.gen();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f32::consts::PI * u2).cos();
        z * stddev
    }
}

/// Handle shared between the control loop and the telemetry task.
pub type SharedVehicle = Arc<Mutex<SimVehicle>>;

pub fn shared(vehicle: SimVehicle) -> SharedVehicle {
    Arc::new(Mutex::new(vehicle))
}

fn lock(vehicle: &SharedVehicle) -> MutexGuard<'_, SimVehicle> {
    // A panic elsewhere must not wedge the control loop
    vehicle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Step the vehicle and latch a snapshot in one critical section.
pub fn step_and_snapshot(vehicle: &SharedVehicle, dt_ms: u64) -> TelemetrySnapshot {
    let mut v = lock(vehicle);
    v.step(dt_ms);
    v.snapshot()
}

/// Command-side view of the simulated vehicle.
pub struct SimLink {
    vehicle: SharedVehicle,
}

impl SimLink {
    pub fn new(vehicle: SharedVehicle) -> Self {
        Self { vehicle }
    }
}

impl OffboardLink for SimLink {
    fn publish_setpoint(&mut self, setpoint: Setpoint) {
        lock(&self.vehicle).apply_setpoint(setpoint);
    }

    fn request_arm(&mut self, arm: bool) -> bool {
        lock(&self.vehicle).request_arm(arm)
    }

    fn request_mode(&mut self, mode: &str) -> bool {
        lock(&self.vehicle).request_mode(mode)
    }
}
