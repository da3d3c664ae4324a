//! Waypoint-sequencing state machine
//!
//! Pure per-tick implementation: each call to [`FlightStateMachine::update`]
//! reads exactly one telemetry snapshot, performs at most one setpoint
//! publish, and returns the events produced by that tick.

use heapless::Vec;

use super::{FlightConfig, FlightEvent, FlightPhase, OffboardLink, Setpoint};
use crate::mission::{DeliveryManifest, MissionError, Waypoint, WaypointQueue};
use crate::nav::{ArrivalDetector, Position, VelocityTracker};
use crate::telemetry::{TelemetrySnapshot, LAND_MODE, OFFBOARD_MODE};

/// Warm-up setpoints streamed before the FCU accepts offboard commands.
pub const SETPOINT_WARMUP_TICKS: u32 = 50;

/// Maximum events emitted per tick.
pub const MAX_FLIGHT_EVENTS: usize = 4;

type Events = Vec<FlightEvent, MAX_FLIGHT_EVENTS>;

/// What the machine does once the current hover deadline expires.
#[derive(Clone, Copy, Debug)]
enum AfterHover {
    /// Post-takeoff hover done, start draining the queue
    BeginCruise,
    /// Hover at a reached waypoint done, take the completion branch
    WaypointDone,
    /// Post-delivery hover done, continue or return home
    DeliveryDone,
    /// Hover over the launch point done, descend and land there
    BeginLandAtHome,
}

/// Stage within the delivery sub-task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DeliveryStage {
    /// Descending to the delivery altitude above the stop
    Descend,
    /// Holding position while the payload is unpacked
    Unpack,
    /// Climbing back to the waypoint setpoint
    Ascend,
}

/// The orchestrator: drains the waypoint queue, drives the velocity
/// tracker each tick, and transitions through the flight phases.
///
/// Owns all mission state; reads pose and vehicle state from the
/// snapshot passed in each tick and publishes through the link.
pub struct FlightStateMachine {
    phase: FlightPhase,
    config: FlightConfig,
    /// Arrival threshold while cruising, from operator input
    target_error: f32,
    tracker: VelocityTracker,
    queue: WaypointQueue,
    manifest: DeliveryManifest,

    /// Launch position, captured once before setpoint streaming begins
    home: Position,
    warmup_remaining: u32,
    warmup_setpoint: Position,

    /// Waypoint currently being flown, held through hover and delivery
    active_waypoint: Option<Waypoint>,
    /// The dequeue that produced `active_waypoint` emptied the queue
    final_waypoint: bool,

    hover_setpoint: Position,
    hover_until_ms: u64,
    after_hover: AfterHover,

    delivery_stage: DeliveryStage,
    delivery_target: Position,
    unpack_setpoint: Position,

    return_target: Position,
    land_target: Position,
    land_reported: bool,
}

impl FlightStateMachine {
    /// Build a machine over a fully-populated mission.
    ///
    /// The queue must hold at least one waypoint; an empty plan is a
    /// pre-flight validation failure, not a flyable mission.
    pub fn new(
        queue: WaypointQueue,
        manifest: DeliveryManifest,
        target_error: f32,
        config: FlightConfig,
    ) -> Result<Self, MissionError> {
        if queue.is_empty() {
            return Err(MissionError::QueueEmpty);
        }
        Ok(Self {
            phase: FlightPhase::AwaitConnection,
            tracker: VelocityTracker::new(config.desired_speed),
            config,
            target_error,
            queue,
            manifest,
            home: Position::default(),
            warmup_remaining: SETPOINT_WARMUP_TICKS,
            warmup_setpoint: Position::default(),
            active_waypoint: None,
            final_waypoint: false,
            hover_setpoint: Position::default(),
            hover_until_ms: 0,
            after_hover: AfterHover::BeginCruise,
            delivery_stage: DeliveryStage::Descend,
            delivery_target: Position::default(),
            unpack_setpoint: Position::default(),
            return_target: Position::default(),
            land_target: Position::default(),
            land_reported: false,
        })
    }

    pub fn phase(&self) -> FlightPhase {
        self.phase
    }

    /// False once the terminal Shutdown phase is reached.
    pub fn is_running(&self) -> bool {
        self.phase != FlightPhase::Shutdown
    }

    /// Waypoint currently being flown, if any.
    pub fn active_waypoint(&self) -> Option<Waypoint> {
        self.active_waypoint
    }

    /// Waypoints still queued (excluding the active one).
    pub fn remaining_waypoints(&self) -> usize {
        self.queue.len()
    }

    /// Delivery-manifest entries not yet popped.
    pub fn pending_deliveries(&self) -> usize {
        self.manifest.len()
    }

    /// Launch position. Meaningful once streaming has begun.
    pub fn home(&self) -> Position {
        self.home
    }

    /// Advance one control tick.
    ///
    /// Reads the snapshot once, publishes at most one setpoint, and
    /// returns the events this tick produced. `now_ms` is the runtime's
    /// wall clock; hover and unpack deadlines are measured against it.
    pub fn update(
        &mut self,
        snapshot: &TelemetrySnapshot,
        link: &mut dyn OffboardLink,
        now_ms: u64,
    ) -> Events {
        let mut events = Events::new();
        let pos = snapshot.pose.position;

        match self.phase {
            FlightPhase::AwaitConnection => {
                if snapshot.state.connected {
                    self.home = pos;
                    self.warmup_setpoint = pos.at_altitude(self.config.takeoff_altitude);
                    self.warmup_remaining = SETPOINT_WARMUP_TICKS;
                    push(&mut events, FlightEvent::Connected);
                    self.transition(FlightPhase::StreamSetpoints, &mut events);
                }
            }

            FlightPhase::StreamSetpoints => {
                self.publish_hold(self.warmup_setpoint, link, now_ms);
                self.warmup_remaining -= 1;
                if self.warmup_remaining == 0 {
                    self.transition(FlightPhase::AwaitArmAndOffboard, &mut events);
                }
            }

            FlightPhase::AwaitArmAndOffboard => {
                // Keep the stream alive or the FCU drops offboard
                self.publish_hold(self.warmup_setpoint, link, now_ms);
                if snapshot.state.offboard_ready() {
                    push(&mut events, FlightEvent::OffboardReady);
                    if self.config.publish_odom_reference {
                        push(&mut events, FlightEvent::OdomReference);
                    }
                    self.transition(FlightPhase::TakeOff, &mut events);
                } else if self.config.simulation_mode {
                    // Rejected requests are retried next tick, unbounded
                    let _ = link.request_arm(true);
                    let _ = link.request_mode(OFFBOARD_MODE);
                }
            }

            FlightPhase::TakeOff => {
                let target = self.home.at_altitude(self.config.takeoff_altitude);
                self.track_and_publish(pos, target, link, now_ms);
                if ArrivalDetector::reached(self.target_error, pos, target) {
                    push(&mut events, FlightEvent::TakeoffComplete);
                    self.begin_hover(target, now_ms, AfterHover::BeginCruise, &mut events);
                }
            }

            FlightPhase::Cruise => {
                if self.active_waypoint.is_none() {
                    match self.queue.dequeue() {
                        Ok(wp) => {
                            self.final_waypoint = self.queue.is_empty();
                            self.active_waypoint = Some(wp);
                        }
                        Err(_) => {
                            // Nothing left to fly; descend where we are
                            self.publish_hold(pos, link, now_ms);
                            self.land_target = pos.at_altitude(0.0);
                            self.transition(FlightPhase::Land, &mut events);
                            return events;
                        }
                    }
                }
                if let Some(wp) = self.active_waypoint {
                    self.track_and_publish(pos, wp.position, link, now_ms);
                    if ArrivalDetector::reached(self.target_error, pos, wp.position) {
                        push(
                            &mut events,
                            FlightEvent::WaypointReached {
                                seq: wp.seq,
                                final_waypoint: self.final_waypoint,
                            },
                        );
                        self.begin_hover(wp.position, now_ms, AfterHover::WaypointDone, &mut events);
                    }
                }
            }

            FlightPhase::Hover => {
                self.publish_hold(self.hover_setpoint, link, now_ms);
                if now_ms >= self.hover_until_ms {
                    match self.after_hover {
                        AfterHover::BeginCruise => {
                            self.active_waypoint = None;
                            self.transition(FlightPhase::Cruise, &mut events);
                        }
                        AfterHover::WaypointDone => self.waypoint_done(&mut events),
                        AfterHover::DeliveryDone => self.delivery_done(&mut events),
                        AfterHover::BeginLandAtHome => {
                            self.land_target = self.home.at_altitude(0.0);
                            self.transition(FlightPhase::Land, &mut events);
                        }
                    }
                }
            }

            FlightPhase::Delivery => self.update_delivery(snapshot, link, now_ms, &mut events),

            FlightPhase::ReturnHome => {
                self.track_and_publish(pos, self.return_target, link, now_ms);
                if ArrivalDetector::reached(self.target_error, pos, self.return_target) {
                    self.begin_hover(
                        self.return_target,
                        now_ms,
                        AfterHover::BeginLandAtHome,
                        &mut events,
                    );
                }
            }

            FlightPhase::Land => {
                self.track_and_publish(pos, self.land_target, link, now_ms);
                let grounded = snapshot.state.status.is_on_ground();
                if grounded
                    || ArrivalDetector::reached(self.config.land_error, pos, self.land_target)
                {
                    if grounded && !self.land_reported {
                        self.land_reported = true;
                        push(&mut events, FlightEvent::LandDetected);
                    }
                    if link.request_mode(LAND_MODE) {
                        push(&mut events, FlightEvent::MissionComplete);
                        self.transition(FlightPhase::Shutdown, &mut events);
                    }
                }
            }

            FlightPhase::Shutdown => {}
        }

        events
    }

    // ========================================================================
    // Phase helpers
    // ========================================================================

    fn transition(&mut self, next: FlightPhase, events: &mut Events) {
        self.phase = next;
        push(events, FlightEvent::PhaseChanged(next));
    }

    /// Publish a setpoint one tick of tracking ahead of the current pose.
    fn track_and_publish(
        &self,
        current: Position,
        target: Position,
        link: &mut dyn OffboardLink,
        now_ms: u64,
    ) {
        let vel = self.tracker.compute(current, target);
        link.publish_setpoint(Setpoint {
            position: current.offset_by(vel),
            timestamp_ms: now_ms,
        });
    }

    /// Republish a fixed setpoint (hover / warm-up stream).
    fn publish_hold(&self, position: Position, link: &mut dyn OffboardLink, now_ms: u64) {
        link.publish_setpoint(Setpoint {
            position,
            timestamp_ms: now_ms,
        });
    }

    fn begin_hover(
        &mut self,
        setpoint: Position,
        now_ms: u64,
        after: AfterHover,
        events: &mut Events,
    ) {
        self.hover_setpoint = setpoint;
        self.hover_until_ms = now_ms + self.config.hover_ms;
        self.after_hover = after;
        self.transition(FlightPhase::Hover, events);
    }

    /// Completion branch after hovering at a reached waypoint.
    fn waypoint_done(&mut self, events: &mut Events) {
        let Some(wp) = self.active_waypoint else {
            self.transition(FlightPhase::Cruise, events);
            return;
        };

        if !self.final_waypoint {
            if self.config.delivery_mode {
                self.begin_delivery(wp, events);
            } else {
                self.active_waypoint = None;
                self.transition(FlightPhase::Cruise, events);
            }
        } else if !self.config.return_home_mode {
            // Land directly at the last waypoint
            self.land_target = wp.position.at_altitude(0.0);
            self.transition(FlightPhase::Land, events);
        } else if self.config.delivery_mode {
            // Deliver first, then head home
            self.begin_delivery(wp, events);
        } else {
            self.begin_return_home(wp, events);
        }
    }

    /// Continuation after the post-delivery hover.
    fn delivery_done(&mut self, events: &mut Events) {
        let Some(wp) = self.active_waypoint else {
            self.transition(FlightPhase::Cruise, events);
            return;
        };

        if self.final_waypoint && self.config.return_home_mode {
            self.begin_return_home(wp, events);
        } else {
            self.active_waypoint = None;
            self.transition(FlightPhase::Cruise, events);
        }
    }

    fn begin_delivery(&mut self, wp: Waypoint, events: &mut Events) {
        self.delivery_stage = DeliveryStage::Descend;
        self.delivery_target = wp.position.at_altitude(self.config.delivery_altitude);
        self.transition(FlightPhase::Delivery, events);
    }

    fn begin_return_home(&mut self, wp: Waypoint, events: &mut Events) {
        // Cruise back at the altitude the branch was taken at
        self.return_target = Position::new(self.home.x, self.home.y, wp.position.z);
        push(events, FlightEvent::ReturningHome);
        self.transition(FlightPhase::ReturnHome, events);
    }

    fn update_delivery(
        &mut self,
        snapshot: &TelemetrySnapshot,
        link: &mut dyn OffboardLink,
        now_ms: u64,
        events: &mut Events,
    ) {
        let pos = snapshot.pose.position;
        match self.delivery_stage {
            DeliveryStage::Descend => {
                self.track_and_publish(pos, self.delivery_target, link, now_ms);
                let touched = snapshot.state.status.touchdown_for_delivery();
                if touched
                    || ArrivalDetector::reached(self.config.land_error, pos, self.delivery_target)
                {
                    // Hold where we actually came down, not the nominal target
                    self.unpack_setpoint = if touched { pos } else { self.delivery_target };
                    self.hover_until_ms = now_ms + self.config.unpack_ms;
                    self.delivery_stage = DeliveryStage::Unpack;
                }
            }
            DeliveryStage::Unpack => {
                self.publish_hold(self.unpack_setpoint, link, now_ms);
                if now_ms >= self.hover_until_ms {
                    let _ = self.manifest.pop();
                    if let Some(wp) = self.active_waypoint {
                        push(events, FlightEvent::DeliveryComplete { seq: wp.seq });
                    }
                    self.delivery_stage = DeliveryStage::Ascend;
                }
            }
            DeliveryStage::Ascend => {
                let Some(wp) = self.active_waypoint else {
                    self.transition(FlightPhase::Cruise, events);
                    return;
                };
                self.track_and_publish(pos, wp.position, link, now_ms);
                if ArrivalDetector::reached(self.target_error, pos, wp.position) {
                    self.begin_hover(wp.position, now_ms, AfterHover::DeliveryDone, events);
                }
            }
        }
    }
}

/// Bounded event push; MAX_FLIGHT_EVENTS is sized for the worst tick.
fn push(events: &mut Events, event: FlightEvent) {
    let _ = events.push(event);
}
