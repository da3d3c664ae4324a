//! Mission storage: waypoint queue and delivery manifest
//!
//! Bounded containers populated once before flight and drained exactly
//! once by the flight state machine. Capacity violations are signaled as
//! errors instead of silently overwriting entries.

use core::fmt;

use heapless::{Deque, Vec};

use crate::nav::Position;

/// Hard upper bound on waypoints per flight session. The logical
/// capacity of a queue or manifest is the operator-declared count and
/// may be smaller.
pub const MAX_WAYPOINTS: usize = 32;

/// Errors from mission container operations.
///
/// Boundary violations are programming errors at the plan-loading
/// seam and are expected to fail loudly before flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MissionError {
    /// Declared capacity exceeds the compile-time storage bound
    CapacityTooLarge { requested: usize, max: usize },
    /// Enqueue beyond the declared waypoint count
    QueueFull { capacity: usize },
    /// Dequeue from an empty queue
    QueueEmpty,
    /// Manifest push beyond the declared waypoint count
    ManifestFull { capacity: usize },
}

impl fmt::Display for MissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissionError::CapacityTooLarge { requested, max } => {
                write!(f, "Declared capacity {} exceeds maximum {}", requested, max)
            }
            MissionError::QueueFull { capacity } => {
                write!(f, "Waypoint queue full ({} waypoints)", capacity)
            }
            MissionError::QueueEmpty => write!(f, "Waypoint queue is empty"),
            MissionError::ManifestFull { capacity } => {
                write!(f, "Delivery manifest full ({} entries)", capacity)
            }
        }
    }
}

impl core::error::Error for MissionError {}

/// A target position plus its enqueue ordinal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Waypoint {
    /// Enqueue order, 0-indexed
    pub seq: u16,
    /// Target position in ENU meters
    pub position: Position,
}

impl Waypoint {
    pub const fn new(seq: u16, position: Position) -> Self {
        Self { seq, position }
    }
}

/// Bounded FIFO of target waypoints.
///
/// Sized at construction from the operator-declared waypoint count:
/// filled exactly once before flight, drained exactly once during it.
#[derive(Debug)]
pub struct WaypointQueue {
    items: Deque<Waypoint, MAX_WAYPOINTS>,
    capacity: usize,
}

impl WaypointQueue {
    /// Create an empty queue with the given logical capacity.
    pub fn new(capacity: usize) -> Result<Self, MissionError> {
        if capacity == 0 || capacity > MAX_WAYPOINTS {
            return Err(MissionError::CapacityTooLarge {
                requested: capacity,
                max: MAX_WAYPOINTS,
            });
        }
        Ok(Self {
            items: Deque::new(),
            capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append to the tail. Fails when the queue already holds
    /// `capacity` items.
    pub fn enqueue(&mut self, waypoint: Waypoint) -> Result<(), MissionError> {
        if self.items.len() >= self.capacity {
            return Err(MissionError::QueueFull {
                capacity: self.capacity,
            });
        }
        // Cannot overflow the backing deque: capacity <= MAX_WAYPOINTS
        self.items
            .push_back(waypoint)
            .map_err(|_| MissionError::QueueFull {
                capacity: self.capacity,
            })
    }

    /// Remove and return the head, strict FIFO order.
    pub fn dequeue(&mut self) -> Result<Waypoint, MissionError> {
        self.items.pop_front().ok_or(MissionError::QueueEmpty)
    }
}

/// Bounded LIFO of waypoint indices that require a delivery action.
///
/// Built before flight, popped once per completed delivery.
#[derive(Debug)]
pub struct DeliveryManifest {
    indices: Vec<u16, MAX_WAYPOINTS>,
    capacity: usize,
}

impl DeliveryManifest {
    /// Create an empty manifest. Depth is bounded by the waypoint count.
    pub fn new(capacity: usize) -> Result<Self, MissionError> {
        if capacity > MAX_WAYPOINTS {
            return Err(MissionError::CapacityTooLarge {
                requested: capacity,
                max: MAX_WAYPOINTS,
            });
        }
        Ok(Self {
            indices: Vec::new(),
            capacity,
        })
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Push a waypoint index. Fails when depth would exceed the
    /// waypoint count.
    pub fn push(&mut self, index: u16) -> Result<(), MissionError> {
        if self.indices.len() >= self.capacity {
            return Err(MissionError::ManifestFull {
                capacity: self.capacity,
            });
        }
        self.indices
            .push(index)
            .map_err(|_| MissionError::ManifestFull {
                capacity: self.capacity,
            })
    }

    /// Pop the most recently pushed index, `None` when empty.
    pub fn pop(&mut self) -> Option<u16> {
        self.indices.pop()
    }
}
