use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::action::Direction;

/// Capacity a snake starts with when none is given
pub const DEFAULT_CAPACITY: usize = 5;

/// A position on the game grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Move position by delta
    pub fn moved_by(&self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Move position in a direction
    pub fn moved_in_direction(&self, direction: Direction) -> Self {
        let (dx, dy) = direction.delta();
        self.moved_by(dx, dy)
    }
}

/// Stable identity of a snake for the duration of a race
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SnakeId(pub usize);

impl fmt::Display for SnakeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
struct Body {
    segments: VecDeque<Position>,
    capacity: usize,
}

/// A snake whose body is mutated by its own runner thread while any number
/// of other threads read it.
///
/// The body sits behind a reader/writer lock; the facing direction is a
/// separate atomic so steering never contends with rendering.
#[derive(Debug)]
pub struct Snake {
    id: SnakeId,
    body: RwLock<Body>,
    direction: AtomicU8,
}

impl Snake {
    /// Create a snake with a single head segment and the default capacity
    pub fn new(id: SnakeId, head: Position, direction: Direction) -> Self {
        Self::with_capacity(id, head, direction, DEFAULT_CAPACITY)
    }

    /// Create a snake with a single head segment; capacity is clamped to at least one
    pub fn with_capacity(id: SnakeId, head: Position, direction: Direction, capacity: usize) -> Self {
        let mut segments = VecDeque::with_capacity(capacity.max(1));
        segments.push_front(head);

        Self {
            id,
            body: RwLock::new(Body {
                segments,
                capacity: capacity.max(1),
            }),
            direction: AtomicU8::new(direction.as_u8()),
        }
    }

    pub fn id(&self) -> SnakeId {
        self.id
    }

    /// Current facing direction
    pub fn direction(&self) -> Direction {
        Direction::from_u8(self.direction.load(Ordering::Acquire))
    }

    /// Try to face `direction`. A reversal of the current heading is ignored.
    ///
    /// Returns whether the turn was accepted.
    pub fn turn(&self, direction: Direction) -> bool {
        self.direction
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                if Direction::from_u8(current).is_opposite(direction) {
                    None
                } else {
                    Some(direction.as_u8())
                }
            })
            .is_ok()
    }

    /// Get the head position
    pub fn head(&self) -> Position {
        let body = self.body.read();
        // the body always holds at least the head
        body.segments[0]
    }

    /// Copy of the whole body, head first
    pub fn snapshot(&self) -> Vec<Position> {
        self.body.read().segments.iter().copied().collect()
    }

    /// Whether any segment occupies `pos`
    pub fn occupies(&self, pos: Position) -> bool {
        self.body.read().segments.contains(&pos)
    }

    /// Push a new head, grow the capacity if asked, then drop tail segments
    /// until the body fits.
    pub fn advance(&self, new_head: Position, grow: bool) {
        let mut body = self.body.write();
        body.segments.push_front(new_head);
        if grow {
            body.capacity += 1;
        }
        while body.segments.len() > body.capacity {
            body.segments.pop_back();
        }
    }

    /// Get the length of the snake
    pub fn len(&self) -> usize {
        self.body.read().segments.len()
    }

    /// Always false; a snake keeps its head for its whole life
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Maximum number of segments currently allowed
    pub fn capacity(&self) -> usize {
        self.body.read().capacity
    }
}
