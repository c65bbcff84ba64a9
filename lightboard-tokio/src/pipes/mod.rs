//! Broadcast pipes fanning events out to many subscribers.
//!
//! Producers never block on slow subscribers: every subscription has a
//! bounded buffer and drops its oldest events when it overflows, at which
//! point it is marked lagging.

use thiserror::Error;

pub mod stateless;

/// Size of each subscription's buffer.
pub const PIPE_SIZE: usize = 64;

/// Something went wrong in a Receiver.
#[derive(Error, Debug, Eq, PartialEq)]
pub enum RecvError {
    /// The pipe was closed.
    #[error("The pipe was closed")]
    Closed,
}
