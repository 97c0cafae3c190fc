//! Acceptance window for non-replayable message IDs.
//!
//! Tracks the largest ID accepted so far. Rejections come in two strengths:
//! a recently used ID is [`ErrorCode::MessageReplayed`], from which the
//! sender recovers by incrementing and retrying, and an ID too far from the
//! window is [`ErrorCode::MessageReplayedUnrecoverable`]. IDs wrap at
//! [`MAX_LONG_VALUE`].
//!
//! # Thread Safety
//!
//! Not thread-safe. The token factory owning the window keeps it behind a
//! mutex.

use tessera_common::{Error, ErrorCode, Result};

use crate::{MAX_LONG_VALUE, MAX_MESSAGES};

/// IDs this close below the largest are treated as in-flight retries.
const CATCHUP: i64 = MAX_MESSAGES / 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonReplayableIdWindow {
    largest: i64,
    window: i64,
}

impl NonReplayableIdWindow {
    /// Default window size.
    pub const DEFAULT_WINDOW: i64 = 65536;

    pub fn new(window: i64) -> Self {
        Self { largest: 0, window }
    }

    /// Window that has already accepted `largest`.
    pub fn with_largest(window: i64, largest: i64) -> Self {
        Self { largest, window }
    }

    pub fn largest(&self) -> i64 {
        self.largest
    }

    pub fn window(&self) -> i64 {
        self.window
    }

    /// Decide whether `id` would be accepted. Does not update state.
    ///
    /// `Err` for an out-of-range ID, `Ok(Some(code))` for a replay.
    pub fn check(&self, id: i64) -> Result<Option<ErrorCode>> {
        if !(0..=MAX_LONG_VALUE).contains(&id) {
            return Err(Error::message(
                ErrorCode::NonReplayableIdOutOfRange,
                format!("non-replayable ID {id}"),
            ));
        }

        let largest = self.largest;

        // Recently accepted
        if largest - CATCHUP < id && id <= largest {
            return Ok(Some(ErrorCode::MessageReplayed));
        }

        // Too far ahead
        if id - self.window > largest {
            return Ok(Some(ErrorCode::MessageReplayedUnrecoverable));
        }

        // Behind, unless far enough back to be across the wraparound
        if id < largest {
            let cutoff = largest - MAX_LONG_VALUE + self.window;
            if id >= cutoff {
                return Ok(Some(ErrorCode::MessageReplayedUnrecoverable));
            }
        }

        Ok(None)
    }

    /// Check and, if accepted, record `id` as the new largest.
    pub fn accept(&mut self, id: i64) -> Result<Option<ErrorCode>> {
        let rejection = self.check(id)?;
        if rejection.is_none() {
            self.largest = id;
        }
        Ok(rejection)
    }
}

impl Default for NonReplayableIdWindow {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WINDOW)
    }
}
