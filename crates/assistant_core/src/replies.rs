//! Forward-only walk over one batch of generated replies.

use shared::domain::{GeneratedReplies, ReplyOption, StoredBatch};

/// Consumption state for the current reply batch.
///
/// The cursor only ever moves forward; advancing past the last reply
/// clears the whole batch back to `Idle` so the next generation starts
/// fresh. There is no backward transition.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ReplyWalk {
    #[default]
    Idle,
    Presenting {
        batch: GeneratedReplies,
        cursor: usize,
    },
}

/// Outcome of one advance step.
#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    /// The next reply is now presented.
    Next(ReplyOption),
    /// The last reply was consumed; the walk re-armed to `Idle`.
    Exhausted,
    /// There was nothing to advance over.
    Idle,
}

impl ReplyWalk {
    /// Begins presenting a fresh batch at the first reply, discarding
    /// any unconsumed remainder of the previous batch.
    pub fn start(batch: GeneratedReplies) -> Self {
        if batch.replies.is_empty() {
            Self::Idle
        } else {
            Self::Presenting { batch, cursor: 0 }
        }
    }

    /// Rebuilds a walk persisted before a reload. An out-of-range
    /// cursor means the batch was already exhausted.
    pub fn restore(stored: StoredBatch) -> Self {
        if stored.cursor < stored.batch.replies.len() {
            Self::Presenting {
                batch: stored.batch,
                cursor: stored.cursor,
            }
        } else {
            Self::Idle
        }
    }

    pub fn to_stored(&self) -> Option<StoredBatch> {
        match self {
            Self::Idle => None,
            Self::Presenting { batch, cursor } => Some(StoredBatch {
                batch: batch.clone(),
                cursor: *cursor,
            }),
        }
    }

    pub fn current(&self) -> Option<&ReplyOption> {
        match self {
            Self::Idle => None,
            Self::Presenting { batch, cursor } => batch.replies.get(*cursor),
        }
    }

    /// Zero-based cursor and batch length.
    pub fn position(&self) -> Option<(usize, usize)> {
        match self {
            Self::Idle => None,
            Self::Presenting { batch, cursor } => Some((*cursor, batch.replies.len())),
        }
    }

    pub fn advance(&mut self) -> Advance {
        match std::mem::take(self) {
            Self::Idle => Advance::Idle,
            Self::Presenting { batch, cursor } => {
                let next = cursor + 1;
                if next < batch.replies.len() {
                    let reply = batch.replies[next].clone();
                    *self = Self::Presenting {
                        batch,
                        cursor: next,
                    };
                    Advance::Next(reply)
                } else {
                    Advance::Exhausted
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/replies_tests.rs"]
mod tests;
