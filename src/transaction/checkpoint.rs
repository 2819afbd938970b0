//! Recovery points
//!
//! The broadcast and internal-transfer paths call [`Checkpoint::reach`] between
//! durable writes. Production uses [`NoopCheckpoint`]; tests inject a crash at
//! a chosen point and then re-run the flow as a restarted process would.

use super::error::TransactionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckpointId {
    /// Network accepted the envelope, nothing persisted yet
    AfterSubmit,
    /// Broadcast observation written, broadcast record not yet written
    AfterObservationWrite,
    /// Internal debit recorded, broadcast record not yet written
    AfterInternalSettlement,
}

pub trait Checkpoint: Send + Sync {
    fn reach(&self, id: CheckpointId) -> Result<(), TransactionError>;
}

pub struct NoopCheckpoint;

impl Checkpoint for NoopCheckpoint {
    #[inline]
    fn reach(&self, _id: CheckpointId) -> Result<(), TransactionError> {
        Ok(())
    }
}

/// Fails once at `target`, then behaves like [`NoopCheckpoint`]
#[cfg(test)]
pub struct CrashAt {
    target: CheckpointId,
    armed: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl CrashAt {
    pub fn new(target: CheckpointId) -> Self {
        Self {
            target,
            armed: std::sync::atomic::AtomicBool::new(true),
        }
    }

    pub fn fired(&self) -> bool {
        !self.armed.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl Checkpoint for CrashAt {
    fn reach(&self, id: CheckpointId) -> Result<(), TransactionError> {
        use std::sync::atomic::Ordering;
        if id == self.target && self.armed.swap(false, Ordering::SeqCst) {
            return Err(TransactionError::Crash(id));
        }
        Ok(())
    }
}
