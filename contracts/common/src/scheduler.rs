//! Operation Scheduler
//!
//! Time-delayed admin actions. Each privileged reconfiguration is queued
//! with `execute_after = now + delay` and may only run once that time is
//! reached, giving depositors an exit window. Cancelling marks an entry
//! executed so it can never run.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::{VaultError, VaultResult};
use crate::types::Bytes32;

/// A queued operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct ScheduledOperation<T> {
    /// Unique operation id
    pub id: Bytes32,
    /// The action to apply
    pub operation: T,
    /// Timestamp when queued
    pub queued_at: u64,
    /// Earliest execution timestamp
    pub execute_after: u64,
    /// Executed or cancelled
    pub executed: bool,
}

impl<T> ScheduledOperation<T> {
    /// Check if operation can be executed
    pub fn can_execute(&self, now: u64) -> bool {
        !self.executed && now >= self.execute_after
    }

    /// Check if operation is still waiting on its delay
    pub fn is_pending(&self, now: u64) -> bool {
        !self.executed && now < self.execute_after
    }
}

/// Queue of delayed operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct OperationQueue<T> {
    /// Delay applied to every queued operation
    pub delay: u64,
    operations: Vec<ScheduledOperation<T>>,
    nonce: u64,
}

impl<T: Clone + BorshSerialize> OperationQueue<T> {
    pub fn new(delay: u64) -> Self {
        Self { delay, operations: Vec::new(), nonce: 0 }
    }

    fn derive_id(&self, operation: &T, now: u64) -> Bytes32 {
        let mut hasher = Sha256::new();
        hasher.update(borsh::to_vec(operation).unwrap_or_default());
        hasher.update(self.nonce.to_le_bytes());
        hasher.update(now.to_le_bytes());
        let result = hasher.finalize();
        let mut id = [0u8; 32];
        id.copy_from_slice(&result);
        id
    }

    /// Queue an operation, returning its id
    pub fn queue(&mut self, operation: T, now: u64) -> VaultResult<Bytes32> {
        let id = self.derive_id(&operation, now);
        let execute_after = now.checked_add(self.delay).ok_or(VaultError::Overflow)?;
        self.nonce += 1;
        self.operations.push(ScheduledOperation {
            id,
            operation,
            queued_at: now,
            execute_after,
            executed: false,
        });
        Ok(id)
    }

    /// Look up an operation
    pub fn get(&self, id: &Bytes32) -> Option<&ScheduledOperation<T>> {
        self.operations.iter().find(|op| op.id == *id)
    }

    /// Pure eligibility check
    pub fn check_ready(&self, id: &Bytes32, now: u64) -> VaultResult<&ScheduledOperation<T>> {
        let op = self.get(id).ok_or(VaultError::OperationNotFound { id: *id })?;
        if op.executed {
            return Err(VaultError::OperationAlreadyExecuted { id: *id });
        }
        if now < op.execute_after {
            return Err(VaultError::OperationNotReady { execute_after: op.execute_after, now });
        }
        Ok(op)
    }

    /// Mark a ready operation executed and hand it back for application
    pub fn take_ready(&mut self, id: &Bytes32, now: u64) -> VaultResult<T> {
        let operation = self.check_ready(id, now)?.operation.clone();
        if let Some(op) = self.operations.iter_mut().find(|op| op.id == *id) {
            op.executed = true;
        }
        Ok(operation)
    }

    /// Neutralize a queued operation
    pub fn cancel(&mut self, id: &Bytes32) -> VaultResult<()> {
        let op = self
            .operations
            .iter_mut()
            .find(|op| op.id == *id)
            .ok_or(VaultError::OperationNotFound { id: *id })?;
        if op.executed {
            return Err(VaultError::OperationAlreadyExecuted { id: *id });
        }
        op.executed = true;
        Ok(())
    }

    /// Operations still waiting on their delay
    pub fn pending(&self, now: u64) -> impl Iterator<Item = &ScheduledOperation<T>> {
        self.operations.iter().filter(move |op| op.is_pending(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq, BorshSerialize)]
    enum Action {
        SetWeight(u32, u64),
    }

    #[test]
    fn test_queue_and_execute_after_delay() {
        let mut queue = OperationQueue::new(3_600);
        let id = queue.queue(Action::SetWeight(0, 5_000), 1_000).unwrap();

        let err = queue.take_ready(&id, 4_599).unwrap_err();
        assert_eq!(err, VaultError::OperationNotReady { execute_after: 4_600, now: 4_599 });

        assert_eq!(queue.take_ready(&id, 4_600).unwrap(), Action::SetWeight(0, 5_000));
        assert_eq!(
            queue.take_ready(&id, 4_600),
            Err(VaultError::OperationAlreadyExecuted { id })
        );
    }

    #[test]
    fn test_cancel_marks_executed() {
        let mut queue = OperationQueue::new(10);
        let id = queue.queue(Action::SetWeight(1, 100), 0).unwrap();
        assert_eq!(queue.pending(0).count(), 1);

        queue.cancel(&id).unwrap();
        assert!(queue.get(&id).unwrap().executed);
        assert_eq!(queue.pending(0).count(), 0);
        assert!(queue.take_ready(&id, 100).is_err());
        assert!(queue.cancel(&id).is_err());
    }

    #[test]
    fn test_identical_operations_get_distinct_ids() {
        let mut queue = OperationQueue::new(10);
        let a = queue.queue(Action::SetWeight(1, 100), 0).unwrap();
        let b = queue.queue(Action::SetWeight(1, 100), 0).unwrap();
        assert_ne!(a, b);
        assert!(matches!(
            queue.check_ready(&[9u8; 32], 100),
            Err(VaultError::OperationNotFound { .. })
        ));
    }
}
