//! Reentrancy Guard and Atomic Execution
//!
//! Every mutating entry point runs through [`Transactional::transact`]:
//! the guard is taken, the body runs against a draft copy of the component,
//! and the draft replaces the live state only on success. A failed call
//! therefore leaves no partial state and no events behind, and the guard is
//! released on every exit path.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::errors::{VaultError, VaultResult};

/// Mutex-style reentrancy flag
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct ReentrancyGuard {
    entered: bool,
}

impl ReentrancyGuard {
    pub fn new() -> Self {
        Self { entered: false }
    }

    /// Take the guard, failing with `Reentrancy` if already held
    pub fn enter(&mut self) -> VaultResult<()> {
        if self.entered {
            return Err(VaultError::Reentrancy);
        }
        self.entered = true;
        Ok(())
    }

    /// Release the guard
    pub fn exit(&mut self) {
        self.entered = false;
    }

    pub fn is_entered(&self) -> bool {
        self.entered
    }
}

/// Draft-and-commit execution under a reentrancy guard
pub trait Transactional: Clone {
    /// The component's guard
    fn guard_mut(&mut self) -> &mut ReentrancyGuard;

    /// Run `body` atomically
    fn transact<R>(&mut self, body: impl FnOnce(&mut Self) -> VaultResult<R>) -> VaultResult<R> {
        self.guard_mut().enter()?;
        let mut draft = self.clone();
        let result = body(&mut draft);
        if result.is_ok() {
            *self = draft;
        }
        self.guard_mut().exit();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default)]
    struct Counter {
        value: u64,
        guard: ReentrancyGuard,
    }

    impl Transactional for Counter {
        fn guard_mut(&mut self) -> &mut ReentrancyGuard {
            &mut self.guard
        }
    }

    #[test]
    fn test_commit_on_success() {
        let mut counter = Counter::default();
        counter.transact(|c| {
            c.value += 5;
            Ok(())
        })
        .unwrap();
        assert_eq!(counter.value, 5);
        assert!(!counter.guard.is_entered());
    }

    #[test]
    fn test_rollback_on_failure() {
        let mut counter = Counter::default();
        let result: VaultResult<()> = counter.transact(|c| {
            c.value += 5;
            Err(VaultError::ZeroAmount)
        });
        assert_eq!(result, Err(VaultError::ZeroAmount));
        assert_eq!(counter.value, 0);
        assert!(!counter.guard.is_entered());
    }

    #[test]
    fn test_nested_entry_rejected() {
        let mut counter = Counter::default();
        let result = counter.transact(|c| c.transact(|inner| {
            inner.value += 1;
            Ok(())
        }));
        assert_eq!(result, Err(VaultError::Reentrancy));
        assert_eq!(counter.value, 0);
        assert!(!counter.guard.is_entered());
    }
}
