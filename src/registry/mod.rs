use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{AppError, Result};
use crate::models::Stack;

/// Shared, ordered collection of every stack seen this run. Ids follow
/// insertion order and are never reused; stacks are never removed. One
/// lock serializes all access and is never held across a network call.
#[derive(Clone, Default)]
pub struct StackRegistry {
    stacks: Arc<Mutex<Vec<Stack>>>,
}

impl StackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> MutexGuard<'_, Vec<Stack>> {
        // A poisoned lock means some other holder panicked mid-operation;
        // the Vec itself is still usable.
        match self.stacks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Registers a new stack and returns a copy of it. Duplicate names are
    /// allowed (a retried deployment registers a second attempt); lookups
    /// return the first match.
    pub fn add(&self, name: &str, create: bool) -> Stack {
        let mut stacks = self.locked();
        let stack = Stack::new(stacks.len(), name.to_string(), create);
        stacks.push(stack.clone());
        stack
    }

    /// First stack registered under `name`, if any.
    pub fn get_by_name(&self, name: &str) -> Option<Stack> {
        self.locked().iter().find(|stack| stack.name == name).cloned()
    }

    /// Read-only copy of every tracked stack, in registration order.
    pub fn snapshot(&self) -> Vec<Stack> {
        self.locked().clone()
    }

    /// Applies the operator skip. Returns whether the stack actually moved
    /// to skipped (a terminal stack stays put).
    pub fn mark_skipped(&self, name: &str) -> Result<bool> {
        let mut stacks = self.locked();
        let stack = stacks
            .iter_mut()
            .find(|stack| stack.name == name)
            .ok_or_else(|| AppError::UnknownStack(name.to_string()))?;
        Ok(stack.mark_skipped())
    }

    /// Runs the status state machine on the named stack. Returns whether
    /// anything changed.
    pub fn apply_backend_status(&self, name: &str, raw_status: &str) -> Result<bool> {
        let mut stacks = self.locked();
        let stack = stacks
            .iter_mut()
            .find(|stack| stack.name == name)
            .ok_or_else(|| AppError::UnknownStack(name.to_string()))?;
        Ok(stack.apply_backend_status(raw_status))
    }
}
