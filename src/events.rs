//! Lifecycle events and gating
//!
//! Every save and delete passes through a fixed sequence of lifecycle
//! events. The `before-*` events are gates: a hook answering
//! [`GateOutcome::Abort`] stops the operation before any storage mutation.
//! The `after-*` events are informational and fire only once the physical
//! operation succeeded.

use crate::entity::EntityRef;

/// A lifecycle event fired by a repository during save or delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityEvent {
    BeforeAdd,
    BeforeUpdate,
    BeforeSave,
    AfterAdd,
    AfterUpdate,
    AfterSave,
    BeforeDelete,
    AfterDelete,
}

impl EntityEvent {
    /// Stable event name, useful for logs and assertions.
    pub fn name(&self) -> &'static str {
        match self {
            EntityEvent::BeforeAdd => "before-add",
            EntityEvent::BeforeUpdate => "before-update",
            EntityEvent::BeforeSave => "before-save",
            EntityEvent::AfterAdd => "after-add",
            EntityEvent::AfterUpdate => "after-update",
            EntityEvent::AfterSave => "after-save",
            EntityEvent::BeforeDelete => "before-delete",
            EntityEvent::AfterDelete => "after-delete",
        }
    }

    /// Whether hooks can abort the operation at this event.
    pub fn is_gate(&self) -> bool {
        matches!(
            self,
            EntityEvent::BeforeAdd
                | EntityEvent::BeforeUpdate
                | EntityEvent::BeforeSave
                | EntityEvent::BeforeDelete
        )
    }
}

/// Outcome of a lifecycle hook.
///
/// The repository's state machine consumes this directly; there is no
/// mutable event object to flip flags on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// Let the operation proceed.
    Continue,
    /// Abort the operation. Only honored for gate events; on `after-*`
    /// events the outcome is ignored.
    Abort,
}

/// Observer of repository lifecycle events.
///
/// Hooks are invoked in registration order. Every hook sees every event,
/// even after an earlier hook aborted; the abort wins once all hooks ran.
pub trait LifecycleHook {
    fn handle(&self, event: EntityEvent, entity: &EntityRef) -> GateOutcome;
}

impl<F> LifecycleHook for F
where
    F: Fn(EntityEvent, &EntityRef) -> GateOutcome,
{
    fn handle(&self, event: EntityEvent, entity: &EntityRef) -> GateOutcome {
        self(event, entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_classification() {
        assert!(EntityEvent::BeforeAdd.is_gate());
        assert!(EntityEvent::BeforeUpdate.is_gate());
        assert!(EntityEvent::BeforeSave.is_gate());
        assert!(EntityEvent::BeforeDelete.is_gate());
        assert!(!EntityEvent::AfterAdd.is_gate());
        assert!(!EntityEvent::AfterUpdate.is_gate());
        assert!(!EntityEvent::AfterSave.is_gate());
        assert!(!EntityEvent::AfterDelete.is_gate());
    }

    #[test]
    fn test_event_names() {
        assert_eq!(EntityEvent::BeforeSave.name(), "before-save");
        assert_eq!(EntityEvent::AfterDelete.name(), "after-delete");
    }
}
