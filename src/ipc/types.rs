/*!
 * Bounded Buffer Types
 * Roles, semaphore operations, snapshots and lifecycle events
 */

use crate::core::sync::{SemaphoreCounts, SemaphoreKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// The two roles sharing a bounded buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Producer,
    Consumer,
}

impl Role {
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Producer => "producer",
            Self::Consumer => "consumer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// P (acquire) or V (release)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Acquire,
    Release,
}

/// A single semaphore operation performed by a role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SemaphoreOp {
    pub role: Role,
    pub semaphore: SemaphoreKind,
    pub action: Action,
}

impl SemaphoreOp {
    pub const fn new(role: Role, semaphore: SemaphoreKind, action: Action) -> Self {
        Self {
            role,
            semaphore,
            action,
        }
    }
}

impl fmt::Display for SemaphoreOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self.action {
            Action::Acquire => 'P',
            Action::Release => 'V',
        };
        write!(f, "{} {}({})", self.role, letter, self.semaphore)
    }
}

/// Semaphore counts and buffer contents right after one operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SyncSnapshot<T> {
    /// Position in the buffer's operation order, starting at 1
    pub seq: u64,
    /// Operation that produced this snapshot (`None` after a reset)
    pub op: Option<SemaphoreOp>,
    pub empty: usize,
    pub full: usize,
    pub mutex: usize,
    pub buffer: Vec<Option<T>>,
}

impl<T> SyncSnapshot<T> {
    #[inline]
    pub fn counts(&self) -> SemaphoreCounts {
        SemaphoreCounts {
            empty: self.empty,
            full: self.full,
            mutex: self.mutex,
        }
    }

    /// Slots holding an item
    pub fn occupied(&self) -> usize {
        self.buffer.iter().filter(|slot| slot.is_some()).count()
    }
}

/// An item entering or leaving a slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ItemEvent<T> {
    pub role: Role,
    pub slot: usize,
    pub item: T,
}

/// Role lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RolePhase {
    Started,
    Stopped,
}

/// A role starting or stopping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RoleEvent {
    pub session: Uuid,
    pub role: Role,
    pub phase: RolePhase,
    /// Items completed by the role so far
    pub items: u64,
}

/// Everything a bounded buffer publishes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent<T> {
    Snapshot(SyncSnapshot<T>),
    Item(ItemEvent<T>),
    Role(RoleEvent),
}

/// Per-role run settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoleConfig {
    /// Stop on its own after this many items (`None` runs until stopped)
    pub max_items: Option<u64>,
    /// Pause after each completed item
    pub cycle_delay: Duration,
}

impl RoleConfig {
    /// Run until stopped
    pub const fn unbounded() -> Self {
        Self {
            max_items: None,
            cycle_delay: Duration::ZERO,
        }
    }

    /// Stop after `n` items
    pub const fn items(n: u64) -> Self {
        Self {
            max_items: Some(n),
            cycle_delay: Duration::ZERO,
        }
    }

    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.cycle_delay = delay;
        self
    }

    /// Whether another item may start after `done` items
    #[inline]
    pub fn allows(&self, done: u64) -> bool {
        self.max_items.map_or(true, |max| done < max)
    }
}

/// What a role did before it stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RoleReport {
    pub role: Role,
    pub items: u64,
    /// Stopped by request rather than by reaching its item limit
    pub stopped: bool,
}

/// Final state of a joined session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SessionReport {
    pub session: Uuid,
    pub producer: RoleReport,
    pub consumer: RoleReport,
    pub counts: SemaphoreCounts,
    /// Items left in the buffer
    pub occupied: usize,
}

/// Default item label: `Item-1`, `Item-2`, ...
pub fn item_label(n: u64) -> String {
    format!("Item-{}", n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_op_display() {
        let op = SemaphoreOp::new(Role::Producer, SemaphoreKind::Empty, Action::Acquire);
        assert_eq!(op.to_string(), "producer P(empty)");
        let op = SemaphoreOp::new(Role::Consumer, SemaphoreKind::Mutex, Action::Release);
        assert_eq!(op.to_string(), "consumer V(mutex)");
    }

    #[test]
    fn test_role_config_allows() {
        assert!(RoleConfig::unbounded().allows(u64::MAX - 1));
        assert!(RoleConfig::items(2).allows(1));
        assert!(!RoleConfig::items(2).allows(2));
    }

    #[test]
    fn test_snapshot_occupied() {
        let snap = SyncSnapshot {
            seq: 1,
            op: None,
            empty: 1,
            full: 2,
            mutex: 1,
            buffer: vec![Some("a"), None, Some("b")],
        };
        assert_eq!(snap.occupied(), 2);
        assert_eq!(snap.counts().full, 2);
    }

    #[test]
    fn test_item_label() {
        assert_eq!(item_label(3), "Item-3");
    }
}
