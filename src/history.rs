//! Focus history and bookmarks
//!
//! Back/forward navigation over previously focused modules plus a fixed row
//! of bookmark slots. Entries are plain handles: a destroyed module is skipped
//! when navigating and a bookmark pointing at one reads as empty the next time
//! it is looked at.

use tracing::debug;

use crate::graph::NodeId;

pub const BOOKMARK_SLOTS: usize = 8;

/// Oldest entries are dropped past this length
const MAX_HISTORY: usize = 64;

/// What the surface is showing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusTarget {
    pub node: NodeId,
    /// Shown next to the module name, e.g. the owning track
    pub context: Option<String>,
}

impl FocusTarget {
    pub fn new(node: NodeId) -> Self {
        Self { node, context: None }
    }

    pub fn with_context(node: NodeId, context: impl Into<String>) -> Self {
        Self {
            node,
            context: Some(context.into()),
        }
    }
}

#[derive(Debug, Default)]
pub struct Navigator {
    current: Option<FocusTarget>,
    history: Vec<FocusTarget>,
    cursor: usize,
    bookmarks: [Option<FocusTarget>; BOOKMARK_SLOTS],
}

impl Navigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&FocusTarget> {
        self.current.as_ref()
    }

    pub fn focused_node(&self) -> Option<NodeId> {
        self.current.as_ref().map(|t| t.node)
    }

    /// Set the focus; returns true when the focused module changed
    ///
    /// With `add_to_history`, anything forward of the cursor is discarded and
    /// the target is appended.
    pub fn focus(&mut self, target: Option<FocusTarget>, add_to_history: bool) -> bool {
        let changed = self.focused_node() != target.as_ref().map(|t| t.node);
        if let (Some(target), true) = (&target, add_to_history) {
            let duplicate = self.history.get(self.cursor).is_some_and(|t| t.node == target.node);
            if !duplicate {
                if !self.history.is_empty() {
                    self.history.truncate(self.cursor + 1);
                }
                self.history.push(target.clone());
                if self.history.len() > MAX_HISTORY {
                    self.history.remove(0);
                }
                self.cursor = self.history.len() - 1;
            }
        }
        if changed {
            debug!("Focus: {:?}", target.as_ref().map(|t| t.node));
        }
        self.current = target;
        changed
    }

    pub fn can_go_back(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_go_forward(&self) -> bool {
        self.cursor + 1 < self.history.len()
    }

    /// Step back to the nearest live entry
    pub fn back(&mut self, is_alive: impl Fn(NodeId) -> bool) -> Option<&FocusTarget> {
        let index = (0..self.cursor).rev().find(|&i| is_alive(self.history[i].node))?;
        self.jump(index)
    }

    /// Step forward to the nearest live entry
    pub fn forward(&mut self, is_alive: impl Fn(NodeId) -> bool) -> Option<&FocusTarget> {
        let index = (self.cursor + 1..self.history.len()).find(|&i| is_alive(self.history[i].node))?;
        self.jump(index)
    }

    fn jump(&mut self, index: usize) -> Option<&FocusTarget> {
        self.cursor = index;
        let target = self.history[index].clone();
        debug!("History: entry {} of {}", index + 1, self.history.len());
        self.current = Some(target);
        self.current.as_ref()
    }

    /// Drop the focus if its module is gone; returns true if it was cleared
    pub fn clear_if_dead(&mut self, is_alive: impl Fn(NodeId) -> bool) -> bool {
        match &self.current {
            Some(target) if !is_alive(target.node) => {
                debug!("Focused node {:?} was destroyed", target.node);
                self.current = None;
                true
            }
            _ => false,
        }
    }

    /// Save the current focus into `slot`
    pub fn store_bookmark(&mut self, slot: usize) -> bool {
        let Some(entry) = self.bookmarks.get_mut(slot) else {
            return false;
        };
        match &self.current {
            Some(target) => {
                *entry = Some(target.clone());
                true
            }
            None => false,
        }
    }

    pub fn clear_bookmark(&mut self, slot: usize) {
        if let Some(entry) = self.bookmarks.get_mut(slot) {
            *entry = None;
        }
    }

    /// Read a slot, emptying it if its module is gone
    pub fn bookmark(&mut self, slot: usize, is_alive: impl Fn(NodeId) -> bool) -> Option<FocusTarget> {
        let entry = self.bookmarks.get_mut(slot)?;
        if entry.as_ref().is_some_and(|t| !is_alive(t.node)) {
            *entry = None;
        }
        entry.clone()
    }

    /// Occupancy without a liveness check
    pub fn has_bookmark(&self, slot: usize) -> bool {
        self.bookmarks.get(slot).is_some_and(|b| b.is_some())
    }
}
