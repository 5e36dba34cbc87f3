//! Mode state machine
//!
//! Decides what the pads currently mean. The machine is re-evaluated once per
//! tick from a snapshot of the inputs that drive it; only explicit actions
//! (the add-module toggle) are stored between ticks, plus the mixer grace
//! deadline.

use std::fmt;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::graph::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Normal,
    AddModule,
    Mixer,
    SnapshotView,
    /// The focused module owns the pads
    GridDelegated(NodeId),
}

impl Mode {
    pub fn delegate(self) -> Option<NodeId> {
        match self {
            Mode::GridDelegated(node) => Some(node),
            _ => None,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Normal => write!(f, "normal"),
            Mode::AddModule => write!(f, "add module"),
            Mode::Mixer => write!(f, "mixer"),
            Mode::SnapshotView => write!(f, "snapshot view"),
            Mode::GridDelegated(node) => write!(f, "grid delegated to node {}", node.index),
        }
    }
}

/// Inputs sampled at the start of a tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModeInputs {
    pub track_held: bool,
    pub page_encoder_touched: bool,
    pub snapshot_held: bool,
    /// A module is focused or a track is selected
    pub has_focus: bool,
    /// Focused module that is alive, can take the grid and has not released it
    pub delegate: Option<NodeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeTransition {
    pub from: Mode,
    pub to: Mode,
}

pub struct ModeMachine {
    mode: Mode,
    add_module: bool,
    mixer_until: Option<Instant>,
    grace: Duration,
}

impl ModeMachine {
    pub fn new(grace: Duration) -> Self {
        Self {
            mode: Mode::Normal,
            add_module: false,
            mixer_until: None,
            grace,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn set_grace(&mut self, grace: Duration) {
        self.grace = grace;
    }

    /// Flip the add-module latch; returns whether it is now on
    pub fn toggle_add_module(&mut self) -> bool {
        self.add_module = !self.add_module;
        self.add_module
    }

    pub fn exit_add_module(&mut self) {
        self.add_module = false;
    }

    /// Re-evaluate; returns the transition when the mode changed
    ///
    /// Precedence, highest first: the add-module latch, the mixer chord (or
    /// its grace period), snapshot view, delegation, normal. A lost delegate
    /// lands in Normal while a track is selected, and in SnapshotView when
    /// nothing is focused or selected.
    pub fn evaluate(&mut self, inputs: &ModeInputs, now: Instant) -> Option<ModeTransition> {
        let chord = inputs.track_held && inputs.page_encoder_touched;
        if chord {
            self.mixer_until = Some(now + self.grace);
        }
        let mixer = chord || self.mixer_until.is_some_and(|until| now < until);
        if !mixer {
            self.mixer_until = None;
        }

        let next = if self.add_module {
            Mode::AddModule
        } else if mixer {
            Mode::Mixer
        } else if inputs.snapshot_held || (!inputs.has_focus && inputs.delegate.is_none()) {
            Mode::SnapshotView
        } else if let Some(node) = inputs.delegate {
            Mode::GridDelegated(node)
        } else {
            Mode::Normal
        };

        if next == self.mode {
            return None;
        }
        debug!("Mode: {} -> {}", self.mode, next);
        let transition = ModeTransition {
            from: self.mode,
            to: next,
        };
        self.mode = next;
        Some(transition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const GRACE: Duration = Duration::from_millis(300);

    fn node(index: u32) -> NodeId {
        NodeId {
            index,
            generation: 0,
        }
    }

    fn focused() -> ModeInputs {
        ModeInputs {
            has_focus: true,
            ..ModeInputs::default()
        }
    }

    #[test]
    fn test_add_module_is_a_toggle() {
        let now = Instant::now();
        let mut modes = ModeMachine::new(GRACE);
        modes.evaluate(&focused(), now);
        assert_eq!(modes.mode(), Mode::Normal);

        assert!(modes.toggle_add_module());
        let t = modes.evaluate(&focused(), now).unwrap();
        assert_eq!((t.from, t.to), (Mode::Normal, Mode::AddModule));

        assert!(!modes.toggle_add_module());
        modes.evaluate(&focused(), now);
        assert_eq!(modes.mode(), Mode::Normal);
    }

    #[test]
    fn test_mixer_needs_both_inputs() {
        let now = Instant::now();
        let mut modes = ModeMachine::new(GRACE);

        let track_only = ModeInputs {
            track_held: true,
            ..focused()
        };
        modes.evaluate(&track_only, now);
        assert_eq!(modes.mode(), Mode::Normal);

        let chord = ModeInputs {
            page_encoder_touched: true,
            ..track_only
        };
        modes.evaluate(&chord, now);
        assert_eq!(modes.mode(), Mode::Mixer);
    }

    #[test]
    fn test_mixer_grace_period() {
        let start = Instant::now();
        let mut modes = ModeMachine::new(GRACE);
        let chord = ModeInputs {
            track_held: true,
            page_encoder_touched: true,
            ..focused()
        };
        modes.evaluate(&chord, start);

        // Released, but still inside the grace period
        assert_eq!(modes.evaluate(&focused(), start + Duration::from_millis(100)), None);
        assert_eq!(modes.mode(), Mode::Mixer);

        // A quick re-touch restarts the grace period
        modes.evaluate(&chord, start + Duration::from_millis(200));
        modes.evaluate(&focused(), start + Duration::from_millis(450));
        assert_eq!(modes.mode(), Mode::Mixer);

        modes.evaluate(&focused(), start + Duration::from_millis(600));
        assert_eq!(modes.mode(), Mode::Normal);
    }

    #[test]
    fn test_snapshot_view_when_nothing_is_focused() {
        let now = Instant::now();
        let mut modes = ModeMachine::new(GRACE);
        modes.evaluate(&ModeInputs::default(), now);
        assert_eq!(modes.mode(), Mode::SnapshotView);

        let held = ModeInputs {
            snapshot_held: true,
            ..focused()
        };
        modes.evaluate(&focused(), now);
        assert_eq!(modes.mode(), Mode::Normal);
        modes.evaluate(&held, now);
        assert_eq!(modes.mode(), Mode::SnapshotView);
    }

    #[test]
    fn test_lost_delegate_without_selection_shows_snapshots() {
        let now = Instant::now();
        let mut modes = ModeMachine::new(GRACE);
        let delegated = ModeInputs {
            delegate: Some(node(3)),
            ..focused()
        };
        modes.evaluate(&delegated, now);

        let t = modes.evaluate(&ModeInputs::default(), now).unwrap();
        assert_eq!(t.from, Mode::GridDelegated(node(3)));
        assert_eq!(t.to, Mode::SnapshotView);
    }

    #[test]
    fn test_delegation_follows_focus() {
        let now = Instant::now();
        let mut modes = ModeMachine::new(GRACE);
        let delegated = ModeInputs {
            delegate: Some(node(3)),
            ..focused()
        };
        let t = modes.evaluate(&delegated, now).unwrap();
        assert_eq!(t.to, Mode::GridDelegated(node(3)));
        assert_eq!(modes.mode().delegate(), Some(node(3)));

        // Released or destroyed: back to normal
        modes.evaluate(&focused(), now);
        assert_eq!(modes.mode(), Mode::Normal);

        // The snapshot button still wins over delegation
        let held = ModeInputs {
            snapshot_held: true,
            ..delegated
        };
        modes.evaluate(&held, now);
        assert_eq!(modes.mode(), Mode::SnapshotView);
    }

    fn inputs() -> impl Strategy<Value = ModeInputs> {
        (any::<bool>(), any::<bool>(), any::<bool>(), any::<bool>(), proptest::option::of(0u32..4))
            .prop_map(|(track_held, page_encoder_touched, snapshot_held, has_focus, delegate)| {
                ModeInputs {
                    track_held,
                    page_encoder_touched,
                    snapshot_held,
                    has_focus,
                    delegate: delegate.map(node),
                }
            })
    }

    proptest! {
        #[test]
        fn prop_transitions_chain_and_stay_exclusive(
            steps in proptest::collection::vec((inputs(), 0u64..200, any::<bool>()), 1..50)
        ) {
            let mut modes = ModeMachine::new(GRACE);
            let mut now = Instant::now();
            let mut current = modes.mode();
            for (input, advance, toggle) in steps {
                now += Duration::from_millis(advance);
                if toggle {
                    modes.toggle_add_module();
                }
                match modes.evaluate(&input, now) {
                    Some(t) => {
                        prop_assert_eq!(t.from, current);
                        prop_assert_ne!(t.from, t.to);
                        current = t.to;
                    }
                    None => prop_assert_eq!(modes.mode(), current),
                }
                prop_assert_eq!(modes.mode(), current);
                if input.track_held && input.page_encoder_touched && modes.mode() != Mode::AddModule {
                    prop_assert_eq!(modes.mode(), Mode::Mixer);
                }
            }
        }
    }
}
