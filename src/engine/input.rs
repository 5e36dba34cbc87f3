//! Input routing
//!
//! Events reach a grid delegate first when one owns the pads; whatever it
//! does not consume falls through to the engine's own handling for the
//! current mode.

use std::time::Instant;
use tracing::{debug, trace, warn};

use crate::binder::{BindSource, decode_delta};
use crate::events::SurfaceEvent;
use crate::graph::{
    Graph, GridControlKind, Nudge, CHANNEL_PRESSURE_INDEX, PITCH_BEND_INDEX,
};
use crate::history::FocusTarget;
use crate::mode::Mode;
use crate::surface::ControlAddress;

impl super::SurfaceEngine {
    pub(crate) fn handle_event(&mut self, graph: &mut dyn Graph, event: SurfaceEvent, now: Instant) {
        trace!("Surface event {:?}", event);
        if let Some(address) = event.address() {
            debug_assert!(address.is_valid(), "Input address out of range: {}", address);
            if !address.is_valid() {
                warn!("Ignoring input from out-of-range address {}", address);
                return;
            }
        }
        match event {
            SurfaceEvent::Note { index, velocity } => {
                let address = ControlAddress::note(index);
                let pressed = velocity > 0;
                let changed = self.buttons.record(address, pressed, now);

                let (kind, grid_index) = match self.profile.pad_at(address) {
                    Some((column, row)) => (GridControlKind::Pad, column + row * self.profile.grid_columns()),
                    None => (GridControlKind::Note, index as usize),
                };
                if self.delegate_control(graph, kind, grid_index, velocity as f32 / 127.0) {
                    return;
                }
                if changed {
                    self.handle_note(graph, address, pressed, now);
                }
            }
            SurfaceEvent::Control { index, value } => {
                let address = ControlAddress::cc(index);
                if self.delegate_control(graph, GridControlKind::ControlChange, index as usize, value as f32 / 127.0) {
                    return;
                }
                self.handle_control(graph, address, value, now);
            }
            SurfaceEvent::PitchBend { value, .. } => {
                self.delegate_control(graph, GridControlKind::PitchBend, PITCH_BEND_INDEX, value as f32 / 16383.0);
            }
            SurfaceEvent::ChannelPressure { channel, pressure } => {
                self.delegate_control(
                    graph,
                    GridControlKind::ChannelPressure,
                    CHANNEL_PRESSURE_INDEX + channel as usize,
                    pressure as f32 / 127.0,
                );
            }
        }
    }

    /// Offer a control to the module owning the grid
    fn delegate_control(
        &mut self,
        graph: &mut dyn Graph,
        kind: GridControlKind,
        index: usize,
        value: f32,
    ) -> bool {
        let Some(node) = self.modes.mode().delegate() else {
            return false;
        };
        if !graph.is_alive(node) {
            return false;
        }
        match graph.grid_delegate(node) {
            Some(delegate) => {
                let handled = delegate.on_grid_control(kind, index, value);
                if handled {
                    trace!("{:?} {} handled by delegate", kind, index);
                }
                handled
            }
            None => false,
        }
    }

    fn handle_note(&mut self, graph: &mut dyn Graph, address: ControlAddress, pressed: bool, now: Instant) {
        if let Some(column) = self.profile.encoder_touch_column(address) {
            self.binder.touch(column, pressed);
            return;
        }
        if address == self.profile.page_encoder_touch() {
            return;
        }
        if let Some((column, row)) = self.profile.pad_at(address) {
            if pressed {
                self.handle_pad(graph, column, row, now);
            }
            return;
        }
        if pressed {
            self.handle_button(graph, address, now);
        }
    }

    fn handle_control(&mut self, graph: &mut dyn Graph, address: ControlAddress, value: u8, now: Instant) {
        if let Some(column) = self.profile.encoder_turn_column(address) {
            let fine = self.buttons.is_held(self.profile.buttons().shift);
            self.binder.apply_encoder(graph, column, value, fine, now);
            return;
        }
        if address == self.profile.page_encoder_turn() {
            self.handle_page_encoder(graph, value, now);
            return;
        }

        let pressed = value > 0;
        if self.buttons.record(address, pressed, now) && pressed {
            self.handle_button(graph, address, now);
        }
    }

    fn handle_page_encoder(&mut self, graph: &mut dyn Graph, value: u8, now: Instant) {
        if self.modes.mode() == Mode::Mixer {
            let Some(held) = self.buttons.first_held(self.profile.track_buttons()) else {
                return;
            };
            let gain = graph.tracks().get(held).and_then(|t| t.gain);
            if let Some(gain) = gain {
                let fine = self.buttons.is_held(self.profile.buttons().shift);
                self.binder.apply_delta(graph, gain, value, fine, now);
            }
            return;
        }
        let before = self.binder.page();
        let page = self.binder.adjust_page(value);
        if page != before {
            debug!("Parameter page {} of {} (delta {})", page + 1, self.binder.page_count(), decode_delta(value));
        }
    }

    fn handle_button(&mut self, graph: &mut dyn Graph, address: ControlAddress, now: Instant) {
        let buttons = *self.profile.buttons();

        if address == buttons.add_module {
            let active = self.modes.toggle_add_module();
            debug!("Add module {}", if active { "armed" } else { "cancelled" });
            return;
        }
        if address == buttons.back {
            self.back(graph);
            return;
        }
        if address == buttons.forward {
            self.forward(graph);
            return;
        }

        let nudge = [
            (buttons.step_down, Nudge::StepDown),
            (buttons.step_up, Nudge::StepUp),
            (buttons.double, Nudge::Double),
            (buttons.halve, Nudge::Halve),
            (buttons.reset, Nudge::Reset),
        ]
        .into_iter()
        .find(|(b, _)| *b == address)
        .map(|(_, n)| n);
        if let Some(nudge) = nudge {
            if let Some(param) = self.binder.nudge(graph, nudge, now) {
                debug!("{:?} applied to {:?}", nudge, param);
            }
            return;
        }

        if let Some(index) = self.profile.track_buttons().iter().position(|&b| b == address) {
            self.select_track(graph, index);
            return;
        }

        if let Some(slot) = self.profile.bookmark_buttons().iter().position(|&b| b == address) {
            if self.buttons.is_held(buttons.bookmark_store) {
                if self.navigator.store_bookmark(slot) {
                    self.display_screen_message(&format!("Bookmark {} stored", slot + 1), None, now);
                }
            } else if self.buttons.is_held(buttons.delete) {
                self.navigator.clear_bookmark(slot);
                self.display_screen_message(&format!("Bookmark {} cleared", slot + 1), None, now);
            } else if let Some(target) = self.navigator.bookmark(slot, |n| graph.is_alive(n)) {
                self.navigator.focus(Some(target), true);
            }
        }
    }

    /// Select a track and focus its current module
    fn select_track(&mut self, graph: &dyn Graph, index: usize) {
        let Some(track) = graph.tracks().into_iter().nth(index) else {
            return;
        };
        debug!("Track '{}' selected", track.name);
        self.selected_track = Some(track.id);
        if let Some(node) = track.focus_node.filter(|&n| graph.is_alive(n)) {
            self.navigator.focus(Some(FocusTarget::with_context(node, track.name)), true);
        }
    }

    fn handle_pad(&mut self, graph: &mut dyn Graph, column: usize, row: usize, now: Instant) {
        match self.modes.mode() {
            Mode::Normal => {
                let Some(node) = self.placement.node_at(column, row) else {
                    return;
                };
                let context = graph
                    .capabilities(node)
                    .track
                    .and_then(|id| graph.tracks().into_iter().find(|t| t.id == id))
                    .map(|t| t.name);
                self.navigator.focus(Some(FocusTarget { node, context }), true);
            }
            Mode::AddModule => {
                let entry = column + row * self.profile.grid_columns();
                if entry >= graph.spawnables().len() {
                    return;
                }
                let near = self
                    .navigator
                    .focused_node()
                    .and_then(|n| graph.node_position(n));
                if let Some(node) = graph.spawn(entry, near) {
                    debug!("Spawned entry {} as {:?}", entry, node);
                    self.navigator.focus(Some(FocusTarget::new(node)), true);
                }
                self.modes.exit_add_module();
            }
            Mode::Mixer => {
                // Column is the track, row sets the gain from the top down
                let gain = graph.tracks().get(column).and_then(|t| t.gain);
                if let Some(gain) = gain {
                    let rows = self.profile.grid_rows();
                    let level = (rows - row) as f32 / rows as f32;
                    graph.set_param_value(gain, level);
                }
            }
            Mode::SnapshotView => self.handle_snapshot_pad(graph, column, row, now),
            Mode::GridDelegated(_) => {}
        }
    }

    fn handle_snapshot_pad(&mut self, graph: &mut dyn Graph, slot: usize, row: usize, now: Instant) {
        let Some(track) = graph.tracks().into_iter().nth(row) else {
            return;
        };
        let buttons = *self.profile.buttons();

        let label = if self.buttons.is_held(buttons.shift) {
            graph.snapshot_label(track.id, slot)
        } else if self.buttons.is_held(buttons.snapshot_view) {
            graph.store_snapshot(track.id, slot);
            graph
                .snapshot_label(track.id, slot)
                .map(|label| format!("Stored {}", label))
        } else {
            graph.recall_snapshot(track.id, slot)
        };
        if let Some(label) = label {
            self.display_screen_message(&label, None, now);
        }
    }

    /// Source for the encoder binding in mixer mode
    pub(crate) fn mixer_source(&self) -> BindSource {
        if self.buttons.is_held(self.profile.buttons().shift) {
            BindSource::TrackSends
        } else {
            BindSource::TrackGains
        }
    }
}
