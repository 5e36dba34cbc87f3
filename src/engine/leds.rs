//! LED painting per mode
//!
//! Every tick stages the full desired state; the cache works out what
//! actually needs to go over the wire.

use std::collections::HashMap;
use std::time::Instant;

use crate::graph::{Graph, GridLeds, TrackInfo};
use crate::mode::Mode;

impl super::SurfaceEngine {
    pub(crate) fn paint_leds(&mut self, graph: &mut dyn Graph, now: Instant) {
        let palette = *self.profile.palette();
        for address in self.profile.pad_addresses() {
            self.leds.set_led(address, palette.off, None);
        }

        let tracks = graph.tracks();
        match self.modes.mode() {
            Mode::Normal => self.paint_placement(graph),
            Mode::AddModule => self.paint_spawnables(graph),
            Mode::Mixer => self.paint_meters(graph, &tracks),
            Mode::SnapshotView => self.paint_snapshots(&tracks),
            Mode::GridDelegated(node) => {
                if let Some(delegate) = graph.grid_delegate(node) {
                    let mut leds = GridLeds::new(&mut self.leds, self.profile.as_ref());
                    delegate.update_grid_leds(&mut leds);
                }
            }
        }

        self.paint_buttons(graph, &tracks, now);
    }

    /// Modules in category colors, the focused one flashing white
    fn paint_placement(&mut self, graph: &dyn Graph) {
        let palette = *self.profile.palette();
        let focused = self.navigator.focused_node();
        let looks: HashMap<_, _> = graph
            .visible_nodes()
            .into_iter()
            .map(|n| (n.id, (n.category, n.enabled)))
            .collect();

        for (column, row, node) in self.placement.placed() {
            let Some(&(category, enabled)) = looks.get(&node) else {
                continue;
            };
            let color = self.profile.category_color(category, enabled);
            let flash = (focused == Some(node)).then_some(palette.white);
            let address = self.profile.pad_address(column, row);
            self.leds.set_led(address, color, flash);
        }
    }

    fn paint_spawnables(&mut self, graph: &dyn Graph) {
        let columns = self.profile.grid_columns();
        let cells = columns * self.profile.grid_rows();
        for (entry, spawnable) in graph.spawnables().into_iter().enumerate().take(cells) {
            let color = self.profile.category_color(spawnable.category, true);
            let address = self.profile.pad_address(entry % columns, entry / columns);
            self.leds.set_led(address, color, None);
        }
    }

    /// Column per track, gain as a bar growing from the bottom row
    fn paint_meters(&mut self, graph: &dyn Graph, tracks: &[TrackInfo]) {
        let rows = self.profile.grid_rows();
        for (column, track) in tracks.iter().enumerate().take(self.profile.grid_columns()) {
            let level = track
                .gain
                .and_then(|g| graph.param_value(g))
                .unwrap_or(0.0);
            let lit = (level.clamp(0.0, 1.0) * rows as f32).round() as usize;
            for row in (rows - lit)..rows {
                let address = self.profile.pad_address(column, row);
                self.leds.set_led(address, track.color, None);
            }
        }
    }

    /// Row per track, column per snapshot slot
    fn paint_snapshots(&mut self, tracks: &[TrackInfo]) {
        let palette = *self.profile.palette();
        let columns = self.profile.grid_columns();
        for (row, track) in tracks.iter().enumerate().take(self.profile.grid_rows()) {
            for (slot, &stored) in track.snapshots.stored.iter().enumerate().take(columns) {
                let address = self.profile.pad_address(slot, row);
                if track.snapshots.current == Some(slot) {
                    self.leds.set_led(address, palette.white, Some(palette.dark_grey));
                } else if stored {
                    self.leds.set_led(address, track.color, None);
                }
            }
        }
    }

    fn paint_buttons(&mut self, graph: &dyn Graph, tracks: &[TrackInfo], now: Instant) {
        let palette = *self.profile.palette();
        let buttons = *self.profile.buttons();
        let mode = self.modes.mode();
        let lit = |on: bool| if on { palette.button_on } else { palette.off };

        let track_buttons = self.profile.track_buttons().to_vec();
        for (index, address) in track_buttons.into_iter().enumerate() {
            match tracks.get(index) {
                Some(track) => {
                    let flash = (self.selected_track == Some(track.id)).then_some(palette.white);
                    self.leds.set_led(address, track.color, flash);
                }
                None => self.leds.set_led(address, palette.off, None),
            }
        }

        let bookmark_buttons = self.profile.bookmark_buttons().to_vec();
        for (slot, address) in bookmark_buttons.into_iter().enumerate() {
            let occupied = self.navigator.bookmark(slot, |n| graph.is_alive(n)).is_some();
            self.leds.set_led(address, lit(occupied), None);
        }

        // Nudges blink while they would act on a displayed parameter
        let knob_active = self.binder.display_param(now).is_some();
        for address in buttons.nudge_buttons() {
            let flash = knob_active.then_some(palette.off);
            self.leds.set_led(address, lit(knob_active), flash);
        }

        self.leds.set_led(buttons.shift, lit(self.buttons.is_held(buttons.shift)), None);
        self.leds.set_led(buttons.add_module, lit(mode == Mode::AddModule), None);
        self.leds.set_led(buttons.snapshot_view, lit(mode == Mode::SnapshotView), None);
        self.leds.set_led(buttons.back, lit(self.navigator.can_go_back()), None);
        self.leds.set_led(buttons.forward, lit(self.navigator.can_go_forward()), None);
    }
}
