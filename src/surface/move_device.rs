//! Ableton Move layout
//!
//! 8x4 pads starting at note 68 (bottom-left), four track buttons on the
//! left edge, sixteen step buttons along the bottom and a 128x64 monochrome
//! display.

use super::{ButtonLayout, Category, Color, ControlAddress, Palette, SurfaceProfile};
use crate::display::encode::FrameFormat;

const PAD_BASE: u8 = 68;
const GRID_COLUMNS: usize = 8;
const GRID_ROWS: usize = 4;
const ENCODER_TURN_BASE: u8 = 71;
const VOLUME_ENCODER: u8 = 79;
const VOLUME_ENCODER_TOUCH: u8 = 8;
const STEP_BUTTON_BASE: u8 = 16;

pub const DISPLAY_WIDTH: u32 = 128;
pub const DISPLAY_HEIGHT: u32 = 64;

// Track buttons are numbered bottom-up on the device
const TRACK_BUTTONS: [ControlAddress; 4] = [
    ControlAddress::cc(43),
    ControlAddress::cc(42),
    ControlAddress::cc(41),
    ControlAddress::cc(40),
];

const BOOKMARK_BUTTONS: [ControlAddress; 8] = {
    let mut row = [ControlAddress::note(0); 8];
    let mut i = 0;
    while i < 8 {
        row[i] = ControlAddress::note(STEP_BUTTON_BASE + i as u8);
        i += 1;
    }
    row
};

const BUTTONS: ButtonLayout = ButtonLayout {
    shift: ControlAddress::cc(49),
    add_module: ControlAddress::note(29),
    snapshot_view: ControlAddress::cc(118),
    bookmark_store: ControlAddress::cc(52),
    delete: ControlAddress::cc(119),
    back: ControlAddress::cc(51),
    forward: ControlAddress::cc(50),
    step_down: ControlAddress::cc(62),
    step_up: ControlAddress::cc(63),
    double: ControlAddress::cc(55),
    halve: ControlAddress::cc(54),
    reset: ControlAddress::cc(56),
};

const PALETTE: Palette = Palette {
    off: 0,
    white: 120,
    light_grey: 121,
    dark_grey: 124,
    button_on: 127,
};

/// Move surface profile
#[derive(Debug, Default, Clone)]
pub struct MoveProfile;

impl MoveProfile {
    pub fn new() -> Self {
        Self
    }
}

impl SurfaceProfile for MoveProfile {
    fn name(&self) -> &'static str {
        "move"
    }

    fn grid_columns(&self) -> usize {
        GRID_COLUMNS
    }

    fn grid_rows(&self) -> usize {
        GRID_ROWS
    }

    fn pad_address(&self, column: usize, row: usize) -> ControlAddress {
        let flipped = GRID_ROWS - 1 - row.min(GRID_ROWS - 1);
        ControlAddress::note(PAD_BASE + (column + flipped * GRID_COLUMNS) as u8)
    }

    fn encoder_count(&self) -> usize {
        8
    }

    fn encoder_turn(&self, column: usize) -> ControlAddress {
        ControlAddress::cc(ENCODER_TURN_BASE + column as u8)
    }

    fn encoder_touch(&self, column: usize) -> ControlAddress {
        ControlAddress::note(column as u8)
    }

    fn page_encoder_turn(&self) -> ControlAddress {
        ControlAddress::cc(VOLUME_ENCODER)
    }

    fn page_encoder_touch(&self) -> ControlAddress {
        ControlAddress::note(VOLUME_ENCODER_TOUCH)
    }

    fn track_buttons(&self) -> &[ControlAddress] {
        &TRACK_BUTTONS
    }

    fn bookmark_buttons(&self) -> &[ControlAddress] {
        &BOOKMARK_BUTTONS
    }

    fn buttons(&self) -> &ButtonLayout {
        &BUTTONS
    }

    fn palette(&self) -> &Palette {
        &PALETTE
    }

    fn category_color(&self, category: Category, enabled: bool) -> Color {
        let (on, off) = match category {
            Category::Instrument => (26, 116),
            Category::Note => (8, 80),
            Category::Synth => (11, 86),
            Category::Audio => (18, 96),
            Category::Modulator => (22, 110),
            Category::Pulse => (9, 82),
            Category::Other => (118, 119),
        };
        if enabled {
            on
        } else {
            off
        }
    }

    fn display_size(&self) -> (u32, u32) {
        (DISPLAY_WIDTH, DISPLAY_HEIGHT)
    }

    fn frame_format(&self) -> FrameFormat {
        FrameFormat::Mono
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_rows_count_up_from_the_bottom() {
        let profile = MoveProfile::new();
        assert_eq!(profile.pad_address(0, 3), ControlAddress::note(68));
        assert_eq!(profile.pad_address(0, 0), ControlAddress::note(92));
        assert_eq!(profile.pad_address(7, 0), ControlAddress::note(99));
    }

    #[test]
    fn test_disabled_modules_use_dim_colors() {
        let profile = MoveProfile::new();
        assert_eq!(profile.category_color(Category::Synth, true), 11);
        assert_eq!(profile.category_color(Category::Synth, false), 86);
    }
}
