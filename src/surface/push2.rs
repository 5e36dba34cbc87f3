//! Ableton Push 2 layout
//!
//! 8x8 pads starting at note 36 (bottom-left), eight touch encoders above the
//! display, a 960x160 color display.

use super::{ButtonLayout, Category, Color, ControlAddress, Palette, SurfaceProfile};
use crate::display::encode::FrameFormat;

const PAD_BASE: u8 = 36;
const GRID_SIZE: usize = 8;
const ENCODER_TURN_BASE: u8 = 71;
const MASTER_ENCODER: u8 = 79;
const MASTER_ENCODER_TOUCH: u8 = 8;
const BELOW_SCREEN_ROW: u8 = 20;
const QUANTIZE_ROW: u8 = 36;

pub const DISPLAY_WIDTH: u32 = 960;
pub const DISPLAY_HEIGHT: u32 = 160;

const TRACK_BUTTONS: [ControlAddress; 8] = row_of_ccs(BELOW_SCREEN_ROW);
const BOOKMARK_BUTTONS: [ControlAddress; 8] = row_of_ccs(QUANTIZE_ROW);

const fn row_of_ccs(base: u8) -> [ControlAddress; 8] {
    let mut row = [ControlAddress::cc(0); 8];
    let mut i = 0;
    while i < 8 {
        row[i] = ControlAddress::cc(base + i as u8);
        i += 1;
    }
    row
}

const BUTTONS: ButtonLayout = ButtonLayout {
    shift: ControlAddress::cc(49),
    add_module: ControlAddress::cc(52),
    snapshot_view: ControlAddress::cc(51),
    bookmark_store: ControlAddress::cc(28),
    delete: ControlAddress::cc(118),
    back: ControlAddress::cc(44),
    forward: ControlAddress::cc(45),
    step_down: ControlAddress::cc(62),
    step_up: ControlAddress::cc(63),
    double: ControlAddress::cc(55),
    halve: ControlAddress::cc(54),
    reset: ControlAddress::cc(119),
};

const PALETTE: Palette = Palette {
    off: 0,
    white: 122,
    light_grey: 123,
    dark_grey: 124,
    button_on: 127,
};

/// Push 2 surface profile
#[derive(Debug, Default, Clone)]
pub struct Push2Profile;

impl Push2Profile {
    pub fn new() -> Self {
        Self
    }
}

impl SurfaceProfile for Push2Profile {
    fn name(&self) -> &'static str {
        "push 2"
    }

    fn grid_columns(&self) -> usize {
        GRID_SIZE
    }

    fn grid_rows(&self) -> usize {
        GRID_SIZE
    }

    fn pad_address(&self, column: usize, row: usize) -> ControlAddress {
        let flipped = GRID_SIZE - 1 - row.min(GRID_SIZE - 1);
        ControlAddress::note(PAD_BASE + (column + flipped * GRID_SIZE) as u8)
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
        ControlAddress::cc(MASTER_ENCODER)
    }

    fn page_encoder_touch(&self) -> ControlAddress {
        ControlAddress::note(MASTER_ENCODER_TOUCH)
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
        if !enabled {
            return PALETTE.dark_grey;
        }
        match category {
            Category::Instrument => 115,
            Category::Note => 8,
            Category::Synth => 11,
            Category::Audio => 20,
            Category::Modulator => 22,
            Category::Pulse => 9,
            Category::Other => 123,
        }
    }

    fn display_size(&self) -> (u32, u32) {
        (DISPLAY_WIDTH, DISPLAY_HEIGHT)
    }

    fn frame_format(&self) -> FrameFormat {
        FrameFormat::Bgr565
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bottom_left_pad_is_note_36() {
        let profile = Push2Profile::new();
        assert_eq!(profile.pad_address(0, 7), ControlAddress::note(36));
        assert_eq!(profile.pad_address(7, 0), ControlAddress::note(99));
    }

    #[test]
    fn test_encoder_lookup() {
        let profile = Push2Profile::new();
        assert_eq!(profile.encoder_turn_column(ControlAddress::cc(74)), Some(3));
        assert_eq!(profile.encoder_touch_column(ControlAddress::note(7)), Some(7));
        assert_eq!(profile.encoder_turn_column(ControlAddress::cc(79)), None);
    }
}
