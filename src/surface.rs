//! Control surface description
//!
//! Addresses on the device form a flat space of 256 logical controls: notes
//! occupy the first 128 slots and control changes the next 128. Everything
//! device-specific (pad layout, button assignments, colors, display format)
//! lives behind the [`SurfaceProfile`] trait so the engine runs the same
//! control flow for every supported device.

pub mod move_device;
pub mod push2;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::display::encode::FrameFormat;
use crate::leds::LedChannels;

pub use move_device::MoveProfile;
pub use push2::Push2Profile;

/// Width of one address band (notes or control changes)
pub const BAND_WIDTH: usize = 128;

/// Total number of logical controls
pub const ADDRESS_SPACE: usize = BAND_WIDTH * 2;

/// Device palette index
pub type Color = u8;

/// Which MIDI message family a control uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKind {
    Note,
    ControlChange,
}

/// A single control on the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControlAddress {
    pub kind: ControlKind,
    pub index: u8,
}

impl ControlAddress {
    pub const fn note(index: u8) -> Self {
        Self {
            kind: ControlKind::Note,
            index,
        }
    }

    pub const fn cc(index: u8) -> Self {
        Self {
            kind: ControlKind::ControlChange,
            index,
        }
    }

    /// True when the index fits in its band
    pub fn is_valid(self) -> bool {
        (self.index as usize) < BAND_WIDTH
    }

    /// Position in the flat 256-slot address space, `None` outside its band
    pub fn slot(self) -> Option<usize> {
        if !self.is_valid() {
            return None;
        }
        Some(match self.kind {
            ControlKind::Note => self.index as usize,
            ControlKind::ControlChange => BAND_WIDTH + self.index as usize,
        })
    }

    pub fn from_slot(slot: usize) -> Option<Self> {
        match slot {
            s if s < BAND_WIDTH => Some(Self::note(s as u8)),
            s if s < ADDRESS_SPACE => Some(Self::cc((s - BAND_WIDTH) as u8)),
            _ => None,
        }
    }
}

impl fmt::Display for ControlAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ControlKind::Note => write!(f, "note {}", self.index),
            ControlKind::ControlChange => write!(f, "cc {}", self.index),
        }
    }
}

/// Module family, used to pick pad colors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Instrument,
    Note,
    Synth,
    Audio,
    Modulator,
    Pulse,
    #[default]
    Other,
}

/// Fixed palette entries the engine needs on every device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub off: Color,
    pub white: Color,
    pub light_grey: Color,
    pub dark_grey: Color,
    /// Full brightness for single-color button LEDs
    pub button_on: Color,
}

/// Buttons with a fixed meaning, independent of mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonLayout {
    pub shift: ControlAddress,
    pub add_module: ControlAddress,
    pub snapshot_view: ControlAddress,
    pub bookmark_store: ControlAddress,
    pub delete: ControlAddress,
    pub back: ControlAddress,
    pub forward: ControlAddress,
    pub step_down: ControlAddress,
    pub step_up: ControlAddress,
    pub double: ControlAddress,
    pub halve: ControlAddress,
    pub reset: ControlAddress,
}

impl ButtonLayout {
    /// Buttons that act on the displayed parameter
    pub fn nudge_buttons(&self) -> [ControlAddress; 5] {
        [
            self.step_down,
            self.step_up,
            self.double,
            self.halve,
            self.reset,
        ]
    }
}

/// Capabilities of one hardware device
///
/// Pad coordinates are `(column, row)` with row 0 at the top of the grid, the
/// same orientation as module positions on screen.
pub trait SurfaceProfile: Send + Sync {
    /// Human-readable device name, used in error messages
    fn name(&self) -> &'static str;

    fn grid_columns(&self) -> usize;
    fn grid_rows(&self) -> usize;

    /// Address of the pad at `(column, row)`
    fn pad_address(&self, column: usize, row: usize) -> ControlAddress;

    /// Number of parameter columns (one encoder per column)
    fn encoder_count(&self) -> usize;
    fn encoder_turn(&self, column: usize) -> ControlAddress;
    fn encoder_touch(&self, column: usize) -> ControlAddress;

    /// Wide-range encoder used for paging and track gain
    fn page_encoder_turn(&self) -> ControlAddress;
    fn page_encoder_touch(&self) -> ControlAddress;

    /// Track selection row, top to bottom or left to right
    fn track_buttons(&self) -> &[ControlAddress];

    /// One button per bookmark slot
    fn bookmark_buttons(&self) -> &[ControlAddress];

    fn buttons(&self) -> &ButtonLayout;
    fn palette(&self) -> &Palette;

    fn category_color(&self, category: Category, enabled: bool) -> Color;

    fn led_channels(&self) -> LedChannels {
        LedChannels::default()
    }

    fn display_size(&self) -> (u32, u32);
    fn frame_format(&self) -> FrameFormat;

    /// Reverse pad lookup
    fn pad_at(&self, address: ControlAddress) -> Option<(usize, usize)> {
        for row in 0..self.grid_rows() {
            for column in 0..self.grid_columns() {
                if self.pad_address(column, row) == address {
                    return Some((column, row));
                }
            }
        }
        None
    }

    fn encoder_turn_column(&self, address: ControlAddress) -> Option<usize> {
        (0..self.encoder_count()).find(|&c| self.encoder_turn(c) == address)
    }

    fn encoder_touch_column(&self, address: ControlAddress) -> Option<usize> {
        (0..self.encoder_count()).find(|&c| self.encoder_touch(c) == address)
    }

    /// All pad addresses, row-major from the top-left
    fn pad_addresses(&self) -> Vec<ControlAddress> {
        let mut pads = Vec::with_capacity(self.grid_columns() * self.grid_rows());
        for row in 0..self.grid_rows() {
            for column in 0..self.grid_columns() {
                pads.push(self.pad_address(column, row));
            }
        }
        pads
    }
}

/// Supported devices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProfileKind {
    #[default]
    Push2,
    Move,
}

impl ProfileKind {
    pub fn build(self) -> Box<dyn SurfaceProfile> {
        match self {
            ProfileKind::Push2 => Box::new(Push2Profile::new()),
            ProfileKind::Move => Box::new(MoveProfile::new()),
        }
    }
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileKind::Push2 => write!(f, "push2"),
            ProfileKind::Move => write!(f, "move"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_bands() {
        assert_eq!(ControlAddress::note(36).slot(), Some(36));
        assert_eq!(ControlAddress::cc(71).slot(), Some(128 + 71));
        // Would otherwise land on cc 49
        assert_eq!(ControlAddress::note(177).slot(), None);
        assert_eq!(ControlAddress::from_slot(200), Some(ControlAddress::cc(72)));
        assert_eq!(ControlAddress::from_slot(5), Some(ControlAddress::note(5)));
        assert_eq!(ControlAddress::from_slot(256), None);
    }

    #[test]
    fn test_validity() {
        assert!(ControlAddress::cc(127).is_valid());
        assert!(!ControlAddress::note(128).is_valid());
    }

    #[test]
    fn test_pad_lookup_round_trips_for_every_profile() {
        for kind in [ProfileKind::Push2, ProfileKind::Move] {
            let profile = kind.build();
            let pads = profile.pad_addresses();
            assert_eq!(pads.len(), profile.grid_columns() * profile.grid_rows());
            for row in 0..profile.grid_rows() {
                for column in 0..profile.grid_columns() {
                    let address = profile.pad_address(column, row);
                    assert_eq!(profile.pad_at(address), Some((column, row)));
                }
            }
        }
    }

    #[test]
    fn test_profiles_do_not_overlap_pads_and_buttons() {
        for kind in [ProfileKind::Push2, ProfileKind::Move] {
            let profile = kind.build();
            let pads = profile.pad_addresses();
            let b = profile.buttons();
            let mut fixed = b.nudge_buttons().to_vec();
            fixed.extend([
                b.shift,
                b.add_module,
                b.snapshot_view,
                b.bookmark_store,
                b.delete,
                b.back,
                b.forward,
            ]);
            fixed.extend_from_slice(profile.track_buttons());
            fixed.extend_from_slice(profile.bookmark_buttons());
            for address in fixed {
                assert!(!pads.contains(&address), "{} overlaps a pad on {}", address, kind);
            }
        }
    }
}
