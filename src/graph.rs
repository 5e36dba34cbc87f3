//! Graph query interface
//!
//! The engine never owns modules or parameters. It holds [`NodeId`] and
//! [`ParamId`] handles and asks the graph about them every time it needs to
//! dereference one; a handle whose node was destroyed simply stops resolving.

pub mod memory;

use crate::grid::Bounds;
use crate::leds::LedCache;
use crate::surface::{Category, Color, ControlAddress, SurfaceProfile};

/// Generational handle to a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub index: u32,
    pub generation: u32,
}

/// Handle to one parameter of a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParamId {
    pub node: NodeId,
    pub slot: u32,
}

/// Handle to a track (a container grouping modules)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackId(pub u32);

/// 2D canvas position
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VisibleNode {
    pub id: NodeId,
    pub position: Position,
    pub category: Category,
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Continuous control; `steps` is set for discrete-valued sliders
    Slider { steps: Option<u32> },
    /// Fires once per press
    Button,
    /// Anything the surface cannot edit (text fields, dropdown menus)
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamInfo {
    pub name: String,
    pub kind: ParamKind,
    /// Formatted current value
    pub display: String,
    /// The module's on/off switch
    pub is_enable_toggle: bool,
}

impl ParamInfo {
    /// Sliders and buttons are shown on the surface, the enable switch is not
    pub fn is_displayable(&self) -> bool {
        !self.is_enable_toggle && matches!(self.kind, ParamKind::Slider { .. } | ParamKind::Button)
    }
}

/// What a module can do, queried once when it gains focus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeCapabilities {
    pub grid_delegate: bool,
    pub track: Option<TrackId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackInfo {
    pub id: TrackId,
    pub name: String,
    pub color: Color,
    /// Module shown when the track is selected
    pub focus_node: Option<NodeId>,
    pub gain: Option<ParamId>,
    pub send: Option<ParamId>,
    pub snapshots: SnapshotSlots,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SnapshotSlots {
    pub current: Option<usize>,
    /// One flag per slot
    pub stored: Vec<bool>,
}

/// Entry in the module spawn list
#[derive(Debug, Clone, PartialEq)]
pub struct Spawnable {
    pub name: String,
    pub category: Category,
}

/// Parameter edits that depend on the parameter's own scale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nudge {
    StepDown,
    StepUp,
    Double,
    Halve,
    Reset,
}

/// Control types forwarded to a grid delegate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridControlKind {
    /// Index is the grid cell, `column + row * columns`
    Pad,
    /// Index is the raw note number
    Note,
    /// Index is the raw controller number
    ControlChange,
    /// Index is [`PITCH_BEND_INDEX`]
    PitchBend,
    /// Index is [`CHANNEL_PRESSURE_INDEX`] plus the channel
    ChannelPressure,
}

pub const PITCH_BEND_INDEX: usize = 256;
pub const CHANNEL_PRESSURE_INDEX: usize = PITCH_BEND_INDEX + 1;

/// LED access handed to a grid delegate while it owns the pads
pub struct GridLeds<'a> {
    leds: &'a mut LedCache,
    profile: &'a dyn SurfaceProfile,
}

impl<'a> GridLeds<'a> {
    pub fn new(leds: &'a mut LedCache, profile: &'a dyn SurfaceProfile) -> Self {
        Self { leds, profile }
    }

    pub fn columns(&self) -> usize {
        self.profile.grid_columns()
    }

    pub fn rows(&self) -> usize {
        self.profile.grid_rows()
    }

    /// Row 0 is the top row
    pub fn set_pad(&mut self, column: usize, row: usize, color: Color, flash: Option<Color>) {
        if column >= self.columns() || row >= self.rows() {
            return;
        }
        let address = self.profile.pad_address(column, row);
        self.leds.set_led(address, color, flash);
    }

    pub fn set_led(&mut self, address: ControlAddress, color: Color, flash: Option<Color>) {
        self.leds.set_led(address, color, flash);
    }

    pub fn profile(&self) -> &dyn SurfaceProfile {
        self.profile
    }
}

/// A module that takes over the pad grid while focused
pub trait GridDelegate {
    /// Called once each time the module gains the grid
    fn on_grid_connect(&mut self);

    /// `value` is normalized to 0..=1; return true when consumed
    fn on_grid_control(&mut self, kind: GridControlKind, index: usize, value: f32) -> bool;

    /// Paint the pads; called every tick while delegated
    fn update_grid_leds(&mut self, leds: &mut GridLeds<'_>);

    /// True when the module wants to hand the grid back
    fn releases_control(&self) -> bool {
        false
    }
}

/// Everything the engine reads from or edits in the module graph
pub trait Graph {
    /// Modules currently on screen, in a stable order
    fn visible_nodes(&self) -> Vec<VisibleNode>;

    /// Visible canvas area, merged into the placement bounding box
    fn viewport(&self) -> Option<Bounds> {
        None
    }

    fn is_alive(&self, node: NodeId) -> bool;
    fn node_name(&self, node: NodeId) -> Option<String>;
    fn node_position(&self, node: NodeId) -> Option<Position>;
    fn capabilities(&self, node: NodeId) -> NodeCapabilities;

    /// Controls the module exposes, in display order
    fn parameters(&self, node: NodeId) -> Vec<ParamId>;

    /// Explicit encoder mapping set up by the user, if any
    fn override_parameters(&self, _node: NodeId) -> Option<Vec<ParamId>> {
        None
    }

    fn param_info(&self, param: ParamId) -> Option<ParamInfo>;
    /// Normalized 0..=1
    fn param_value(&self, param: ParamId) -> Option<f32>;
    fn set_param_value(&mut self, param: ParamId, value: f32);
    fn trigger_param(&mut self, param: ParamId);
    fn nudge_param(&mut self, param: ParamId, nudge: Nudge);

    fn tracks(&self) -> Vec<TrackInfo>;
    /// Returns the snapshot label
    fn recall_snapshot(&mut self, track: TrackId, slot: usize) -> Option<String>;
    fn store_snapshot(&mut self, track: TrackId, slot: usize);
    fn snapshot_label(&self, track: TrackId, slot: usize) -> Option<String>;

    fn spawnables(&self) -> Vec<Spawnable>;
    fn spawn(&mut self, entry: usize, near: Option<Position>) -> Option<NodeId>;

    fn grid_delegate(&mut self, node: NodeId) -> Option<&mut dyn GridDelegate>;
}
