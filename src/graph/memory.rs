//! In-memory module graph
//!
//! A small self-contained [`Graph`] used by the demo binary and by the tests.
//! Nodes live in a generational arena so that a removed node's handles stop
//! resolving even if its slot is reused.

use std::collections::HashMap;
use tracing::debug;

use super::{
    Graph, GridControlKind, GridDelegate, GridLeds, NodeCapabilities, NodeId, Nudge, ParamId,
    ParamInfo, ParamKind, Position, SnapshotSlots, Spawnable, TrackId, TrackInfo, VisibleNode,
};
use crate::config::{DemoConfig, DemoParamKind};
use crate::grid::Bounds;
use crate::surface::{Category, Color};

/// Snapshot slots per track
pub const SNAPSHOT_SLOTS: usize = 8;

const FINE_STEP: f32 = 0.01;

/// Description of one parameter when building a node
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub value: f32,
    pub is_enable_toggle: bool,
}

impl ParamSpec {
    pub fn slider(name: &str, value: f32) -> Self {
        Self {
            name: name.to_string(),
            kind: ParamKind::Slider { steps: None },
            value,
            is_enable_toggle: false,
        }
    }

    pub fn stepped(name: &str, value: f32, steps: u32) -> Self {
        Self {
            kind: ParamKind::Slider { steps: Some(steps) },
            ..Self::slider(name, value)
        }
    }

    pub fn button(name: &str) -> Self {
        Self {
            kind: ParamKind::Button,
            ..Self::slider(name, 0.0)
        }
    }

    pub fn text(name: &str) -> Self {
        Self {
            kind: ParamKind::Other,
            ..Self::slider(name, 0.0)
        }
    }

    pub fn enable_toggle() -> Self {
        Self {
            is_enable_toggle: true,
            kind: ParamKind::Slider { steps: Some(2) },
            ..Self::slider("enabled", 1.0)
        }
    }
}

#[derive(Debug, Clone)]
struct MemoryParam {
    spec: ParamSpec,
    value: f32,
    triggers: u32,
}

impl MemoryParam {
    fn display(&self) -> String {
        match self.spec.kind {
            ParamKind::Slider { steps: Some(steps) } if steps > 1 => {
                format!("{}", (self.value * (steps - 1) as f32).round() as u32)
            }
            ParamKind::Slider { .. } => format!("{:.2}", self.value),
            ParamKind::Button => "trigger".to_string(),
            ParamKind::Other => String::new(),
        }
    }

    fn step(&self) -> f32 {
        match self.spec.kind {
            ParamKind::Slider { steps: Some(steps) } if steps > 1 => 1.0 / (steps - 1) as f32,
            _ => FINE_STEP,
        }
    }
}

#[derive(Debug, Clone)]
struct MemoryNode {
    name: String,
    category: Category,
    position: Position,
    enabled: bool,
    visible: bool,
    params: Vec<MemoryParam>,
    overrides: Option<Vec<ParamId>>,
}

#[derive(Debug, Clone, Default)]
struct Slot {
    generation: u32,
    node: Option<MemoryNode>,
}

#[derive(Debug, Clone)]
struct Snapshot {
    label: String,
    values: Vec<(ParamId, f32)>,
}

#[derive(Debug, Clone)]
struct MemoryTrack {
    name: String,
    color: Color,
    strip: NodeId,
    members: Vec<NodeId>,
    snapshots: Vec<Option<Snapshot>>,
    current: Option<usize>,
}

/// Grid delegate that toggles pads on and off
#[derive(Debug, Clone)]
pub struct ToggleGrid {
    pub color: Color,
    pub cells: Vec<bool>,
    pub connects: usize,
    /// Set to hand the grid back to the engine
    pub release: bool,
    pub last_control: Option<(GridControlKind, usize, f32)>,
}

impl ToggleGrid {
    pub fn new(color: Color) -> Self {
        Self {
            color,
            cells: Vec::new(),
            connects: 0,
            release: false,
            last_control: None,
        }
    }
}

impl GridDelegate for ToggleGrid {
    fn on_grid_connect(&mut self) {
        self.connects += 1;
    }

    fn on_grid_control(&mut self, kind: GridControlKind, index: usize, value: f32) -> bool {
        self.last_control = Some((kind, index, value));
        if kind != GridControlKind::Pad {
            return false;
        }
        if value > 0.0 {
            if self.cells.len() <= index {
                self.cells.resize(index + 1, false);
            }
            self.cells[index] = !self.cells[index];
        }
        true
    }

    fn update_grid_leds(&mut self, leds: &mut GridLeds<'_>) {
        let columns = leds.columns();
        let off = leds.profile().palette().off;
        for row in 0..leds.rows() {
            for column in 0..columns {
                let on = self.cells.get(column + row * columns).copied().unwrap_or(false);
                leds.set_pad(column, row, if on { self.color } else { off }, None);
            }
        }
    }

    fn releases_control(&self) -> bool {
        self.release
    }
}

/// Graph stored entirely in memory
#[derive(Debug, Default)]
pub struct MemoryGraph {
    slots: Vec<Slot>,
    free: Vec<u32>,
    tracks: Vec<MemoryTrack>,
    spawnables: Vec<Spawnable>,
    delegates: HashMap<NodeId, ToggleGrid>,
    viewport: Option<Bounds>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from the `demo` section of the configuration
    pub fn from_demo(demo: &DemoConfig) -> Self {
        let mut graph = Self::new();
        graph.viewport = demo
            .viewport
            .map(|[min_x, min_y, max_x, max_y]| Bounds::new(min_x, min_y, max_x, max_y));

        let mut tracks = HashMap::new();
        for track in &demo.tracks {
            let id = graph.add_track(&track.name, track.color);
            tracks.insert(track.name.clone(), id);
        }

        for module in &demo.modules {
            let params = module
                .params
                .iter()
                .map(|p| match p.kind {
                    DemoParamKind::Slider => match p.steps {
                        Some(steps) => ParamSpec::stepped(&p.name, p.value, steps),
                        None => ParamSpec::slider(&p.name, p.value),
                    },
                    DemoParamKind::Button => ParamSpec::button(&p.name),
                })
                .collect();
            let node = graph.add_node(&module.name, module.category, module.x, module.y, params);
            if module.grid {
                graph.set_delegate(node, ToggleGrid::new(module.grid_color));
            }
            if let Some(track) = module.track.as_ref().and_then(|t| tracks.get(t)) {
                graph.add_to_track(*track, node);
            }
        }

        for entry in &demo.spawnables {
            graph.add_spawnable(&entry.name, entry.category);
        }
        debug!(
            "Demo graph: {} modules, {} tracks",
            graph.node_count(),
            graph.tracks.len()
        );
        graph
    }

    pub fn add_node(
        &mut self,
        name: &str,
        category: Category,
        x: f32,
        y: f32,
        params: Vec<ParamSpec>,
    ) -> NodeId {
        let node = MemoryNode {
            name: name.to_string(),
            category,
            position: Position::new(x, y),
            enabled: true,
            visible: true,
            params: params
                .into_iter()
                .map(|spec| MemoryParam {
                    value: spec.value,
                    spec,
                    triggers: 0,
                })
                .collect(),
            overrides: None,
        };

        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(node);
                NodeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                NodeId {
                    index: (self.slots.len() - 1) as u32,
                    generation: 0,
                }
            }
        }
    }

    /// Destroy a node; its handles stop resolving
    pub fn remove_node(&mut self, id: NodeId) -> bool {
        if !self.is_alive(id) {
            return false;
        }
        let slot = &mut self.slots[id.index as usize];
        slot.node = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.delegates.remove(&id);
        for track in &mut self.tracks {
            track.members.retain(|&m| m != id);
        }
        true
    }

    pub fn node_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.node.as_ref().is_some_and(|n| n.visible))
            .count()
    }

    fn node(&self, id: NodeId) -> Option<&MemoryNode> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_ref()
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut MemoryNode> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_mut()
    }

    fn param(&self, id: ParamId) -> Option<&MemoryParam> {
        self.node(id.node)?.params.get(id.slot as usize)
    }

    fn param_mut(&mut self, id: ParamId) -> Option<&mut MemoryParam> {
        self.node_mut(id.node)?.params.get_mut(id.slot as usize)
    }

    pub fn set_position(&mut self, id: NodeId, x: f32, y: f32) {
        if let Some(node) = self.node_mut(id) {
            node.position = Position::new(x, y);
        }
    }

    pub fn set_enabled(&mut self, id: NodeId, enabled: bool) {
        if let Some(node) = self.node_mut(id) {
            node.enabled = enabled;
        }
    }

    pub fn set_overrides(&mut self, id: NodeId, params: Option<Vec<ParamId>>) {
        if let Some(node) = self.node_mut(id) {
            node.overrides = params;
        }
    }

    pub fn set_viewport(&mut self, viewport: Option<Bounds>) {
        self.viewport = viewport;
    }

    pub fn param_id(&self, node: NodeId, name: &str) -> Option<ParamId> {
        let slot = self
            .node(node)?
            .params
            .iter()
            .position(|p| p.spec.name == name)?;
        Some(ParamId {
            node,
            slot: slot as u32,
        })
    }

    pub fn trigger_count(&self, param: ParamId) -> u32 {
        self.param(param).map_or(0, |p| p.triggers)
    }

    pub fn set_delegate(&mut self, node: NodeId, delegate: ToggleGrid) {
        if self.is_alive(node) {
            self.delegates.insert(node, delegate);
        }
    }

    pub fn toggle_grid(&self, node: NodeId) -> Option<&ToggleGrid> {
        self.delegates.get(&node)
    }

    pub fn toggle_grid_mut(&mut self, node: NodeId) -> Option<&mut ToggleGrid> {
        self.delegates.get_mut(&node)
    }

    /// Add a track with its own hidden gain/send strip
    pub fn add_track(&mut self, name: &str, color: Color) -> TrackId {
        self.add_track_with_strip(
            name,
            color,
            vec![ParamSpec::slider("gain", 0.8), ParamSpec::slider("send", 0.0)],
        )
    }

    /// Add a track whose strip has only the given parameters
    ///
    /// Missing `gain` or `send` sliders leave the track out of that mixer page.
    pub fn add_track_with_strip(&mut self, name: &str, color: Color, strip: Vec<ParamSpec>) -> TrackId {
        let strip = self.add_node(&format!("{} strip", name), Category::Audio, 0.0, 0.0, strip);
        if let Some(node) = self.node_mut(strip) {
            node.visible = false;
        }
        self.tracks.push(MemoryTrack {
            name: name.to_string(),
            color,
            strip,
            members: Vec::new(),
            snapshots: vec![None; SNAPSHOT_SLOTS],
            current: None,
        });
        TrackId((self.tracks.len() - 1) as u32)
    }

    pub fn add_to_track(&mut self, track: TrackId, node: NodeId) {
        if let Some(t) = self.tracks.get_mut(track.0 as usize) {
            if !t.members.contains(&node) {
                t.members.push(node);
            }
        }
    }

    pub fn add_spawnable(&mut self, name: &str, category: Category) {
        self.spawnables.push(Spawnable {
            name: name.to_string(),
            category,
        });
    }

    fn track(&self, id: TrackId) -> Option<&MemoryTrack> {
        self.tracks.get(id.0 as usize)
    }
}

impl Graph for MemoryGraph {
    fn visible_nodes(&self) -> Vec<VisibleNode> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                let node = slot.node.as_ref().filter(|n| n.visible)?;
                Some(VisibleNode {
                    id: NodeId {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    position: node.position,
                    category: node.category,
                    enabled: node.enabled,
                })
            })
            .collect()
    }

    fn viewport(&self) -> Option<Bounds> {
        self.viewport
    }

    fn is_alive(&self, node: NodeId) -> bool {
        self.node(node).is_some()
    }

    fn node_name(&self, node: NodeId) -> Option<String> {
        self.node(node).map(|n| n.name.clone())
    }

    fn node_position(&self, node: NodeId) -> Option<Position> {
        self.node(node).map(|n| n.position)
    }

    fn capabilities(&self, node: NodeId) -> NodeCapabilities {
        let track = self
            .tracks
            .iter()
            .position(|t| t.members.contains(&node))
            .map(|i| TrackId(i as u32));
        NodeCapabilities {
            grid_delegate: self.delegates.contains_key(&node),
            track,
        }
    }

    fn parameters(&self, node: NodeId) -> Vec<ParamId> {
        self.node(node)
            .map(|n| {
                (0..n.params.len())
                    .map(|slot| ParamId {
                        node,
                        slot: slot as u32,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn override_parameters(&self, node: NodeId) -> Option<Vec<ParamId>> {
        self.node(node)?.overrides.clone()
    }

    fn param_info(&self, param: ParamId) -> Option<ParamInfo> {
        let p = self.param(param)?;
        Some(ParamInfo {
            name: p.spec.name.clone(),
            kind: p.spec.kind,
            display: p.display(),
            is_enable_toggle: p.spec.is_enable_toggle,
        })
    }

    fn param_value(&self, param: ParamId) -> Option<f32> {
        self.param(param).map(|p| p.value)
    }

    fn set_param_value(&mut self, param: ParamId, value: f32) {
        if let Some(p) = self.param_mut(param) {
            p.value = value.clamp(0.0, 1.0);
        }
    }

    fn trigger_param(&mut self, param: ParamId) {
        if let Some(p) = self.param_mut(param) {
            p.triggers += 1;
        }
    }

    fn nudge_param(&mut self, param: ParamId, nudge: Nudge) {
        let Some(p) = self.param_mut(param) else {
            return;
        };
        let value = match nudge {
            Nudge::StepDown => p.value - p.step(),
            Nudge::StepUp => p.value + p.step(),
            Nudge::Double => p.value * 2.0,
            Nudge::Halve => p.value * 0.5,
            Nudge::Reset => p.spec.value,
        };
        p.value = value.clamp(0.0, 1.0);
    }

    fn tracks(&self) -> Vec<TrackInfo> {
        self.tracks
            .iter()
            .enumerate()
            .map(|(i, t)| TrackInfo {
                id: TrackId(i as u32),
                name: t.name.clone(),
                color: t.color,
                focus_node: t.members.first().copied(),
                gain: self.param_id(t.strip, "gain"),
                send: self.param_id(t.strip, "send"),
                snapshots: SnapshotSlots {
                    current: t.current,
                    stored: t.snapshots.iter().map(|s| s.is_some()).collect(),
                },
            })
            .collect()
    }

    fn recall_snapshot(&mut self, track: TrackId, slot: usize) -> Option<String> {
        let t = self.tracks.get_mut(track.0 as usize)?;
        let snapshot = t.snapshots.get(slot)?.clone()?;
        t.current = Some(slot);
        for (param, value) in &snapshot.values {
            self.set_param_value(*param, *value);
        }
        Some(snapshot.label)
    }

    fn store_snapshot(&mut self, track: TrackId, slot: usize) {
        let Some(t) = self.track(track) else {
            return;
        };
        if slot >= t.snapshots.len() {
            return;
        }
        let members = t.members.clone();
        let values = members
            .iter()
            .flat_map(|&node| self.parameters(node))
            .filter_map(|p| self.param_value(p).map(|v| (p, v)))
            .collect();
        let label = format!("{} {}", t.name, slot + 1);
        if let Some(t) = self.tracks.get_mut(track.0 as usize) {
            t.snapshots[slot] = Some(Snapshot { label, values });
            t.current = Some(slot);
        }
    }

    fn snapshot_label(&self, track: TrackId, slot: usize) -> Option<String> {
        self.track(track)?
            .snapshots
            .get(slot)?
            .as_ref()
            .map(|s| s.label.clone())
    }

    fn spawnables(&self) -> Vec<Spawnable> {
        self.spawnables.clone()
    }

    fn spawn(&mut self, entry: usize, near: Option<Position>) -> Option<NodeId> {
        let spawnable = self.spawnables.get(entry)?.clone();
        let at = near.unwrap_or_default();
        let node = self.add_node(
            &spawnable.name,
            spawnable.category,
            at.x + 20.0,
            at.y + 20.0,
            vec![ParamSpec::slider("level", 0.5)],
        );
        debug!("Spawned '{}' as {:?}", spawnable.name, node);
        Some(node)
    }

    fn grid_delegate(&mut self, node: NodeId) -> Option<&mut dyn GridDelegate> {
        match self.delegates.get_mut(&node) {
            Some(delegate) => Some(delegate as &mut dyn GridDelegate),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removed_node_handles_stop_resolving() {
        let mut graph = MemoryGraph::new();
        let a = graph.add_node("a", Category::Synth, 0.0, 0.0, vec![ParamSpec::slider("x", 0.1)]);
        let param = graph.param_id(a, "x").unwrap();

        assert!(graph.remove_node(a));
        assert!(!graph.is_alive(a));
        assert_eq!(graph.param_value(param), None);

        // The slot is reused with a new generation
        let b = graph.add_node("b", Category::Synth, 0.0, 0.0, vec![]);
        assert_eq!(b.index, a.index);
        assert!(!graph.is_alive(a));
        assert!(graph.is_alive(b));
    }

    #[test]
    fn test_track_strips_are_hidden() {
        let mut graph = MemoryGraph::new();
        let track = graph.add_track("drums", 9);
        let kick = graph.add_node("kick", Category::Instrument, 10.0, 10.0, vec![]);
        graph.add_to_track(track, kick);

        assert_eq!(graph.visible_nodes().len(), 1);
        let tracks = graph.tracks();
        assert_eq!(tracks[0].focus_node, Some(kick));
        assert!(tracks[0].gain.is_some());
        assert_eq!(graph.capabilities(kick).track, Some(track));
    }

    #[test]
    fn test_snapshot_store_and_recall() {
        let mut graph = MemoryGraph::new();
        let track = graph.add_track("bass", 20);
        let osc = graph.add_node("osc", Category::Synth, 0.0, 0.0, vec![ParamSpec::slider("pw", 0.3)]);
        graph.add_to_track(track, osc);
        let pw = graph.param_id(osc, "pw").unwrap();

        graph.store_snapshot(track, 2);
        graph.set_param_value(pw, 0.9);
        assert_eq!(graph.recall_snapshot(track, 2).as_deref(), Some("bass 3"));
        assert_eq!(graph.param_value(pw), Some(0.3));
        assert_eq!(graph.recall_snapshot(track, 5), None);
        assert_eq!(graph.tracks()[0].snapshots.current, Some(2));
    }

    #[test]
    fn test_nudges() {
        let mut graph = MemoryGraph::new();
        let n = graph.add_node(
            "n",
            Category::Note,
            0.0,
            0.0,
            vec![ParamSpec::stepped("mode", 0.0, 5), ParamSpec::slider("amt", 0.4)],
        );
        let mode = graph.param_id(n, "mode").unwrap();
        let amt = graph.param_id(n, "amt").unwrap();

        graph.nudge_param(mode, Nudge::StepUp);
        assert_eq!(graph.param_value(mode), Some(0.25));
        assert_eq!(graph.param_info(mode).unwrap().display, "1");

        graph.nudge_param(amt, Nudge::Double);
        assert_eq!(graph.param_value(amt), Some(0.8));
        graph.nudge_param(amt, Nudge::Double);
        assert_eq!(graph.param_value(amt), Some(1.0));
        graph.nudge_param(amt, Nudge::Reset);
        assert_eq!(graph.param_value(amt), Some(0.4));
    }

    #[test]
    fn test_toggle_grid_consumes_pads_only() {
        let mut grid = ToggleGrid::new(5);
        assert!(grid.on_grid_control(GridControlKind::Pad, 3, 1.0));
        assert!(grid.cells[3]);
        assert!(grid.on_grid_control(GridControlKind::Pad, 3, 0.0));
        assert!(grid.cells[3]);
        assert!(!grid.on_grid_control(GridControlKind::ControlChange, 71, 0.1));
    }
}
