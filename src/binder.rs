//! Parameter binding
//!
//! Keeps the ordered list of parameters behind the encoder columns and turns
//! relative encoder deltas into edits. The list is only replaced when its
//! source or length changes, so a module that keeps exposing the same controls
//! does not lose its page position every tick.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::graph::{Graph, NodeId, Nudge, ParamId, ParamKind};

/// Where the bound list comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindSource {
    Node { node: NodeId, overridden: bool },
    TrackGains,
    TrackSends,
}

/// Tuning for encoder handling
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinderSettings {
    /// Normalized change per encoder detent
    pub step: f32,
    /// Step multiplier while fine mode is held
    pub fine_scale: f32,
    /// Minimum interval between two triggers of the same button parameter
    pub retrigger: Duration,
    /// How long an adjustment outranks a touch for display
    pub adjust_priority: Duration,
    /// Page offset change per page encoder detent
    pub page_step: f32,
    /// Encoder input is ignored this long after a reset
    pub reset_hold_off: Duration,
}

impl Default for BinderSettings {
    fn default() -> Self {
        Self {
            step: 0.005,
            fine_scale: 0.5,
            retrigger: Duration::from_millis(400),
            adjust_priority: Duration::from_millis(200),
            page_step: 0.07,
            reset_hold_off: Duration::from_millis(1000),
        }
    }
}

/// Decode a two's complement relative encoder value
///
/// Values below 64 turn clockwise, values from 64 up are negative.
pub fn decode_delta(value: u8) -> i32 {
    let value = (value & 0x7F) as i32;
    if value < 64 {
        value
    } else {
        value - 128
    }
}

/// Displayable parameters of a node, preferring the user's override list
pub fn node_parameters(graph: &dyn Graph, node: NodeId) -> (Vec<ParamId>, bool) {
    match graph.override_parameters(node) {
        Some(list) => (list, true),
        None => {
            let list = graph
                .parameters(node)
                .into_iter()
                .filter(|&p| graph.param_info(p).is_some_and(|info| info.is_displayable()))
                .collect();
            (list, false)
        }
    }
}

/// The encoder-column binding for one engine
pub struct ParameterBinder {
    columns: usize,
    settings: BinderSettings,
    source: Option<BindSource>,
    params: Vec<ParamId>,
    page_offset: f32,
    held: Vec<bool>,
    last_touched: Option<usize>,
    last_adjusted: Option<(usize, Instant)>,
    last_trigger: HashMap<ParamId, Instant>,
    reset_at: Option<Instant>,
}

impl ParameterBinder {
    pub fn new(columns: usize, settings: BinderSettings) -> Self {
        Self {
            columns: columns.max(1),
            settings,
            source: None,
            params: Vec::new(),
            page_offset: 0.0,
            held: vec![false; columns.max(1)],
            last_touched: None,
            last_adjusted: None,
            last_trigger: HashMap::new(),
            reset_at: None,
        }
    }

    pub fn set_settings(&mut self, settings: BinderSettings) {
        self.settings = settings;
    }

    pub fn settings(&self) -> &BinderSettings {
        &self.settings
    }

    /// Offer the current parameter list; returns true if the binding changed
    ///
    /// The list is compared by source identity and length only.
    pub fn rebind(&mut self, source: Option<BindSource>, params: Vec<ParamId>) -> bool {
        if source == self.source && params.len() == self.params.len() {
            return false;
        }
        if source != self.source {
            debug!("Rebinding encoders to {:?} ({} parameters)", source, params.len());
            self.page_offset = 0.0;
            self.last_adjusted = None;
        }
        self.last_trigger.retain(|param, _| params.contains(param));
        self.source = source;
        self.params = params;
        self.clamp_page();
        true
    }

    pub fn clear(&mut self) -> bool {
        self.rebind(None, Vec::new())
    }

    pub fn source(&self) -> Option<BindSource> {
        self.source
    }

    pub fn all(&self) -> &[ParamId] {
        &self.params
    }

    pub fn page(&self) -> usize {
        self.page_offset.max(0.0) as usize
    }

    pub fn page_count(&self) -> usize {
        if self.params.is_empty() {
            0
        } else {
            (self.params.len() - 1) / self.columns + 1
        }
    }

    fn max_page(&self) -> usize {
        self.page_count().saturating_sub(1)
    }

    fn clamp_page(&mut self) {
        self.page_offset = self.page_offset.clamp(0.0, self.max_page() as f32);
    }

    /// Parameters visible on the current page
    pub fn bound(&self) -> &[ParamId] {
        let start = (self.page() * self.columns).min(self.params.len());
        let end = (start + self.columns).min(self.params.len());
        &self.params[start..end]
    }

    pub fn bound_at(&self, column: usize) -> Option<ParamId> {
        self.bound().get(column).copied()
    }

    /// Move the page window by a raw page-encoder value
    pub fn adjust_page(&mut self, raw: u8) -> usize {
        self.page_offset += decode_delta(raw) as f32 * self.settings.page_step;
        self.clamp_page();
        self.page()
    }

    pub fn set_page(&mut self, page: usize) {
        self.page_offset = page as f32;
        self.clamp_page();
    }

    /// Record an encoder touch or release
    pub fn touch(&mut self, column: usize, held: bool) {
        let Some(slot) = self.held.get_mut(column) else {
            return;
        };
        *slot = held;
        if held {
            self.last_touched = Some(column);
        }
    }

    pub fn is_touched(&self, column: usize) -> bool {
        self.held.get(column).copied().unwrap_or(false)
    }

    pub fn release_touches(&mut self) {
        self.held.iter_mut().for_each(|h| *h = false);
    }

    /// Column whose parameter the display should feature
    ///
    /// A fresh adjustment wins, then the most recently touched encoder if it
    /// is still held, then any held encoder.
    pub fn display_column(&self, now: Instant) -> Option<usize> {
        if let Some((column, at)) = self.last_adjusted {
            if now.saturating_duration_since(at) < self.settings.adjust_priority
                && column < self.bound().len()
            {
                return Some(column);
            }
        }
        if let Some(column) = self.last_touched {
            if self.is_touched(column) {
                return Some(column);
            }
        }
        self.held.iter().position(|&h| h)
    }

    pub fn display_param(&self, now: Instant) -> Option<ParamId> {
        self.display_column(now).and_then(|c| self.bound_at(c))
    }

    fn in_hold_off(&self, now: Instant) -> bool {
        self.reset_at
            .is_some_and(|at| now.saturating_duration_since(at) < self.settings.reset_hold_off)
    }

    /// Apply a raw encoder value to the parameter bound at `column`
    pub fn apply_encoder(
        &mut self,
        graph: &mut dyn Graph,
        column: usize,
        raw: u8,
        fine: bool,
        now: Instant,
    ) -> Option<ParamId> {
        if self.in_hold_off(now) {
            trace!("Encoder {} ignored during reset hold-off", column);
            return None;
        }
        let param = self.bound_at(column)?;
        self.apply_delta(graph, param, raw, fine, now);
        self.last_adjusted = Some((column, now));
        Some(param)
    }

    /// Apply a raw encoder value to any parameter
    pub fn apply_delta(
        &mut self,
        graph: &mut dyn Graph,
        param: ParamId,
        raw: u8,
        fine: bool,
        now: Instant,
    ) {
        let delta = decode_delta(raw);
        let Some(info) = graph.param_info(param) else {
            return;
        };
        match info.kind {
            ParamKind::Button => {
                if delta <= 0 {
                    return;
                }
                let ready = self
                    .last_trigger
                    .get(&param)
                    .map_or(true, |&at| now.saturating_duration_since(at) >= self.settings.retrigger);
                if ready {
                    self.last_trigger.insert(param, now);
                    graph.trigger_param(param);
                }
            }
            ParamKind::Slider { .. } => {
                let Some(current) = graph.param_value(param) else {
                    return;
                };
                let mut step = self.settings.step;
                if fine {
                    step *= self.settings.fine_scale;
                }
                let value = (current + delta as f32 * step).clamp(0.0, 1.0);
                graph.set_param_value(param, value);
            }
            ParamKind::Other => {}
        }
    }

    /// Nudge the displayed parameter; returns the edited parameter
    pub fn nudge(&mut self, graph: &mut dyn Graph, nudge: Nudge, now: Instant) -> Option<ParamId> {
        let param = self.display_param(now)?;
        graph.nudge_param(param, nudge);
        if nudge == Nudge::Reset {
            self.reset_at = Some(now);
        }
        Some(param)
    }
}
