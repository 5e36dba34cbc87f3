//! Surface engine - binds one control surface to the module graph
//!
//! The engine owns everything that describes the surface: button states, the
//! LED cache, the encoder binding, the mode machine, focus history and the
//! display compositor. The graph and the transport are borrowed for the
//! duration of each [`SurfaceEngine::poll`] call.
//!
//! One tick:
//! - drain the input queue and route every event (delegate first)
//! - drop references to destroyed modules
//! - re-evaluate the mode; a transition repaints the pad region
//! - rebind the encoders, rebuild the grid placement
//! - paint and flush the LEDs, then render and send a display frame

mod input;
mod leds;
mod view;


use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::binder::{BinderSettings, ParameterBinder};
use crate::config::EngineConfig;
use crate::display::Compositor;
use crate::events::{self, ButtonTable, EventQueue, EventSender, SurfaceEvent};
use crate::graph::{Graph, NodeCapabilities, NodeId, ParamId, TrackId};
use crate::grid::{GridPlacement, GridResolver};
use crate::history::{FocusTarget, Navigator};
use crate::leds::LedCache;
use crate::mode::{Mode, ModeInputs, ModeMachine};
use crate::surface::SurfaceProfile;
use crate::transport::Transport;

/// Engine tuning
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    pub binder: BinderSettings,
    pub mixer_grace: Duration,
    /// Default duration of override messages
    pub message_duration: Duration,
    pub event_queue: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for EngineSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            binder: config.binder_settings(),
            mixer_grace: config.mixer_grace(),
            message_duration: config.message_duration(),
            event_queue: config.event_queue,
        }
    }
}

/// Whether the engine is driving the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineStatus {
    Enabled,
    /// Human-readable reason, reported once
    Disabled(String),
}

pub struct SurfaceEngine {
    pub(crate) profile: Box<dyn SurfaceProfile>,
    pub(crate) settings: EngineSettings,
    pub(crate) events: EventQueue,
    pub(crate) buttons: ButtonTable,
    pub(crate) leds: LedCache,
    pub(crate) resolver: GridResolver,
    pub(crate) placement: GridPlacement,
    pub(crate) binder: ParameterBinder,
    pub(crate) modes: ModeMachine,
    pub(crate) navigator: Navigator,
    pub(crate) compositor: Compositor,
    /// Track chosen with the track row
    pub(crate) selected_track: Option<TrackId>,
    /// Capabilities of the focused module, queried on focus change
    pub(crate) focus_caps: Option<(NodeId, NodeCapabilities)>,
    pub(crate) status: EngineStatus,
    pub(crate) retry_requested: bool,
}

impl SurfaceEngine {
    /// Create an engine and the sender its transport feeds input into
    pub fn new(profile: Box<dyn SurfaceProfile>, settings: EngineSettings) -> (Self, EventSender) {
        let (sender, events) = events::channel(settings.event_queue);
        let (width, height) = profile.display_size();
        let columns = profile.encoder_count();

        let engine = Self {
            leds: LedCache::new(profile.led_channels()),
            resolver: GridResolver::new(profile.grid_columns(), profile.grid_rows()),
            placement: GridPlacement::empty(profile.grid_columns(), profile.grid_rows()),
            binder: ParameterBinder::new(columns, settings.binder),
            modes: ModeMachine::new(settings.mixer_grace),
            navigator: Navigator::new(),
            compositor: Compositor::new(width, height, columns, profile.frame_format()),
            buttons: ButtonTable::new(),
            events,
            selected_track: None,
            focus_caps: None,
            status: EngineStatus::Enabled,
            retry_requested: false,
            settings,
            profile,
        };
        info!(
            "Surface engine ready for {} ({}x{} pads)",
            engine.profile.name(),
            engine.profile.grid_columns(),
            engine.profile.grid_rows()
        );
        (engine, sender)
    }

    pub fn profile(&self) -> &dyn SurfaceProfile {
        self.profile.as_ref()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Re-apply tuning after a configuration reload
    pub fn apply_settings(&mut self, settings: EngineSettings) {
        if settings.event_queue != self.settings.event_queue {
            warn!("event_queue changes take effect after a restart");
        }
        self.binder.set_settings(settings.binder);
        self.modes.set_grace(settings.mixer_grace);
        self.settings = settings;
        debug!("Engine settings applied");
    }

    pub fn status(&self) -> &EngineStatus {
        &self.status
    }

    pub fn is_enabled(&self) -> bool {
        self.status == EngineStatus::Enabled
    }

    /// Stop driving the device; the reason is logged once
    pub fn disable(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        if let EngineStatus::Disabled(current) = &self.status {
            if *current == reason {
                return;
            }
        }
        error!("Surface disabled: {}", reason);
        self.status = EngineStatus::Disabled(reason);
        self.retry_requested = false;
    }

    /// Mark a fresh connection; every LED is resent on the next tick
    ///
    /// Also called when the engine is already enabled, since a new port
    /// shows whatever the last session left lit.
    pub fn enable(&mut self) {
        self.leds.invalidate_all();
        if self.is_enabled() {
            debug!("Surface reconnected");
            return;
        }
        info!("Surface enabled");
        self.status = EngineStatus::Enabled;
        self.buttons.release_all(Instant::now());
        self.binder.release_touches();
    }

    /// Ask the owner to reinitialize the transport
    pub fn request_retry(&mut self) {
        self.retry_requested = true;
    }

    /// True once per request while disabled
    pub fn take_retry_request(&mut self) -> bool {
        std::mem::take(&mut self.retry_requested)
    }

    pub fn mode(&self) -> Mode {
        self.modes.mode()
    }

    pub fn placement(&self) -> &GridPlacement {
        &self.placement
    }

    /// Parameters on the encoders, current page only
    pub fn bound_parameters(&self) -> &[ParamId] {
        self.binder.bound()
    }

    pub fn page(&self) -> usize {
        self.binder.page()
    }

    pub fn leds(&self) -> &LedCache {
        &self.leds
    }

    pub fn focus_target(&self) -> Option<&FocusTarget> {
        self.navigator.current()
    }

    pub fn selected_track(&self) -> Option<TrackId> {
        self.selected_track
    }

    /// Focus a module; `None` clears the focus
    pub fn focus(&mut self, target: Option<FocusTarget>, add_to_history: bool) {
        self.navigator.focus(target, add_to_history);
    }

    pub fn back(&mut self, graph: &dyn Graph) -> bool {
        self.navigator.back(|n| graph.is_alive(n)).is_some()
    }

    pub fn forward(&mut self, graph: &dyn Graph) -> bool {
        self.navigator.forward(|n| graph.is_alive(n)).is_some()
    }

    /// Show a one-shot message instead of the normal screen
    pub fn display_screen_message(&mut self, text: &str, duration: Option<Duration>, now: Instant) {
        let duration = duration.unwrap_or(self.settings.message_duration);
        self.compositor.show_message(text, duration, now);
    }

    /// Run one tick
    pub fn poll(&mut self, graph: &mut dyn Graph, transport: &mut dyn Transport, now: Instant) {
        let events = self.events.drain();

        if !self.is_enabled() {
            if events.iter().any(is_press) {
                debug!("Input while disabled, requesting transport retry");
                self.retry_requested = true;
            }
            return;
        }

        self.drop_stale_references(graph);
        for event in events {
            self.handle_event(graph, event, now);
        }
        self.drop_stale_references(graph);

        self.update_mode(graph, now);
        self.update_binding(graph);

        let nodes: Vec<_> = graph
            .visible_nodes()
            .into_iter()
            .map(|n| (n.id, n.position))
            .collect();
        self.placement = self.resolver.resolve(&nodes, graph.viewport());

        self.paint_leds(graph, now);
        if let Err(e) = self.leds.flush(transport) {
            self.disable(format!("LED update failed: {}", e));
            return;
        }

        let model = self.display_model(graph, now);
        let frame = self.compositor.render(&model, now);
        if let Err(e) = transport.send_frame(frame) {
            self.disable(format!("Display update failed: {}", e));
        }
    }

    /// Clear focus, selection and cached capabilities that no longer resolve
    fn drop_stale_references(&mut self, graph: &dyn Graph) {
        self.navigator.clear_if_dead(|n| graph.is_alive(n));
        if let Some(track) = self.selected_track {
            if !graph.tracks().iter().any(|t| t.id == track) {
                debug!("Selected track {:?} is gone", track);
                self.selected_track = None;
            }
        }
        let focused = self.navigator.focused_node();
        if self.focus_caps.map(|(node, _)| node) != focused {
            self.focus_caps = focused.map(|node| (node, graph.capabilities(node)));
        }
    }

    fn update_mode(&mut self, graph: &mut dyn Graph, now: Instant) {
        let buttons = self.profile.buttons();
        let delegate = match self.focus_caps {
            Some((node, caps)) if caps.grid_delegate && graph.is_alive(node) => graph
                .grid_delegate(node)
                .filter(|d| !d.releases_control())
                .map(|_| node),
            _ => None,
        };

        let inputs = ModeInputs {
            track_held: self.buttons.first_held(self.profile.track_buttons()).is_some(),
            page_encoder_touched: self.buttons.is_held(self.profile.page_encoder_touch()),
            snapshot_held: self.buttons.is_held(buttons.snapshot_view),
            has_focus: self.navigator.current().is_some() || self.selected_track.is_some(),
            delegate,
        };

        let Some(transition) = self.modes.evaluate(&inputs, now) else {
            return;
        };
        self.leds.invalidate(self.profile.pad_addresses());
        if let Some(node) = transition.to.delegate() {
            if let Some(delegate) = graph.grid_delegate(node) {
                delegate.on_grid_connect();
            }
        }
    }
}

fn is_press(event: &SurfaceEvent) -> bool {
    match *event {
        SurfaceEvent::Note { velocity, .. } => velocity > 0,
        SurfaceEvent::Control { value, .. } => value > 0,
        _ => false,
    }
}
