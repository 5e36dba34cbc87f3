//! Device input events
//!
//! The MIDI callback runs on the backend's own thread. It never touches engine
//! state: it pushes [`SurfaceEvent`]s into a bounded channel that the poll
//! tick drains in one go, so each tick works from a consistent snapshot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::warn;

use crate::midi::MidiMessage;
use crate::surface::{ControlAddress, ADDRESS_SPACE};

/// Raw input from the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// Velocity 0 is a release
    Note { index: u8, velocity: u8 },
    Control { index: u8, value: u8 },
    PitchBend { channel: u8, value: u16 },
    ChannelPressure { channel: u8, pressure: u8 },
}

impl SurfaceEvent {
    pub fn from_midi(message: &MidiMessage) -> Self {
        match *message {
            MidiMessage::NoteOn { note, velocity, .. } => SurfaceEvent::Note {
                index: note,
                velocity,
            },
            MidiMessage::NoteOff { note, .. } => SurfaceEvent::Note {
                index: note,
                velocity: 0,
            },
            MidiMessage::ControlChange { cc, value, .. } => SurfaceEvent::Control { index: cc, value },
            MidiMessage::PitchBend { channel, value } => SurfaceEvent::PitchBend { channel, value },
            MidiMessage::ChannelPressure { channel, pressure } => {
                SurfaceEvent::ChannelPressure { channel, pressure }
            }
        }
    }

    /// Control the event came from, for notes and CCs
    pub fn address(&self) -> Option<ControlAddress> {
        match *self {
            SurfaceEvent::Note { index, .. } => Some(ControlAddress::note(index)),
            SurfaceEvent::Control { index, .. } => Some(ControlAddress::cc(index)),
            _ => None,
        }
    }
}

/// Producer half, handed to the transport's input callback
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::Sender<SurfaceEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventSender {
    pub fn on_note(&self, index: u8, velocity: u8) {
        self.push(SurfaceEvent::Note { index, velocity });
    }

    pub fn on_control(&self, index: u8, value: u8) {
        self.push(SurfaceEvent::Control { index, value });
    }

    pub fn on_pitch_bend(&self, channel: u8, value: u16) {
        self.push(SurfaceEvent::PitchBend { channel, value });
    }

    pub fn on_channel_pressure(&self, channel: u8, pressure: u8) {
        self.push(SurfaceEvent::ChannelPressure { channel, pressure });
    }

    /// Never blocks; events are dropped when the queue is full
    pub fn push(&self, event: SurfaceEvent) {
        if self.tx.try_send(event).is_err() {
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            // Log the first drop and then every hundredth
            if dropped % 100 == 1 {
                warn!("Surface event queue full, {} events dropped so far", dropped);
            }
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Consumer half, owned by the engine
pub struct EventQueue {
    rx: mpsc::Receiver<SurfaceEvent>,
}

impl EventQueue {
    /// Take everything queued so far
    pub fn drain(&mut self) -> Vec<SurfaceEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

pub fn channel(capacity: usize) -> (EventSender, EventQueue) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        EventSender {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        },
        EventQueue { rx },
    )
}

/// Last known state of one button
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonState {
    pub pressed: bool,
    pub changed_at: Option<Instant>,
}

/// Pressed/held state for every logical control
pub struct ButtonTable {
    states: Vec<ButtonState>,
}

impl ButtonTable {
    pub fn new() -> Self {
        Self {
            states: vec![ButtonState::default(); ADDRESS_SPACE],
        }
    }

    /// Record a transition; returns true when the state actually changed
    ///
    /// Addresses outside their band are ignored.
    pub fn record(&mut self, address: ControlAddress, pressed: bool, now: Instant) -> bool {
        let Some(state) = address.slot().and_then(|slot| self.states.get_mut(slot)) else {
            return false;
        };
        if state.pressed == pressed {
            return false;
        }
        *state = ButtonState {
            pressed,
            changed_at: Some(now),
        };
        true
    }

    pub fn is_held(&self, address: ControlAddress) -> bool {
        self.get(address).pressed
    }

    pub fn get(&self, address: ControlAddress) -> ButtonState {
        address
            .slot()
            .and_then(|slot| self.states.get(slot))
            .copied()
            .unwrap_or_default()
    }

    /// Index of the first held button in `buttons`
    pub fn first_held(&self, buttons: &[ControlAddress]) -> Option<usize> {
        buttons.iter().position(|&b| self.is_held(b))
    }

    pub fn release_all(&mut self, now: Instant) {
        for slot in 0..ADDRESS_SPACE {
            if let Some(address) = ControlAddress::from_slot(slot) {
                self.record(address, false, now);
            }
        }
    }
}

impl Default for ButtonTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_returns_events_in_order() {
        let (tx, mut queue) = channel(8);
        tx.on_note(36, 100);
        tx.on_control(71, 1);
        tx.on_pitch_bend(0, 8192);

        let events = queue.drain();
        assert_eq!(
            events,
            vec![
                SurfaceEvent::Note { index: 36, velocity: 100 },
                SurfaceEvent::Control { index: 71, value: 1 },
                SurfaceEvent::PitchBend { channel: 0, value: 8192 },
            ]
        );
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn test_full_queue_drops_instead_of_blocking() {
        let (tx, mut queue) = channel(2);
        for i in 0..5 {
            tx.on_note(i, 1);
        }
        assert_eq!(tx.dropped(), 3);
        assert_eq!(queue.drain().len(), 2);
    }

    #[test]
    fn test_button_table_tracks_transitions() {
        let mut buttons = ButtonTable::new();
        let shift = ControlAddress::cc(49);
        let now = Instant::now();

        assert!(buttons.record(shift, true, now));
        assert!(!buttons.record(shift, true, now));
        assert!(buttons.is_held(shift));
        assert_eq!(buttons.get(shift).changed_at, Some(now));

        let row = [ControlAddress::cc(20), ControlAddress::cc(21)];
        buttons.record(row[1], true, now);
        assert_eq!(buttons.first_held(&row), Some(1));

        buttons.release_all(now);
        assert!(!buttons.is_held(shift));
        assert_eq!(buttons.first_held(&row), None);
    }

    #[test]
    fn test_out_of_band_address_is_ignored() {
        let mut buttons = ButtonTable::new();
        let now = Instant::now();

        assert!(!buttons.record(ControlAddress::note(177), true, now));
        assert!(!buttons.is_held(ControlAddress::note(177)));
        assert!(!buttons.is_held(ControlAddress::cc(49)));
    }

    #[test]
    fn test_note_off_maps_to_release() {
        let event = SurfaceEvent::from_midi(&MidiMessage::NoteOff {
            channel: 0,
            note: 3,
            velocity: 64,
        });
        assert_eq!(event, SurfaceEvent::Note { index: 3, velocity: 0 });
    }
}
