//! LED state cache
//!
//! Colors are staged with [`LedCache::set_led`] during a tick and only
//! transmitted by [`LedCache::flush`], which sends the entries whose staged
//! value differs from what the device last received. A new cache knows
//! nothing about the device, so its first flush writes every slot.

use tracing::{trace, warn};

use crate::error::SurfaceResult;
use crate::surface::{Color, ControlAddress, ControlKind, ADDRESS_SPACE};
use crate::transport::Transport;

/// Desired color of one control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LedState {
    pub primary: Color,
    /// `None` means steady
    pub flash: Option<Color>,
}

impl LedState {
    pub fn steady(primary: Color) -> Self {
        Self {
            primary,
            flash: None,
        }
    }

    pub fn flashing(primary: Color, flash: Color) -> Self {
        Self {
            primary,
            flash: Some(flash),
        }
    }
}

/// MIDI channels (0-based) used for LED output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedChannels {
    /// Channel for steady colors and for the flash color
    pub steady: u8,
    /// Channel for the primary color of a flashing LED
    pub flash: u8,
}

impl Default for LedChannels {
    fn default() -> Self {
        Self { steady: 0, flash: 9 }
    }
}

/// Staged and last-transmitted LED state for every logical control
pub struct LedCache {
    staged: Vec<LedState>,
    /// `None` forces a resend on the next flush
    sent: Vec<Option<LedState>>,
    channels: LedChannels,
}

impl LedCache {
    pub fn new(channels: LedChannels) -> Self {
        Self {
            staged: vec![LedState::default(); ADDRESS_SPACE],
            sent: vec![None; ADDRESS_SPACE],
            channels,
        }
    }

    /// Stage a color; nothing is sent until [`LedCache::flush`]
    pub fn set_led(&mut self, address: ControlAddress, color: Color, flash: Option<Color>) {
        debug_assert!(address.is_valid(), "LED address out of range: {}", address);
        let Some(slot) = address.slot() else {
            warn!("Ignoring LED write to out-of-range address {}", address);
            return;
        };
        self.staged[slot] = LedState {
            primary: color,
            flash,
        };
    }

    pub fn staged(&self, address: ControlAddress) -> LedState {
        address
            .slot()
            .and_then(|slot| self.staged.get(slot))
            .copied()
            .unwrap_or_default()
    }

    pub fn sent(&self, address: ControlAddress) -> Option<LedState> {
        address.slot().and_then(|slot| self.sent[slot])
    }

    /// Forget what the device shows for these controls so they are resent
    pub fn invalidate<I>(&mut self, addresses: I)
    where
        I: IntoIterator<Item = ControlAddress>,
    {
        for address in addresses {
            if let Some(slot) = address.slot() {
                self.sent[slot] = None;
            }
        }
    }

    pub fn invalidate_all(&mut self) {
        self.sent.iter_mut().for_each(|entry| *entry = None);
    }

    /// Number of staged entries that differ from the device
    pub fn pending(&self) -> usize {
        self.staged
            .iter()
            .zip(&self.sent)
            .filter(|(staged, sent)| Some(**staged) != **sent)
            .count()
    }

    /// Transmit every changed entry and return the number of messages sent
    ///
    /// A flashing LED costs two messages: the flash color on the steady
    /// channel, then the primary color on the flash channel. On a transport
    /// error the failing entry stays dirty and the error is returned.
    pub fn flush(&mut self, transport: &mut dyn Transport) -> SurfaceResult<usize> {
        let mut messages = 0;
        for slot in 0..ADDRESS_SPACE {
            let staged = self.staged[slot];
            if self.sent[slot] == Some(staged) {
                continue;
            }
            let Some(address) = ControlAddress::from_slot(slot) else {
                continue;
            };

            match staged.flash {
                Some(flash) => {
                    send(transport, address, flash, self.channels.steady)?;
                    send(transport, address, staged.primary, self.channels.flash)?;
                    messages += 2;
                }
                None => {
                    send(transport, address, staged.primary, self.channels.steady)?;
                    messages += 1;
                }
            }
            self.sent[slot] = Some(staged);
        }
        if messages > 0 {
            trace!("LED flush sent {} messages", messages);
        }
        Ok(messages)
    }
}

fn send(
    transport: &mut dyn Transport,
    address: ControlAddress,
    color: Color,
    channel: u8,
) -> SurfaceResult<()> {
    match address.kind {
        ControlKind::Note => transport.send_note(address.index, color, channel),
        ControlKind::ControlChange => transport.send_control_change(address.index, color, channel),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::{RecordingTransport, Sent};

    fn cache() -> LedCache {
        LedCache::new(LedChannels::default())
    }

    /// A cache whose device is known to be dark
    fn synced() -> LedCache {
        let mut leds = cache();
        leds.flush(&mut RecordingTransport::default()).unwrap();
        leds
    }

    #[test]
    fn test_first_flush_clears_every_slot() {
        let mut leds = cache();
        let mut transport = RecordingTransport::default();
        assert_eq!(leds.pending(), ADDRESS_SPACE);

        assert_eq!(leds.flush(&mut transport).unwrap(), ADDRESS_SPACE);
        assert!(transport.sent.contains(&Sent::Note {
            index: 36,
            value: 0,
            channel: 0
        }));
        assert!(transport.sent.contains(&Sent::ControlChange {
            index: 20,
            value: 0,
            channel: 0
        }));
        assert_eq!(leds.pending(), 0);
    }

    #[test]
    fn test_second_flush_sends_nothing() {
        let mut leds = synced();
        let mut transport = RecordingTransport::default();
        let pad = ControlAddress::note(36);

        leds.set_led(pad, 5, None);
        assert_eq!(leds.flush(&mut transport).unwrap(), 1);
        assert_eq!(leds.flush(&mut transport).unwrap(), 0);
        assert_eq!(
            transport.sent,
            vec![Sent::Note {
                index: 36,
                value: 5,
                channel: 0
            }]
        );
    }

    #[test]
    fn test_unchanged_value_is_not_sent() {
        let mut leds = synced();
        let mut transport = RecordingTransport::default();
        leds.set_led(ControlAddress::cc(20), 0, None);
        assert_eq!(leds.flush(&mut transport).unwrap(), 0);
        assert!(transport.sent.is_empty());
    }

    #[test]
    fn test_flash_sends_flash_color_then_primary() {
        let mut leds = synced();
        let mut transport = RecordingTransport::default();
        leds.set_led(ControlAddress::cc(20), 11, Some(122));

        assert_eq!(leds.flush(&mut transport).unwrap(), 2);
        assert_eq!(
            transport.sent,
            vec![
                Sent::ControlChange {
                    index: 20,
                    value: 122,
                    channel: 0
                },
                Sent::ControlChange {
                    index: 20,
                    value: 11,
                    channel: 9
                },
            ]
        );
    }

    #[test]
    fn test_dropping_flash_is_a_change() {
        let mut leds = synced();
        let mut transport = RecordingTransport::default();
        let pad = ControlAddress::note(40);
        leds.set_led(pad, 11, Some(122));
        leds.flush(&mut transport).unwrap();
        transport.sent.clear();

        leds.set_led(pad, 11, None);
        assert_eq!(leds.flush(&mut transport).unwrap(), 1);
        assert_eq!(leds.sent(pad), Some(LedState::steady(11)));
    }

    #[test]
    fn test_invalidate_forces_resend() {
        let mut leds = synced();
        let mut transport = RecordingTransport::default();
        let pad = ControlAddress::note(36);
        leds.set_led(pad, 9, None);
        leds.flush(&mut transport).unwrap();

        leds.invalidate([pad]);
        assert_eq!(leds.pending(), 1);
        assert_eq!(leds.flush(&mut transport).unwrap(), 1);
        assert_eq!(leds.pending(), 0);
    }

    #[test]
    fn test_failed_send_keeps_entry_dirty() {
        let mut leds = synced();
        let mut transport = RecordingTransport {
            fail: true,
            ..Default::default()
        };
        let pad = ControlAddress::note(36);
        leds.set_led(pad, 3, None);

        assert!(leds.flush(&mut transport).is_err());
        assert_eq!(leds.sent(pad), Some(LedState::default()));
        assert_eq!(leds.pending(), 1);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic]
    fn test_out_of_range_address_panics_in_debug() {
        let mut leds = synced();
        leds.set_led(ControlAddress::note(200), 1, None);
    }
}
