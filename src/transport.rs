//! Device transport
//!
//! The engine only needs three fire-and-forget operations. [`MidiTransport`]
//! implements them over `midir`; display frames go through a bounded queue
//! to whatever writes them out and are dropped when it falls behind.

use midir::{MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::error::{SurfaceError, SurfaceResult};
use crate::events::{EventSender, SurfaceEvent};
use crate::midi::{format_hex, MidiMessage};

/// Outgoing side of a surface connection
pub trait Transport {
    fn send_note(&mut self, index: u8, value: u8, channel: u8) -> SurfaceResult<()>;
    fn send_control_change(&mut self, index: u8, value: u8, channel: u8) -> SurfaceResult<()>;
    /// Hand over a packed display frame without waiting for the device
    fn send_frame(&mut self, frame: Vec<u8>) -> SurfaceResult<()>;
}

/// Stand-in used while no device is connected
#[derive(Debug, Default)]
pub struct Disconnected;

impl Transport for Disconnected {
    fn send_note(&mut self, _index: u8, _value: u8, _channel: u8) -> SurfaceResult<()> {
        Err(SurfaceError::Disconnected)
    }

    fn send_control_change(&mut self, _index: u8, _value: u8, _channel: u8) -> SurfaceResult<()> {
        Err(SurfaceError::Disconnected)
    }

    fn send_frame(&mut self, _frame: Vec<u8>) -> SurfaceResult<()> {
        Err(SurfaceError::Disconnected)
    }
}

/// Port name patterns for one device
#[derive(Debug, Clone)]
pub struct PortPatterns {
    pub device: String,
    pub input: String,
    pub output: String,
}

/// MIDI connection to a surface
pub struct MidiTransport {
    _input: MidiInputConnection<()>,
    output: MidiOutputConnection,
    frames: mpsc::Sender<Vec<u8>>,
    frames_dropped: u64,
}

impl MidiTransport {
    /// Connect both ports; incoming messages are pushed to `events`
    pub fn connect(
        ports: &PortPatterns,
        events: EventSender,
        frames: mpsc::Sender<Vec<u8>>,
    ) -> SurfaceResult<Self> {
        info!(
            "Connecting to {} - Input: '{}', Output: '{}'",
            ports.device, ports.input, ports.output
        );

        let midi_in = MidiInput::new("surface-bind-input")
            .map_err(|e| SurfaceError::TransportInit(e.to_string()))?;
        let (in_port, in_name) = find_port(&midi_in, &ports.input).ok_or_else(|| {
            SurfaceError::DeviceNotFound {
                device: ports.device.clone(),
                pattern: ports.input.clone(),
            }
        })?;

        info!("Connecting to input port: {}", in_name);
        let input = midi_in
            .connect(
                &in_port,
                "surface-bind",
                move |_timestamp, data, _| match MidiMessage::parse(data) {
                    Some(message) => events.push(SurfaceEvent::from_midi(&message)),
                    None => trace!("Ignoring MIDI: {}", format_hex(data)),
                },
                (),
            )
            .map_err(|e| SurfaceError::TransportInit(e.to_string()))?;

        let midi_out = MidiOutput::new("surface-bind-output")
            .map_err(|e| SurfaceError::TransportInit(e.to_string()))?;
        let (out_port, out_name) = find_port(&midi_out, &ports.output).ok_or_else(|| {
            SurfaceError::DeviceNotFound {
                device: ports.device.clone(),
                pattern: ports.output.clone(),
            }
        })?;

        info!("Connecting to output port: {}", out_name);
        let output = midi_out
            .connect(&out_port, "surface-bind")
            .map_err(|e| SurfaceError::TransportInit(e.to_string()))?;

        info!("{} connected", ports.device);
        Ok(Self {
            _input: input,
            output,
            frames,
            frames_dropped: 0,
        })
    }

    fn send(&mut self, message: MidiMessage) -> SurfaceResult<()> {
        let data = message.encode();
        self.output
            .send(&data)
            .map_err(|e| SurfaceError::Send(e.to_string()))?;
        trace!("Sent: {} | {}", format_hex(&data), message);
        Ok(())
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped
    }
}

impl Transport for MidiTransport {
    fn send_note(&mut self, index: u8, value: u8, channel: u8) -> SurfaceResult<()> {
        self.send(MidiMessage::NoteOn {
            channel,
            note: index,
            velocity: value,
        })
    }

    fn send_control_change(&mut self, index: u8, value: u8, channel: u8) -> SurfaceResult<()> {
        self.send(MidiMessage::ControlChange {
            channel,
            cc: index,
            value,
        })
    }

    fn send_frame(&mut self, frame: Vec<u8>) -> SurfaceResult<()> {
        match self.frames.try_send(frame) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.frames_dropped += 1;
                trace!("Display link busy, frame dropped ({} total)", self.frames_dropped);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SurfaceError::Disconnected),
        }
    }
}

/// Ports that can be listed by name
trait PortSource {
    type Port;
    fn list(&self) -> Vec<Self::Port>;
    fn name_of(&self, port: &Self::Port) -> Option<String>;
}

impl PortSource for MidiInput {
    type Port = midir::MidiInputPort;

    fn list(&self) -> Vec<Self::Port> {
        self.ports()
    }

    fn name_of(&self, port: &Self::Port) -> Option<String> {
        self.port_name(port).ok()
    }
}

impl PortSource for MidiOutput {
    type Port = midir::MidiOutputPort;

    fn list(&self) -> Vec<Self::Port> {
        self.ports()
    }

    fn name_of(&self, port: &Self::Port) -> Option<String> {
        self.port_name(port).ok()
    }
}

/// Case-insensitive substring match on port names
fn find_port<S: PortSource>(source: &S, pattern: &str) -> Option<(S::Port, String)> {
    let pattern = pattern.to_lowercase();
    for port in source.list() {
        if let Some(name) = source.name_of(&port) {
            if name.to_lowercase().contains(&pattern) {
                debug!("Found port '{}' matching pattern '{}'", name, pattern);
                return Some((port, name));
            }
        }
    }
    None
}

/// Port listing for `--list-ports`
pub mod discovery {
    use super::*;
    use anyhow::Result;

    /// Information about a MIDI port
    #[derive(Debug, Clone)]
    pub struct PortInfo {
        pub index: usize,
        pub name: String,
        pub is_virtual: bool,
    }

    fn describe<S: PortSource>(source: &S) -> Vec<PortInfo> {
        source
            .list()
            .iter()
            .enumerate()
            .filter_map(|(index, port)| {
                let name = source.name_of(port)?;
                let is_virtual = name.contains("Virtual")
                    || name.contains("loopMIDI")
                    || name.contains("IAC");
                Some(PortInfo {
                    index,
                    name,
                    is_virtual,
                })
            })
            .collect()
    }

    pub fn discover_input_ports() -> Result<Vec<PortInfo>> {
        Ok(describe(&MidiInput::new("surface-bind-discovery")?))
    }

    pub fn discover_output_ports() -> Result<Vec<PortInfo>> {
        Ok(describe(&MidiOutput::new("surface-bind-discovery")?))
    }

    /// Print both port lists and flag the ones matching known surfaces
    pub fn print_ports() {
        use colored::*;

        println!("\n{}", "=== Available MIDI Ports ===".bold().cyan());

        let sections = [
            ("Input Ports:", discover_input_ports()),
            ("Output Ports:", discover_output_ports()),
        ];
        for (title, ports) in sections {
            let Ok(ports) = ports else { continue };
            println!("\n{}", title.bold());
            if ports.is_empty() {
                println!("  {}", "No ports found".dimmed());
            }
            for port in ports {
                let marker = if port.is_virtual {
                    "[VIRTUAL]".yellow()
                } else {
                    "[PHYSICAL]".green()
                };
                let lower = port.name.to_lowercase();
                if lower.contains("push 2") || lower.contains("move") {
                    println!("  {} {}", marker, port.name.bright_white().bold());
                } else {
                    println!("  {} {}", marker, port.name);
                }
            }
        }
        println!();
    }
}

/// Recording transport for tests
#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Sent {
        Note { index: u8, value: u8, channel: u8 },
        ControlChange { index: u8, value: u8, channel: u8 },
        Frame(usize),
    }

    #[derive(Debug, Default)]
    pub struct RecordingTransport {
        pub sent: Vec<Sent>,
        pub frames: Vec<Vec<u8>>,
        pub fail: bool,
    }

    impl RecordingTransport {
        /// Last value sent to a note, on any channel
        pub fn last_note(&self, index: u8) -> Option<(u8, u8)> {
            self.sent.iter().rev().find_map(|s| match *s {
                Sent::Note { index: i, value, channel } if i == index => Some((value, channel)),
                _ => None,
            })
        }

        pub fn messages(&self) -> usize {
            self.sent
                .iter()
                .filter(|s| !matches!(s, Sent::Frame(_)))
                .count()
        }
    }

    impl Transport for RecordingTransport {
        fn send_note(&mut self, index: u8, value: u8, channel: u8) -> SurfaceResult<()> {
            if self.fail {
                return Err(SurfaceError::Send("test failure".to_string()));
            }
            self.sent.push(Sent::Note { index, value, channel });
            Ok(())
        }

        fn send_control_change(&mut self, index: u8, value: u8, channel: u8) -> SurfaceResult<()> {
            if self.fail {
                return Err(SurfaceError::Send("test failure".to_string()));
            }
            self.sent.push(Sent::ControlChange { index, value, channel });
            Ok(())
        }

        fn send_frame(&mut self, frame: Vec<u8>) -> SurfaceResult<()> {
            self.sent.push(Sent::Frame(frame.len()));
            self.frames.push(frame);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnected_transport_reports_error() {
        let mut transport = Disconnected;
        assert!(matches!(
            transport.send_note(36, 1, 0),
            Err(SurfaceError::Disconnected)
        ));
        assert!(transport.send_frame(vec![0; 4]).is_err());
    }
}
