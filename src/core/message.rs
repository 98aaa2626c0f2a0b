//! Channel voice messages: the `MidiEvent` channel-event family (NoteOn, NoteOff,
//! PolyphonicKeyPressure, ControlChange, ProgramChange, ChannelPressure, PitchBend).

use crate::byte_iter::ByteIter;
use crate::constants::{STATUS_CHANNEL_MASK, STATUS_TYPE_MASK};
use crate::core::bits::{decode_14_bit_number, encode_14_bit_number};
use crate::core::numbers::{Channel, ControlValue, NoteNumber, PitchBend, Program, Velocity, U7};
use crate::core::status_type::StatusType;
use crate::error::LibResult;
use crate::scribe::Scribe;
use snafu::ResultExt;
use std::io::{Read, Write};

/// A Note On, Note Off, or Polyphonic Key Pressure message: channel, note number, and a
/// velocity/pressure value.
#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub struct NoteMessage {
    pub channel: Channel,
    pub note_number: NoteNumber,
    pub velocity: Velocity,
}

/// A Control Change message. The distinction some hardware draws between "control change"
/// (controller numbers 0-119) and "channel mode" (120-127) messages is the same wire format and
/// is not modeled as a separate event kind here.
#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub struct ControlChangeValue {
    pub channel: Channel,
    pub controller: U7,
    pub value: ControlValue,
}

/// A Program Change message.
#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub struct ProgramChangeValue {
    pub channel: Channel,
    pub program: Program,
}

/// A Channel Pressure (aftertouch) message.
#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub struct ChannelPressureValue {
    pub channel: Channel,
    pub pressure: U7,
}

/// A Pitch Bend message. `value` is the full 14-bit bend amount, center (no bend) at 8192.
#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub struct PitchBendValue {
    pub channel: Channel,
    pub value: PitchBend,
}

/// A channel voice message: one of the seven channel-event kinds named in the data model.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub enum Message {
    NoteOff(NoteMessage),
    NoteOn(NoteMessage),
    PolyPressure(NoteMessage),
    Control(ControlChangeValue),
    Program(ProgramChangeValue),
    ChannelPressure(ChannelPressureValue),
    PitchBend(PitchBendValue),
}

impl Default for Message {
    fn default() -> Self {
        Message::NoteOff(NoteMessage::default())
    }
}

impl Message {
    /// The channel this message is addressed to.
    pub fn channel(&self) -> Channel {
        match self {
            Message::NoteOff(m) | Message::NoteOn(m) | Message::PolyPressure(m) => m.channel,
            Message::Control(m) => m.channel,
            Message::Program(m) => m.channel,
            Message::ChannelPressure(m) => m.channel,
            Message::PitchBend(m) => m.channel,
        }
    }

    fn kind(&self) -> StatusType {
        match self {
            Message::NoteOff(_) => StatusType::NoteOff,
            Message::NoteOn(_) => StatusType::NoteOn,
            Message::PolyPressure(_) => StatusType::PolyPressure,
            Message::Control(_) => StatusType::ControlOrSelectChannelMode,
            Message::Program(_) => StatusType::Program,
            Message::ChannelPressure(_) => StatusType::ChannelPressure,
            Message::PitchBend(_) => StatusType::PitchBend,
        }
    }

    /// The status byte this message would be written with: `(kind_nibble << 4) | channel`.
    pub(crate) fn status_byte(&self) -> u8 {
        ((self.kind() as u8) << 4) | (self.channel().get() & STATUS_CHANNEL_MASK)
    }

    /// Parse a channel event's data bytes, given the already-resolved status byte (which may
    /// have been carried over from running status rather than just read off the wire).
    pub(crate) fn parse<R: Read>(iter: &mut ByteIter<R>, status_byte: u8) -> LibResult<Self> {
        let channel = Channel::new(status_byte & STATUS_CHANNEL_MASK);
        let kind_nibble = (status_byte & STATUS_TYPE_MASK) >> 4;
        let kind = StatusType::from_u8(kind_nibble)?;
        match kind {
            StatusType::NoteOff => {
                let note_number = NoteNumber::new(iter.read_or_die().context(io!())?);
                let velocity = Velocity::new(iter.read_or_die().context(io!())?);
                Ok(Message::NoteOff(NoteMessage {
                    channel,
                    note_number,
                    velocity,
                }))
            }
            StatusType::NoteOn => {
                let note_number = NoteNumber::new(iter.read_or_die().context(io!())?);
                let velocity = Velocity::new(iter.read_or_die().context(io!())?);
                Ok(Message::NoteOn(NoteMessage {
                    channel,
                    note_number,
                    velocity,
                }))
            }
            StatusType::PolyPressure => {
                let note_number = NoteNumber::new(iter.read_or_die().context(io!())?);
                let velocity = Velocity::new(iter.read_or_die().context(io!())?);
                Ok(Message::PolyPressure(NoteMessage {
                    channel,
                    note_number,
                    velocity,
                }))
            }
            StatusType::ControlOrSelectChannelMode => {
                let controller = U7::new(iter.read_or_die().context(io!())?);
                let value = ControlValue::new(iter.read_or_die().context(io!())?);
                Ok(Message::Control(ControlChangeValue {
                    channel,
                    controller,
                    value,
                }))
            }
            StatusType::Program => {
                let program = Program::new(iter.read_or_die().context(io!())?);
                Ok(Message::Program(ProgramChangeValue { channel, program }))
            }
            StatusType::ChannelPressure => {
                let pressure = U7::new(iter.read_or_die().context(io!())?);
                Ok(Message::ChannelPressure(ChannelPressureValue {
                    channel,
                    pressure,
                }))
            }
            StatusType::PitchBend => {
                // the wire carries the 14-bit value as two 7-bit bytes, lsb first.
                let lsb = iter.read_or_die().context(io!())?;
                let msb = iter.read_or_die().context(io!())?;
                let packed = (u16::from(lsb) << 8) | u16::from(msb);
                let value = PitchBend::new(decode_14_bit_number(packed));
                Ok(Message::PitchBend(PitchBendValue { channel, value }))
            }
            StatusType::System => {
                invalid_file!(format!(
                    "system status byte {:#04X} is not a channel event",
                    status_byte
                ))
            }
        }
    }

    /// Write this message's data bytes. The status byte itself is written by the caller (the
    /// track-chunk codec), which decides whether running status allows it to be omitted.
    pub(crate) fn write<W: Write>(&self, w: &mut Scribe<W>) -> LibResult<()> {
        match self {
            Message::NoteOff(m) | Message::NoteOn(m) | Message::PolyPressure(m) => {
                write_u8!(w, m.note_number.get()).context(wr!())?;
                write_u8!(w, m.velocity.get()).context(wr!())?;
            }
            Message::Control(m) => {
                write_u8!(w, m.controller.get()).context(wr!())?;
                write_u8!(w, m.value.get()).context(wr!())?;
            }
            Message::Program(m) => {
                write_u8!(w, m.program.get()).context(wr!())?;
            }
            Message::ChannelPressure(m) => {
                write_u8!(w, m.pressure.get()).context(wr!())?;
            }
            Message::PitchBend(m) => {
                let packed = encode_14_bit_number(m.value.get());
                let lsb = (packed >> 8) as u8;
                let msb = (packed & 0xFF) as u8;
                write_u8!(w, lsb).context(wr!())?;
                write_u8!(w, msb).context(wr!())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(bytes: &[u8], status_byte: u8) -> Message {
        let cursor = Cursor::new(Vec::from(bytes));
        let mut iter = ByteIter::new(std::io::Read::bytes(cursor)).unwrap();
        Message::parse(&mut iter, status_byte).unwrap()
    }

    #[test]
    fn note_on_roundtrip() {
        let m = parse(&[0x3C, 0x40], 0x90);
        match m {
            Message::NoteOn(n) => {
                assert_eq!(0, n.channel.get());
                assert_eq!(60, n.note_number.get());
                assert_eq!(64, n.velocity.get());
            }
            _ => panic!("wrong variant"),
        }
        assert_eq!(0x90, m.status_byte());
    }

    #[test]
    fn pitch_bend_center() {
        let m = parse(&[0x00, 0x40], 0xE0);
        match m {
            Message::PitchBend(p) => assert_eq!(8192, p.value.get()),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn system_status_rejected() {
        let cursor = Cursor::new(Vec::<u8>::new());
        let mut iter = ByteIter::new(std::io::Read::bytes(cursor)).unwrap();
        assert!(Message::parse(&mut iter, 0xF8).is_err());
    }
}
