use crate::byte_iter::ByteIter;
use crate::constants::{FILE_META_EVENT, FILE_SYSEX_F0, FILE_SYSEX_F7};
use crate::core::{Message, NoteMessage, Velocity};
use crate::error::LibResult;
use crate::file::settings::{CompressionPolicy, ReaderSettings, SilentNoteOnPolicy};
use crate::file::{MetaEvent, SysexEvent};
use crate::scribe::Scribe;
use crate::vlq::Vlq;
use log::trace;
use snafu::{OptionExt, ResultExt};
use std::io::{Read, Write};

/// `<event> = <MIDI event> | <sysex event> | <meta-event>`
///
/// Running status (the ability for a channel event to omit its status byte when it repeats the
/// previous channel event's) is owned by the track-chunk codec, not by this type: the caller
/// threads a `current_status` cell through successive calls to `parse`/`write` and this code
/// only reads or updates it.
#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub enum Event {
    /// Any MIDI channel message. Running status applies.
    Midi(Message),
    /// A MIDI system exclusive message.
    Sysex(SysexEvent),
    /// Non-MIDI information useful to this format or to sequencers.
    Meta(MetaEvent),
}

impl Default for Event {
    fn default() -> Self {
        Event::Midi(Message::default())
    }
}

impl Event {
    fn parse<R: Read>(
        iter: &mut ByteIter<R>,
        current_status: &mut Option<u8>,
        settings: &ReaderSettings,
    ) -> LibResult<Self> {
        let peeked = iter.peek_or_die().context(io!())?;
        match peeked {
            FILE_SYSEX_F0 | FILE_SYSEX_F7 => {
                *current_status = None;
                Ok(Event::Sysex(SysexEvent::parse(peeked, iter)?))
            }
            FILE_META_EVENT => {
                trace!("I peeked at {:#x}, a MetaEvent!", peeked);
                *current_status = None;
                Ok(Event::Meta(MetaEvent::parse(
                    iter,
                    &settings.custom_meta_event_types,
                )?))
            }
            b if b & 0x80 != 0 => {
                trace!("I peeked at {:#x}, a fresh channel status byte!", b);
                iter.read_expect(b).context(io!())?;
                *current_status = Some(b);
                let message = Message::parse(iter, b)?;
                Ok(Event::Midi(normalize_silent_note_on(message, settings)))
            }
            _ => {
                let status = current_status.context(crate::error::UnexpectedRunningStatus {
                    site: site!(),
                })?;
                trace!("I peeked at a data byte, reusing running status {:#x}", status);
                let message = Message::parse(iter, status)?;
                Ok(Event::Midi(normalize_silent_note_on(message, settings)))
            }
        }
    }

    pub(crate) fn write<W: Write>(
        &self,
        w: &mut Scribe<W>,
        compression: &CompressionPolicy,
    ) -> LibResult<()> {
        match self {
            Event::Midi(message) => {
                let message = silence_note_off(*message, compression);
                w.write_status_byte(message.status_byte())?;
                message.write(w)
            }
            Event::Sysex(sysex) => {
                w.clear_running_status();
                sysex.write(w)
            }
            Event::Meta(meta) => {
                w.clear_running_status();
                meta.write(w)
            }
        }
    }
}

/// A `NoteOn` with velocity `0` is, per the reader's `SilentNoteOnPolicy`, indistinguishable in
/// meaning from a `NoteOff`; normalize it so downstream code (the note-pairing engine, among
/// others) only ever sees one shape for "this note just ended".
fn normalize_silent_note_on(message: Message, settings: &ReaderSettings) -> Message {
    if settings.silent_note_on != SilentNoteOnPolicy::NoteOff {
        return message;
    }
    match message {
        Message::NoteOn(n) if n.velocity.get() == 0 => Message::NoteOff(NoteMessage {
            velocity: Velocity::new(0),
            ..n
        }),
        other => other,
    }
}

/// The inverse transform, applied on write when `note_off_as_silent_note_on` compression is
/// requested: every `NoteOff` is rewritten as a velocity-0 `NoteOn` so it can share running
/// status with preceding `NoteOn` events.
fn silence_note_off(message: Message, compression: &CompressionPolicy) -> Message {
    if !compression.note_off_as_silent_note_on {
        return message;
    }
    match message {
        Message::NoteOff(n) => Message::NoteOn(NoteMessage {
            velocity: Velocity::new(0),
            ..n
        }),
        other => other,
    }
}

/// `<MTrk event> = <delta-time> <event>`
#[derive(Clone, Debug, Default, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub struct TrackEvent {
    /// The amount of time, in ticks, before this event, relative to the previous event in the
    /// same track (or to the start of the track, for the first event). Stored as a VLQ on the
    /// wire.
    delta_time: u32,
    event: Event,
}

impl TrackEvent {
    pub fn new(delta_time: u32, event: Event) -> Self {
        Self { delta_time, event }
    }

    pub fn delta_time(&self) -> u32 {
        self.delta_time
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    /// Returns true if this is a [`MetaEvent::EndOfTrack`].
    pub(crate) fn is_end(&self) -> bool {
        matches!(&self.event, Event::Meta(MetaEvent::EndOfTrack))
    }

    pub(crate) fn parse<R: Read>(
        iter: &mut ByteIter<R>,
        current_status: &mut Option<u8>,
        settings: &ReaderSettings,
    ) -> LibResult<Self> {
        let delta_time = iter.read_vlq_u32().context(io!())?;
        trace!("delta_time {}", delta_time);
        let event = Event::parse(iter, current_status, settings)?;
        Ok(Self { delta_time, event })
    }

    pub(crate) fn write<W: Write>(
        &self,
        w: &mut Scribe<W>,
        compression: &CompressionPolicy,
    ) -> LibResult<()> {
        let delta = Vlq::new(self.delta_time).to_bytes();
        w.write_all(&delta).context(wr!())?;
        self.event.write(w, compression)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Channel, NoteNumber};
    use std::io::Cursor;

    fn parse_one(bytes: &[u8], status: &mut Option<u8>) -> Event {
        let cursor = Cursor::new(Vec::from(bytes));
        let mut iter = ByteIter::new(std::io::Read::bytes(cursor)).unwrap();
        Event::parse(&mut iter, status, &ReaderSettings::default()).unwrap()
    }

    #[test]
    fn fresh_status_byte_updates_current_status() {
        let mut status = None;
        let event = parse_one(&[0x90, 0x3c, 0x40], &mut status);
        assert!(matches!(event, Event::Midi(Message::NoteOn(_))));
        assert_eq!(Some(0x90), status);
    }

    #[test]
    fn running_status_reuses_previous_status() {
        let mut status = Some(0x90);
        let event = parse_one(&[0x3c, 0x00], &mut status);
        match event {
            Event::Midi(Message::NoteOff(n)) => {
                assert_eq!(0, n.velocity.get());
                assert_eq!(60, n.note_number.get());
            }
            other => panic!("expected a silenced note-on normalized to note-off, got {:?}", other),
        }
    }

    #[test]
    fn data_byte_without_running_status_is_an_error() {
        let mut status = None;
        let cursor = Cursor::new(vec![0x3c, 0x40]);
        let mut iter = ByteIter::new(std::io::Read::bytes(cursor)).unwrap();
        assert!(Event::parse(&mut iter, &mut status, &ReaderSettings::default()).is_err());
    }

    #[test]
    fn sysex_and_meta_clear_running_status() {
        let mut status = Some(0x90);
        let _ = parse_one(&[0xf0, 0x01, 0xf7], &mut status);
        assert_eq!(None, status);

        let mut status = Some(0x90);
        let _ = parse_one(&[0xff, 0x2f, 0x00], &mut status);
        assert_eq!(None, status);
    }

    #[test]
    fn note_off_as_silent_note_on_compression_round_trips() {
        let note_off = Event::Midi(Message::NoteOff(NoteMessage {
            channel: Channel::new(2),
            note_number: NoteNumber::new(64),
            velocity: Velocity::new(0),
        }));
        let compression = CompressionPolicy {
            note_off_as_silent_note_on: true,
            ..CompressionPolicy::default()
        };
        let mut out = Vec::new();
        {
            let mut scribe = Scribe::new(&mut out, crate::scribe::ScribeSettings::default());
            note_off.write(&mut scribe, &compression).unwrap();
        }
        assert_eq!(0x92, out[0]);
        assert_eq!(64, out[1]);
        assert_eq!(0, out[2]);
    }
}
