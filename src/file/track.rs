use crate::byte_iter::ByteIter;
use crate::core::{
    Channel, Clocks, DurationName, Message, NoteMessage, NoteNumber, PitchBend, PitchBendValue,
    Program, ProgramChangeValue, Velocity,
};
use crate::error::LibResult;
use crate::file::settings::{
    CompressionPolicy, InvalidChunkSizePolicy, MissedEndOfTrackPolicy, ReaderSettings,
};
use crate::file::{
    note, Event, KeySignatureValue, MetaEvent, MicrosecondsPerQuarter, Note, ProcessNotesResult,
    QuartersPerMinute, TimeSignatureValue, TrackEvent, DEFAULT_SET_TEMPO,
};
use crate::scribe::{ByteCounter, Scribe, ScribeSettings};
use crate::Text;
use log::{debug, trace};
use snafu::ResultExt;
use std::convert::TryFrom;
use std::io::{Read, Write};

/// 2.3 - Track Chunks
/// The track chunks (type MTrk) are where actual song data is stored. Each track chunk is simply a
/// stream of MIDI events (and non-MIDI events), preceded by delta-time values. The format for Track
/// Chunks is exactly the same for all three header formats.
///
/// `<Track Chunk> = <chunk type><length><MTrk event>+`
#[derive(Clone, Debug, Default, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub struct Track {
    events: Vec<TrackEvent>,
}

impl Track {
    /// Returns `true` if the track has no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The number of events in the track.
    pub fn events_len(&self) -> usize {
        self.events.len()
    }

    /// Iterator over the events in the track. `EndOfTrack` is never stored here; it is
    /// synthesized at the end of the stream on both decode and encode.
    pub fn events(&self) -> impl Iterator<Item = &TrackEvent> {
        self.events.iter()
    }

    /// Replace the whole event list, e.g. after re-projecting from absolute time.
    pub(crate) fn replace_events(&mut self, events: Vec<TrackEvent>) {
        self.events = events;
    }

    /// Run the note-pairing engine over this track and let `action` edit each paired note's time
    /// and/or length. If anything changed, the track's events are rebuilt and re-sorted into
    /// delta-time order.
    pub fn process_notes<F: FnMut(&mut Note)>(&mut self, action: F) -> ProcessNotesResult {
        note::process_notes(self, action)
    }

    /// Run the note-pairing engine over this track and remove every paired note for which
    /// `predicate` returns `true`. Returns the number of notes removed.
    pub fn remove_notes<F: FnMut(&Note) -> bool>(&mut self, predicate: F) -> usize {
        note::remove_notes(self, predicate)
    }

    /// Add an event to the end.
    pub fn push_event(&mut self, delta_time: u32, event: Event) -> crate::Result<()> {
        self.events.push(TrackEvent::new(delta_time, event));
        Ok(())
    }

    /// Add event at `index` and shift everything after it.
    pub fn insert_event(&mut self, index: u32, delta_time: u32, event: Event) -> crate::Result<()> {
        self.events
            .insert(index as usize, TrackEvent::new(delta_time, event));
        Ok(())
    }

    /// Replace the event at `index`.
    pub fn replace_event(
        &mut self,
        index: u32,
        delta_time: u32,
        event: Event,
    ) -> crate::Result<()> {
        self.events[index as usize] = TrackEvent::new(delta_time, event);
        Ok(())
    }

    /// Add, or replace, the track name at the beginning of a track.
    pub fn set_name<S: Into<String>>(&mut self, name: S) -> crate::Result<()> {
        let name = Text::new(name);
        let meta = Event::Meta(MetaEvent::TrackName(name.clone()));
        if self.is_empty() {
            self.push_event(0, meta)?;
            return Ok(());
        }
        for (ix, event) in self.events.iter_mut().enumerate() {
            if event.delta_time() != 0 {
                break;
            }
            if let Event::Meta(MetaEvent::TrackName(s)) = event.event() {
                debug!("changing track name from '{}' to '{}'", s, name);
                self.replace_event(ix as u32, 0, meta)?;
                return Ok(());
            }
        }
        self.insert_event(0, 0, meta)?;
        Ok(())
    }

    /// Add, or replace, the instrument name at the beginning of a track.
    pub fn set_instrument_name<S: Into<String>>(&mut self, name: S) -> crate::Result<()> {
        let name = Text::new(name);
        let meta = Event::Meta(MetaEvent::InstrumentName(name.clone()));
        if self.is_empty() {
            self.push_event(0, meta)?;
            return Ok(());
        }
        for (ix, event) in self.events.iter_mut().enumerate() {
            if event.delta_time() != 0 {
                break;
            }
            if let Event::Meta(MetaEvent::InstrumentName(s)) = event.event() {
                debug!("changing instrument name from '{}' to '{}'", s, name);
                self.replace_event(ix as u32, 0, meta)?;
                return Ok(());
            }
        }
        self.insert_event(0, 0, meta)?;
        Ok(())
    }

    /// Add, or replace, the program change at the beginning of a track.
    pub fn set_program(&mut self, channel: Channel, program: Program) -> crate::Result<()> {
        let program_change = Event::Midi(Message::Program(ProgramChangeValue { channel, program }));
        if self.is_empty() {
            self.push_event(0, program_change)?;
            return Ok(());
        }
        for (ix, event) in self.events.iter_mut().enumerate() {
            if event.delta_time() != 0 {
                break;
            }
            if let Event::Midi(Message::Program(prog)) = event.event() {
                debug!(
                    "changing program from '{}' to '{}'",
                    prog.program.get(),
                    program.get()
                );
                self.replace_event(ix as u32, 0, program_change)?;
                return Ok(());
            }
        }
        self.insert_event(0, 0, program_change)?;
        Ok(())
    }

    /// Add a time signature.
    pub fn push_time_signature(
        &mut self,
        delta_time: u32,
        numerator: u8,
        denominator: DurationName,
        click: Clocks,
    ) -> crate::Result<()> {
        let time_sig = TimeSignatureValue::new(numerator, denominator, click)?;
        let event = Event::Meta(MetaEvent::TimeSignature(time_sig));
        self.push_event(delta_time, event)
    }

    /// Add a tempo message.
    pub fn push_tempo(
        &mut self,
        delta_time: u32,
        quarters_per_minute: QuartersPerMinute,
    ) -> crate::Result<()> {
        let minutes_per_quarter = 1f64 / f64::from(quarters_per_minute.get());
        let seconds_per_quarter = minutes_per_quarter * 60f64;
        let microseconds_per_quarter = seconds_per_quarter * 1_000_000f64;
        let value = microseconds_per_quarter as u32;
        let event = Event::Meta(MetaEvent::SetTempo(MicrosecondsPerQuarter::new(value)));
        self.push_event(delta_time, event)
    }

    /// Add a note on message.
    pub fn push_note_on(
        &mut self,
        delta_time: u32,
        channel: Channel,
        note_number: NoteNumber,
        velocity: Velocity,
    ) -> crate::Result<()> {
        let note_on = Event::Midi(Message::NoteOn(NoteMessage {
            channel,
            note_number,
            velocity,
        }));
        self.push_event(delta_time, note_on)
    }

    /// Add a note off message.
    pub fn push_note_off(
        &mut self,
        delta_time: u32,
        channel: Channel,
        note_number: NoteNumber,
        velocity: Velocity,
    ) -> crate::Result<()> {
        let note_off = Event::Midi(Message::NoteOff(NoteMessage {
            channel,
            note_number,
            velocity,
        }));
        self.push_event(delta_time, note_off)
    }

    /// Add a lyric.
    pub fn push_lyric<S: Into<String>>(&mut self, delta_time: u32, lyric: S) -> crate::Result<()> {
        let lyric = Event::Meta(MetaEvent::Lyric(Text::new(lyric)));
        self.push_event(delta_time, lyric)
    }

    /// Add a pitch bend value.
    pub fn push_pitch_bend(
        &mut self,
        delta_time: u32,
        channel: Channel,
        value: PitchBend,
    ) -> crate::Result<()> {
        let pitch_bend = Event::Midi(Message::PitchBend(PitchBendValue { channel, value }));
        self.push_event(delta_time, pitch_bend)
    }

    pub(crate) fn parse<R: Read>(
        iter: &mut ByteIter<R>,
        settings: &ReaderSettings,
    ) -> LibResult<Self> {
        iter.expect_tag("MTrk").context(io!())?;
        let declared_length = iter.read_u32().context(io!())?;
        Self::parse_chunk_body(iter, declared_length, settings)
    }

    /// Parse a track chunk's body, given its length, once the caller has already consumed the
    /// `"MTrk"` tag and the chunk length word itself (e.g. while dispatching on chunk id).
    pub(crate) fn parse_chunk_body<R: Read>(
        iter: &mut ByteIter<R>,
        declared_length: u32,
        settings: &ReaderSettings,
    ) -> LibResult<Self> {
        let start_position = iter.position();
        iter.set_size_limit(declared_length as u64);

        let mut events = Vec::new();
        let mut current_status: Option<u8> = None;
        let mut saw_end = false;
        loop {
            if iter.is_end() {
                break;
            }
            let event = TrackEvent::parse(iter, &mut current_status, settings)?;
            trace!("parsed {:?}", event);
            if event.is_end() {
                debug!("end of track event");
                saw_end = true;
                break;
            }
            events.push(event);
        }

        if !saw_end {
            match settings.missed_end_of_track {
                MissedEndOfTrackPolicy::Abort => {
                    iter.clear_size_limit();
                    return crate::error::MissedEndOfTrack { site: site!() }.fail();
                }
                MissedEndOfTrackPolicy::Ignore => {
                    debug!("track ended without an EndOfTrack event, accepting per policy");
                }
            }
        }

        let consumed = iter.position() - start_position;
        if consumed != u64::from(declared_length) {
            match settings.invalid_chunk_size {
                InvalidChunkSizePolicy::Abort => {
                    iter.clear_size_limit();
                    return crate::error::InvalidChunkSize {
                        site: site!(),
                        declared: declared_length,
                        consumed: consumed as u32,
                    }
                    .fail();
                }
                InvalidChunkSizePolicy::Ignore => {
                    if consumed < u64::from(declared_length) {
                        let remaining = u64::from(declared_length) - consumed;
                        for _ in 0..remaining {
                            iter.read().context(io!())?;
                        }
                    }
                }
            }
        }
        iter.clear_size_limit();
        Ok(Self { events })
    }

    pub(crate) fn write<W: Write>(
        &self,
        w: &mut Scribe<W>,
        compression: &CompressionPolicy,
    ) -> LibResult<()> {
        w.write_all(b"MTrk").context(wr!())?;

        // content-size pass: run the same traversal against a sink that only counts bytes, so
        // the chunk length can be written before the content itself without buffering it.
        let mut counter = Scribe::new(
            ByteCounter::new(),
            ScribeSettings {
                running_status: compression.use_running_status,
            },
        );
        encode_events(&self.events, &mut counter, compression)?;
        let counted = counter.get_ref().count();
        let track_length = u32::try_from(counted).context(crate::error::TrackTooLong {
            site: site!(),
            len: counted as usize,
        })?;
        w.write_all(&track_length.to_be_bytes()).context(wr!())?;

        // content pass: write the bytes for real, straight through to the destination writer.
        let mut track_scribe = Scribe::new(
            w,
            ScribeSettings {
                running_status: compression.use_running_status,
            },
        );
        encode_events(&self.events, &mut track_scribe, compression)
    }
}

/// Shared traversal for both the size-counting and byte-emitting encode passes: applies
/// `DeleteUnknownMetaEvents` and the three independent default-suppression latches, then hands
/// each surviving event to `TrackEvent::write`, which in turn applies running status and
/// `NoteOffAsSilentNoteOn`. An `EndOfTrack` is conceptually appended if the caller hasn't stored
/// one explicitly.
fn encode_events<W: Write>(
    events: &[TrackEvent],
    w: &mut Scribe<W>,
    compression: &CompressionPolicy,
) -> LibResult<()> {
    let mut skip_set_tempo = true;
    let mut skip_key_signature = true;
    let mut skip_time_signature = true;

    let needs_synthetic_end = !matches!(
        events.last().map(|e| e.event()),
        Some(Event::Meta(MetaEvent::EndOfTrack))
    );
    let synthetic_end = TrackEvent::new(0, Event::Meta(MetaEvent::EndOfTrack));
    let all_events = events
        .iter()
        .chain(needs_synthetic_end.then(|| &synthetic_end));

    for te in all_events {
        if compression.delete_unknown_meta_events {
            if let Event::Meta(MetaEvent::UnknownMeta(_, _)) = te.event() {
                continue;
            }
        }
        match te.event() {
            Event::Meta(MetaEvent::SetTempo(value)) if skip_set_tempo => {
                if value.get() == DEFAULT_SET_TEMPO {
                    if compression.delete_default_set_tempo {
                        continue;
                    }
                } else {
                    skip_set_tempo = false;
                }
            }
            Event::Meta(MetaEvent::KeySignature(value)) if skip_key_signature => {
                if *value == KeySignatureValue::default() {
                    if compression.delete_default_key_signature {
                        continue;
                    }
                } else {
                    skip_key_signature = false;
                }
            }
            Event::Meta(MetaEvent::TimeSignature(value)) if skip_time_signature => {
                if *value == TimeSignatureValue::default() {
                    if compression.delete_default_time_signature {
                        continue;
                    }
                } else {
                    skip_time_signature = false;
                }
            }
            _ => {}
        }
        te.write(w, compression)?;
    }
    Ok(())
}
