use crate::core::{Channel, Clocks, DurationName, PortValue};
use crate::byte_iter::ByteIter;
use crate::error::{self, LibResult};
use crate::file::settings::CustomMetaEventTypes;
use crate::scribe::Scribe;
use crate::vlq::Vlq;
use crate::{Result, Text};
use snafu::{ensure, OptionExt, ResultExt};
use std::convert::TryFrom;
use std::io::{Read, Write};

/// A meta event: an in-stream non-audible event carrying metadata (tempo, key, text, etc.),
/// prefixed by `0xFF`. All carry a single type byte and a VLQ-length-prefixed payload.
///
/// A few meta-events are defined herein. It is not required for every program to support every
/// meta-event.
///
/// In general, meta-events in a track which occur at the same time may occur in any order. If a
/// copyright event is used, it should be placed as early as possible in the file, so it will be
/// noticed easily. Sequence Number and Sequence/Track Name events, if present, must appear at
/// time 0. An end-of-track event must occur as the last event in the track.
#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub enum MetaEvent {
    /// `FF 00 02 ssss` or `FF 00 00`: This optional event, which must occur at the beginning of a
    /// track, before any nonzero delta-times, specifies the number of a sequence. `None` when the
    /// payload is empty.
    SequenceNumber(Option<u16>),

    /// `FF 01 len text`: Any amount of text describing anything.
    Text(Text),

    /// `FF 02 len text`: Contains a copyright notice as printable ASCII text.
    Copyright(Text),

    /// `FF 03 len text`: If in a format 0 track, or the first track in a format 1 file, the name
    /// of the sequence. Otherwise, the name of the track.
    TrackName(Text),

    /// `FF 04 len text`: A description of the type of instrumentation to be used in that track.
    InstrumentName(Text),

    /// `FF 05 len text`: A lyric to be sung.
    Lyric(Text),

    /// `FF 06 len text`: The name of a point in the sequence, such as a rehearsal letter.
    Marker(Text),

    /// `FF 07 len text`: A description of something happening on a film or video screen or stage
    /// at that point in the musical score.
    CuePoint(Text),

    /// `FF 20 01 cc`: The MIDI channel (0-15) contained in this event may be used to associate a
    /// MIDI channel with all events which follow, including System Exclusive and meta-events.
    ChannelPrefix(Channel),

    /// `FF 21 01 pp`: Associates a MIDI output port number with all events which follow.
    PortPrefix(PortValue),

    /// `FF 2F 00`: This event is not optional. It is included so that an exact ending point may
    /// be specified for the track.
    EndOfTrack,

    /// `FF 51 03 tttttt`: Set Tempo, in microseconds per MIDI quarter-note.
    SetTempo(MicrosecondsPerQuarter),

    /// `FF 54 05 hr mn se fr ff`: This event, if present, designates the SMPTE time at which the
    /// track chunk is supposed to start.
    SmpteOffset(SmpteOffsetValue),

    /// `FF 58 04 nn dd cc bb`: numerator, denominator (negative power of two), MIDI clocks per
    /// metronome click, and notated 32nd-notes per quarter note.
    TimeSignature(TimeSignatureValue),

    /// `FF 59 02 sf mi`: key signature, accidentals in `[-7, 7]` and major/minor mode.
    KeySignature(KeySignatureValue),

    /// `FF 7F len data`: special requirements for particular sequencers; the payload's meaning is
    /// manufacturer-defined and is not interpreted here.
    SequencerSpecific(Vec<u8>),

    /// A meta event whose type byte is registered in `CustomMetaEventTypes` but whose payload is
    /// not otherwise interpreted.
    Custom(u8, Vec<u8>),

    /// A meta event whose type byte is not recognized and not registered as custom. The raw
    /// payload is preserved so the event round-trips even though its meaning is unknown.
    UnknownMeta(u8, Vec<u8>),
}

impl Default for MetaEvent {
    fn default() -> Self {
        MetaEvent::EndOfTrack
    }
}

impl MetaEvent {
    pub(crate) fn parse<R: Read>(
        iter: &mut ByteIter<R>,
        custom_types: &CustomMetaEventTypes,
    ) -> LibResult<Self> {
        iter.read_expect(0xff).context(io!())?;
        let meta_type_byte = iter.read_or_die().context(io!())?;
        match meta_type_byte {
            META_SEQUENCE_NUM => {
                let length = iter.read_vlq_u32().context(io!())?;
                if length == 0 {
                    Ok(MetaEvent::SequenceNumber(None))
                } else {
                    ensure!(length == 2, error::Other { site: site!() });
                    let bytes = iter.read_n(2).context(io!())?;
                    Ok(MetaEvent::SequenceNumber(Some(u16::from_be_bytes([
                        bytes[0], bytes[1],
                    ]))))
                }
            }
            META_TEXT..=META_CUE_POINT => MetaEvent::parse_text(iter),
            META_CHAN_PREFIX => {
                iter.read_expect(LEN_META_CHAN_PREFIX).context(io!())?;
                Ok(MetaEvent::ChannelPrefix(Channel::new(
                    iter.read_or_die().context(io!())?,
                )))
            }
            META_PORT => {
                iter.read_expect(1).context(io!())?;
                Ok(MetaEvent::PortPrefix(PortValue::new(
                    iter.read_or_die().context(io!())?,
                )))
            }
            META_END_OF_TRACK => MetaEvent::parse_end_of_track(iter),
            META_SET_TEMPO => Ok(MetaEvent::SetTempo(MicrosecondsPerQuarter::parse(iter)?)),
            META_SMTPE_OFFSET => Ok(MetaEvent::SmpteOffset(SmpteOffsetValue::parse(iter)?)),
            META_TIME_SIG => Ok(MetaEvent::TimeSignature(TimeSignatureValue::parse(iter)?)),
            META_KEY_SIG => Ok(MetaEvent::KeySignature(KeySignatureValue::parse(iter)?)),
            META_SEQ_SPECIFIC => {
                let length = iter.read_vlq_u32().context(io!())?;
                let payload = iter.read_n(length as usize).context(io!())?;
                Ok(MetaEvent::SequencerSpecific(payload))
            }
            other => {
                let length = iter.read_vlq_u32().context(io!())?;
                let payload = iter.read_n(length as usize).context(io!())?;
                if custom_types.contains(other) {
                    Ok(MetaEvent::Custom(other, payload))
                } else {
                    Ok(MetaEvent::UnknownMeta(other, payload))
                }
            }
        }
    }

    pub(crate) fn write<W: Write>(&self, w: &mut Scribe<W>) -> LibResult<()> {
        w.write_all(&[0xff]).context(wr!())?;
        match self {
            MetaEvent::SequenceNumber(value) => {
                write_u8!(w, META_SEQUENCE_NUM)?;
                match value {
                    Some(v) => {
                        write_u8!(w, 2)?;
                        w.write_all(&v.to_be_bytes()).context(wr!())
                    }
                    None => {
                        write_u8!(w, 0)
                    }
                }
            }
            MetaEvent::Text(s) => write_text(w, META_TEXT, s),
            MetaEvent::Copyright(s) => write_text(w, META_COPYRIGHT, s),
            MetaEvent::TrackName(s) => write_text(w, META_TRACK_NAME, s),
            MetaEvent::InstrumentName(s) => write_text(w, META_INSTR_NAME, s),
            MetaEvent::Lyric(s) => write_text(w, META_LYRIC, s),
            MetaEvent::Marker(s) => write_text(w, META_MARKER, s),
            MetaEvent::CuePoint(s) => write_text(w, META_CUE_POINT, s),
            MetaEvent::ChannelPrefix(channel) => {
                write_u8!(w, META_CHAN_PREFIX)?;
                write_u8!(w, LEN_META_CHAN_PREFIX)?;
                write_u8!(w, channel.get())
            }
            MetaEvent::PortPrefix(port) => {
                write_u8!(w, META_PORT)?;
                write_u8!(w, 1)?;
                write_u8!(w, port.get())
            }
            MetaEvent::EndOfTrack => {
                write_u8!(w, META_END_OF_TRACK)?;
                write_u8!(w, LEN_META_END_OF_TRACK)?;
                Ok(())
            }
            MetaEvent::SetTempo(value) => {
                write_u8!(w, META_SET_TEMPO)?;
                write_u8!(w, LEN_META_SET_TEMPO)?;
                let bytes = u32::to_be_bytes(value.get());
                debug_assert_eq!(bytes.len(), 4);
                w.write_all(&bytes[1..]).context(wr!())
            }
            MetaEvent::SmpteOffset(value) => value.write(w),
            MetaEvent::TimeSignature(value) => value.write(w),
            MetaEvent::KeySignature(value) => value.write(w),
            MetaEvent::SequencerSpecific(payload) => write_payload(w, META_SEQ_SPECIFIC, payload),
            MetaEvent::Custom(type_byte, payload) => write_payload(w, *type_byte, payload),
            MetaEvent::UnknownMeta(type_byte, payload) => write_payload(w, *type_byte, payload),
        }
    }

    pub(crate) fn parse_end_of_track<R: Read>(iter: &mut ByteIter<R>) -> LibResult<Self> {
        // after 0x2f we should see 0x00
        iter.read_expect(0x00).context(io!())?;
        Ok(MetaEvent::EndOfTrack)
    }

    pub(crate) fn parse_text<R: Read>(iter: &mut ByteIter<R>) -> LibResult<Self> {
        // we should be on a type-byte with a value between 0x01 and 0x07 (the text range).
        let text_type = iter.current().context(error::Other { site: site!() })?;
        let length = iter.read_vlq_u32().context(io!())?;
        let bytes = iter.read_n(length as usize).context(io!())?;
        // the spec does not strictly specify what encoding should be used for strings
        let s: Text = bytes.into();
        match text_type {
            META_TEXT => Ok(MetaEvent::Text(s)),
            META_COPYRIGHT => Ok(MetaEvent::Copyright(s)),
            META_TRACK_NAME => Ok(MetaEvent::TrackName(s)),
            META_INSTR_NAME => Ok(MetaEvent::InstrumentName(s)),
            META_LYRIC => Ok(MetaEvent::Lyric(s)),
            META_MARKER => Ok(MetaEvent::Marker(s)),
            META_CUE_POINT => Ok(MetaEvent::CuePoint(s)),
            _ => invalid_file!("unrecognized byte {:#04X}", text_type),
        }
    }
}

/// Type bytes with dedicated variants above; anything else routes through `Custom`/`UnknownMeta`.
pub(crate) fn is_standard_type_byte(type_byte: u8) -> bool {
    matches!(
        type_byte,
        META_SEQUENCE_NUM
            | META_TEXT..=META_CUE_POINT
            | META_CHAN_PREFIX
            | META_PORT
            | META_END_OF_TRACK
            | META_SET_TEMPO
            | META_SMTPE_OFFSET
            | META_TIME_SIG
            | META_KEY_SIG
            | META_SEQ_SPECIFIC
    )
}

fn write_text<W: Write>(w: &mut Scribe<W>, text_type: u8, text: &Text) -> LibResult<()> {
    write_payload(w, text_type, text.as_bytes())
}

fn write_payload<W: Write>(w: &mut Scribe<W>, type_byte: u8, bytes: &[u8]) -> LibResult<()> {
    w.write_all(&type_byte.to_be_bytes()).context(wr!())?;
    let size_u32 = u32::try_from(bytes.len()).context(error::StringTooLong {
        site: site!(),
        len: bytes.len(),
    })?;
    let size = Vlq::new(size_u32).to_bytes();
    w.write_all(&size).context(wr!())?;
    w.write_all(bytes).context(wr!())?;
    Ok(())
}

#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub struct SmpteOffsetValue {
    pub hr: u8,
    pub mn: u8,
    pub se: u8,
    pub fr: u8,
    pub ff: u8,
}

impl SmpteOffsetValue {
    pub(crate) fn parse<R: Read>(iter: &mut ByteIter<R>) -> LibResult<Self> {
        // after 0x54 we should see 0x05
        iter.read_expect(LEN_META_SMTPE_OFFSET).context(io!())?;
        Ok(Self {
            hr: iter.read_or_die().context(io!())?,
            mn: iter.read_or_die().context(io!())?,
            se: iter.read_or_die().context(io!())?,
            fr: iter.read_or_die().context(io!())?,
            ff: iter.read_or_die().context(io!())?,
        })
    }

    pub(crate) fn write<W: Write>(&self, w: &mut Scribe<W>) -> LibResult<()> {
        write_u8!(w, META_SMTPE_OFFSET)?;
        write_u8!(w, LEN_META_SMTPE_OFFSET)?;
        write_u8!(w, self.hr)?;
        write_u8!(w, self.mn)?;
        write_u8!(w, self.se)?;
        write_u8!(w, self.fr)?;
        write_u8!(w, self.ff)?;
        Ok(())
    }
}

pub(crate) const META_SEQUENCE_NUM: u8 = 0x00;
pub(crate) const META_TEXT: u8 = 0x01;
pub(crate) const META_COPYRIGHT: u8 = 0x02;
pub(crate) const META_TRACK_NAME: u8 = 0x03;
pub(crate) const META_INSTR_NAME: u8 = 0x04;
pub(crate) const META_LYRIC: u8 = 0x05;
pub(crate) const META_MARKER: u8 = 0x06;
pub(crate) const META_CUE_POINT: u8 = 0x07;
pub(crate) const META_CHAN_PREFIX: u8 = 0x20;
pub(crate) const META_END_OF_TRACK: u8 = 0x2f;
pub(crate) const META_SET_TEMPO: u8 = 0x51;
pub(crate) const META_SMTPE_OFFSET: u8 = 0x54;
pub(crate) const META_TIME_SIG: u8 = 0x58;
pub(crate) const META_KEY_SIG: u8 = 0x59;
pub(crate) const META_SEQ_SPECIFIC: u8 = 0x7f;
/// https://groups.google.com/u/2/g/comp.music.midi/c/_MIjgi-8xQQ
pub(crate) const META_PORT: u8 = 0x21;

pub(crate) const LEN_META_CHAN_PREFIX: u8 = 1;
pub(crate) const LEN_META_END_OF_TRACK: u8 = 0;
pub(crate) const LEN_META_SET_TEMPO: u8 = 3;
pub(crate) const LEN_META_SMTPE_OFFSET: u8 = 5;
pub(crate) const LEN_META_TIME_SIG: u8 = 4;
pub(crate) const LEN_META_KEY_SIG: u8 = 2;

/// `SetTempo(500_000)`, the value written by `DeleteDefaultSetTempo` suppression when matched.
pub const DEFAULT_SET_TEMPO: u32 = 500_000;

#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub struct TimeSignatureValue {
    /// The upper part of a time signature. For example, in 6/8, the `numerator` is 6.
    numerator: u8,

    /// The lower part of a time signature, expressed as a negative power of two.
    denominator: DurationName,

    /// The number of MIDI clocks in a metronome click.
    click: Clocks,

    /// The number of notated 32nd notes per quarter note. This should normally be 8.
    tpq: u8,
}

impl Default for TimeSignatureValue {
    fn default() -> Self {
        Self {
            numerator: 4,
            denominator: DurationName::Quarter,
            click: Clocks::Quarter,
            tpq: 8,
        }
    }
}

impl TimeSignatureValue {
    pub fn new(numerator: u8, denominator: DurationName, click: Clocks) -> Result<Self> {
        ensure!(numerator > 0, error::Other { site: site!() });
        Ok(Self {
            numerator,
            denominator,
            click,
            ..Self::default()
        })
    }

    pub fn numerator(&self) -> u8 {
        self.numerator
    }

    pub fn denominator(&self) -> DurationName {
        self.denominator
    }

    pub fn click(&self) -> Clocks {
        self.click
    }

    pub(crate) fn parse<R: Read>(iter: &mut ByteIter<R>) -> LibResult<Self> {
        iter.read_expect(LEN_META_TIME_SIG).context(io!())?;
        Ok(Self {
            numerator: iter.read_or_die().context(io!())?,
            denominator: DurationName::from_u8(iter.read_or_die().context(io!())?)?,
            click: Clocks::from_u8(iter.read_or_die().context(io!())?),
            tpq: iter.read_or_die().context(io!())?,
        })
    }

    pub(crate) fn write<W: Write>(&self, w: &mut Scribe<W>) -> LibResult<()> {
        write_u8!(w, META_TIME_SIG)?;
        write_u8!(w, LEN_META_TIME_SIG)?;
        write_u8!(w, self.numerator)?;
        write_u8!(w, self.denominator as u8)?;
        write_u8!(w, self.click.to_u8())?;
        write_u8!(w, self.tpq)?;
        Ok(())
    }
}

// -7 is 7 flats, +7 is 7 sharps.
clamp!(KeyAccidentals, i8, -7, 7, 0, pub);

#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub enum KeyMode {
    Major,
    Minor,
}

impl Default for KeyMode {
    fn default() -> Self {
        KeyMode::Major
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub struct KeySignatureValue {
    accidentals: KeyAccidentals,
    mode: KeyMode,
}

impl KeySignatureValue {
    pub(crate) fn parse<R: Read>(iter: &mut ByteIter<R>) -> LibResult<Self> {
        iter.read_expect(LEN_META_KEY_SIG).context(io!())?;
        let raw_accidentals_byte = iter.read_or_die().context(io!())?;
        let casted_accidentals = raw_accidentals_byte as i8;
        Ok(Self {
            accidentals: casted_accidentals.into(),
            mode: match iter.read_or_die().context(io!())? {
                1 => KeyMode::Minor,
                _ => KeyMode::Major,
            },
        })
    }

    pub(crate) fn write<W: Write>(&self, w: &mut Scribe<W>) -> LibResult<()> {
        write_u8!(w, META_KEY_SIG)?;
        write_u8!(w, LEN_META_KEY_SIG)?;
        write_u8!(w, self.accidentals.get() as u8)?;
        write_u8!(w, self.mode as u8)?;
        Ok(())
    }
}

pub(crate) const DEFAULT_MICROSECONDS_PER_QUARTER: u32 = 500_000;
pub(crate) const MAX_24BIT_UINT_VALUE: u32 = 16_777_215;

clamp!(
    MicrosecondsPerQuarter,
    u32,
    1,
    MAX_24BIT_UINT_VALUE,
    DEFAULT_MICROSECONDS_PER_QUARTER,
    pub
);

impl MicrosecondsPerQuarter {
    pub(crate) fn parse<R: Read>(iter: &mut ByteIter<R>) -> LibResult<Self> {
        iter.read_expect(LEN_META_SET_TEMPO).context(io!())?;
        let bytes = iter.read_n(LEN_META_SET_TEMPO as usize).context(io!())?;
        // bytes is a big-endian u24. fit it into a big-endian u32 then parse it
        let beu32 = [0u8, bytes[0], bytes[1], bytes[2]];
        let parsed_number = u32::from_be_bytes(beu32);
        Ok(MicrosecondsPerQuarter::new(parsed_number))
    }
}

clamp!(QuartersPerMinute, u8, 1, u8::MAX, 120, pub);

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse_bytes(bytes: &[u8]) -> MetaEvent {
        let cursor = Cursor::new(Vec::from(bytes));
        let mut iter = ByteIter::new(std::io::Read::bytes(cursor)).unwrap();
        MetaEvent::parse(&mut iter, &CustomMetaEventTypes::default()).unwrap()
    }

    #[test]
    fn sequence_number_empty() {
        let e = parse_bytes(&[0xff, 0x00, 0x00]);
        assert_eq!(MetaEvent::SequenceNumber(None), e);
    }

    #[test]
    fn sequence_number_present() {
        let e = parse_bytes(&[0xff, 0x00, 0x02, 0x00, 0x07]);
        assert_eq!(MetaEvent::SequenceNumber(Some(7)), e);
    }

    #[test]
    fn unknown_meta_roundtrips_raw_payload() {
        let e = parse_bytes(&[0xff, 0x0b, 0x02, 0xaa, 0xbb]);
        assert_eq!(MetaEvent::UnknownMeta(0x0b, vec![0xaa, 0xbb]), e);
    }

    #[test]
    fn custom_meta_routed_by_registry() {
        let mut custom = CustomMetaEventTypes::default();
        custom.register(0x0b);
        let cursor = Cursor::new(vec![0xff, 0x0b, 0x01, 0x05]);
        let mut iter = ByteIter::new(std::io::Read::bytes(cursor)).unwrap();
        let e = MetaEvent::parse(&mut iter, &custom).unwrap();
        assert_eq!(MetaEvent::Custom(0x0b, vec![0x05]), e);
    }

    #[test]
    fn end_of_track() {
        let e = parse_bytes(&[0xff, 0x2f, 0x00]);
        assert_eq!(MetaEvent::EndOfTrack, e);
    }
}
