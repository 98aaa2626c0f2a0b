#![allow(dead_code)]

#[macro_use]
mod error;
#[macro_use]
mod clamp;
#[macro_use]
mod macros;

mod byte_iter;
pub mod constants;
pub mod core;
pub mod file;
mod scribe;
pub mod text;
pub mod vlq;

use crate::byte_iter::ByteIter;
use crate::error::LibResult;
use crate::file::{
    Division, ExtraTrackChunkPolicy, Format, Header, ReaderSettings, Track,
    UnexpectedTrackChunksCountPolicy, UnknownChunkIdPolicy, UnknownFileFormatPolicy,
    WriterSettings,
};
use crate::scribe::{Scribe, ScribeSettings};
pub use error::{Error, Result};
use log::{debug, trace, warn};
use snafu::ResultExt;
use std::convert::TryFrom;
use std::io::{Read, Write};
use std::path::Path;
pub use text::Text;

// https://www.music.mcgill.ca/~gary/306/week9/smf.html
// https://github.com/Shkyrockett/midi-unit-test-cases

/// A chunk whose 4-byte identifier was neither `"MTrk"` nor a registered custom chunk type. Its
/// raw bytes are kept so the chunk round-trips through `read` without being interpreted, but
/// `write` never re-emits it: only the header and track chunks are written back out.
#[derive(Clone, Debug, Default, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub struct UnknownChunk {
    id: String,
    data: Vec<u8>,
}

impl UnknownChunk {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// A parsed Standard MIDI File: a header chunk plus its track chunks.
#[derive(Clone, Debug, Default, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub struct MidiFile {
    header: Header,
    tracks: Vec<Track>,
    unknown_chunks: Vec<UnknownChunk>,
}

impl MidiFile {
    /// Create a new, empty file with the given format and division.
    pub fn new(format: Format, division: Division) -> Self {
        Self {
            header: Header::new(format, division),
            tracks: Vec::new(),
            unknown_chunks: Vec::new(),
        }
    }

    fn read_inner<R: Read>(mut iter: ByteIter<R>, settings: &ReaderSettings) -> LibResult<Self> {
        trace!("parsing header chunk");
        iter.expect_tag("MThd").context(io!())?;
        let chunk_length = iter.read_u32().context(io!())?;
        if chunk_length != 6 {
            return crate::error::Other { site: site!() }.fail();
        }
        let format_word = iter.read_u16().context(io!())?;
        let declared_tracks = iter.read_u16().context(io!())?;
        let division_data = iter.read_u16().context(io!())?;

        let format = match Format::from_u16(format_word) {
            Ok(format) => format,
            Err(e) => match settings.unknown_file_format {
                UnknownFileFormatPolicy::Abort => return Err(e),
                UnknownFileFormatPolicy::Ignore => {
                    warn!("unrecognized file format {}, accepting per policy", format_word);
                    Format::default()
                }
            },
        };
        let header = Header::new(format, Division::from_u16(division_data)?);

        let mut tracks = Vec::new();
        let mut unknown_chunks = Vec::new();
        let mut found_track_chunks: u16 = 0;

        while !iter.is_end() {
            let id_bytes = iter.read4().context(io!())?;
            let id = String::from_utf8_lossy(&id_bytes).into_owned();
            let length = iter.read_u32().context(io!())?;

            if id == "MTrk" {
                found_track_chunks += 1;
                let keep = found_track_chunks <= declared_tracks
                    || settings.extra_track_chunk == ExtraTrackChunkPolicy::Read;
                if keep {
                    trace!(
                        "parsing track chunk {} (one-based), {} declared",
                        found_track_chunks,
                        declared_tracks
                    );
                    tracks.push(Track::parse_chunk_body(&mut iter, length, settings)?);
                } else {
                    debug!("skipping extra track chunk {} per policy", found_track_chunks);
                    for _ in 0..length {
                        iter.read().context(io!())?;
                    }
                }
                continue;
            }

            let read_raw = settings.custom_chunk_types.contains(&id)
                || settings.unknown_chunk_id == UnknownChunkIdPolicy::ReadAsUnknownChunk;
            if read_raw {
                let data = iter.read_n(length as usize).context(io!())?;
                unknown_chunks.push(UnknownChunk { id, data });
            } else {
                match settings.unknown_chunk_id {
                    UnknownChunkIdPolicy::Skip => {
                        for _ in 0..length {
                            iter.read().context(io!())?;
                        }
                    }
                    UnknownChunkIdPolicy::Abort => {
                        return crate::error::UnknownChunkId { site: site!(), id }.fail()
                    }
                    UnknownChunkIdPolicy::ReadAsUnknownChunk => unreachable!(),
                }
            }
        }

        if found_track_chunks != declared_tracks
            && settings.unexpected_track_chunks_count == UnexpectedTrackChunksCountPolicy::Abort
        {
            return crate::error::UnexpectedTrackChunksCount {
                site: site!(),
                declared: declared_tracks,
                found: found_track_chunks,
            }
            .fail();
        }

        Ok(Self {
            header,
            tracks,
            unknown_chunks,
        })
    }

    /// Parse a MIDI file from a reader, using default reading policies.
    pub fn read<R: Read>(r: R) -> Result<Self> {
        Self::read_with_settings(r, &ReaderSettings::default())
    }

    /// Parse a MIDI file from a reader, using the given reading policies.
    pub fn read_with_settings<R: Read>(r: R, settings: &ReaderSettings) -> Result<Self> {
        let bytes = r.bytes();
        let iter = ByteIter::new(bytes).context(io!())?;
        Ok(Self::read_inner(iter, settings)?)
    }

    /// Load a MIDI file from disk, using default reading policies.
    pub fn load<P: AsRef<Path>>(file: P) -> Result<Self> {
        Self::load_with_settings(file, &ReaderSettings::default())
    }

    /// Load a MIDI file from disk, using the given reading policies.
    pub fn load_with_settings<P: AsRef<Path>>(file: P, settings: &ReaderSettings) -> Result<Self> {
        Ok(Self::read_inner(
            ByteIter::new_file(file).context(io!())?,
            settings,
        )?)
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn tracks_len(&self) -> usize {
        self.tracks.len()
    }

    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }

    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn track_mut(&mut self, index: usize) -> Option<&mut Track> {
        self.tracks.get_mut(index)
    }

    /// Append a new, empty track and return its index.
    pub fn push_track(&mut self) -> usize {
        self.tracks.push(Track::default());
        self.tracks.len() - 1
    }

    /// Chunks that were present in the file but whose identifier was neither `"MTrk"` nor a
    /// registered custom chunk type.
    pub fn unknown_chunks(&self) -> impl Iterator<Item = &UnknownChunk> {
        self.unknown_chunks.iter()
    }

    fn write_inner<W: Write>(&self, w: W, settings: &WriterSettings) -> LibResult<()> {
        let ntracks = u16::try_from(self.tracks.len()).context(crate::error::TrackTooLong {
            site: site!(),
            len: self.tracks.len(),
        })?;
        let mut scribe = Scribe::new(
            w,
            ScribeSettings {
                running_status: settings.compression.use_running_status,
            },
        );
        self.header.write(&mut scribe, ntracks)?;
        for track in &self.tracks {
            track.write(&mut scribe, &settings.compression)?;
        }
        Ok(())
    }

    /// Write a MIDI file, using default writing policies.
    pub fn write<W: Write>(&self, w: W) -> Result<()> {
        self.write_with_settings(w, &WriterSettings::default())
    }

    /// Write a MIDI file, using the given writing policies.
    pub fn write_with_settings<W: Write>(&self, w: W, settings: &WriterSettings) -> Result<()> {
        Ok(self.write_inner(w, settings)?)
    }

    /// Save a MIDI file to disk, using default writing policies.
    pub fn save<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        self.save_with_settings(file, &WriterSettings::default())
    }

    /// Save a MIDI file to disk, using the given writing policies.
    pub fn save_with_settings<P: AsRef<Path>>(&self, file: P, settings: &WriterSettings) -> Result<()> {
        let f = std::fs::File::create(file.as_ref()).context(crate::error::Wr { site: site!() })?;
        Ok(self.write_inner(f, settings)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Channel, NoteNumber, Velocity};
    use crate::file::{CompressionPolicy, Event, MetaEvent};

    fn sample_file() -> MidiFile {
        let mut file = MidiFile::new(Format::Single, Division::default());
        let ix = file.push_track();
        let track = file.track_mut(ix).unwrap();
        track.set_name("melody").unwrap();
        track
            .push_note_on(0, Channel::new(0), NoteNumber::new(60), Velocity::new(64))
            .unwrap();
        track
            .push_note_off(96, Channel::new(0), NoteNumber::new(60), Velocity::new(0))
            .unwrap();
        file
    }

    #[test]
    fn roundtrips_through_bytes() {
        let file = sample_file();
        let mut bytes = Vec::new();
        file.write(&mut bytes).unwrap();

        let read_back = MidiFile::read(bytes.as_slice()).unwrap();
        assert_eq!(1, read_back.tracks_len());
        let track = read_back.track(0).unwrap();
        assert_eq!(3, track.events_len());
        assert!(matches!(
            track.events().next().unwrap().event(),
            Event::Meta(MetaEvent::TrackName(_))
        ));
    }

    #[test]
    fn unknown_file_format_aborts_by_default() {
        let mut bytes = vec![];
        bytes.extend_from_slice(b"MThd");
        bytes.extend_from_slice(&6u32.to_be_bytes());
        bytes.extend_from_slice(&99u16.to_be_bytes());
        bytes.extend_from_slice(&0u16.to_be_bytes());
        bytes.extend_from_slice(&96u16.to_be_bytes());
        assert!(MidiFile::read(bytes.as_slice()).is_err());
    }

    #[test]
    fn unknown_chunk_is_kept_by_default() {
        let mut bytes = vec![];
        bytes.extend_from_slice(b"MThd");
        bytes.extend_from_slice(&6u32.to_be_bytes());
        bytes.extend_from_slice(&0u16.to_be_bytes());
        bytes.extend_from_slice(&0u16.to_be_bytes());
        bytes.extend_from_slice(&96u16.to_be_bytes());
        bytes.extend_from_slice(b"XTRA");
        bytes.extend_from_slice(&2u32.to_be_bytes());
        bytes.extend_from_slice(&[0xaa, 0xbb]);

        let file = MidiFile::read(bytes.as_slice()).unwrap();
        let chunk = file.unknown_chunks().next().unwrap();
        assert_eq!("XTRA", chunk.id());
        assert_eq!(&[0xaa, 0xbb], chunk.data());
    }

    #[test]
    fn running_status_compression_round_trips() {
        let file = sample_file();
        let mut bytes = Vec::new();
        let settings = WriterSettings {
            compression: CompressionPolicy {
                use_running_status: true,
                ..CompressionPolicy::default()
            },
        };
        file.write_with_settings(&mut bytes, &settings).unwrap();
        let read_back = MidiFile::read(bytes.as_slice()).unwrap();
        assert_eq!(1, read_back.tracks_len());
    }
}
