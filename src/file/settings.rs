//! Reading and writing configuration: policies that govern how tolerant the decoder is of
//! malformed or unusual input, and how aggressively the encoder compresses its output.

/// How to react when the header's declared track count disagrees with the number of track
/// chunks actually encountered while reading.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub enum UnexpectedTrackChunksCountPolicy {
    /// Accept the discrepancy and keep whatever tracks were found.
    Ignore,
    /// Fail with `UnexpectedTrackChunksCount`.
    Abort,
}

impl Default for UnexpectedTrackChunksCountPolicy {
    fn default() -> Self {
        UnexpectedTrackChunksCountPolicy::Ignore
    }
}

/// What to do with track chunks beyond the header's declared count.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub enum ExtraTrackChunkPolicy {
    /// Parse and keep them.
    Read,
    /// Skip over their bytes without parsing.
    Skip,
}

impl Default for ExtraTrackChunkPolicy {
    fn default() -> Self {
        ExtraTrackChunkPolicy::Read
    }
}

/// What to do with a chunk whose 4-byte identifier is not recognized (neither `MTrk` nor a
/// registered custom chunk type).
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub enum UnknownChunkIdPolicy {
    /// Keep the chunk's raw bytes under an unknown-chunk record.
    ReadAsUnknownChunk,
    /// Skip over it.
    Skip,
    /// Fail with `UnknownChunkId`.
    Abort,
}

impl Default for UnknownChunkIdPolicy {
    fn default() -> Self {
        UnknownChunkIdPolicy::ReadAsUnknownChunk
    }
}

/// What to do when a track chunk's byte budget is exhausted without an `EndOfTrack` event.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub enum MissedEndOfTrackPolicy {
    /// Accept the track as-is.
    Ignore,
    /// Fail with `MissedEndOfTrack`.
    Abort,
}

impl Default for MissedEndOfTrackPolicy {
    fn default() -> Self {
        MissedEndOfTrackPolicy::Ignore
    }
}

/// Whether a decoded `NoteOn` with velocity `0` is normalized to a `NoteOff`.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub enum SilentNoteOnPolicy {
    /// Leave it as a zero-velocity `NoteOn`.
    NoteOn,
    /// Rewrite it as a `NoteOff` with velocity `0`.
    NoteOff,
}

impl Default for SilentNoteOnPolicy {
    fn default() -> Self {
        SilentNoteOnPolicy::NoteOff
    }
}

/// What to do when a chunk's declared byte length disagrees with the number of bytes actually
/// consumed while parsing its content.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub enum InvalidChunkSizePolicy {
    /// Accept the chunk, trusting the declared length for seeking past it.
    Ignore,
    /// Fail with `InvalidChunkSize`.
    Abort,
}

impl Default for InvalidChunkSizePolicy {
    fn default() -> Self {
        InvalidChunkSizePolicy::Ignore
    }
}

/// What to do when the header's format word is not one of the three standard values.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub enum UnknownFileFormatPolicy {
    /// Accept it anyway.
    Ignore,
    /// Fail with `UnknownFileFormat`.
    Abort,
}

impl Default for UnknownFileFormatPolicy {
    fn default() -> Self {
        UnknownFileFormatPolicy::Abort
    }
}

/// Policies and registries that control how a `MidiFile` is decoded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReaderSettings {
    pub unexpected_track_chunks_count: UnexpectedTrackChunksCountPolicy,
    pub extra_track_chunk: ExtraTrackChunkPolicy,
    pub unknown_chunk_id: UnknownChunkIdPolicy,
    pub missed_end_of_track: MissedEndOfTrackPolicy,
    pub silent_note_on: SilentNoteOnPolicy,
    pub invalid_chunk_size: InvalidChunkSizePolicy,
    pub unknown_file_format: UnknownFileFormatPolicy,
    /// User-registered meta-event type bytes that should be decoded as `MetaEvent::Custom`
    /// rather than `MetaEvent::UnknownMeta`. Malformed registrants (`0xFF`, the meta escape
    /// byte itself is never a valid type byte) are silently ignored.
    pub custom_meta_event_types: CustomMetaEventTypes,
    /// User-registered 4-byte chunk identifiers that should be read rather than treated as
    /// unknown. Malformed registrants (identifiers that are not 4 ASCII bytes) are silently
    /// ignored.
    pub custom_chunk_types: CustomChunkTypes,
}

/// A registry of meta-event type bytes outside the standard set that a caller wants decoded as
/// `MetaEvent::Custom(type_byte, payload)` instead of `MetaEvent::UnknownMeta`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CustomMetaEventTypes {
    type_bytes: Vec<u8>,
}

impl CustomMetaEventTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type byte. Ignored if it collides with a standard type byte.
    pub fn register(&mut self, type_byte: u8) {
        if crate::file::meta_event::is_standard_type_byte(type_byte) {
            return;
        }
        if !self.type_bytes.contains(&type_byte) {
            self.type_bytes.push(type_byte);
        }
    }

    pub fn contains(&self, type_byte: u8) -> bool {
        self.type_bytes.contains(&type_byte)
    }
}

/// A registry of 4-byte chunk identifiers outside `"MThd"`/`"MTrk"` that a caller wants read
/// rather than skipped or treated as unknown.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CustomChunkTypes {
    ids: Vec<String>,
}

impl CustomChunkTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a 4-character chunk identifier. Ignored if it is not exactly 4 ASCII bytes.
    pub fn register<S: Into<String>>(&mut self, id: S) {
        let id = id.into();
        if id.len() == 4 && id.is_ascii() && !self.ids.contains(&id) {
            self.ids.push(id);
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|i| i == id)
    }
}

/// Independent compression flags controlling how a `MidiFile` is encoded.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub struct CompressionPolicy {
    /// Omit a channel event's status byte when it repeats the previous one.
    pub use_running_status: bool,
    /// Substitute a velocity-0 `NoteOn` for every `NoteOff` on the wire.
    pub note_off_as_silent_note_on: bool,
    /// Drop `UnknownMeta` events entirely.
    pub delete_unknown_meta_events: bool,
    /// Drop a leading default-valued `SetTempo` (500,000 microseconds/quarter).
    pub delete_default_set_tempo: bool,
    /// Drop a leading default-valued `KeySignature` (C major).
    pub delete_default_key_signature: bool,
    /// Drop a leading default-valued `TimeSignature` (4/4).
    pub delete_default_time_signature: bool,
}

impl Default for CompressionPolicy {
    fn default() -> Self {
        CompressionPolicy {
            use_running_status: false,
            note_off_as_silent_note_on: false,
            delete_unknown_meta_events: false,
            delete_default_set_tempo: false,
            delete_default_key_signature: false,
            delete_default_time_signature: false,
        }
    }
}

/// Policies that control how a `MidiFile` is encoded.
#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub struct WriterSettings {
    pub compression: CompressionPolicy,
}
