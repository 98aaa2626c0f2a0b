mod utils;

use midi_smf::core::{Channel, Clocks, DurationName, NoteNumber, PitchBend, Velocity};
use midi_smf::file::{
    CompressionPolicy, Division, Format, QuarterNoteDivision, QuartersPerMinute, WriterSettings,
};
use midi_smf::MidiFile;
use std::fmt::{Debug, Display, Formatter};
use tempfile::TempDir;
use utils::enable_logging;

type RtResult = std::result::Result<(), RtErr>;

enum RtErr {
    Length(WrongLength),
    NotEqual(String),
}

impl Display for RtErr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RtErr::Length(x) => Display::fmt(x, f),
            RtErr::NotEqual(x) => write!(
                f,
                "re-saving a freshly loaded file did not reproduce the same bytes, fixture: {}",
                x
            ),
        }
    }
}

macro_rules! impldebug {
    ($symbol:ident) => {
        impl Debug for $symbol {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                Display::fmt(self, f)
            }
        }
    };
}

impldebug!(RtErr);

struct WrongLength {
    fixture: String,
    expected: usize,
    actual: usize,
}

impl Display for WrongLength {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "round trip test error, expected {} bytes, got {} bytes, fixture: {}",
            self.expected, self.actual, self.fixture
        )
    }
}

impldebug!(WrongLength);

/// Asserts that a `MidiFile` built in memory survives save-to-disk, load, and re-save with
/// exactly the same bytes and structure, under the given writer settings.
fn round_trip_test<S: AsRef<str>>(
    fixture: S,
    file: &MidiFile,
    settings: &WriterSettings,
) -> RtResult {
    enable_logging();
    let td = TempDir::new().unwrap();
    let first_path = td.path().join("first.mid");
    let second_path = td.path().join("second.mid");

    file.save_with_settings(&first_path, settings).unwrap();
    let reloaded = MidiFile::load(&first_path).unwrap();
    reloaded.save_with_settings(&second_path, settings).unwrap();

    let first_bytes = std::fs::read(&first_path).unwrap();
    let second_bytes = std::fs::read(&second_path).unwrap();

    if first_bytes.len() != second_bytes.len() {
        return Err(RtErr::Length(WrongLength {
            fixture: fixture.as_ref().into(),
            expected: first_bytes.len(),
            actual: second_bytes.len(),
        }));
    }
    if first_bytes != second_bytes {
        return Err(RtErr::NotEqual(fixture.as_ref().into()));
    }
    if *file != reloaded {
        return Err(RtErr::NotEqual(fixture.as_ref().into()));
    }
    Ok(())
}

fn single_note_file() -> MidiFile {
    let mut file = MidiFile::new(Format::Single, Division::default());
    let track_ix = file.push_track();

    let track = file.track_mut(track_ix).unwrap();
    track.set_name("single note").unwrap();
    track
        .push_note_on(0, Channel::new(0), NoteNumber::new(60), Velocity::new(100))
        .unwrap();
    track
        .push_note_off(480, Channel::new(0), NoteNumber::new(60), Velocity::new(0))
        .unwrap();
    file
}

fn multi_track_file() -> MidiFile {
    let mut file = MidiFile::new(
        Format::Multi,
        Division::QuarterNote(QuarterNoteDivision::new(960)),
    );
    let conductor_ix = file.push_track();

    let conductor = file.track_mut(conductor_ix).unwrap();
    conductor
        .push_time_signature(0, 3, DurationName::Quarter, Clocks::Quarter)
        .unwrap();
    conductor
        .push_tempo(0, QuartersPerMinute::new(90))
        .unwrap();

    let melody_ix = file.push_track();

    let melody = file.track_mut(melody_ix).unwrap();
    for (number, duration) in [(60u8, 240u32), (62, 240), (64, 240), (65, 240)] {
        melody
            .push_note_on(0, Channel::new(0), NoteNumber::new(number), Velocity::new(90))
            .unwrap();
        melody
            .push_note_off(
                duration,
                Channel::new(0),
                NoteNumber::new(number),
                Velocity::new(0),
            )
            .unwrap();
    }

    let pitch_bend_ix = file.push_track();

    let pitch_bend = file.track_mut(pitch_bend_ix).unwrap();
    pitch_bend
        .push_pitch_bend(0, Channel::new(1), PitchBend::new(10000))
        .unwrap();

    file
}

#[test]
fn single_note_default_settings() {
    let settings = WriterSettings::default();
    round_trip_test("single_note_default_settings", &single_note_file(), &settings).unwrap();
}

#[test]
fn single_note_with_running_status() {
    let settings = WriterSettings {
        compression: CompressionPolicy {
            use_running_status: true,
            ..CompressionPolicy::default()
        },
    };
    round_trip_test("single_note_with_running_status", &single_note_file(), &settings).unwrap();
}

#[test]
fn multi_track_default_settings() {
    let settings = WriterSettings::default();
    round_trip_test("multi_track_default_settings", &multi_track_file(), &settings).unwrap();
}

#[test]
fn multi_track_with_full_compression() {
    let settings = WriterSettings {
        compression: CompressionPolicy {
            use_running_status: true,
            note_off_as_silent_note_on: true,
            delete_default_set_tempo: true,
            delete_default_key_signature: true,
            delete_default_time_signature: true,
            delete_unknown_meta_events: true,
        },
    };
    round_trip_test("multi_track_with_full_compression", &multi_track_file(), &settings).unwrap();
}

/// Asserts that a deliberately malformed byte stream fails to load.
fn bad_bytes_test(bytes: &[u8]) {
    enable_logging();
    assert!(MidiFile::read(bytes).is_err());
}

#[test]
fn truncated_header_is_rejected() {
    bad_bytes_test(b"MThd\x00\x00\x00\x06\x00\x00");
}

#[test]
fn garbage_bytes_are_rejected() {
    bad_bytes_test(b"not a midi file at all");
}
