mod utils;

use midi_smf::core::{
    Channel, Clocks, DurationName, Message, NoteMessage, NoteNumber, PitchBend, PitchBendValue,
    Velocity,
};
use midi_smf::file::{Division, Event, Format, MetaEvent, QuarterNoteDivision, QuartersPerMinute};
use midi_smf::MidiFile;
use tempfile::tempdir;
use utils::enable_logging;

fn build_sample() -> MidiFile {
    let mut file = MidiFile::new(Format::Multi, Division::QuarterNote(QuarterNoteDivision::new(480)));

    let tempo_track_ix = file.push_track();

    let tempo_track = file.track_mut(tempo_track_ix).unwrap();
    tempo_track.set_name("conductor").unwrap();
    tempo_track
        .push_time_signature(0, 4, DurationName::Quarter, Clocks::Quarter)
        .unwrap();
    tempo_track
        .push_tempo(0, QuartersPerMinute::new(120))
        .unwrap();

    let melody_track_ix = file.push_track();

    let melody_track = file.track_mut(melody_track_ix).unwrap();
    melody_track.set_name("melody").unwrap();
    melody_track
        .push_note_on(0, Channel::new(0), NoteNumber::new(60), Velocity::new(80))
        .unwrap();
    melody_track
        .push_note_off(480, Channel::new(0), NoteNumber::new(60), Velocity::new(0))
        .unwrap();
    melody_track
        .push_note_on(0, Channel::new(0), NoteNumber::new(64), Velocity::new(80))
        .unwrap();
    melody_track
        .push_note_off(480, Channel::new(0), NoteNumber::new(64), Velocity::new(0))
        .unwrap();

    file
}

#[test]
fn sample_file_has_the_expected_structure() {
    enable_logging();
    let file = build_sample();

    assert_eq!(Format::Multi, *file.header().format());
    assert_eq!(
        Division::QuarterNote(QuarterNoteDivision::new(480)),
        *file.header().division()
    );
    assert_eq!(2, file.tracks_len());

    let conductor = file.track(0).unwrap();
    assert_eq!(3, conductor.events_len());
    let mut events = conductor.events();

    let track_event = events.next().unwrap();
    assert!(matches!(
        track_event.event(),
        Event::Meta(MetaEvent::TrackName(_))
    ));

    let track_event = events.next().unwrap();
    match track_event.event() {
        Event::Meta(MetaEvent::TimeSignature(ts)) => {
            assert_eq!(4, ts.numerator());
            assert_eq!(DurationName::Quarter, ts.denominator());
            assert_eq!(Clocks::Quarter, ts.click());
        }
        other => panic!("wrong variant, got {:?}", other),
    }

    let track_event = events.next().unwrap();
    assert!(matches!(
        track_event.event(),
        Event::Meta(MetaEvent::SetTempo(_))
    ));

    let melody = file.track(1).unwrap();
    assert_eq!(5, melody.events_len());
}

#[test]
fn writing_and_reading_back_preserves_the_file() {
    enable_logging();
    let file = build_sample();

    let mut bytes = Vec::new();
    file.write(&mut bytes).unwrap();
    let read_back = MidiFile::read(bytes.as_slice()).unwrap();

    assert_eq!(file.tracks_len(), read_back.tracks_len());
    for (original, reloaded) in file.tracks().zip(read_back.tracks()) {
        assert_eq!(original.events_len(), reloaded.events_len());
    }
}

#[test]
fn saving_and_loading_from_disk_round_trips() {
    enable_logging();
    let file = build_sample();

    let dir = tempdir().unwrap();
    let path = dir.path().join("sample.mid");
    file.save(&path).unwrap();
    let loaded = MidiFile::load(&path).unwrap();

    assert_eq!(file.tracks_len(), loaded.tracks_len());
    assert_eq!(*file.header(), *loaded.header());
}

#[test]
fn pitch_bend_round_trips_through_a_file() {
    enable_logging();
    let mut file = MidiFile::new(Format::Single, Division::default());
    let track_ix = file.push_track();

    let track = file.track_mut(track_ix).unwrap();
    for value in [0u16, 4096, 8192, 12288, 16383] {
        track
            .push_pitch_bend(10, Channel::new(0), PitchBend::new(value))
            .unwrap();
    }

    let mut bytes = Vec::new();
    file.write(&mut bytes).unwrap();
    let read_back = MidiFile::read(bytes.as_slice()).unwrap();
    let track = read_back.track(0).unwrap();

    let values: Vec<u16> = track
        .events()
        .filter_map(|e| match e.event() {
            Event::Midi(Message::PitchBend(PitchBendValue { value, .. })) => Some(value.get()),
            _ => None,
        })
        .collect();
    assert_eq!(vec![0, 4096, 8192, 12288, 16383], values);
}

#[test]
fn process_notes_shifts_every_note_later() {
    enable_logging();
    let mut file = build_sample();
    let melody = file.track_mut(1).unwrap();

    let result = melody.process_notes(|note| {
        note.set_time(note.time() + 100);
    });
    assert!(result.times_changed());
    assert!(!result.lengths_changed());

    let note_ons: Vec<&NoteMessage> = melody
        .events()
        .filter_map(|e| match e.event() {
            Event::Midi(Message::NoteOn(n)) => Some(n),
            _ => None,
        })
        .collect();
    assert_eq!(2, note_ons.len());
}

#[test]
fn remove_notes_drops_a_matching_pitch() {
    enable_logging();
    let mut file = build_sample();
    let melody = file.track_mut(1).unwrap();

    let removed = melody.remove_notes(|note| note.note_number().get() == 64);
    assert_eq!(1, removed);

    let remaining_pitches: Vec<u8> = melody
        .events()
        .filter_map(|e| match e.event() {
            Event::Midi(Message::NoteOn(n)) => Some(n.note_number.get()),
            _ => None,
        })
        .collect();
    assert_eq!(vec![60], remaining_pitches);
}
