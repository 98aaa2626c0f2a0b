//! Note pairing: matching `NoteOn`/`NoteOff` timed events into `Note` values, and the two
//! note-level editing operations built on top of it.
//!
//! `NotePairing` is a lazy `Iterator` adapter. Pending note-ons are held in a slab with an
//! intrusive doubly-linked list threading them (and the other events interleaved with them) in
//! arrival order, so a note can be closed out of order - mid-list - in O(1) without shifting
//! anything else. Completed items only ever leave the list from the head, which is what lets the
//! adapter emit eagerly instead of buffering the whole track.

use crate::core::{Channel, Message, NoteNumber, Velocity};
use crate::file::projection::{self, TimedEvent};
use crate::file::{Event, Track};
use std::collections::{HashMap, VecDeque};

type NoteId = (Channel, NoteNumber);

/// A paired `NoteOn`/`NoteOff`: a note with a start time, a duration, and the two timed events it
/// was built from.
#[derive(Clone, Debug, PartialEq)]
pub struct Note {
    time: i64,
    length: i64,
    channel: Channel,
    note_number: NoteNumber,
    velocity: Velocity,
    off_velocity: Velocity,
    note_on: TimedEvent,
    note_off: TimedEvent,
}

impl Note {
    fn from_pair(note_on: TimedEvent, note_off: TimedEvent) -> Self {
        let (channel, note_number, velocity) = match note_on.event() {
            Event::Midi(Message::NoteOn(m)) => (m.channel, m.note_number, m.velocity),
            other => unreachable!("note-on slot held a non-NoteOn event: {:?}", other),
        };
        let off_velocity = match note_off.event() {
            Event::Midi(Message::NoteOff(m)) => m.velocity,
            other => unreachable!("note-off slot held a non-NoteOff event: {:?}", other),
        };
        let time = note_on.time();
        let length = note_off.time() - time;
        Note {
            time,
            length,
            channel,
            note_number,
            velocity,
            off_velocity,
            note_on,
            note_off,
        }
    }

    pub fn time(&self) -> i64 {
        self.time
    }

    pub fn length(&self) -> i64 {
        self.length
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn note_number(&self) -> NoteNumber {
        self.note_number
    }

    pub fn velocity(&self) -> Velocity {
        self.velocity
    }

    pub fn off_velocity(&self) -> Velocity {
        self.off_velocity
    }

    /// Move the note to a new start time, keeping its length. Both the underlying `NoteOn` and
    /// `NoteOff` timed events are re-stamped.
    pub fn set_time(&mut self, time: i64) {
        self.time = time;
        self.note_on = TimedEvent::new(self.note_on.event().clone(), time);
        self.note_off = TimedEvent::new(self.note_off.event().clone(), time + self.length);
    }

    /// Change the note's length. Negative lengths are clamped to `0`.
    pub fn set_length(&mut self, length: i64) {
        self.length = length.max(0);
        self.note_off = TimedEvent::new(self.note_off.event().clone(), self.time + self.length);
    }

    pub fn note_on(&self) -> &TimedEvent {
        &self.note_on
    }

    pub fn note_off(&self) -> &TimedEvent {
        &self.note_off
    }
}

/// One item yielded by `NotePairing`: either a fully paired note, or a non-note event (or, at end
/// of stream, an unmatched `NoteOn` with no closing `NoteOff`) passed through unchanged.
#[derive(Clone, Debug, PartialEq)]
pub enum PairingItem {
    Note(Note),
    Residual(TimedEvent),
}

enum Descriptor {
    Note {
        note_on: TimedEvent,
        note_off: Option<TimedEvent>,
    },
    Event(TimedEvent),
}

struct Slot {
    descriptor: Descriptor,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Lazily pairs `NoteOn`/`NoteOff` timed events pulled from `I`, yielding `PairingItem`s in the
/// order their notes (or passthrough events) close.
///
/// Same-channel, same-number note-ons nest LIFO: a `NoteOff` closes the most recently opened,
/// still-unclosed `NoteOn` for that `(channel, note_number)`. A `NoteOff` with nothing open for
/// its id is passed through as a residual, since there is no note to attach it to.
pub struct NotePairing<I: Iterator<Item = TimedEvent>> {
    inner: I,
    slab: Vec<Option<Slot>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    open: HashMap<NoteId, Vec<usize>>,
    emit_queue: VecDeque<PairingItem>,
    exhausted: bool,
}

impl<I: Iterator<Item = TimedEvent>> NotePairing<I> {
    pub fn new(inner: I) -> Self {
        Self {
            inner,
            slab: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            open: HashMap::new(),
            emit_queue: VecDeque::new(),
            exhausted: false,
        }
    }

    fn alloc(&mut self, descriptor: Descriptor) -> usize {
        let slot = Slot {
            descriptor,
            prev: self.tail,
            next: None,
        };
        let index = if let Some(reused) = self.free.pop() {
            self.slab[reused] = Some(slot);
            reused
        } else {
            self.slab.push(Some(slot));
            self.slab.len() - 1
        };
        if let Some(tail) = self.tail {
            self.slab[tail].as_mut().expect("tail slot is live").next = Some(index);
        } else {
            self.head = Some(index);
        }
        self.tail = Some(index);
        index
    }

    fn unlink(&mut self, index: usize) -> Descriptor {
        let slot = self.slab[index].take().expect("double remove of a note slot");
        match slot.prev {
            Some(prev) => self.slab[prev].as_mut().expect("prev slot is live").next = slot.next,
            None => self.head = slot.next,
        }
        match slot.next {
            Some(next) => self.slab[next].as_mut().expect("next slot is live").prev = slot.prev,
            None => self.tail = slot.prev,
        }
        self.free.push(index);
        slot.descriptor
    }

    /// Drain completed items off the head of the list: a plain passthrough event, or a note whose
    /// `NoteOff` has arrived. Stops at the first still-open note.
    fn drain_ready(&mut self) {
        while let Some(head) = self.head {
            let ready = match &self.slab[head].as_ref().expect("head slot is live").descriptor {
                Descriptor::Note { note_off, .. } => note_off.is_some(),
                Descriptor::Event(_) => true,
            };
            if !ready {
                break;
            }
            let descriptor = self.unlink(head);
            self.emit_queue.push_back(to_item(descriptor));
        }
    }

    /// Called once the source iterator is exhausted: flush everything still pending, including
    /// unmatched note-ons, in list order.
    fn flush(&mut self) {
        while let Some(head) = self.head {
            let descriptor = self.unlink(head);
            self.emit_queue.push_back(to_item(descriptor));
        }
    }

    /// Pull one event from the source and fold it into the pending list, queuing anything it
    /// completes. Returns `false` once the source is exhausted.
    fn pull(&mut self) -> bool {
        let timed = match self.inner.next() {
            Some(timed) => timed,
            None => return false,
        };

        let open_key = match timed.event() {
            Event::Midi(Message::NoteOn(m)) => Some((true, (m.channel, m.note_number))),
            Event::Midi(Message::NoteOff(m)) => Some((false, (m.channel, m.note_number))),
            _ => None,
        };

        match open_key {
            Some((true, id)) => {
                let index = self.alloc(Descriptor::Note {
                    note_on: timed,
                    note_off: None,
                });
                self.open.entry(id).or_default().push(index);
            }
            Some((false, id)) => {
                let handle = self.open.get_mut(&id).and_then(Vec::pop);
                match handle {
                    Some(index) => {
                        if let Some(Slot {
                            descriptor: Descriptor::Note { note_off, .. },
                            ..
                        }) = self.slab[index].as_mut()
                        {
                            *note_off = Some(timed);
                        }
                        if self.head == Some(index) {
                            self.drain_ready();
                        }
                    }
                    None => self.pass_through(timed),
                }
            }
            None => self.pass_through(timed),
        }
        true
    }

    fn pass_through(&mut self, timed: TimedEvent) {
        if self.head.is_none() {
            self.emit_queue.push_back(PairingItem::Residual(timed));
        } else {
            self.alloc(Descriptor::Event(timed));
        }
    }
}

fn to_item(descriptor: Descriptor) -> PairingItem {
    match descriptor {
        Descriptor::Note {
            note_on,
            note_off: Some(note_off),
        } => PairingItem::Note(Note::from_pair(note_on, note_off)),
        // only reached while flushing at end of stream: an unmatched note-on passes through bare.
        Descriptor::Note {
            note_on,
            note_off: None,
        } => PairingItem::Residual(note_on),
        Descriptor::Event(timed) => PairingItem::Residual(timed),
    }
}

impl<I: Iterator<Item = TimedEvent>> Iterator for NotePairing<I> {
    type Item = PairingItem;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.emit_queue.pop_front() {
                return Some(item);
            }
            if self.exhausted {
                return None;
            }
            if !self.pull() {
                self.flush();
                self.exhausted = true;
            }
        }
    }
}

/// The result of a `process_notes` pass: which aspects of the note set, if any, actually changed.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ProcessNotesResult {
    times_changed: bool,
    lengths_changed: bool,
}

impl ProcessNotesResult {
    pub fn times_changed(&self) -> bool {
        self.times_changed
    }

    pub fn lengths_changed(&self) -> bool {
        self.lengths_changed
    }

    pub fn changed(&self) -> bool {
        self.times_changed || self.lengths_changed
    }
}

/// Pair every note in `track`, let `action` edit each one, and write the result back if anything
/// moved. Non-note events are left untouched. The track is only rebuilt (re-sorted into
/// delta-time order) if a note's time or length actually changed.
pub(crate) fn process_notes<F: FnMut(&mut Note)>(
    track: &mut Track,
    mut action: F,
) -> ProcessNotesResult {
    let snapshot: Vec<_> = track.events().cloned().collect();
    let timed = projection::project(&snapshot);
    let items: Vec<PairingItem> = NotePairing::new(timed.into_iter()).collect();

    let mut result = ProcessNotesResult::default();
    let mut rebuilt = Vec::with_capacity(items.len() + 1);

    for item in items {
        match item {
            PairingItem::Note(mut note) => {
                let (time_before, length_before) = (note.time(), note.length());
                action(&mut note);
                result.times_changed |= note.time() != time_before;
                result.lengths_changed |= note.length() != length_before;
                rebuilt.push(note.note_on);
                rebuilt.push(note.note_off);
            }
            PairingItem::Residual(timed_event) => rebuilt.push(timed_event),
        }
    }

    if result.changed() {
        track.replace_events(projection::unproject(rebuilt));
    }
    result
}

/// Pair every note in `track` and drop every one `predicate` accepts (both its `NoteOn` and its
/// `NoteOff`). Returns the number of notes removed.
pub(crate) fn remove_notes<F: FnMut(&Note) -> bool>(track: &mut Track, mut predicate: F) -> usize {
    let snapshot: Vec<_> = track.events().cloned().collect();
    let timed = projection::project(&snapshot);
    let items: Vec<PairingItem> = NotePairing::new(timed.into_iter()).collect();

    let mut removed = 0usize;
    let mut rebuilt = Vec::with_capacity(items.len());

    for item in items {
        match item {
            PairingItem::Note(note) => {
                if predicate(&note) {
                    removed += 1;
                } else {
                    rebuilt.push(note.note_on);
                    rebuilt.push(note.note_off);
                }
            }
            PairingItem::Residual(timed_event) => rebuilt.push(timed_event),
        }
    }

    if removed > 0 {
        track.replace_events(projection::unproject(rebuilt));
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{NoteMessage, Velocity};
    use crate::file::Event as FileEvent;

    fn on(channel: u8, number: u8) -> FileEvent {
        FileEvent::Midi(Message::NoteOn(NoteMessage {
            channel: Channel::new(channel),
            note_number: NoteNumber::new(number),
            velocity: Velocity::new(100),
        }))
    }

    fn off(channel: u8, number: u8) -> FileEvent {
        FileEvent::Midi(Message::NoteOff(NoteMessage {
            channel: Channel::new(channel),
            note_number: NoteNumber::new(number),
            velocity: Velocity::new(0),
        }))
    }

    fn build_track(events: Vec<(u32, FileEvent)>) -> Track {
        let mut track = Track::default();
        for (delta, event) in events {
            track.push_event(delta, event).unwrap();
        }
        track
    }

    #[test]
    fn pairs_a_simple_note() {
        let track = build_track(vec![(0, on(0, 60)), (96, off(0, 60))]);
        let snapshot: Vec<_> = track.events().cloned().collect();
        let items: Vec<PairingItem> =
            NotePairing::new(projection::project(&snapshot).into_iter()).collect();
        assert_eq!(1, items.len());
        match &items[0] {
            PairingItem::Note(note) => {
                assert_eq!(0, note.time());
                assert_eq!(96, note.length());
                assert_eq!(60, note.note_number().get());
            }
            other => panic!("expected a note, got {:?}", other),
        }
    }

    #[test]
    fn overlapping_same_pitch_notes_nest_lifo() {
        // two overlapping note-ons for the same (channel, number); the note-offs close the most
        // recently opened one first.
        let track = build_track(vec![
            (0, on(0, 60)),
            (10, on(0, 60)),
            (10, off(0, 60)),
            (10, off(0, 60)),
        ]);
        let snapshot: Vec<_> = track.events().cloned().collect();
        let items: Vec<PairingItem> =
            NotePairing::new(projection::project(&snapshot).into_iter()).collect();
        let notes: Vec<&Note> = items
            .iter()
            .filter_map(|i| match i {
                PairingItem::Note(n) => Some(n),
                _ => None,
            })
            .collect();
        assert_eq!(2, notes.len());
        // emission is head-first: the outer note-on (opened at time 0) sits at the head of the
        // list until it closes, so it is emitted first even though the inner note closes sooner.
        assert_eq!(0, notes[0].time());
        assert_eq!(30, notes[0].length());
        // the inner note-on (opened at time 10) is closed first, by the note-off at time 20, but
        // only emitted once it reaches the head behind the outer note.
        assert_eq!(10, notes[1].time());
        assert_eq!(10, notes[1].length());
    }

    #[test]
    fn unmatched_note_on_flushes_as_a_residual() {
        let track = build_track(vec![(0, on(0, 60))]);
        let snapshot: Vec<_> = track.events().cloned().collect();
        let items: Vec<PairingItem> =
            NotePairing::new(projection::project(&snapshot).into_iter()).collect();
        assert_eq!(1, items.len());
        assert!(matches!(items[0], PairingItem::Residual(_)));
    }

    #[test]
    fn unmatched_note_off_passes_through_immediately() {
        let track = build_track(vec![(0, off(0, 60)), (10, on(0, 64))]);
        let snapshot: Vec<_> = track.events().cloned().collect();
        let items: Vec<PairingItem> =
            NotePairing::new(projection::project(&snapshot).into_iter()).collect();
        assert_eq!(2, items.len());
        assert!(matches!(items[0], PairingItem::Residual(_)));
    }

    #[test]
    fn process_notes_transposes_and_rebuilds_delta_times() {
        let mut track = build_track(vec![(0, on(0, 60)), (96, off(0, 60))]);
        let result = track.process_notes(|note| {
            let shifted = note.time() + 10;
            note.set_time(shifted);
        });
        assert!(result.times_changed());
        assert!(!result.lengths_changed());

        let snapshot: Vec<_> = track.events().cloned().collect();
        let timed = projection::project(&snapshot);
        assert_eq!(10, timed[0].time());
        assert_eq!(106, timed[1].time());
    }

    #[test]
    fn process_notes_is_a_no_op_when_nothing_changes() {
        let mut track = build_track(vec![(0, on(0, 60)), (96, off(0, 60))]);
        let before: Vec<_> = track.events().cloned().collect();
        let result = track.process_notes(|_note| {});
        assert!(!result.changed());
        let after: Vec<_> = track.events().cloned().collect();
        assert_eq!(before, after);
    }

    #[test]
    fn remove_notes_drops_both_constituent_events() {
        let mut track = build_track(vec![
            (0, on(0, 60)),
            (10, on(0, 67)),
            (86, off(0, 60)),
            (0, off(0, 67)),
        ]);
        let removed = track.remove_notes(|note| note.note_number().get() == 60);
        assert_eq!(1, removed);
        let remaining: Vec<NoteNumber> = track
            .events()
            .filter_map(|e| match e.event() {
                FileEvent::Midi(Message::NoteOn(m)) => Some(m.note_number),
                FileEvent::Midi(Message::NoteOff(m)) => Some(m.note_number),
                _ => None,
            })
            .collect();
        assert!(remaining.iter().all(|n| n.get() == 67));
        assert_eq!(2, remaining.len());
    }
}
