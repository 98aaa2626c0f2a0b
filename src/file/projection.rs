//! Timed-event projection: converting a track's delta-time-encoded events to and from absolute
//! time, the representation the note-pairing engine and most editing operations want to work in.

use crate::file::{Event, TrackEvent};

/// An event paired with its absolute time (the running sum of every preceding delta-time in the
/// track), rather than the time relative to its predecessor.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TimedEvent {
    event: Event,
    time: i64,
}

impl TimedEvent {
    pub fn new(event: Event, time: i64) -> Self {
        Self { event, time }
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn into_event(self) -> Event {
        self.event
    }

    pub fn time(&self) -> i64 {
        self.time
    }
}

/// Forward projection: sum delta-times into absolute times, in the order the events appear.
pub fn project(events: &[TrackEvent]) -> Vec<TimedEvent> {
    let mut time: i64 = 0;
    events
        .iter()
        .map(|te| {
            time += i64::from(te.delta_time());
            TimedEvent::new(te.event().clone(), time)
        })
        .collect()
}

/// Inverse projection: stable sort by absolute time, then recompute each delta-time as the gap
/// from its new predecessor (the first event's delta-time is always `0`).
///
/// A stable sort preserves the input order among events sharing the same absolute time, which
/// matters for running status and for events a caller depends on staying adjacent (e.g. a
/// `NoteOff` immediately followed by the next `NoteOn` on the same tick).
pub fn unproject(mut timed: Vec<TimedEvent>) -> Vec<TrackEvent> {
    timed.sort_by_key(|t| t.time);
    let mut previous: i64 = 0;
    timed
        .into_iter()
        .map(|t| {
            let delta_time = (t.time - previous).max(0) as u32;
            previous = t.time;
            TrackEvent::new(delta_time, t.event)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Channel, Message, NoteMessage, NoteNumber, Velocity};

    fn note_event(number: u8) -> Event {
        Event::Midi(Message::NoteOn(NoteMessage {
            channel: Channel::new(0),
            note_number: NoteNumber::new(number),
            velocity: Velocity::new(80),
        }))
    }

    #[test]
    fn project_accumulates_delta_times() {
        let events = vec![
            TrackEvent::new(0, note_event(60)),
            TrackEvent::new(10, note_event(62)),
            TrackEvent::new(5, note_event(64)),
        ];
        let timed = project(&events);
        let times: Vec<i64> = timed.iter().map(TimedEvent::time).collect();
        assert_eq!(vec![0, 10, 15], times);
    }

    #[test]
    fn unproject_is_the_inverse_of_project() {
        let events = vec![
            TrackEvent::new(0, note_event(60)),
            TrackEvent::new(10, note_event(62)),
            TrackEvent::new(5, note_event(64)),
        ];
        let timed = project(&events);
        let back = unproject(timed);
        assert_eq!(events, back);
    }

    #[test]
    fn unproject_sorts_out_of_order_times_stably() {
        let timed = vec![
            TimedEvent::new(note_event(64), 15),
            TimedEvent::new(note_event(60), 0),
            TimedEvent::new(note_event(62), 10),
        ];
        let events = unproject(timed);
        let deltas: Vec<u32> = events.iter().map(TrackEvent::delta_time).collect();
        assert_eq!(vec![0, 10, 5], deltas);
    }
}
