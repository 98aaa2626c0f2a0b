/*!
The `core` module is for types and concepts that are *not* strictly related to MIDI *files*.
These types and concepts could be used for realtime MIDI as well.
!*/

mod bits;
mod clocks;
mod duration_name;
mod message;
mod numbers;
mod status_type;

pub use bits::{decode_14_bit_number, encode_14_bit_number};
pub use clocks::Clocks;
pub use duration_name::DurationName;
pub use message::{
    ChannelPressureValue, ControlChangeValue, Message, NoteMessage, PitchBendValue,
    ProgramChangeValue,
};
pub use numbers::{Channel, ControlValue, NoteNumber, PitchBend, Program, U7, Velocity};
pub use status_type::StatusType;
