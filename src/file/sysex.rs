use crate::byte_iter::ByteIter;
use crate::constants::{FILE_SYSEX_F0, FILE_SYSEX_F7};
use crate::error::LibResult;
use crate::scribe::Scribe;
use crate::vlq::Vlq;
use snafu::ResultExt;
use std::convert::TryFrom;
use std::io::{Read, Write};

/// A system-exclusive event: `NormalSysEx` (`F0`) or `EscapeSysEx` (`F7`), carrying a raw,
/// VLQ-length-prefixed payload whose meaning is manufacturer-defined.
#[derive(Clone, Debug, Default, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub struct SysexEvent {
    t: SysexEventType,
    data: Vec<u8>,
}

impl SysexEvent {
    pub fn new(t: SysexEventType, data: Vec<u8>) -> Self {
        Self { t, data }
    }

    pub fn event_type(&self) -> SysexEventType {
        self.t
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// `first_byte` is `0xF0` or `0xF7`, already peeked (not yet consumed) by the caller.
    pub(crate) fn parse<R: Read>(first_byte: u8, iter: &mut ByteIter<R>) -> LibResult<Self> {
        let t = match first_byte {
            FILE_SYSEX_F0 => SysexEventType::F0,
            FILE_SYSEX_F7 => SysexEventType::F7,
            _ => {
                invalid_file!("{:#04X} is not a sysex marker byte", first_byte)
            }
        };
        // consume the marker byte
        iter.read_expect(first_byte).context(io!())?;
        let length = iter.read_vlq_u32().context(io!())?;
        let data = iter.read_n(length as usize).context(io!())?;
        Ok(Self { t, data })
    }

    pub(crate) fn write<W: Write>(&self, w: &mut Scribe<W>) -> LibResult<()> {
        write_u8!(w, self.t as u8).context(wr!())?;
        let size_u32 = u32::try_from(self.data.len()).context(crate::error::TrackTooLong {
            site: site!(),
            len: self.data.len(),
        })?;
        w.write_all(&Vlq::new(size_u32).to_bytes()).context(wr!())?;
        w.write_all(&self.data).context(wr!())?;
        Ok(())
    }
}

/// `<sysex event>` is used to specify a MIDI system exclusive message, either as one unit or in
/// packets, or as an "escape" to specify any arbitrary bytes to be transmitted. See Appendix 1 -
/// MIDI Messages. A normal complete system exclusive message is stored in a MIDI File in this way:
#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, Hash, Default)]
pub enum SysexEventType {
    /// F0 `<length>` `<bytes to be transmitted after F0>`
    ///
    /// The length is stored as a variable-length quantity. It specifies the number of bytes which
    /// follow it, not including the F0 or the length itself. For instance, the transmitted message
    /// `F0 43 12 00 07 F7` would be stored in a MIDI File as `F0 05 43 12 00 07 F7`. It is required
    /// to include the `F7` at the end so that the reader of the MIDI File knows that it has read
    /// the entire message.
    #[default]
    F0 = 0xf0,

    /// F7 <length> <all bytes to be transmitted>
    ///
    /// Unfortunately, some synthesiser manufacturers specify that their system exclusive messages
    /// are to be transmitted as little packets. The F0 and F7 sysex events may be used together to
    /// break up syntactically complete system exclusive messages into timed packets.
    F7 = 0xf7,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_normal_sysex() {
        let bytes = [0xf0u8, 0x03, 0x43, 0x12, 0xf7];
        let cursor = std::io::Cursor::new(Vec::from(bytes));
        let mut iter = ByteIter::new(std::io::Read::bytes(cursor)).unwrap();
        let e = SysexEvent::parse(0xf0, &mut iter).unwrap();
        assert!(matches!(e.event_type(), SysexEventType::F0));
        assert_eq!(&[0x43, 0x12, 0xf7], e.data());
    }
}
