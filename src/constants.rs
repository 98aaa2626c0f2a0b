/// To extract the channel number from a status byte. The right most (least-significant?) four bits
/// of a status byte represent the channel number.
pub(crate) const STATUS_CHANNEL_MASK: u8 = 0b0000_1111;

/// Message type mask. The left most (most-significant?) four bits of a status byte message
/// represent the message type.
pub(crate) const STATUS_TYPE_MASK: u8 = 0b1111_0000;

/// `0xFF`: File Spec: All meta-events begin with FF, then have an event type byte (which is always
/// less than 128)
pub(crate) const FILE_META_EVENT: u8 = 0xFF;

/// `0xF0`: File Spec: `F0 <length> <bytes to be transmitted after F0>`
pub(crate) const FILE_SYSEX_F0: u8 = 0xF0;

/// `0xF7`: File Spec: `F7 <length> <all bytes to be transmitted>`
pub(crate) const FILE_SYSEX_F7: u8 = 0xF7;
