//! TLV packet framing: locating the `0x7F` sync byte and slicing out one packet's payload.
//!
//! The TLV layer is the outermost carrier of the multiplex.  Input may be arbitrarily corrupted
//! (satellite reception), so when framing fails the only recovery is to advance one byte and try
//! again; [`TlvFramer::try_consume`](struct.TlvFramer.html#method.try_consume) reports that to
//! the caller as [`FrameOutcome::Resync`](enum.FrameOutcome.html).

use crate::bytes::ByteReader;

/// The value `0x7F`, which must appear in the first byte of every TLV packet.
pub const SYNC_BYTE: u8 = 0x7F;

/// Fixed size of the TLV header preceding the payload; 4 bytes.
pub const HEADER_SIZE: usize = 4;

/// The kinds of payload a TLV packet may carry.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TlvPacketType {
    /// `0x01` - an uncompressed IPv6 packet (NTP time data arrives this way)
    Ipv6Packet,
    /// `0x02` - an IPv4/IPv6 packet with its headers compressed out; carries MMTP
    HeaderCompressedIpPacket,
    /// `0x03` - transmission control signal (TLV-NIT, AMT)
    TransmissionControlSignalPacket,
    /// `0x04` and `0xFD..=0xFF` - accepted by the framer, ignored by the demultiplexer
    Reserved(u8),
}
impl TlvPacketType {
    /// `true` iff the value is one the framer accepts as the second header byte.
    pub fn is_valid(val: u8) -> bool {
        val <= 0x04 || val >= 0xFD
    }

    fn from(val: u8) -> TlvPacketType {
        match val {
            0x01 => TlvPacketType::Ipv6Packet,
            0x02 => TlvPacketType::HeaderCompressedIpPacket,
            0x03 => TlvPacketType::TransmissionControlSignalPacket,
            _ => TlvPacketType::Reserved(val),
        }
    }
}

/// One whole TLV packet, sliced out of the input buffer.
#[derive(Debug)]
pub struct TlvPacket<'buf> {
    packet_type: TlvPacketType,
    payload: &'buf [u8],
}
impl<'buf> TlvPacket<'buf> {
    pub fn packet_type(&self) -> TlvPacketType {
        self.packet_type
    }
    pub fn payload(&self) -> &'buf [u8] {
        self.payload
    }
}

/// Result of one framing attempt.
#[derive(Debug)]
pub enum FrameOutcome<'buf> {
    /// a complete packet was consumed from the reader
    Packet(TlvPacket<'buf>),
    /// the buffer ends before the packet does; nothing was consumed
    NeedMoreBytes,
    /// the bytes at the cursor are not a valid TLV header; one byte was consumed
    Resync,
}

/// Locates TLV packets within a byte stream.
///
/// Stateless; all framing state lives in the caller's `ByteReader` position.
pub struct TlvFramer;
impl TlvFramer {
    /// Attempt to frame one TLV packet at the reader's current position.
    ///
    /// On `NeedMoreBytes` the reader is left untouched so the caller can retry with the same
    /// bytes plus more.  On `Resync` exactly one byte has been consumed.
    pub fn try_consume<'buf>(reader: &mut ByteReader<'buf>) -> FrameOutcome<'buf> {
        if reader.remaining() < HEADER_SIZE {
            return FrameOutcome::NeedMoreBytes;
        }
        // infallible: remaining() checked above
        let sync = reader.peek_at(0).unwrap();
        let ptype = reader.peek_at(1).unwrap();
        if sync != SYNC_BYTE || !TlvPacketType::is_valid(ptype) {
            reader.skip(1).unwrap();
            return FrameOutcome::Resync;
        }
        let data_length =
            (usize::from(reader.peek_at(2).unwrap()) << 8) | usize::from(reader.peek_at(3).unwrap());
        if reader.remaining() < HEADER_SIZE + data_length {
            return FrameOutcome::NeedMoreBytes;
        }
        reader.skip(HEADER_SIZE).unwrap();
        let payload = reader.read_slice(data_length).unwrap();
        FrameOutcome::Packet(TlvPacket {
            packet_type: TlvPacketType::from(ptype),
            payload,
        })
    }
}
