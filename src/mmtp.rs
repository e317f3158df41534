//! MMTP packet parsing, including extension headers and payload descrambling.
//!
//! An MMTP packet arrives inside a header-compressed-IP TLV packet.  If the multi-type extension
//! header announces scrambling, the payload is decrypted here through the
//! [`Descrambler`](../cas/struct.Descrambler.html) before anything downstream sees it; until the
//! conditional-access device has produced key material, scrambled packets surface as
//! [`MmtpError::ScramblerNotReady`](enum.MmtpError.html#variant.ScramblerNotReady) and carry no
//! payload.

use crate::bytes::{ByteReader, ReadError};
use crate::cas::{Descrambler, KeyParity};
use crate::PacketId;
use log::warn;
use std::borrow::Cow;

/// Multi-type extension header item type for the scrambling-control item.
const EXT_ITEM_SCRAMBLING: u16 = 0x0001;

/// What an MMTP packet's payload contains.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PayloadType {
    /// `0x00` - a Media Processing Unit, or a fragment of one
    Mpu,
    /// `0x02` - one or more signalling messages
    ContainsOneOrMoreControlMessage,
    /// any other value; not processed by this crate
    Other(u8),
}
impl PayloadType {
    fn from(val: u8) -> PayloadType {
        match val {
            0x00 => PayloadType::Mpu,
            0x02 => PayloadType::ContainsOneOrMoreControlMessage,
            _ => PayloadType::Other(val),
        }
    }
}

/// Value of the scrambling-control extension's encryption flag.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum EncryptionFlag {
    Unscrambled,
    Reserved,
    Even,
    Odd,
}
impl EncryptionFlag {
    fn from(val: u8) -> EncryptionFlag {
        match val {
            0 => EncryptionFlag::Unscrambled,
            1 => EncryptionFlag::Reserved,
            2 => EncryptionFlag::Even,
            3 => EncryptionFlag::Odd,
            _ => panic!("invalid 2-bit value {}", val),
        }
    }
}

/// Problems decoding an MMTP packet.
#[derive(Debug, PartialEq, Eq)]
pub enum MmtpError {
    Read(ReadError),
    /// the payload is scrambled and no ECM has been decrypted yet; retry after key delivery
    ScramblerNotReady,
}
impl From<ReadError> for MmtpError {
    fn from(e: ReadError) -> MmtpError {
        MmtpError::Read(e)
    }
}

/// A decoded MMTP packet.  The payload is borrowed from the input buffer unless descrambling
/// forced a copy.
#[derive(Debug)]
pub struct MmtpPacket<'buf> {
    pub version: u8,
    pub fec_type: u8,
    pub rap_flag: bool,
    pub payload_type: PayloadType,
    pub packet_id: PacketId,
    pub delivery_timestamp: u32,
    pub packet_sequence_number: u32,
    pub packet_counter: Option<u32>,
    pub scrambling: Option<EncryptionFlag>,
    payload: Cow<'buf, [u8]>,
}
impl<'buf> MmtpPacket<'buf> {
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

/// Parses MMTP packets, descrambling payloads where the extension headers call for it.
pub struct MmtpDecoder;
impl MmtpDecoder {
    /// Decode one MMTP packet from the remainder of `reader`.
    pub fn decode<'buf>(
        reader: &mut ByteReader<'buf>,
        descrambler: &mut Descrambler,
    ) -> Result<MmtpPacket<'buf>, MmtpError> {
        let b0 = reader.read_u8()?;
        let version = b0 >> 6;
        let packet_counter_flag = b0 & 0b0010_0000 != 0;
        let fec_type = (b0 >> 3) & 0b11;
        let extension_flag = b0 & 0b0000_0010 != 0;
        let rap_flag = b0 & 0b0000_0001 != 0;
        let payload_type = PayloadType::from(reader.read_u8()? & 0b0011_1111);
        let packet_id = PacketId::new(reader.read_u16()?);
        let delivery_timestamp = reader.read_u32()?;
        let packet_sequence_number = reader.read_u32()?;
        let packet_counter = if packet_counter_flag {
            Some(reader.read_u32()?)
        } else {
            None
        };
        let scrambling = if extension_flag {
            Self::parse_extension(reader)?
        } else {
            None
        };

        let payload = match scrambling {
            Some(EncryptionFlag::Even) | Some(EncryptionFlag::Odd) => {
                if !descrambler.ready() {
                    return Err(MmtpError::ScramblerNotReady);
                }
                let parity = if scrambling == Some(EncryptionFlag::Odd) {
                    KeyParity::Odd
                } else {
                    KeyParity::Even
                };
                let mut data = reader.rest().to_vec();
                if !descrambler.decrypt(&mut data, parity) {
                    // device fault; callers retry once a fresh ECM restores the key state
                    return Err(MmtpError::ScramblerNotReady);
                }
                Cow::Owned(data)
            }
            Some(EncryptionFlag::Reserved) => {
                warn!(
                    "reserved encryption_flag on {:?}; passing payload through unmodified",
                    packet_id
                );
                Cow::Borrowed(reader.rest())
            }
            _ => Cow::Borrowed(reader.rest()),
        };

        Ok(MmtpPacket {
            version,
            fec_type,
            rap_flag,
            payload_type,
            packet_id,
            delivery_timestamp,
            packet_sequence_number,
            packet_counter,
            scrambling,
            payload,
        })
    }

    /// Walks the extension header; only the scrambling-control item of the multi-type extension
    /// is of interest, everything else is skipped.
    fn parse_extension(
        reader: &mut ByteReader<'_>,
    ) -> Result<Option<EncryptionFlag>, ReadError> {
        let ext_type = reader.read_u16()?;
        let ext_length = reader.read_u16()? as usize;
        let mut ext = reader.sub_reader(ext_length)?;
        if ext_type != 0x0000 {
            return Ok(None);
        }
        let mut scrambling = None;
        loop {
            if ext.remaining() < 4 {
                break;
            }
            let head = ext.read_u16()?;
            let end_flag = head & 0x8000 != 0;
            let item_type = head & 0x7FFF;
            let item_length = ext.read_u16()? as usize;
            let mut item = ext.sub_reader(item_length)?;
            if item_type == EXT_ITEM_SCRAMBLING {
                let b = item.read_u8()?;
                scrambling = Some(EncryptionFlag::from((b >> 3) & 0b11));
            }
            if end_flag {
                break;
            }
        }
        Ok(scrambling)
    }
}

/// What a data unit inside an MPU payload contains.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum FragmentType {
    /// `0` - MPU metadata (ftyp/mmpu/moov boxes); not forwarded
    MpuMetadata,
    /// `1` - movie-fragment metadata (moof/mdat header); not forwarded
    MovieFragmentMetadata,
    /// `2` - a Media Fragment Unit
    Mfu,
    Other(u8),
}
impl FragmentType {
    fn from(val: u8) -> FragmentType {
        match val {
            0 => FragmentType::MpuMetadata,
            1 => FragmentType::MovieFragmentMetadata,
            2 => FragmentType::Mfu,
            _ => FragmentType::Other(val),
        }
    }
}

/// The MPU-mode MMTP payload header, with the reader left at the first data unit.
#[derive(Debug)]
pub struct MpuPayload {
    pub payload_length: u16,
    pub fragment_type: FragmentType,
    pub timed_flag: bool,
    pub fragmentation_indicator: crate::fragment::FragmentationIndicator,
    pub aggregate_flag: bool,
    pub fragment_counter: u8,
    pub mpu_sequence_number: u32,
}
impl MpuPayload {
    pub fn parse(r: &mut ByteReader<'_>) -> Result<MpuPayload, ReadError> {
        let payload_length = r.read_u16()?;
        let b = r.read_u8()?;
        Ok(MpuPayload {
            payload_length,
            fragment_type: FragmentType::from(b >> 4),
            timed_flag: b & 0b0000_1000 != 0,
            fragmentation_indicator: crate::fragment::FragmentationIndicator::from((b >> 1) & 0b11),
            aggregate_flag: b & 0b0000_0001 != 0,
            fragment_counter: r.read_u8()?,
            mpu_sequence_number: r.read_u32()?,
        })
    }
}

/// One data unit from an MPU payload; `data` is the opaque MFU bytes.
#[derive(Debug)]
pub struct DataUnit<'buf> {
    pub movie_fragment_sequence_number: Option<u32>,
    pub sample_number: Option<u32>,
    pub item_id: Option<u32>,
    pub data: &'buf [u8],
}
impl<'buf> DataUnit<'buf> {
    /// Timed data units carry a 14-byte MFU header, non-timed a 4-byte one; in aggregate mode
    /// each unit is length-prefixed, otherwise it runs to the end of the payload.
    pub fn parse(
        r: &mut ByteReader<'buf>,
        timed_flag: bool,
        aggregate_flag: bool,
    ) -> Result<DataUnit<'buf>, ReadError> {
        let mut unit = if aggregate_flag {
            let data_unit_length = r.read_u16()? as usize;
            r.sub_reader(data_unit_length)?
        } else {
            ByteReader::new(r.rest())
        };
        let (movie_fragment_sequence_number, sample_number, item_id) = if timed_flag {
            let mfsn = unit.read_u32()?;
            let sample = unit.read_u32()?;
            // offset, priority and dependency counter are not needed downstream,
            unit.skip(6)?;
            (Some(mfsn), Some(sample), None)
        } else {
            (None, None, Some(unit.read_u32()?))
        };
        Ok(DataUnit {
            movie_fragment_sequence_number,
            sample_number,
            item_id,
            data: unit.rest(),
        })
    }
}

/// Header of one signalling message within a control-message MMTP payload.
#[derive(Debug)]
pub struct SignalingMessage<'buf> {
    pub fragmentation_indicator: crate::fragment::FragmentationIndicator,
    pub length_extension_flag: bool,
    pub aggregation_flag: bool,
    pub fragment_counter: u8,
    pub payload: &'buf [u8],
}
impl<'buf> SignalingMessage<'buf> {
    pub fn parse(r: &mut ByteReader<'buf>) -> Result<SignalingMessage<'buf>, ReadError> {
        let b = r.read_u8()?;
        Ok(SignalingMessage {
            fragmentation_indicator: crate::fragment::FragmentationIndicator::from(b >> 6),
            length_extension_flag: b & 0b0000_0010 != 0,
            aggregation_flag: b & 0b0000_0001 != 0,
            fragment_counter: r.read_u8()?,
            payload: r.rest(),
        })
    }
}
