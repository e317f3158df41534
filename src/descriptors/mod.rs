//! Descriptors attached to tables and to the assets within them.
//!
//! MMT-SI descriptors have a 16-bit tag and (for most tags) an 8-bit length; the two
//! text-bearing event descriptors use a 16-bit length instead.  Tags this crate gives a type to
//! are parsed into the matching [`MmtDescriptor`](enum.MmtDescriptor.html) variant; everything
//! else is carried as `Unknown` so consumers can still get at the bytes.

pub mod access_control;
pub mod component;
pub mod events;
pub mod timestamps;

use crate::bytes::{ByteReader, ReadError};
use hex_slice::AsHex;
use std::fmt;

use self::access_control::AccessControlDescriptor;
use self::component::{
    AudioComponentDescriptor, StreamIdentificationDescriptor, VideoComponentDescriptor,
};
use self::events::ShortEventDescriptor;
use self::timestamps::{MpuExtendedTimestampDescriptor, MpuTimestampDescriptor};

/// A descriptor whose tag this crate doesn't model; the body is preserved as-is.
#[derive(Clone, PartialEq, Eq)]
pub struct UnknownDescriptor {
    pub tag: u16,
    pub payload: Vec<u8>,
}
impl fmt::Debug for UnknownDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnknownDescriptor")
            .field("tag", &format_args!("{:#x}", self.tag))
            .field("payload", &format_args!("{:x}", self.payload.as_hex()))
            .finish()
    }
}

/// The descriptors this crate understands, as a tagged sum.
#[derive(Debug, Clone)]
pub enum MmtDescriptor {
    MpuTimestamp(MpuTimestampDescriptor),
    MpuExtendedTimestamp(MpuExtendedTimestampDescriptor),
    StreamIdentification(StreamIdentificationDescriptor),
    VideoComponent(VideoComponentDescriptor),
    AudioComponent(AudioComponentDescriptor),
    AccessControl(AccessControlDescriptor),
    ShortEvent(ShortEventDescriptor),
    Unknown(UnknownDescriptor),
}
impl MmtDescriptor {
    pub const TAG_MPU_TIMESTAMP: u16 = 0x0001;
    pub const TAG_ACCESS_CONTROL: u16 = 0x8004;
    pub const TAG_VIDEO_COMPONENT: u16 = 0x8010;
    pub const TAG_STREAM_IDENTIFICATION: u16 = 0x8011;
    pub const TAG_AUDIO_COMPONENT: u16 = 0x8014;
    pub const TAG_MPU_EXTENDED_TIMESTAMP: u16 = 0x8026;
    pub const TAG_SHORT_EVENT: u16 = 0xF001;
    pub const TAG_EXTENDED_EVENT: u16 = 0xF002;

    /// The event text descriptors carry a 16-bit length; all other tags an 8-bit one.
    fn has_wide_length(tag: u16) -> bool {
        tag == Self::TAG_SHORT_EVENT || tag == Self::TAG_EXTENDED_EVENT
    }

    /// Parse one descriptor, consuming its header and exactly its declared body length.
    pub fn parse(r: &mut ByteReader<'_>) -> Result<MmtDescriptor, ReadError> {
        let tag = r.read_u16()?;
        let length = if Self::has_wide_length(tag) {
            r.read_u16()? as usize
        } else {
            r.read_u8()? as usize
        };
        let mut body = r.sub_reader(length)?;
        let desc = match tag {
            Self::TAG_MPU_TIMESTAMP => {
                MmtDescriptor::MpuTimestamp(MpuTimestampDescriptor::parse(&mut body)?)
            }
            Self::TAG_MPU_EXTENDED_TIMESTAMP => MmtDescriptor::MpuExtendedTimestamp(
                MpuExtendedTimestampDescriptor::parse(&mut body)?,
            ),
            Self::TAG_STREAM_IDENTIFICATION => MmtDescriptor::StreamIdentification(
                StreamIdentificationDescriptor::parse(&mut body)?,
            ),
            Self::TAG_VIDEO_COMPONENT => {
                MmtDescriptor::VideoComponent(VideoComponentDescriptor::parse(&mut body)?)
            }
            Self::TAG_AUDIO_COMPONENT => {
                MmtDescriptor::AudioComponent(AudioComponentDescriptor::parse(&mut body)?)
            }
            Self::TAG_ACCESS_CONTROL => {
                MmtDescriptor::AccessControl(AccessControlDescriptor::parse(&mut body)?)
            }
            Self::TAG_SHORT_EVENT => {
                MmtDescriptor::ShortEvent(ShortEventDescriptor::parse(&mut body)?)
            }
            _ => MmtDescriptor::Unknown(UnknownDescriptor {
                tag,
                payload: body.rest().to_vec(),
            }),
        };
        Ok(desc)
    }

    /// Parse a whole descriptor loop (the bounded region handed in as `r`).
    pub fn parse_loop(r: &mut ByteReader<'_>) -> Result<Vec<MmtDescriptor>, ReadError> {
        let mut list = vec![];
        while !r.is_eof() {
            list.push(MmtDescriptor::parse(r)?);
        }
        Ok(list)
    }
}
