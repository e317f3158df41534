//! Structures for demultiplexing an MMT/TLV stream, the transport format of
//! Japanese 4K/8K satellite broadcasts (ARIB STD-B60 / STD-B32).
//!
//! # Design Principals
//!
//!  * *Non-blocking*.  It should be possible to integrate this library into a system non-blocking
//!    event-loop.  The caller has to 'push' data.
//!  * *Transport Neutral*.  There is currently no code here supporting consuming from files or the
//!    network.  The APIs accept `&[u8]`, and the caller handles providing the data from wherever.
//!  * *Extensible*.  The conditional-access device and the per-codec media-fragment processors are
//!    points of extension; this library defines the traits and drives them, other crates supply
//!    implementations.
//!  * *Lossy-input tolerant*.  Bad framing, sequence gaps and truncated structures are recovered
//!    from by resynchronisation and discard-until-random-access-point, never by panicking.
//!
//! # Getting started
//!
//! Implement [`DemuxHandler`](demux/trait.DemuxHandler.html) for a type of your own, construct a
//! [`Demuxer`](demux/struct.Demuxer.html), and repeatedly call
//! [`process_packet()`](demux/struct.Demuxer.html#method.process_packet) with a
//! [`ByteReader`](bytes/struct.ByteReader.html) over your input buffer until it reports that more
//! bytes are needed.

pub mod bytes;
pub mod cas;
pub mod demux;
pub mod descriptors;
pub mod fragment;
pub mod ip;
pub mod mfu;
pub mod mmtp;
pub mod streams;
pub mod tables;
pub mod tlv;

use std::fmt;

/// Identifier of a logical sub-stream within the MMTP multiplex (an asset, or a signalling
/// channel).
///
/// The value-space is the full 16 bits, unlike the 13-bit PID of an MPEG-TS multiplex.
#[derive(PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
pub struct PacketId(u16);
impl PacketId {
    /// The number of distinct `PacketId` values
    pub const PACKET_ID_COUNT: usize = 1 << 16;

    pub const fn new(id: u16) -> PacketId {
        PacketId(id)
    }
}
impl From<PacketId> for u16 {
    fn from(pid: PacketId) -> Self {
        pid.0
    }
}
impl From<PacketId> for usize {
    fn from(pid: PacketId) -> Self {
        pid.0 as usize
    }
}
impl fmt::Debug for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PacketId({:#x})", self.0)
    }
}

/// The kind of content an asset announced in the MMT Package Table carries, derived from the
/// asset's FourCC asset-type code.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum AssetType {
    /// `hev1` - HEVC video
    Hevc,
    /// `mp4a` - AAC / ALS audio
    Aac,
    /// `stpp` - TTML subtitles
    Ttml,
    /// `aapp` - ARIB application data
    Application,
    /// an asset-type code this crate doesn't give a name to
    Other(u32),
}
impl AssetType {
    pub fn from_fourcc(code: u32) -> AssetType {
        match &code.to_be_bytes() {
            b"hev1" => AssetType::Hevc,
            b"mp4a" => AssetType::Aac,
            b"stpp" => AssetType::Ttml,
            b"aapp" => AssetType::Application,
            _ => AssetType::Other(code),
        }
    }

    /// `true` for the asset types this crate knows how to route to a consumer callback.
    pub fn is_media(self) -> bool {
        !matches!(self, AssetType::Other(_))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fourcc() {
        assert_eq!(AssetType::from_fourcc(0x68657631), AssetType::Hevc);
        assert_eq!(AssetType::from_fourcc(0x6d703461), AssetType::Aac);
        assert_eq!(AssetType::from_fourcc(0x73747070), AssetType::Ttml);
        assert_eq!(AssetType::from_fourcc(0x61617070), AssetType::Application);
        assert_eq!(
            AssetType::from_fourcc(0x61637433),
            AssetType::Other(0x61637433)
        );
        assert!(AssetType::Hevc.is_media());
        assert!(!AssetType::Other(0).is_media());
    }

    #[test]
    fn packet_id() {
        let pid = PacketId::new(0x100);
        assert_eq!(u16::from(pid), 0x100);
        assert_eq!(usize::from(pid), 0x100);
        assert_eq!(format!("{:?}", pid), "PacketId(0x100)");
    }
}
