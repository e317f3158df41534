//! The IP-flavoured TLV payloads: plain IPv6 packets (which carry NTP time data), and the
//! header-compressed IP packets that carry MMTP.

use crate::bytes::{ByteReader, ReadError};
use log::warn;

/// IP protocol number for UDP.
pub const PROTOCOL_UDP: u8 = 17;
/// Well-known NTP port.
pub const PORT_NTP: u16 = 123;

/// Fixed part of an IPv6 packet header.
#[derive(Debug)]
pub struct Ipv6Header {
    pub traffic_class: u8,
    pub flow_label: u32,
    pub payload_length: u16,
    pub next_header: u8,
    pub hop_limit: u8,
    pub source: [u8; 16],
    pub destination: [u8; 16],
}
impl Ipv6Header {
    pub fn parse(r: &mut ByteReader<'_>) -> Result<Ipv6Header, ReadError> {
        let first = r.read_u32()?;
        let version = (first >> 28) as u8;
        if version != 6 {
            warn!("IP version {} where 6 expected", version);
        }
        let payload_length = r.read_u16()?;
        let next_header = r.read_u8()?;
        let hop_limit = r.read_u8()?;
        let mut source = [0u8; 16];
        source.copy_from_slice(r.read_slice(16)?);
        let mut destination = [0u8; 16];
        destination.copy_from_slice(r.read_slice(16)?);
        Ok(Ipv6Header {
            traffic_class: ((first >> 20) & 0xFF) as u8,
            flow_label: first & 0xF_FFFF,
            payload_length,
            next_header,
            hop_limit,
            source,
            destination,
        })
    }
}

/// UDP datagram header.
#[derive(Debug)]
pub struct UdpHeader {
    pub source_port: u16,
    pub destination_port: u16,
    pub length: u16,
    pub checksum: u16,
}
impl UdpHeader {
    pub fn parse(r: &mut ByteReader<'_>) -> Result<UdpHeader, ReadError> {
        Ok(UdpHeader {
            source_port: r.read_u16()?,
            destination_port: r.read_u16()?,
            length: r.read_u16()?,
            checksum: r.read_u16()?,
        })
    }
}

/// A 64-bit NTP timestamp: seconds since era epoch, and 2^-32-second fraction.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct NtpTimestamp {
    pub seconds: u32,
    pub fraction: u32,
}
impl NtpTimestamp {
    pub fn from_raw(raw: u64) -> NtpTimestamp {
        NtpTimestamp {
            seconds: (raw >> 32) as u32,
            fraction: raw as u32,
        }
    }
}

/// An NTPv4 packet, per RFC 5905.  The broadcast multiplex carries these in-band over IPv6 UDP
/// as the receiver's wall-clock reference.
#[derive(Debug)]
pub struct Ntpv4 {
    pub leap_indicator: u8,
    pub version: u8,
    pub mode: u8,
    pub stratum: u8,
    pub poll: u8,
    pub precision: i8,
    pub root_delay: u32,
    pub root_dispersion: u32,
    pub reference_id: u32,
    pub reference_timestamp: NtpTimestamp,
    pub origin_timestamp: NtpTimestamp,
    pub receive_timestamp: NtpTimestamp,
    pub transmit_timestamp: NtpTimestamp,
}
impl Ntpv4 {
    pub fn parse(r: &mut ByteReader<'_>) -> Result<Ntpv4, ReadError> {
        let flags = r.read_u8()?;
        Ok(Ntpv4 {
            leap_indicator: flags >> 6,
            version: (flags >> 3) & 0b111,
            mode: flags & 0b111,
            stratum: r.read_u8()?,
            poll: r.read_u8()?,
            precision: r.read_u8()? as i8,
            root_delay: r.read_u32()?,
            root_dispersion: r.read_u32()?,
            reference_id: r.read_u32()?,
            reference_timestamp: NtpTimestamp::from_raw(r.read_u64()?),
            origin_timestamp: NtpTimestamp::from_raw(r.read_u64()?),
            receive_timestamp: NtpTimestamp::from_raw(r.read_u64()?),
            transmit_timestamp: NtpTimestamp::from_raw(r.read_u64()?),
        })
    }
}

/// The kinds of compressed-header context defined for TLV multiplexes.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CompressedHeaderType {
    /// `0x60` - full IPv6 + UDP headers follow (context initialisation)
    Ipv6FullHeader,
    /// `0x61` - headers compressed out entirely; payload follows immediately
    Ipv6CompressedHeader,
    Other(u8),
}
impl CompressedHeaderType {
    fn from(val: u8) -> CompressedHeaderType {
        match val {
            0x60 => CompressedHeaderType::Ipv6FullHeader,
            0x61 => CompressedHeaderType::Ipv6CompressedHeader,
            _ => CompressedHeaderType::Other(val),
        }
    }
}

/// The header-compressed IP packet wrapper around an MMTP packet.
#[derive(Debug)]
pub struct CompressedIpPacket {
    pub context_id: u16,
    pub sequence_number: u8,
    pub header_type: CompressedHeaderType,
    /// present only when the context carries full headers
    pub ipv6: Option<Ipv6Header>,
    pub udp: Option<UdpHeader>,
}
impl CompressedIpPacket {
    /// Parses the compressed-IP wrapper, leaving the reader positioned at the MMTP packet.
    pub fn parse(r: &mut ByteReader<'_>) -> Result<CompressedIpPacket, ReadError> {
        let cid_sn = r.read_u16()?;
        let header_type = CompressedHeaderType::from(r.read_u8()?);
        let (ipv6, udp) = match header_type {
            CompressedHeaderType::Ipv6FullHeader => {
                let ip = Ipv6Header::parse(r)?;
                let udp = UdpHeader::parse(r)?;
                (Some(ip), Some(udp))
            }
            CompressedHeaderType::Ipv6CompressedHeader => (None, None),
            CompressedHeaderType::Other(t) => {
                warn!("unhandled compressed-IP header type {:#x}", t);
                (None, None)
            }
        };
        Ok(CompressedIpPacket {
            context_id: cid_sn >> 4,
            sequence_number: (cid_sn & 0xF) as u8,
            header_type,
            ipv6,
            udp,
        })
    }
}
