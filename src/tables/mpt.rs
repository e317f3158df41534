//! The MMT Package Table: the list of assets making up the package currently on air, and where
//! in the transport each one travels.

use crate::bytes::{ByteReader, ReadError};
use crate::descriptors::MmtDescriptor;
use crate::{AssetType, PacketId};
use log::warn;

/// Where an asset's data can be found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneralLocationInfo {
    /// `location_type 0x00` - in this multiplex, under the given packet-id
    PacketId(PacketId),
    /// `location_type 0x01` - an IPv4 flow elsewhere
    Ipv4 {
        source: [u8; 4],
        destination: [u8; 4],
        destination_port: u16,
        packet_id: PacketId,
    },
    /// `location_type 0x02` - an IPv6 flow elsewhere
    Ipv6 {
        source: [u8; 16],
        destination: [u8; 16],
        destination_port: u16,
        packet_id: PacketId,
    },
}
impl GeneralLocationInfo {
    pub fn parse(r: &mut ByteReader<'_>) -> Result<GeneralLocationInfo, ReadError> {
        let location_type = r.read_u8()?;
        match location_type {
            0x00 => Ok(GeneralLocationInfo::PacketId(PacketId::new(r.read_u16()?))),
            0x01 => {
                let mut source = [0u8; 4];
                source.copy_from_slice(r.read_slice(4)?);
                let mut destination = [0u8; 4];
                destination.copy_from_slice(r.read_slice(4)?);
                Ok(GeneralLocationInfo::Ipv4 {
                    source,
                    destination,
                    destination_port: r.read_u16()?,
                    packet_id: PacketId::new(r.read_u16()?),
                })
            }
            0x02 => {
                let mut source = [0u8; 16];
                source.copy_from_slice(r.read_slice(16)?);
                let mut destination = [0u8; 16];
                destination.copy_from_slice(r.read_slice(16)?);
                Ok(GeneralLocationInfo::Ipv6 {
                    source,
                    destination,
                    destination_port: r.read_u16()?,
                    packet_id: PacketId::new(r.read_u16()?),
                })
            }
            other => {
                warn!("unhandled general location type {:#x}", other);
                Err(ReadError::UnhandledValue {
                    field: "location_type",
                    value: other,
                })
            }
        }
    }

    /// The packet-id for in-band locations; `None` for flows outside this multiplex.
    pub fn in_band_packet_id(&self) -> Option<PacketId> {
        match *self {
            GeneralLocationInfo::PacketId(pid) => Some(pid),
            _ => None,
        }
    }
}

/// One asset announced by the MPT.
#[derive(Debug, Clone)]
pub struct MptAsset {
    pub identifier_type: u8,
    pub asset_id_scheme: u32,
    pub asset_id: Vec<u8>,
    pub asset_type: AssetType,
    pub asset_clock_relation_flag: bool,
    pub locations: Vec<GeneralLocationInfo>,
    pub descriptors: Vec<MmtDescriptor>,
}

/// `0x20` MMT Package Table.
#[derive(Debug, Clone)]
pub struct Mpt {
    pub version: u8,
    pub mpt_mode: u8,
    pub package_id: Vec<u8>,
    pub descriptors: Vec<MmtDescriptor>,
    pub assets: Vec<MptAsset>,
}
impl Mpt {
    pub fn parse(r: &mut ByteReader<'_>) -> Result<Mpt, ReadError> {
        r.skip(1)?; // table id, already dispatched on
        let version = r.read_u8()?;
        let length = r.read_u16()? as usize;
        let mut t = r.sub_reader(length)?;
        let mpt_mode = t.read_u8()? & 0b11;
        let package_id_length = t.read_u8()? as usize;
        let package_id = t.read_vec(package_id_length)?;
        let descriptors_length = t.read_u16()? as usize;
        let mut descriptor_data = t.sub_reader(descriptors_length)?;
        let descriptors = MmtDescriptor::parse_loop(&mut descriptor_data)?;
        let asset_count = t.read_u8()?;
        let mut assets = Vec::with_capacity(asset_count as usize);
        for _ in 0..asset_count {
            assets.push(Self::parse_asset(&mut t)?);
        }
        Ok(Mpt {
            version,
            mpt_mode,
            package_id,
            descriptors,
            assets,
        })
    }

    fn parse_asset(t: &mut ByteReader<'_>) -> Result<MptAsset, ReadError> {
        let identifier_type = t.read_u8()?;
        let asset_id_scheme = t.read_u32()?;
        let asset_id_length = t.read_u8()? as usize;
        let asset_id = t.read_vec(asset_id_length)?;
        let asset_type = AssetType::from_fourcc(t.read_u32()?);
        let asset_clock_relation_flag = t.read_u8()? & 1 != 0;
        let location_count = t.read_u8()?;
        let mut locations = Vec::with_capacity(location_count as usize);
        for _ in 0..location_count {
            locations.push(GeneralLocationInfo::parse(t)?);
        }
        let descriptors_length = t.read_u16()? as usize;
        let mut descriptor_data = t.sub_reader(descriptors_length)?;
        let descriptors = MmtDescriptor::parse_loop(&mut descriptor_data)?;
        Ok(MptAsset {
            identifier_type,
            asset_id_scheme,
            asset_id,
            asset_type,
            asset_clock_relation_flag,
            locations,
            descriptors,
        })
    }
}
