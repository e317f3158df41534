//! The MH Service Description Table: the services of this (or another) TLV stream and their
//! names/attributes.

use super::{Section, SectionHeader, TableError};
use crate::bytes::{ByteReader, ReadError};
use crate::descriptors::MmtDescriptor;

/// One service entry of an MH-SDT section.
#[derive(Debug, Clone)]
pub struct MhSdtService {
    pub service_id: u16,
    pub eit_user_defined_flags: u8,
    pub eit_schedule_flag: bool,
    pub eit_present_following_flag: bool,
    pub running_status: u8,
    pub free_ca_mode: bool,
    pub descriptors: Vec<MmtDescriptor>,
}

/// `0x9F` (actual stream) / `0xA0` (other stream) MH-SDT.
#[derive(Debug, Clone)]
pub struct MhSdt {
    pub header: SectionHeader,
    pub original_network_id: u16,
    pub services: Vec<MhSdtService>,
}
impl MhSdt {
    pub fn parse(r: &mut ByteReader<'_>) -> Result<MhSdt, TableError> {
        let section = Section::parse(r)?;
        let mut body = section.body;
        let original_network_id = body.read_u16()?;
        body.skip(1)?; // reserved
        let mut services = vec![];
        while !body.is_eof() {
            services.push(Self::parse_service(&mut body)?);
        }
        Ok(MhSdt {
            header: section.header,
            original_network_id,
            services,
        })
    }

    /// The id of the TLV stream these services belong to.
    pub fn tlv_stream_id(&self) -> u16 {
        self.header.table_id_extension
    }

    fn parse_service(body: &mut ByteReader<'_>) -> Result<MhSdtService, ReadError> {
        let service_id = body.read_u16()?;
        let flags = body.read_u8()?;
        let halfword = body.read_u16()?;
        let descriptors_loop_length = (halfword & 0x0FFF) as usize;
        let mut descriptor_data = body.sub_reader(descriptors_loop_length)?;
        Ok(MhSdtService {
            service_id,
            eit_user_defined_flags: (flags >> 2) & 0b111,
            eit_schedule_flag: flags & 0b10 != 0,
            eit_present_following_flag: flags & 0b01 != 0,
            running_status: (halfword >> 13) as u8,
            free_ca_mode: halfword & 0x1000 != 0,
            descriptors: MmtDescriptor::parse_loop(&mut descriptor_data)?,
        })
    }
}
