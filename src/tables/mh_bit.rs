//! The MH Broadcaster Information Table: per-broadcaster attributes within a network.

use super::{Section, SectionHeader, TableError};
use crate::bytes::{ByteReader, ReadError};
use crate::descriptors::MmtDescriptor;

/// One broadcaster entry of an MH-BIT section.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    pub broadcaster_id: u8,
    pub descriptors: Vec<MmtDescriptor>,
}
impl Broadcaster {
    fn parse(body: &mut ByteReader<'_>) -> Result<Broadcaster, ReadError> {
        let broadcaster_id = body.read_u8()?;
        let halfword = body.read_u16()?;
        let descriptors_length = (halfword & 0x0FFF) as usize;
        let mut descriptor_data = body.sub_reader(descriptors_length)?;
        Ok(Broadcaster {
            broadcaster_id,
            descriptors: MmtDescriptor::parse_loop(&mut descriptor_data)?,
        })
    }
}

/// `0x9D` MH-BIT.
#[derive(Debug, Clone)]
pub struct MhBit {
    pub header: SectionHeader,
    pub broadcast_view_propriety: bool,
    pub first_descriptors: Vec<MmtDescriptor>,
    pub broadcasters: Vec<Broadcaster>,
}
impl MhBit {
    pub fn parse(r: &mut ByteReader<'_>) -> Result<MhBit, TableError> {
        let section = Section::parse(r)?;
        let mut body = section.body;
        let halfword = body.read_u16()?;
        let broadcast_view_propriety = halfword & 0x1000 != 0;
        let first_descriptors_length = (halfword & 0x0FFF) as usize;
        let mut descriptor_data = body.sub_reader(first_descriptors_length)?;
        let first_descriptors = MmtDescriptor::parse_loop(&mut descriptor_data)?;
        let mut broadcasters = vec![];
        while !body.is_eof() {
            broadcasters.push(Broadcaster::parse(&mut body)?);
        }
        Ok(MhBit {
            header: section.header,
            broadcast_view_propriety,
            first_descriptors,
            broadcasters,
        })
    }

    pub fn original_network_id(&self) -> u16 {
        self.header.table_id_extension
    }
}
