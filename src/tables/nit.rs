//! The TLV Network Information Table, carried in transmission-control TLV packets rather than
//! in MMTP signalling.

use super::{Section, SectionHeader, TableError};
use crate::bytes::{ByteReader, ReadError};
use crate::descriptors::MmtDescriptor;

/// One TLV stream entry of a NIT section.
#[derive(Debug, Clone)]
pub struct NitStream {
    pub tlv_stream_id: u16,
    pub original_network_id: u16,
    pub descriptors: Vec<MmtDescriptor>,
}
impl NitStream {
    fn parse(body: &mut ByteReader<'_>) -> Result<NitStream, ReadError> {
        let tlv_stream_id = body.read_u16()?;
        let original_network_id = body.read_u16()?;
        let halfword = body.read_u16()?;
        let descriptors_length = (halfword & 0x0FFF) as usize;
        let mut descriptor_data = body.sub_reader(descriptors_length)?;
        Ok(NitStream {
            tlv_stream_id,
            original_network_id,
            descriptors: MmtDescriptor::parse_loop(&mut descriptor_data)?,
        })
    }
}

/// `0x40` (actual network) / `0x41` (other network) TLV-NIT.
#[derive(Debug, Clone)]
pub struct Nit {
    pub header: SectionHeader,
    pub network_descriptors: Vec<MmtDescriptor>,
    pub streams: Vec<NitStream>,
}
impl Nit {
    pub fn parse(r: &mut ByteReader<'_>) -> Result<Nit, TableError> {
        let section = Section::parse(r)?;
        let mut body = section.body;
        let halfword = body.read_u16()?;
        let network_descriptors_length = (halfword & 0x0FFF) as usize;
        let mut descriptor_data = body.sub_reader(network_descriptors_length)?;
        let network_descriptors = MmtDescriptor::parse_loop(&mut descriptor_data)?;
        let halfword = body.read_u16()?;
        let stream_loop_length = (halfword & 0x0FFF) as usize;
        let mut stream_data = body.sub_reader(stream_loop_length)?;
        let mut streams = vec![];
        while !stream_data.is_eof() {
            streams.push(NitStream::parse(&mut stream_data)?);
        }
        Ok(Nit {
            header: section.header,
            network_descriptors,
            streams,
        })
    }

    pub fn network_id(&self) -> u16 {
        self.header.table_id_extension
    }
}
