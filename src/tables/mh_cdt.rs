//! The MH Common Data Table, which distributes shared binary resources (service logos) as
//! versioned data modules.

use super::{Section, SectionHeader, TableError};
use crate::bytes::ByteReader;
use crate::descriptors::MmtDescriptor;
use hex_slice::AsHex;
use std::fmt;

/// `0xA2` MH-CDT.
#[derive(Clone)]
pub struct MhCdt {
    pub header: SectionHeader,
    pub original_network_id: u16,
    pub data_type: u8,
    pub descriptors: Vec<MmtDescriptor>,
    pub data_module: Vec<u8>,
}
impl MhCdt {
    pub fn parse(r: &mut ByteReader<'_>) -> Result<MhCdt, TableError> {
        let section = Section::parse(r)?;
        let mut body = section.body;
        let original_network_id = body.read_u16()?;
        let data_type = body.read_u8()?;
        let halfword = body.read_u16()?;
        let descriptors_loop_length = (halfword & 0x0FFF) as usize;
        let mut descriptor_data = body.sub_reader(descriptors_loop_length)?;
        let descriptors = MmtDescriptor::parse_loop(&mut descriptor_data)?;
        Ok(MhCdt {
            header: section.header,
            original_network_id,
            data_type,
            descriptors,
            data_module: body.rest().to_vec(),
        })
    }

    /// The id under which receivers store this data module.
    pub fn download_data_id(&self) -> u16 {
        self.header.table_id_extension
    }
}
impl fmt::Debug for MhCdt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MhCdt")
            .field("header", &self.header)
            .field("original_network_id", &self.original_network_id)
            .field("data_type", &self.data_type)
            .field("descriptors", &self.descriptors)
            .field(
                "data_module",
                &format_args!("{} bytes: {:x}", self.data_module.len(),
                    self.data_module[..self.data_module.len().min(16)].as_hex()),
            )
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tables::test_support::finish_section;

    #[test]
    fn logo_module() {
        let mut body = vec![
            0x00, 0x2A, // download data id
            0xC1, 0x00, 0x00, // version/current, section numbers
            0x00, 0x02, // original network id
            0x01, // data type: logo
            0xF0, 0x00, // no descriptors
        ];
        body.extend_from_slice(&[0x89, 0x50, 0x4E, 0x47]); // module bytes
        let section = finish_section(0xA2, 0xB0, &body);
        let mut r = ByteReader::new(&section[..]);
        let cdt = MhCdt::parse(&mut r).unwrap();
        assert_eq!(cdt.download_data_id(), 42);
        assert_eq!(cdt.data_type, 1);
        assert_eq!(cdt.data_module, vec![0x89, 0x50, 0x4E, 0x47]);
    }
}
