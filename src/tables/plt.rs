//! The Package List Table: which MMT packages exist and where each one's MPT travels.

use crate::bytes::{ByteReader, ReadError};
use crate::tables::mpt::GeneralLocationInfo;

/// One package entry of the PLT.
#[derive(Debug, Clone)]
pub struct PltEntry {
    pub package_id: Vec<u8>,
    pub location: GeneralLocationInfo,
}

/// `0x80` Package List Table.
#[derive(Debug, Clone)]
pub struct Plt {
    pub version: u8,
    pub packages: Vec<PltEntry>,
}
impl Plt {
    pub fn parse(r: &mut ByteReader<'_>) -> Result<Plt, ReadError> {
        r.skip(1)?; // table id, already dispatched on
        let version = r.read_u8()?;
        let length = r.read_u16()? as usize;
        let mut t = r.sub_reader(length)?;
        let count = t.read_u8()?;
        let mut packages = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let package_id_length = t.read_u8()? as usize;
            let package_id = t.read_vec(package_id_length)?;
            let location = GeneralLocationInfo::parse(&mut t)?;
            packages.push(PltEntry {
                package_id,
                location,
            });
        }
        Ok(Plt { version, packages })
    }
}
