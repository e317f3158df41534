//! The MH Time Offset Table: the multiplex's wall-clock time of day.

use super::{JstTime, ShortSection, TableError};
use crate::bytes::ByteReader;
use crate::descriptors::MmtDescriptor;

/// `0xA1` MH-TOT.
#[derive(Debug, Clone)]
pub struct MhTot {
    pub jst_time: JstTime,
    pub descriptors: Vec<MmtDescriptor>,
}
impl MhTot {
    pub fn parse(r: &mut ByteReader<'_>) -> Result<MhTot, TableError> {
        let section = ShortSection::parse(r)?;
        let mut body = section.body;
        let jst_time = JstTime::from_raw(body.read_u40()?);
        let halfword = body.read_u16()?;
        let descriptors_loop_length = (halfword & 0x0FFF) as usize;
        let mut descriptor_data = body.sub_reader(descriptors_loop_length)?;
        Ok(MhTot {
            jst_time,
            descriptors: MmtDescriptor::parse_loop(&mut descriptor_data)?,
        })
    }
}
