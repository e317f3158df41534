//! The MH Event Information Table: present/following and schedule programme listings per
//! service.

use super::{bcd_duration_secs, JstTime, Section, SectionHeader, TableError};
use crate::bytes::{ByteReader, ReadError};
use crate::descriptors::MmtDescriptor;

/// One programme within an MH-EIT section.
#[derive(Debug, Clone)]
pub struct MhEitEvent {
    pub event_id: u16,
    pub start_time: JstTime,
    /// seconds; `None` when the broadcast leaves the duration undefined (all-ones BCD)
    pub duration: Option<u32>,
    pub running_status: u8,
    pub free_ca_mode: bool,
    pub descriptors: Vec<MmtDescriptor>,
}

/// `0x8B` (present/following) and `0x8C..=0x9B` (schedule) MH-EIT.
#[derive(Debug, Clone)]
pub struct MhEit {
    pub header: SectionHeader,
    /// `table_id_extension` of the section carries the service id
    pub tlv_stream_id: u16,
    pub original_network_id: u16,
    pub segment_last_section_number: u8,
    pub last_table_id: u8,
    pub events: Vec<MhEitEvent>,
}
impl MhEit {
    pub fn parse(r: &mut ByteReader<'_>) -> Result<MhEit, TableError> {
        let section = Section::parse(r)?;
        let mut body = section.body;
        let tlv_stream_id = body.read_u16()?;
        let original_network_id = body.read_u16()?;
        let segment_last_section_number = body.read_u8()?;
        let last_table_id = body.read_u8()?;
        let mut events = vec![];
        while !body.is_eof() {
            events.push(Self::parse_event(&mut body)?);
        }
        Ok(MhEit {
            header: section.header,
            tlv_stream_id,
            original_network_id,
            segment_last_section_number,
            last_table_id,
            events,
        })
    }

    /// The service this section describes.
    pub fn service_id(&self) -> u16 {
        self.header.table_id_extension
    }

    fn parse_event(body: &mut ByteReader<'_>) -> Result<MhEitEvent, ReadError> {
        let event_id = body.read_u16()?;
        let raw_start = body.read_u40()?;
        let raw_duration = body.read_u24()?;
        let halfword = body.read_u16()?;
        let descriptors_loop_length = (halfword & 0x0FFF) as usize;
        let mut descriptor_data = body.sub_reader(descriptors_loop_length)?;
        Ok(MhEitEvent {
            event_id,
            start_time: JstTime::from_raw(raw_start),
            duration: if raw_duration == 0xFF_FFFF {
                None
            } else {
                Some(bcd_duration_secs(raw_duration))
            },
            running_status: (halfword >> 13) as u8,
            free_ca_mode: halfword & 0x1000 != 0,
            descriptors: MmtDescriptor::parse_loop(&mut descriptor_data)?,
        })
    }
}
