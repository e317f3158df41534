//! Event-information descriptors attached to MH-EIT entries.
//!
//! Text fields are kept as raw bytes; they are ARIB STD-B24 encoded and character-set
//! conversion is a consumer concern.

use crate::bytes::{ByteReader, ReadError};

/// `0xF001` MH short event descriptor: the programme title and a one-line description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortEventDescriptor {
    pub language: [u8; 3],
    pub event_name: Vec<u8>,
    pub text: Vec<u8>,
}
impl ShortEventDescriptor {
    pub fn parse(r: &mut ByteReader<'_>) -> Result<ShortEventDescriptor, ReadError> {
        let mut language = [0u8; 3];
        language.copy_from_slice(r.read_slice(3)?);
        let event_name_length = r.read_u8()? as usize;
        let event_name = r.read_vec(event_name_length)?;
        let text_length = r.read_u16()? as usize;
        let text = r.read_vec(text_length)?;
        Ok(ShortEventDescriptor {
            language,
            event_name,
            text,
        })
    }
}
