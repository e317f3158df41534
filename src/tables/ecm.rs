//! The Entitlement Control Message table: the scrambling key, encrypted for the
//! conditional-access card.

use super::{Section, SectionHeader, TableError};
use crate::bytes::ByteReader;
use hex_slice::AsHex;
use std::fmt;

/// `0x82` ECM.  The body bytes are opaque to everything except the smart card.
#[derive(Clone)]
pub struct Ecm {
    pub header: SectionHeader,
    pub ecm_data: Vec<u8>,
}
impl Ecm {
    pub fn parse(r: &mut ByteReader<'_>) -> Result<Ecm, TableError> {
        let section = Section::parse(r)?;
        let mut body = section.body;
        Ok(Ecm {
            header: section.header,
            ecm_data: body.rest().to_vec(),
        })
    }
}
impl fmt::Debug for Ecm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ecm")
            .field("header", &self.header)
            .field(
                "ecm_data",
                &format_args!("{:x}", self.ecm_data.as_hex()),
            )
            .finish()
    }
}
