//! The access-control descriptor, which tells a receiver where the conditional-access messages
//! for an asset travel.

use crate::bytes::{ByteReader, ReadError};
use crate::tables::mpt::GeneralLocationInfo;
use hex_slice::AsHex;
use std::fmt;

/// `0x8004` access control descriptor: the CA system in use and the location (normally an
/// in-band packet-id) of its ECM stream.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessControlDescriptor {
    pub ca_system_id: u16,
    pub location: GeneralLocationInfo,
    pub private_data: Vec<u8>,
}
impl AccessControlDescriptor {
    pub fn parse(r: &mut ByteReader<'_>) -> Result<AccessControlDescriptor, ReadError> {
        Ok(AccessControlDescriptor {
            ca_system_id: r.read_u16()?,
            location: GeneralLocationInfo::parse(r)?,
            private_data: r.rest().to_vec(),
        })
    }
}
impl fmt::Debug for AccessControlDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessControlDescriptor")
            .field("ca_system_id", &format_args!("{:#x}", self.ca_system_id))
            .field("location", &self.location)
            .field(
                "private_data",
                &format_args!("{:x}", self.private_data.as_hex()),
            )
            .finish()
    }
}
