//! The two descriptors that carry per-MPU timing: absolute presentation times, and the
//! per-access-unit decode/presentation offsets.

use crate::bytes::{ByteReader, ReadError};
use crate::ip::NtpTimestamp;

/// One `(MPU sequence number, presentation time)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MpuTimestamp {
    pub mpu_sequence_number: u32,
    pub mpu_presentation_time: NtpTimestamp,
}

/// `0x0001` MPU timestamp descriptor: absolute presentation times for a run of MPUs.
#[derive(Debug, Clone, Default)]
pub struct MpuTimestampDescriptor {
    pub entries: Vec<MpuTimestamp>,
}
impl MpuTimestampDescriptor {
    pub fn parse(r: &mut ByteReader<'_>) -> Result<MpuTimestampDescriptor, ReadError> {
        let mut entries = vec![];
        while r.remaining() >= 12 {
            entries.push(MpuTimestamp {
                mpu_sequence_number: r.read_u32()?,
                mpu_presentation_time: NtpTimestamp::from_raw(r.read_u64()?),
            });
        }
        Ok(MpuTimestampDescriptor { entries })
    }
}

/// Per-MPU entry of the extended timestamp descriptor.  `pts_offsets[i]` is the duration of
/// access unit `i` (it advances the decoding time), `dts_pts_offsets[i]` the decode-to-
/// presentation delay of access unit `i`, both in the stream's timescale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MpuExtendedTimestamp {
    pub mpu_sequence_number: u32,
    pub mpu_presentation_time_leap_indicator: u8,
    pub mpu_decoding_time_offset: u16,
    pub num_of_au: u8,
    pub pts_offsets: Vec<u16>,
    pub dts_pts_offsets: Vec<u16>,
}

/// `0x8026` MPU extended timestamp descriptor.
#[derive(Debug, Clone, Default)]
pub struct MpuExtendedTimestampDescriptor {
    pub pts_offset_type: u8,
    pub timescale: Option<u32>,
    pub default_pts_offset: Option<u16>,
    pub entries: Vec<MpuExtendedTimestamp>,
}
impl MpuExtendedTimestampDescriptor {
    pub fn parse(r: &mut ByteReader<'_>) -> Result<MpuExtendedTimestampDescriptor, ReadError> {
        let b = r.read_u8()?;
        let pts_offset_type = (b >> 1) & 0b11;
        let timescale_flag = b & 1 != 0;
        let timescale = if timescale_flag {
            Some(r.read_u32()?)
        } else {
            None
        };
        let default_pts_offset = if pts_offset_type == 1 {
            Some(r.read_u16()?)
        } else {
            None
        };
        let mut entries = vec![];
        while !r.is_eof() {
            let mpu_sequence_number = r.read_u32()?;
            let leap = r.read_u8()? >> 6;
            let mpu_decoding_time_offset = r.read_u16()?;
            let num_of_au = r.read_u8()?;
            let mut pts_offsets = Vec::with_capacity(num_of_au as usize);
            let mut dts_pts_offsets = Vec::with_capacity(num_of_au as usize);
            for _ in 0..num_of_au {
                dts_pts_offsets.push(r.read_u16()?);
                let pts_offset = match pts_offset_type {
                    1 => default_pts_offset.unwrap_or(0),
                    2 => r.read_u16()?,
                    _ => 0,
                };
                pts_offsets.push(pts_offset);
            }
            entries.push(MpuExtendedTimestamp {
                mpu_sequence_number,
                mpu_presentation_time_leap_indicator: leap,
                mpu_decoding_time_offset,
                num_of_au,
                pts_offsets,
                dts_pts_offsets,
            });
        }
        Ok(MpuExtendedTimestampDescriptor {
            pts_offset_type,
            timescale,
            default_pts_offset,
            entries,
        })
    }
}
