//! Component descriptors: what kind of picture/sound an asset carries, and the component tag
//! linking an asset to other signalling.

use crate::bytes::{ByteReader, ReadError};
use bitreader::BitReader;

/// `0x8011` MH stream identification descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamIdentificationDescriptor {
    pub component_tag: u16,
}
impl StreamIdentificationDescriptor {
    pub fn parse(r: &mut ByteReader<'_>) -> Result<StreamIdentificationDescriptor, ReadError> {
        Ok(StreamIdentificationDescriptor {
            component_tag: r.read_u16()?,
        })
    }
}

/// `0x8010` video component descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoComponentDescriptor {
    pub video_resolution: u8,
    pub video_aspect_ratio: u8,
    pub video_scan_flag: bool,
    pub video_frame_rate: u8,
    pub component_tag: u16,
    pub video_transfer_characteristics: u8,
    pub language: [u8; 3],
    pub text: Vec<u8>,
}
impl VideoComponentDescriptor {
    pub fn parse(r: &mut ByteReader<'_>) -> Result<VideoComponentDescriptor, ReadError> {
        let fixed = r.read_slice(8)?;
        let mut bits = BitReader::new(fixed);
        let video_resolution = bits.read_u8(4).map_err(bit_err(fixed))?;
        let video_aspect_ratio = bits.read_u8(4).map_err(bit_err(fixed))?;
        let video_scan_flag = bits.read_bool().map_err(bit_err(fixed))?;
        bits.skip(2).map_err(bit_err(fixed))?;
        let video_frame_rate = bits.read_u8(5).map_err(bit_err(fixed))?;
        let component_tag = bits.read_u16(16).map_err(bit_err(fixed))?;
        let video_transfer_characteristics = bits.read_u8(4).map_err(bit_err(fixed))?;
        bits.skip(4).map_err(bit_err(fixed))?;
        let mut language = [0u8; 3];
        language.copy_from_slice(&fixed[5..8]);
        Ok(VideoComponentDescriptor {
            video_resolution,
            video_aspect_ratio,
            video_scan_flag,
            video_frame_rate,
            component_tag,
            video_transfer_characteristics,
            language,
            text: r.rest().to_vec(),
        })
    }
}

/// `0x8014` MH audio component descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioComponentDescriptor {
    pub stream_content: u8,
    pub component_type: u8,
    pub component_tag: u16,
    pub stream_type: u8,
    pub simulcast_group_tag: u8,
    pub main_component_flag: bool,
    pub quality_indicator: u8,
    pub sampling_rate: u8,
    pub language: [u8; 3],
    /// second language code, present for dual-mono ES-multi-lingual components
    pub language_2: Option<[u8; 3]>,
    pub text: Vec<u8>,
}
impl AudioComponentDescriptor {
    pub fn parse(r: &mut ByteReader<'_>) -> Result<AudioComponentDescriptor, ReadError> {
        let b = r.read_u8()?;
        let stream_content = b & 0b1111;
        let component_type = r.read_u8()?;
        let component_tag = r.read_u16()?;
        let stream_type = r.read_u8()?;
        let simulcast_group_tag = r.read_u8()?;
        let flags = r.read_u8()?;
        let es_multi_lingual_flag = flags & 0b1000_0000 != 0;
        let main_component_flag = flags & 0b0100_0000 != 0;
        let quality_indicator = (flags >> 4) & 0b11;
        let sampling_rate = (flags >> 1) & 0b111;
        let mut language = [0u8; 3];
        language.copy_from_slice(r.read_slice(3)?);
        let language_2 = if es_multi_lingual_flag {
            let mut l = [0u8; 3];
            l.copy_from_slice(r.read_slice(3)?);
            Some(l)
        } else {
            None
        };
        Ok(AudioComponentDescriptor {
            stream_content,
            component_type,
            component_tag,
            stream_type,
            simulcast_group_tag,
            main_component_flag,
            quality_indicator,
            sampling_rate,
            language,
            language_2,
            text: r.rest().to_vec(),
        })
    }
}

fn bit_err(buf: &[u8]) -> impl Fn(bitreader::BitReaderError) -> ReadError + '_ {
    move |_| ReadError::UnexpectedEnd {
        requested: buf.len() + 1,
        remaining: buf.len(),
    }
}
