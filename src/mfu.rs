//! The per-stream Media Fragment Unit processing seam.
//!
//! Codec-specific reframing (HEVC NAL assembly, audio framing, TTML packaging) belongs to
//! implementations of [`MfuProcessor`](trait.MfuProcessor.html) supplied by other crates or by
//! the consumer.  The [`TimedUnitProcessor`](struct.TimedUnitProcessor.html) provided here is
//! the default for every asset type: it stamps each reassembled MFU with the pts/dts derived
//! from the stream's timestamp caches and hands the payload on unchanged.

use crate::streams::ElementaryStream;
use crate::AssetType;
use hex_slice::AsHex;
use std::fmt;

/// A processed media fragment, ready for a consumer callback.
#[derive(Clone, PartialEq, Eq)]
pub struct MfuData {
    /// index of the originating stream within the current MPT declaration order
    pub stream_index: usize,
    pub pts: Option<i64>,
    pub dts: Option<i64>,
    pub payload: Vec<u8>,
    /// the carrying MMTP packet announced a random access point
    pub is_rap: bool,
}
impl fmt::Debug for MfuData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MfuData")
            .field("stream_index", &self.stream_index)
            .field("pts", &self.pts)
            .field("dts", &self.dts)
            .field(
                "payload",
                &format_args!(
                    "{} bytes: {:x}",
                    self.payload.len(),
                    self.payload[..self.payload.len().min(16)].as_hex()
                ),
            )
            .field("is_rap", &self.is_rap)
            .finish()
    }
}

/// Stateful per-stream processor turning raw MFU bytes into consumer-ready
/// [`MfuData`](struct.MfuData.html).
///
/// Returning `None` means the fragment was absorbed into processor state (or discarded) and
/// nothing reaches the consumer for it.
pub trait MfuProcessor {
    fn process(&mut self, stream: &mut ElementaryStream, payload: Vec<u8>) -> Option<MfuData>;
}

/// Factory keyed on asset type.  Every media asset type currently gets a
/// `TimedUnitProcessor`; the indirection is the plug-in point for codec-aware replacements.
pub fn create_processor(asset_type: AssetType) -> Option<Box<dyn MfuProcessor>> {
    match asset_type {
        AssetType::Hevc | AssetType::Aac | AssetType::Ttml | AssetType::Application => {
            Some(Box::new(TimedUnitProcessor::default()))
        }
        AssetType::Other(_) => None,
    }
}

/// Passes MFU payloads through unchanged, attaching timing from the stream's caches and
/// advancing the stream's access-unit position.
#[derive(Default)]
pub struct TimedUnitProcessor;
impl MfuProcessor for TimedUnitProcessor {
    fn process(&mut self, stream: &mut ElementaryStream, payload: Vec<u8>) -> Option<MfuData> {
        if payload.is_empty() {
            return None;
        }
        let timing = stream.au_timing();
        let data = MfuData {
            stream_index: stream.stream_index,
            pts: timing.map(|t| t.pts),
            dts: timing.map(|t| t.dts),
            payload,
            is_rap: stream.rap_flag,
        };
        stream.advance_au();
        Some(data)
    }
}
