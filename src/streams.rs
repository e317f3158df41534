//! The evolving map of elementary streams, driven by MPT updates.
//!
//! # Concepts
//!
//! * A [`StreamRegistry`](struct.StreamRegistry.html) holds one
//!   [`ElementaryStream`](struct.ElementaryStream.html) per packet-id announced (with a media
//!   asset type) by the most recent MPT.  Streams whose announcement vanishes, or whose asset
//!   type changes, are removed; surviving streams keep their timestamp caches.
//! * Stream indices are dense `0..N` in MPT declaration order, reassigned on every MPT; the
//!   by-index view is only valid until the next MPT arrives.
//! * Each stream owns two bounded timestamp caches (at most
//!   [`TIMESTAMP_CACHE_LIMIT`](constant.TIMESTAMP_CACHE_LIMIT.html) entries each) from which
//!   per-access-unit pts/dts are derived.

use crate::descriptors::component::{AudioComponentDescriptor, VideoComponentDescriptor};
use crate::descriptors::timestamps::{MpuExtendedTimestamp, MpuTimestamp};
use crate::descriptors::MmtDescriptor;
use crate::ip::NtpTimestamp;
use crate::mfu::{create_processor, MfuProcessor};
use crate::tables::mpt::Mpt;
use crate::{AssetType, PacketId};
use std::collections::HashMap;
use std::fmt;

/// Upper bound on each per-stream timestamp cache.
pub const TIMESTAMP_CACHE_LIMIT: usize = 100;

/// Rational timebase of a stream's timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timebase {
    pub num: u32,
    pub den: u32,
}
impl Default for Timebase {
    fn default() -> Timebase {
        // the broadcast default until an extended timestamp descriptor names a timescale
        Timebase { num: 1, den: 90_000 }
    }
}

/// Presentation and decoding time of one access unit, in the stream's timebase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuTiming {
    pub pts: i64,
    pub dts: i64,
}

fn ntp_to_ticks(ntp: NtpTimestamp, timescale: u32) -> i64 {
    let whole = i64::from(ntp.seconds) * i64::from(timescale);
    let frac = (u64::from(ntp.fraction) * u64::from(timescale)) >> 32;
    whole + frac as i64
}

/// One elementary stream of the package: an asset with in-band data.
pub struct ElementaryStream {
    pub packet_id: PacketId,
    pub asset_type: AssetType,
    /// position within the current MPT's declaration order
    pub stream_index: usize,
    pub last_mpu_sequence_number: u32,
    /// position of the next access unit within the current MPU
    pub au_index: u32,
    /// RAP flag of the last MMTP packet seen for this stream
    pub rap_flag: bool,
    pub timebase: Timebase,
    pub component_tag: Option<u16>,
    pub video_component: Option<VideoComponentDescriptor>,
    pub audio_component: Option<AudioComponentDescriptor>,
    mpu_timestamps: Vec<MpuTimestamp>,
    mpu_extended_timestamps: Vec<MpuExtendedTimestamp>,
    pub(crate) processor: Option<Box<dyn MfuProcessor>>,
}
impl fmt::Debug for ElementaryStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementaryStream")
            .field("packet_id", &self.packet_id)
            .field("asset_type", &self.asset_type)
            .field("stream_index", &self.stream_index)
            .field("last_mpu_sequence_number", &self.last_mpu_sequence_number)
            .field("au_index", &self.au_index)
            .field("rap_flag", &self.rap_flag)
            .field("timebase", &self.timebase)
            .field("component_tag", &self.component_tag)
            .finish()
    }
}
impl ElementaryStream {
    pub fn new(packet_id: PacketId, asset_type: AssetType) -> ElementaryStream {
        ElementaryStream {
            packet_id,
            asset_type,
            stream_index: 0,
            last_mpu_sequence_number: 0,
            au_index: 0,
            rap_flag: false,
            timebase: Timebase::default(),
            component_tag: None,
            video_component: None,
            audio_component: None,
            mpu_timestamps: vec![],
            mpu_extended_timestamps: vec![],
            processor: None,
        }
    }

    pub fn timestamp_count(&self) -> usize {
        self.mpu_timestamps.len()
    }
    pub fn extended_timestamp_count(&self) -> usize {
        self.mpu_extended_timestamps.len()
    }
    pub fn timestamp_for(&self, mpu_sequence_number: u32) -> Option<&MpuTimestamp> {
        self.mpu_timestamps
            .iter()
            .find(|e| e.mpu_sequence_number == mpu_sequence_number)
    }

    /// Timing of the access unit at the current `au_index` of the current MPU, if both caches
    /// cover it.
    pub fn au_timing(&self) -> Option<AuTiming> {
        let seq = self.last_mpu_sequence_number;
        let ts = self.timestamp_for(seq)?;
        let ext = self
            .mpu_extended_timestamps
            .iter()
            .find(|e| e.mpu_sequence_number == seq)?;
        let au = self.au_index as usize;
        if au >= ext.num_of_au as usize {
            return None;
        }
        let base = ntp_to_ticks(ts.mpu_presentation_time, self.timebase.den);
        let mut dts = base - i64::from(ext.mpu_decoding_time_offset);
        for i in 0..au {
            dts += i64::from(ext.pts_offsets[i]);
        }
        Some(AuTiming {
            pts: dts + i64::from(ext.dts_pts_offsets[au]),
            dts,
        })
    }

    pub fn advance_au(&mut self) {
        self.au_index += 1;
    }

    /// Merge one absolute-timestamp entry: update in place on a sequence match, else recycle a
    /// stale slot, else (at capacity) displace the smallest sequence number, else append.
    fn merge_timestamp(&mut self, entry: &MpuTimestamp) {
        if let Some(existing) = self
            .mpu_timestamps
            .iter_mut()
            .find(|e| e.mpu_sequence_number == entry.mpu_sequence_number)
        {
            existing.mpu_presentation_time = entry.mpu_presentation_time;
            return;
        }
        let last = self.last_mpu_sequence_number;
        if let Some(stale) = self
            .mpu_timestamps
            .iter_mut()
            .find(|e| e.mpu_sequence_number < last)
        {
            *stale = entry.clone();
            return;
        }
        if self.mpu_timestamps.len() >= TIMESTAMP_CACHE_LIMIT {
            let min = self
                .mpu_timestamps
                .iter_mut()
                .min_by_key(|e| e.mpu_sequence_number)
                .unwrap();
            *min = entry.clone();
        } else {
            self.mpu_timestamps.push(entry.clone());
        }
    }

    /// Same policy as `merge_timestamp`, except stale *incoming* entries are discarded instead
    /// of inserted.
    fn merge_extended_timestamp(&mut self, entry: &MpuExtendedTimestamp) {
        if entry.mpu_sequence_number < self.last_mpu_sequence_number {
            return;
        }
        if let Some(existing) = self
            .mpu_extended_timestamps
            .iter_mut()
            .find(|e| e.mpu_sequence_number == entry.mpu_sequence_number)
        {
            *existing = entry.clone();
            return;
        }
        let last = self.last_mpu_sequence_number;
        if let Some(stale) = self
            .mpu_extended_timestamps
            .iter_mut()
            .find(|e| e.mpu_sequence_number < last)
        {
            *stale = entry.clone();
            return;
        }
        if self.mpu_extended_timestamps.len() >= TIMESTAMP_CACHE_LIMIT {
            let min = self
                .mpu_extended_timestamps
                .iter_mut()
                .min_by_key(|e| e.mpu_sequence_number)
                .unwrap();
            *min = entry.clone();
        } else {
            self.mpu_extended_timestamps.push(entry.clone());
        }
    }

    fn ingest_descriptor(&mut self, desc: &MmtDescriptor) {
        match desc {
            MmtDescriptor::MpuTimestamp(d) => {
                for entry in &d.entries {
                    self.merge_timestamp(entry);
                }
            }
            MmtDescriptor::MpuExtendedTimestamp(d) => {
                if let Some(timescale) = d.timescale {
                    if timescale > 0 {
                        self.timebase = Timebase {
                            num: 1,
                            den: timescale,
                        };
                    }
                }
                for entry in &d.entries {
                    self.merge_extended_timestamp(entry);
                }
            }
            MmtDescriptor::StreamIdentification(d) => {
                self.component_tag = Some(d.component_tag);
            }
            MmtDescriptor::VideoComponent(d) => {
                self.video_component = Some(d.clone());
            }
            MmtDescriptor::AudioComponent(d) => {
                self.audio_component = Some(d.clone());
            }
            _ => {}
        }
    }
}

/// Owner of all `ElementaryStream`s, indexed by packet-id (authoritative) and by stream index
/// (rebuilt from each MPT).
#[derive(Default)]
pub struct StreamRegistry {
    by_packet_id: HashMap<PacketId, ElementaryStream>,
    by_stream_index: Vec<PacketId>,
}
impl StreamRegistry {
    pub fn get(&self, pid: PacketId) -> Option<&ElementaryStream> {
        self.by_packet_id.get(&pid)
    }
    pub fn get_mut(&mut self, pid: PacketId) -> Option<&mut ElementaryStream> {
        self.by_packet_id.get_mut(&pid)
    }
    pub fn by_index(&self, stream_index: usize) -> Option<&ElementaryStream> {
        let pid = *self.by_stream_index.get(stream_index)?;
        self.by_packet_id.get(&pid)
    }
    pub fn len(&self) -> usize {
        self.by_packet_id.len()
    }
    pub fn is_empty(&self) -> bool {
        self.by_packet_id.is_empty()
    }
    pub fn contains(&self, pid: PacketId) -> bool {
        self.by_packet_id.contains_key(&pid)
    }

    pub fn clear(&mut self) {
        self.by_packet_id.clear();
        self.by_stream_index.clear();
    }

    /// Take the stream's MFU processor out for a call that needs the stream mutable at the same
    /// time; pair with [`restore_processor`](#method.restore_processor).
    pub(crate) fn take_processor(&mut self, pid: PacketId) -> Option<Box<dyn MfuProcessor>> {
        self.by_packet_id.get_mut(&pid)?.processor.take()
    }
    pub(crate) fn restore_processor(&mut self, pid: PacketId, processor: Box<dyn MfuProcessor>) {
        if let Some(stream) = self.by_packet_id.get_mut(&pid) {
            if stream.processor.is_none() {
                stream.processor = Some(processor);
            }
        }
    }

    /// Applies an MPT: prunes streams the table no longer announces (or re-announces with a
    /// different asset type), upserts the announced media assets in declaration order, and
    /// ingests their descriptors.
    ///
    /// An MPT announcing no in-band assets at all leaves existing streams untouched, so a
    /// transient empty table can't wipe the registry mid-broadcast.
    pub fn apply_mpt(&mut self, mpt: &Mpt) {
        let mut announced: HashMap<PacketId, AssetType> = HashMap::new();
        for asset in &mpt.assets {
            for location in &asset.locations {
                if let Some(pid) = location.in_band_packet_id() {
                    announced.insert(pid, asset.asset_type);
                }
            }
        }

        if !announced.is_empty() {
            self.by_packet_id.retain(|pid, stream| {
                announced.get(pid) == Some(&stream.asset_type)
            });
        }

        self.by_stream_index.clear();

        let mut stream_index = 0;
        for asset in &mpt.assets {
            let mut target = None;
            for location in &asset.locations {
                let pid = match location.in_band_packet_id() {
                    Some(pid) => pid,
                    None => continue,
                };
                if !asset.asset_type.is_media() {
                    continue;
                }
                let stream = self
                    .by_packet_id
                    .entry(pid)
                    .or_insert_with(|| ElementaryStream::new(pid, asset.asset_type));
                stream.asset_type = asset.asset_type;
                stream.stream_index = stream_index;
                if stream.processor.is_none() {
                    stream.processor = create_processor(asset.asset_type);
                }
                self.by_stream_index.push(pid);
                stream_index += 1;
                target = Some(pid);
            }

            let stream = match target.and_then(|pid| self.by_packet_id.get_mut(&pid)) {
                Some(s) => s,
                None => continue,
            };
            for desc in &asset.descriptors {
                stream.ingest_descriptor(desc);
            }
        }
    }
}
