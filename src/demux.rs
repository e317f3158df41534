//! Main types implementing the demultiplexer state-machine.
//!
//! Construct a [`Demuxer`](struct.Demuxer.html) and feed it a succession of byte-slices
//! containing the TLV stream data via [`process_packet()`](struct.Demuxer.html#method.process_packet).
//!
//! Users of this crate are expected to provide their own implementations of,
//!
//!  - [`DemuxHandler`](trait.DemuxHandler.html) - the callbacks through which every demultiplexed
//!    artefact (elementary-stream data, signalling tables, time references) is delivered,
//!  - optionally [`SmartCard`](../cas/trait.SmartCard.html) - the conditional-access device, if
//!    scrambled services are to be descrambled.
//!
//! All callbacks fire synchronously, before `process_packet()` returns; the handler must not
//! re-enter the same `Demuxer` from inside a callback.

use crate::bytes::{ByteReader, ReadError};
use crate::cas::Descrambler;
use crate::fragment::{FragmentAssemblerRegistry, FragmentationIndicator, State};
use crate::ip;
use crate::mfu::MfuData;
use crate::mmtp::{
    DataUnit, FragmentType, MmtpDecoder, MmtpError, MmtpPacket, MpuPayload, PayloadType,
    SignalingMessage,
};
use crate::streams::{ElementaryStream, StreamRegistry};
use crate::tables::{self, MmtTable};
use crate::tlv::{FrameOutcome, TlvFramer, TlvPacketType};
use crate::{AssetType, PacketId};
use fixedbitset::FixedBitSet;
use log::{debug, warn};

/// Message id values of the signalling messages this crate routes.
mod message_id {
    pub const PA: u16 = 0x0000;
    pub const M2_SECTION: u16 = 0x8000;
    pub const M2_SHORT_SECTION: u16 = 0x8002;
}

/// Outcome of one [`Demuxer::process_packet()`](struct.Demuxer.html#method.process_packet) call.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ProcessStatus {
    /// one TLV packet was consumed; callbacks may have fired (a scrambled packet consumed
    /// before key delivery also lands here, with nothing emitted)
    Consumed,
    /// the buffer ends before the current packet does; nothing was consumed, feed more bytes
    NeedMoreData,
    /// framing was invalid at the cursor; one byte was skipped, call again
    Resync,
}

/// Trait for types that will receive call-backs as artefacts are found within the TLV stream.
///
/// Every method has an empty default body, so implementations mention only what they care
/// about.
pub trait DemuxHandler {
    /// A processed media fragment from an HEVC video stream.
    fn on_video_data(&mut self, _stream: &ElementaryStream, _data: &MfuData) {}
    /// A processed media fragment from an AAC/ALS audio stream.
    fn on_audio_data(&mut self, _stream: &ElementaryStream, _data: &MfuData) {}
    /// A processed media fragment from a TTML subtitle stream.
    fn on_subtitle_data(&mut self, _stream: &ElementaryStream, _data: &MfuData) {}
    /// A processed media fragment from an application-data stream.
    fn on_application_data(&mut self, _stream: &ElementaryStream, _data: &MfuData) {}
    /// An NTPv4 time packet from the IPv6 side-channel.
    fn on_ntp(&mut self, _ntp: &ip::Ntpv4) {}
    fn on_mpt(&mut self, _mpt: &tables::Mpt) {}
    fn on_plt(&mut self, _plt: &tables::Plt) {}
    fn on_ecm(&mut self, _ecm: &tables::Ecm) {}
    fn on_mh_eit(&mut self, _eit: &tables::MhEit) {}
    fn on_mh_sdt(&mut self, _sdt: &tables::MhSdt) {}
    fn on_mh_tot(&mut self, _tot: &tables::MhTot) {}
    fn on_mh_cdt(&mut self, _cdt: &tables::MhCdt) {}
    fn on_mh_bit(&mut self, _bit: &tables::MhBit) {}
    fn on_nit(&mut self, _nit: &tables::Nit) {}
}

/// MMT/TLV stream demultiplexer.
///
/// # Incremental parsing
///
/// Successive sections of TLV data can be passed in order to `process_packet()`, and the
/// demultiplexing process will resume at the start of one buffer where it left off at the end
/// of the last.  The demuxer copies whatever it needs to retain (reassembly buffers, table
/// state); the input buffer is only borrowed for the duration of the call.
pub struct Demuxer {
    assemblers: FragmentAssemblerRegistry,
    streams: StreamRegistry,
    descrambler: Descrambler,
    unannounced_warned: FixedBitSet,
}
impl Demuxer {
    pub fn new(descrambler: Descrambler) -> Demuxer {
        Demuxer {
            assemblers: FragmentAssemblerRegistry::default(),
            streams: StreamRegistry::default(),
            descrambler,
            unannounced_warned: FixedBitSet::with_capacity(PacketId::PACKET_ID_COUNT),
        }
    }

    /// The current registry of elementary streams, for consumer introspection.
    pub fn streams(&self) -> &StreamRegistry {
        &self.streams
    }

    /// Drops all reassembly and stream state and forgets the descrambling key; the next input
    /// is treated as a fresh session starting from the next MPT and random access point.
    pub fn clear(&mut self) {
        self.assemblers.clear();
        self.streams.clear();
        self.descrambler.reset();
        self.unannounced_warned.clear();
    }

    /// Attempts to consume one TLV packet from the reader, delivering anything found inside it
    /// through `handler` before returning.
    pub fn process_packet<H: DemuxHandler>(
        &mut self,
        handler: &mut H,
        reader: &mut ByteReader<'_>,
    ) -> ProcessStatus {
        let pk = match TlvFramer::try_consume(reader) {
            FrameOutcome::NeedMoreBytes => return ProcessStatus::NeedMoreData,
            FrameOutcome::Resync => return ProcessStatus::Resync,
            FrameOutcome::Packet(pk) => pk,
        };
        let mut payload = ByteReader::new(pk.payload());
        match pk.packet_type() {
            TlvPacketType::TransmissionControlSignalPacket => {
                self.process_tlv_table(handler, &mut payload);
            }
            TlvPacketType::Ipv6Packet => {
                if let Err(e) = Self::process_ipv6(handler, &mut payload) {
                    warn!("bad IPv6 TLV payload: {:?}", e);
                }
            }
            TlvPacketType::HeaderCompressedIpPacket => {
                self.process_compressed_ip(handler, &mut payload);
            }
            TlvPacketType::Reserved(t) => {
                debug!("ignoring TLV packet of reserved type {:#x}", t);
            }
        }
        ProcessStatus::Consumed
    }

    fn process_tlv_table<H: DemuxHandler>(&mut self, handler: &mut H, r: &mut ByteReader<'_>) {
        let table_id = match r.peek_u8() {
            Ok(id) => id,
            Err(_) => return,
        };
        match table_id {
            tables::table_id::TLV_NIT_ACTUAL | tables::table_id::TLV_NIT_OTHER => {
                match tables::Nit::parse(r) {
                    Ok(nit) => handler.on_nit(&nit),
                    Err(e) => warn!("dropping unparseable NIT: {:?}", e),
                }
            }
            other => debug!("ignoring transmission-control table {:#x}", other),
        }
    }

    fn process_ipv6<H: DemuxHandler>(
        handler: &mut H,
        r: &mut ByteReader<'_>,
    ) -> Result<(), ReadError> {
        let ipv6 = ip::Ipv6Header::parse(r)?;
        if ipv6.next_header != ip::PROTOCOL_UDP {
            return Ok(());
        }
        let udp = ip::UdpHeader::parse(r)?;
        if udp.destination_port != ip::PORT_NTP {
            return Ok(());
        }
        let ntp = ip::Ntpv4::parse(r)?;
        handler.on_ntp(&ntp);
        Ok(())
    }

    fn process_compressed_ip<H: DemuxHandler>(&mut self, handler: &mut H, r: &mut ByteReader<'_>) {
        if let Err(e) = ip::CompressedIpPacket::parse(r) {
            warn!("bad compressed-IP wrapper: {:?}", e);
            return;
        }
        let mmt = match MmtpDecoder::decode(r, &mut self.descrambler) {
            Ok(mmt) => mmt,
            Err(MmtpError::ScramblerNotReady) => {
                // input consumed, nothing emitted; the key will arrive via a future ECM
                debug!("scrambled MMTP packet before key delivery");
                return;
            }
            Err(MmtpError::Read(e)) => {
                warn!("dropping undecodable MMTP packet: {:?}", e);
                return;
            }
        };
        match mmt.payload_type {
            PayloadType::Mpu => self.process_mpu(handler, &mmt),
            PayloadType::ContainsOneOrMoreControlMessage => {
                self.process_signaling_messages(handler, &mmt)
            }
            PayloadType::Other(t) => debug!("ignoring MMTP payload type {:#x}", t),
        }
    }

    fn process_mpu<H: DemuxHandler>(&mut self, handler: &mut H, mmt: &MmtpPacket<'_>) {
        let mut payload = ByteReader::new(mmt.payload());
        let mpu = match MpuPayload::parse(&mut payload) {
            Ok(mpu) => mpu,
            Err(e) => {
                warn!("dropping malformed MPU payload on {:?}: {:?}", mmt.packet_id, e);
                return;
            }
        };
        if !self.streams.contains(mmt.packet_id) {
            if !self.unannounced_warned.put(usize::from(mmt.packet_id)) {
                debug!("MPU data for {:?} not announced by any MPT", mmt.packet_id);
            }
            return;
        }
        // an aggregate of fragments is illegal; a fragment chain can't nest in one packet
        if mpu.aggregate_flag
            && mpu.fragmentation_indicator != FragmentationIndicator::NotFragmented
        {
            return;
        }
        if mpu.fragment_type != FragmentType::Mfu {
            return;
        }
        let assembler = self.assemblers.get(mmt.packet_id);
        // decoding begins only at a random access point
        if assembler.state() == State::Init && !mmt.rap_flag {
            return;
        }

        let stream = self
            .streams
            .get_mut(mmt.packet_id)
            .expect("contains() checked above");
        if assembler.state() == State::Init {
            stream.last_mpu_sequence_number = mpu.mpu_sequence_number;
        } else if mpu.mpu_sequence_number == stream.last_mpu_sequence_number.wrapping_add(1) {
            stream.last_mpu_sequence_number = mpu.mpu_sequence_number;
            stream.au_index = 0;
        } else if mpu.mpu_sequence_number != stream.last_mpu_sequence_number {
            warn!(
                "MPU sequence discontinuity on {:?} ({} then {})",
                mmt.packet_id, stream.last_mpu_sequence_number, mpu.mpu_sequence_number
            );
            assembler.reset();
            return;
        }

        assembler.check_state(mmt.packet_sequence_number);
        stream.rap_flag = mmt.rap_flag;

        let mut completed = vec![];
        if !mpu.aggregate_flag {
            match DataUnit::parse(&mut payload, mpu.timed_flag, false) {
                Ok(du) => {
                    if let Some(unit) = assembler.assemble(
                        du.data,
                        mpu.fragmentation_indicator,
                        mmt.packet_sequence_number,
                    ) {
                        completed.push(unit);
                    }
                }
                Err(e) => {
                    warn!("dropping malformed data unit on {:?}: {:?}", mmt.packet_id, e);
                    return;
                }
            }
        } else {
            while !payload.is_eof() {
                let du = match DataUnit::parse(&mut payload, mpu.timed_flag, true) {
                    Ok(du) => du,
                    Err(e) => {
                        warn!(
                            "dropping remainder of aggregate MPU payload on {:?}: {:?}",
                            mmt.packet_id, e
                        );
                        break;
                    }
                };
                if let Some(unit) = assembler.assemble(
                    du.data,
                    mpu.fragmentation_indicator,
                    mmt.packet_sequence_number,
                ) {
                    completed.push(unit);
                }
            }
        }
        for unit in completed {
            self.process_mfu_data(handler, mmt.packet_id, unit);
        }
    }

    fn process_mfu_data<H: DemuxHandler>(
        &mut self,
        handler: &mut H,
        pid: PacketId,
        unit: Vec<u8>,
    ) {
        let mut processor = match self.streams.take_processor(pid) {
            Some(p) => p,
            None => return,
        };
        let stream = self
            .streams
            .get_mut(pid)
            .expect("processor came from this stream");
        let result = processor.process(stream, unit);
        self.streams.restore_processor(pid, processor);
        let data = match result {
            Some(data) => data,
            None => return,
        };
        let stream = self.streams.get(pid).expect("stream still registered");
        match stream.asset_type {
            AssetType::Hevc => handler.on_video_data(stream, &data),
            AssetType::Aac => handler.on_audio_data(stream, &data),
            AssetType::Ttml => handler.on_subtitle_data(stream, &data),
            AssetType::Application => handler.on_application_data(stream, &data),
            AssetType::Other(_) => {}
        }
    }

    fn process_signaling_messages<H: DemuxHandler>(
        &mut self,
        handler: &mut H,
        mmt: &MmtpPacket<'_>,
    ) {
        let mut payload = ByteReader::new(mmt.payload());
        let msg = match SignalingMessage::parse(&mut payload) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(
                    "dropping malformed signalling message on {:?}: {:?}",
                    mmt.packet_id, e
                );
                return;
            }
        };
        let assembler = self.assemblers.get(mmt.packet_id);
        assembler.check_state(mmt.packet_sequence_number);

        if !msg.aggregation_flag {
            if let Some(complete) = assembler.assemble(
                msg.payload,
                msg.fragmentation_indicator,
                mmt.packet_sequence_number,
            ) {
                self.process_signaling_message(handler, &complete);
            }
        } else {
            // aggregation of fragments is illegal; each aggregated entry is self-contained
            if msg.fragmentation_indicator != FragmentationIndicator::NotFragmented {
                return;
            }
            let mut entries = ByteReader::new(msg.payload);
            while !entries.is_eof() {
                let length = if msg.length_extension_flag {
                    entries.read_u32().map(|l| l as usize)
                } else {
                    entries.read_u16().map(|l| l as usize)
                };
                let taken = length.and_then(|l| entries.read_slice(l));
                match taken {
                    Ok(message) => self.process_signaling_message(handler, message),
                    Err(e) => {
                        warn!(
                            "dropping remainder of aggregated signalling payload on {:?}: {:?}",
                            mmt.packet_id, e
                        );
                        break;
                    }
                }
            }
        }
    }

    fn process_signaling_message<H: DemuxHandler>(&mut self, handler: &mut H, message: &[u8]) {
        let mut r = ByteReader::new(message);
        let id = match r.peek_u16() {
            Ok(id) => id,
            Err(_) => return,
        };
        match id {
            message_id::PA => self.process_pa_message(handler, &mut r),
            message_id::M2_SECTION | message_id::M2_SHORT_SECTION => {
                // message_id, version, length; then exactly one table section
                if r.skip(5).is_err() {
                    warn!("short M2 section message");
                    return;
                }
                self.process_mmt_table(handler, &mut r);
            }
            other => debug!("ignoring signalling message id {:#x}", other),
        }
    }

    fn process_pa_message<H: DemuxHandler>(&mut self, handler: &mut H, r: &mut ByteReader<'_>) {
        let parsed = (|| -> Result<Vec<usize>, ReadError> {
            r.skip(2)?; // message id
            r.skip(1)?; // version
            r.skip(4)?; // length
            let number_of_tables = r.read_u8()?;
            let mut lengths = Vec::with_capacity(number_of_tables as usize);
            for _ in 0..number_of_tables {
                r.skip(2)?; // table id, table version
                lengths.push(r.read_u16()? as usize);
            }
            Ok(lengths)
        })();
        let lengths = match parsed {
            Ok(lengths) => lengths,
            Err(e) => {
                warn!("dropping malformed PA message: {:?}", e);
                return;
            }
        };
        if lengths.is_empty() {
            while !r.is_eof() {
                if !self.process_mmt_table(handler, r) {
                    break;
                }
            }
        } else {
            for length in lengths {
                let mut table = match r.sub_reader(length) {
                    Ok(t) => t,
                    Err(e) => {
                        warn!("PA message table list overruns the message: {:?}", e);
                        return;
                    }
                };
                self.process_mmt_table(handler, &mut table);
            }
        }
    }

    /// Returns `false` when nothing could be made of the bytes at the cursor (which are then
    /// consumed, so callers iterating a multi-table region stop cleanly).
    fn process_mmt_table<H: DemuxHandler>(&mut self, handler: &mut H, r: &mut ByteReader<'_>) -> bool {
        match MmtTable::parse(r) {
            Ok(Some(MmtTable::Mpt(mpt))) => {
                self.streams.apply_mpt(&mpt);
                handler.on_mpt(&mpt);
                true
            }
            Ok(Some(MmtTable::Ecm(ecm))) => {
                self.descrambler.submit_ecm(&ecm.ecm_data);
                handler.on_ecm(&ecm);
                true
            }
            Ok(Some(MmtTable::Plt(plt))) => {
                handler.on_plt(&plt);
                true
            }
            Ok(Some(MmtTable::MhEit(eit))) => {
                handler.on_mh_eit(&eit);
                true
            }
            Ok(Some(MmtTable::MhSdt(sdt))) => {
                handler.on_mh_sdt(&sdt);
                true
            }
            Ok(Some(MmtTable::MhTot(tot))) => {
                handler.on_mh_tot(&tot);
                true
            }
            Ok(Some(MmtTable::MhCdt(cdt))) => {
                handler.on_mh_cdt(&cdt);
                true
            }
            Ok(Some(MmtTable::MhBit(bit))) => {
                handler.on_mh_bit(&bit);
                true
            }
            Ok(None) => {
                if let Ok(id) = r.peek_u8() {
                    debug!("ignoring table id {:#x}", id);
                }
                let _ = r.rest();
                false
            }
            Err(e) => {
                warn!("dropping unparseable table: {:?}", e);
                let _ = r.rest();
                false
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cas::test_support::FixedKeyCard;
    use crate::tables::mpt::test_support::build_mpt;
    use crate::tables::test_support::finish_section;

    const SCRAMBLE_KEY: u8 = 0x5A;

    #[derive(Default)]
    struct Recorder {
        video: Vec<(PacketId, MfuData)>,
        audio: Vec<(PacketId, MfuData)>,
        subtitle: usize,
        application: usize,
        ntp: usize,
        mpt: usize,
        ecm: usize,
        nit: usize,
        eit: usize,
        tot: usize,
    }
    impl DemuxHandler for Recorder {
        fn on_video_data(&mut self, stream: &ElementaryStream, data: &MfuData) {
            self.video.push((stream.packet_id, data.clone()));
        }
        fn on_audio_data(&mut self, stream: &ElementaryStream, data: &MfuData) {
            self.audio.push((stream.packet_id, data.clone()));
        }
        fn on_subtitle_data(&mut self, _stream: &ElementaryStream, _data: &MfuData) {
            self.subtitle += 1;
        }
        fn on_application_data(&mut self, _stream: &ElementaryStream, _data: &MfuData) {
            self.application += 1;
        }
        fn on_ntp(&mut self, _ntp: &ip::Ntpv4) {
            self.ntp += 1;
        }
        fn on_mpt(&mut self, _mpt: &tables::Mpt) {
            self.mpt += 1;
        }
        fn on_ecm(&mut self, _ecm: &tables::Ecm) {
            self.ecm += 1;
        }
        fn on_nit(&mut self, _nit: &tables::Nit) {
            self.nit += 1;
        }
        fn on_mh_eit(&mut self, _eit: &tables::MhEit) {
            self.eit += 1;
        }
        fn on_mh_tot(&mut self, _tot: &tables::MhTot) {
            self.tot += 1;
        }
    }

    fn tlv(packet_type: u8, payload: &[u8]) -> Vec<u8> {
        let mut data = vec![0x7F, packet_type];
        data.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        data.extend_from_slice(payload);
        data
    }

    /// Wraps MMTP packet bytes in the compressed-IP context and a TLV frame.
    fn compressed_ip_tlv(mmtp: &[u8]) -> Vec<u8> {
        let mut payload = vec![0x00, 0x10, 0x61];
        payload.extend_from_slice(mmtp);
        tlv(0x02, &payload)
    }

    fn mmtp_header(payload_type: u8, pid: u16, pseq: u32, rap: bool) -> Vec<u8> {
        let mut h = vec![if rap { 0x01 } else { 0x00 }, payload_type];
        h.extend_from_slice(&pid.to_be_bytes());
        h.extend_from_slice(&[0, 0, 0, 0]); // delivery timestamp
        h.extend_from_slice(&pseq.to_be_bytes());
        h
    }

    /// A non-aggregate, timed MPU payload holding one data-unit piece.
    fn mpu_payload(mpu_seq: u32, indicator: u8, mfu: &[u8]) -> Vec<u8> {
        let mut p = vec![];
        p.extend_from_slice(&((6 + 14 + mfu.len()) as u16).to_be_bytes());
        p.push((2 << 4) | (1 << 3) | (indicator << 1)); // MFU, timed, not aggregated
        p.push(0); // fragment counter
        p.extend_from_slice(&mpu_seq.to_be_bytes());
        p.extend_from_slice(&[0, 0, 0, 0]); // movie fragment sequence number
        p.extend_from_slice(&[0, 0, 0, 0]); // sample number
        p.extend_from_slice(&[0, 0, 0, 0]); // offset
        p.extend_from_slice(&[0, 0]); // priority, dependency counter
        p.extend_from_slice(mfu);
        p
    }

    fn mpu_tlv(pid: u16, pseq: u32, rap: bool, mpu_seq: u32, indicator: u8, mfu: &[u8]) -> Vec<u8> {
        let mut mmtp = mmtp_header(0x00, pid, pseq, rap);
        mmtp.extend_from_slice(&mpu_payload(mpu_seq, indicator, mfu));
        compressed_ip_tlv(&mmtp)
    }

    /// Like `mpu_tlv`, but with the scrambling extension set to ODD and the payload XORed with
    /// the `FixedKeyCard` key.
    fn scrambled_mpu_tlv(pid: u16, pseq: u32, mpu_seq: u32, mfu: &[u8]) -> Vec<u8> {
        let mut mmtp = vec![0x03, 0x00]; // extension_flag + rap_flag
        mmtp.extend_from_slice(&pid.to_be_bytes());
        mmtp.extend_from_slice(&[0, 0, 0, 0]);
        mmtp.extend_from_slice(&pseq.to_be_bytes());
        mmtp.extend_from_slice(&[
            0x00, 0x00, // multi-type extension
            0x00, 0x05, // ext length
            0x80, 0x01, // end_flag, scrambling item
            0x00, 0x01, // item length
            0b11 << 3, // encryption_flag ODD
        ]);
        let mut payload = mpu_payload(mpu_seq, 0, mfu);
        for b in payload.iter_mut() {
            *b ^= SCRAMBLE_KEY;
        }
        mmtp.extend_from_slice(&payload);
        compressed_ip_tlv(&mmtp)
    }

    /// A non-aggregated, not-fragmented signalling message in an MMTP packet in a TLV frame.
    fn signaling_tlv(pid: u16, pseq: u32, message: &[u8]) -> Vec<u8> {
        let mut mmtp = mmtp_header(0x02, pid, pseq, false);
        mmtp.push(0x00); // not fragmented, not aggregated
        mmtp.push(0x00); // fragment counter
        mmtp.extend_from_slice(message);
        compressed_ip_tlv(&mmtp)
    }

    fn pa_message(table: &[u8]) -> Vec<u8> {
        let mut m = vec![0x00, 0x00, 0x00]; // message id, version
        m.extend_from_slice(&((1 + 4 + table.len()) as u32).to_be_bytes());
        m.push(1); // one table
        m.push(table[0]);
        m.push(0x00); // table version
        m.extend_from_slice(&(table.len() as u16).to_be_bytes());
        m.extend_from_slice(table);
        m
    }

    fn m2_section_message(section: &[u8]) -> Vec<u8> {
        let mut m = vec![0x80, 0x00, 0x00]; // message id, version
        m.extend_from_slice(&(section.len() as u16).to_be_bytes());
        m.extend_from_slice(section);
        m
    }

    fn m2_short_section_message(section: &[u8]) -> Vec<u8> {
        let mut m = vec![0x80, 0x02, 0x00]; // message id, version
        m.extend_from_slice(&(section.len() as u16).to_be_bytes());
        m.extend_from_slice(section);
        m
    }

    fn ecm_section() -> Vec<u8> {
        let mut body = vec![0x00, 0x01, 0xC1, 0x00, 0x00];
        body.extend_from_slice(&[0x5A; 16]);
        finish_section(0x82, 0xB0, &body)
    }

    fn mpt_tlv(pseq: u32, assets: &[(u16, AssetType, Vec<u8>)]) -> Vec<u8> {
        signaling_tlv(0x0000, pseq, &pa_message(&build_mpt(assets)))
    }

    fn demuxer_with_card() -> Demuxer {
        Demuxer::new(Descrambler::new(Box::new(FixedKeyCard::new(SCRAMBLE_KEY))))
    }

    fn feed(demuxer: &mut Demuxer, recorder: &mut Recorder, data: &[u8]) -> Vec<ProcessStatus> {
        let mut r = ByteReader::new(data);
        let mut statuses = vec![];
        loop {
            let status = demuxer.process_packet(recorder, &mut r);
            if status == ProcessStatus::NeedMoreData {
                return statuses;
            }
            statuses.push(status);
        }
    }

    #[test]
    fn empty_input() {
        let mut demuxer = demuxer_with_card();
        let mut rec = Recorder::default();
        let mut r = ByteReader::new(&[]);
        assert_eq!(
            demuxer.process_packet(&mut rec, &mut r),
            ProcessStatus::NeedMoreData
        );
        assert!(demuxer.streams().is_empty());
    }

    #[test]
    fn lone_garbage_byte() {
        let mut demuxer = demuxer_with_card();
        let mut rec = Recorder::default();
        let mut r = ByteReader::new(&[0x00]);
        assert_eq!(demuxer.process_packet(&mut rec, &mut r), ProcessStatus::Resync);
        assert_eq!(r.position(), 1);
    }

    #[test]
    fn truncated_tlv_makes_no_progress() {
        let mut demuxer = demuxer_with_card();
        let mut rec = Recorder::default();
        let data = [0x7F, 0x03, 0x00, 0x10, 0xAA];
        let mut r = ByteReader::new(&data[..]);
        assert_eq!(
            demuxer.process_packet(&mut rec, &mut r),
            ProcessStatus::NeedMoreData
        );
        assert_eq!(r.position(), 0);
    }

    #[test]
    fn framing_resync() {
        let mut demuxer = demuxer_with_card();
        let mut rec = Recorder::default();
        // a stray 0xAA, then a transmission-control TLV packet with a 1-byte payload,
        let data = data_encoding::HEXLOWER.decode(b"aa7f03000142").unwrap();
        let statuses = feed(&mut demuxer, &mut rec, &data[..]);
        assert_eq!(
            statuses,
            vec![ProcessStatus::Resync, ProcessStatus::Consumed]
        );
        assert_eq!(rec.nit, 0);
    }

    #[test]
    fn mpt_registers_streams() {
        let mut demuxer = demuxer_with_card();
        let mut rec = Recorder::default();
        feed(
            &mut demuxer,
            &mut rec,
            &mpt_tlv(0, &[(0x100, AssetType::Hevc, vec![])]),
        );
        assert_eq!(rec.mpt, 1);
        assert!(demuxer.streams().contains(PacketId::new(0x100)));
    }

    #[test]
    fn rap_gating() {
        let mut demuxer = demuxer_with_card();
        let mut rec = Recorder::default();
        feed(
            &mut demuxer,
            &mut rec,
            &mpt_tlv(0, &[(0x100, AssetType::Hevc, vec![])]),
        );
        // a head fragment with no random access point must be discarded,
        feed(&mut demuxer, &mut rec, &mpu_tlv(0x100, 10, false, 5, 0b01, &[1, 2]));
        assert!(rec.video.is_empty());
        // at the RAP, a head..tail chain produces exactly one reassembled callback,
        feed(&mut demuxer, &mut rec, &mpu_tlv(0x100, 11, true, 6, 0b01, &[3, 4]));
        feed(&mut demuxer, &mut rec, &mpu_tlv(0x100, 12, false, 6, 0b11, &[5]));
        assert_eq!(rec.video.len(), 1);
        assert_eq!(rec.video[0].0, PacketId::new(0x100));
        assert_eq!(rec.video[0].1.payload, vec![3, 4, 5]);
        // the RAP flag tracks the most recent MMTP packet, which was the tail,
        assert!(!rec.video[0].1.is_rap);
    }

    #[test]
    fn mpu_sequence_gap_drops_until_next_rap() {
        let mut demuxer = demuxer_with_card();
        let mut rec = Recorder::default();
        feed(
            &mut demuxer,
            &mut rec,
            &mpt_tlv(0, &[(0x100, AssetType::Hevc, vec![])]),
        );
        feed(&mut demuxer, &mut rec, &mpu_tlv(0x100, 1, true, 10, 0b00, &[1]));
        assert_eq!(rec.video.len(), 1);
        // MPU 11 never arrives; 12 is a discontinuity and must not be delivered,
        feed(&mut demuxer, &mut rec, &mpu_tlv(0x100, 2, true, 12, 0b00, &[2]));
        assert_eq!(rec.video.len(), 1);
        // the assembler is back in Init, so even contiguous MPUs without a RAP stay dropped,
        feed(&mut demuxer, &mut rec, &mpu_tlv(0x100, 3, false, 13, 0b00, &[3]));
        assert_eq!(rec.video.len(), 1);
        // a fresh RAP restarts delivery,
        feed(&mut demuxer, &mut rec, &mpu_tlv(0x100, 4, true, 14, 0b00, &[4]));
        assert_eq!(rec.video.len(), 2);
        assert_eq!(rec.video[1].1.payload, vec![4]);
    }

    #[test]
    fn unannounced_packet_id_ignored() {
        let mut demuxer = demuxer_with_card();
        let mut rec = Recorder::default();
        feed(&mut demuxer, &mut rec, &mpu_tlv(0x999, 1, true, 1, 0b00, &[1]));
        assert!(rec.video.is_empty());
        assert!(demuxer.streams().is_empty());
    }

    #[test]
    fn scrambled_before_and_after_key_delivery() {
        let mut demuxer = demuxer_with_card();
        let mut rec = Recorder::default();
        feed(
            &mut demuxer,
            &mut rec,
            &mpt_tlv(0, &[(0x100, AssetType::Hevc, vec![])]),
        );
        let scrambled = scrambled_mpu_tlv(0x100, 7, 3, &[0x11, 0x22]);
        // before any ECM: consumed without emission, and no state disturbed,
        let statuses = feed(&mut demuxer, &mut rec, &scrambled);
        assert_eq!(statuses, vec![ProcessStatus::Consumed]);
        assert!(rec.video.is_empty());
        assert_eq!(demuxer.streams().len(), 1);
        // ECM arrives (over an M2 section message), the card yields a key,
        feed(
            &mut demuxer,
            &mut rec,
            &signaling_tlv(0x8401, 1, &m2_section_message(&ecm_section())),
        );
        assert_eq!(rec.ecm, 1);
        // the same packet now decrypts and the payload is delivered intact,
        feed(&mut demuxer, &mut rec, &scrambled);
        assert_eq!(rec.video.len(), 1);
        assert_eq!(rec.video[0].1.payload, vec![0x11, 0x22]);
    }

    #[test]
    fn mpt_asset_type_change_switches_callback() {
        let mut demuxer = demuxer_with_card();
        let mut rec = Recorder::default();
        feed(
            &mut demuxer,
            &mut rec,
            &mpt_tlv(0, &[(0x100, AssetType::Hevc, vec![])]),
        );
        feed(&mut demuxer, &mut rec, &mpu_tlv(0x100, 1, true, 5, 0b00, &[1]));
        assert_eq!(rec.video.len(), 1);

        feed(
            &mut demuxer,
            &mut rec,
            &mpt_tlv(2, &[(0x100, AssetType::Aac, vec![])]),
        );
        let stream = demuxer.streams().get(PacketId::new(0x100)).unwrap();
        assert_eq!(stream.asset_type, AssetType::Aac);
        // the replacement stream has not seen MPU 5; its tracking state is fresh,
        assert_eq!(stream.last_mpu_sequence_number, 0);

        // the old sequence position no longer lines up, so this is a discontinuity...
        feed(&mut demuxer, &mut rec, &mpu_tlv(0x100, 2, true, 6, 0b00, &[2]));
        assert!(rec.audio.is_empty());
        // ...and the next RAP brings delivery back, now through the audio callback,
        feed(&mut demuxer, &mut rec, &mpu_tlv(0x100, 3, true, 7, 0b00, &[3]));
        assert_eq!(rec.audio.len(), 1);
        assert_eq!(rec.video.len(), 1);
        assert_eq!(rec.audio[0].1.payload, vec![3]);
    }

    #[test]
    fn aggregate_mpu_delivers_each_data_unit() {
        let mut demuxer = demuxer_with_card();
        let mut rec = Recorder::default();
        feed(
            &mut demuxer,
            &mut rec,
            &mpt_tlv(0, &[(0x100, AssetType::Hevc, vec![])]),
        );
        // two aggregated, length-prefixed timed data units in one payload,
        let mut p = vec![];
        p.extend_from_slice(&0u16.to_be_bytes()); // payload_length (unused downstream)
        p.push((2 << 4) | (1 << 3) | 0b0000_0001); // MFU, timed, not fragmented, aggregate
        p.push(0);
        p.extend_from_slice(&9u32.to_be_bytes()); // MPU sequence number
        for mfu in [&[0xA1u8][..], &[0xB2, 0xB3][..]] {
            p.extend_from_slice(&((14 + mfu.len()) as u16).to_be_bytes());
            p.extend_from_slice(&[0; 14]);
            p.extend_from_slice(mfu);
        }
        let mut mmtp = mmtp_header(0x00, 0x100, 1, true);
        mmtp.extend_from_slice(&p);
        feed(&mut demuxer, &mut rec, &compressed_ip_tlv(&mmtp));
        assert_eq!(rec.video.len(), 2);
        assert_eq!(rec.video[0].1.payload, vec![0xA1]);
        assert_eq!(rec.video[1].1.payload, vec![0xB2, 0xB3]);
    }

    #[test]
    fn aggregate_of_fragments_is_dropped() {
        let mut demuxer = demuxer_with_card();
        let mut rec = Recorder::default();
        feed(
            &mut demuxer,
            &mut rec,
            &mpt_tlv(0, &[(0x100, AssetType::Hevc, vec![])]),
        );
        let mut p = vec![0x00, 0x00];
        p.push((2 << 4) | (1 << 3) | (0b01 << 1) | 1); // head fragment AND aggregate: illegal
        p.push(0);
        p.extend_from_slice(&9u32.to_be_bytes());
        let mut mmtp = mmtp_header(0x00, 0x100, 1, true);
        mmtp.extend_from_slice(&p);
        feed(&mut demuxer, &mut rec, &compressed_ip_tlv(&mmtp));
        assert!(rec.video.is_empty());
    }

    #[test]
    fn ntp_side_channel() {
        let mut demuxer = demuxer_with_card();
        let mut rec = Recorder::default();
        let mut payload = vec![0x60, 0, 0, 0]; // IPv6 header
        payload.extend_from_slice(&48u16.to_be_bytes());
        payload.push(ip::PROTOCOL_UDP);
        payload.push(64);
        payload.extend_from_slice(&[0; 32]); // addresses
        payload.extend_from_slice(&[0x00, 0x7B, 0x00, 0x7B, 0x00, 0x38, 0x00, 0x00]); // UDP
        payload.extend_from_slice(&[0x24, 0x02, 0x03, 0xe8]); // NTP header
        payload.extend_from_slice(&[0; 44]); // remainder of the NTP packet
        feed(&mut demuxer, &mut rec, &tlv(0x01, &payload));
        assert_eq!(rec.ntp, 1);
    }

    #[test]
    fn non_ntp_udp_ignored() {
        let mut demuxer = demuxer_with_card();
        let mut rec = Recorder::default();
        let mut payload = vec![0x60, 0, 0, 0];
        payload.extend_from_slice(&48u16.to_be_bytes());
        payload.push(ip::PROTOCOL_UDP);
        payload.push(64);
        payload.extend_from_slice(&[0; 32]);
        payload.extend_from_slice(&[0x00, 0x7B, 0x12, 0x34, 0x00, 0x38, 0x00, 0x00]);
        payload.extend_from_slice(&[0; 48]);
        feed(&mut demuxer, &mut rec, &tlv(0x01, &payload));
        assert_eq!(rec.ntp, 0);
    }

    #[test]
    fn nit_on_transmission_control_path() {
        let mut demuxer = demuxer_with_card();
        let mut rec = Recorder::default();
        let mut body = vec![0x00, 0x07, 0xC1, 0x00, 0x00];
        body.extend_from_slice(&[0xF0, 0x00]); // no network descriptors
        body.extend_from_slice(&[0xF0, 0x00]); // no streams
        let section = finish_section(0x40, 0xB0, &body);
        feed(&mut demuxer, &mut rec, &tlv(0x03, &section));
        assert_eq!(rec.nit, 1);
    }

    #[test]
    fn aggregated_signaling_messages() {
        let mut demuxer = demuxer_with_card();
        let mut rec = Recorder::default();
        // two PA messages (each carrying an MPT) aggregated in one signalling payload,
        let msg = pa_message(&build_mpt(&[(0x100, AssetType::Hevc, vec![])]));
        let mut payload = vec![];
        for _ in 0..2 {
            payload.extend_from_slice(&(msg.len() as u16).to_be_bytes());
            payload.extend_from_slice(&msg);
        }
        let mut mmtp = mmtp_header(0x02, 0x0000, 0, false);
        mmtp.push(0b0000_0001); // not fragmented, aggregated
        mmtp.push(0x00);
        mmtp.extend_from_slice(&payload);
        feed(&mut demuxer, &mut rec, &compressed_ip_tlv(&mmtp));
        assert_eq!(rec.mpt, 2);
    }

    #[test]
    fn fragmented_signaling_message() {
        let mut demuxer = demuxer_with_card();
        let mut rec = Recorder::default();
        let msg = pa_message(&build_mpt(&[(0x100, AssetType::Hevc, vec![])]));
        let (head, tail) = msg.split_at(msg.len() / 2);

        let mut mmtp = mmtp_header(0x02, 0x0000, 0, false);
        mmtp.push(0b0100_0000); // head fragment
        mmtp.push(0x00);
        mmtp.extend_from_slice(head);
        feed(&mut demuxer, &mut rec, &compressed_ip_tlv(&mmtp));
        assert_eq!(rec.mpt, 0);

        let mut mmtp = mmtp_header(0x02, 0x0000, 1, false);
        mmtp.push(0b1100_0000); // tail fragment
        mmtp.push(0x00);
        mmtp.extend_from_slice(tail);
        feed(&mut demuxer, &mut rec, &compressed_ip_tlv(&mmtp));
        assert_eq!(rec.mpt, 1);
        assert!(demuxer.streams().contains(PacketId::new(0x100)));
    }

    #[test]
    fn service_information_tables() {
        let mut demuxer = demuxer_with_card();
        let mut rec = Recorder::default();
        // an empty present/following MH-EIT for service 0x400,
        let eit_body = [
            0x04, 0x00, 0xC1, 0x00, 0x00, // section header extension
            0x00, 0x01, // tlv stream id
            0x00, 0x02, // original network id
            0x00, // segment last section number
            0x8B, // last table id
        ];
        let eit = finish_section(0x8B, 0xB0, &eit_body);
        feed(
            &mut demuxer,
            &mut rec,
            &signaling_tlv(0x8000, 0, &m2_section_message(&eit)),
        );
        assert_eq!(rec.eit, 1);
        // MH-TOT travels in the short-section message,
        let tot_body = [0xEE, 0x71, 0x23, 0x59, 0x59, 0xF0, 0x00];
        let tot = finish_section(0xA1, 0x70, &tot_body);
        feed(
            &mut demuxer,
            &mut rec,
            &signaling_tlv(0x8000, 1, &m2_short_section_message(&tot)),
        );
        assert_eq!(rec.tot, 1);
    }

    #[test]
    fn subtitle_and_application_streams() {
        let mut demuxer = demuxer_with_card();
        let mut rec = Recorder::default();
        feed(
            &mut demuxer,
            &mut rec,
            &mpt_tlv(
                0,
                &[
                    (0x130, AssetType::Ttml, vec![]),
                    (0x140, AssetType::Application, vec![]),
                ],
            ),
        );
        feed(&mut demuxer, &mut rec, &mpu_tlv(0x130, 1, true, 1, 0b00, &[7]));
        feed(&mut demuxer, &mut rec, &mpu_tlv(0x140, 1, true, 1, 0b00, &[8]));
        assert_eq!(rec.subtitle, 1);
        assert_eq!(rec.application, 1);
        assert!(rec.video.is_empty());
        assert!(rec.audio.is_empty());
    }

    #[test]
    fn clear_resets_everything() {
        let mut demuxer = demuxer_with_card();
        let mut rec = Recorder::default();
        feed(
            &mut demuxer,
            &mut rec,
            &mpt_tlv(0, &[(0x100, AssetType::Hevc, vec![])]),
        );
        feed(
            &mut demuxer,
            &mut rec,
            &signaling_tlv(0x8401, 1, &m2_section_message(&ecm_section())),
        );
        feed(&mut demuxer, &mut rec, &mpu_tlv(0x100, 1, true, 5, 0b00, &[1]));
        assert_eq!(rec.video.len(), 1);
        demuxer.clear();
        assert!(demuxer.streams().is_empty());
        // post-clear, data for the old pid is unannounced and scrambled content is undecodable,
        feed(&mut demuxer, &mut rec, &mpu_tlv(0x100, 2, true, 6, 0b00, &[2]));
        assert_eq!(rec.video.len(), 1);
        let scrambled = scrambled_mpu_tlv(0x100, 3, 7, &[9]);
        feed(&mut demuxer, &mut rec, &scrambled);
        assert_eq!(rec.video.len(), 1);
    }

    #[test]
    fn same_input_twice_gives_identical_callbacks() {
        let mut stream_bytes = vec![];
        stream_bytes.extend_from_slice(&mpt_tlv(0, &[(0x100, AssetType::Hevc, vec![])]));
        stream_bytes.extend_from_slice(&mpu_tlv(0x100, 1, true, 5, 0b01, &[1, 2]));
        stream_bytes.extend_from_slice(&mpu_tlv(0x100, 2, false, 5, 0b11, &[3]));
        stream_bytes.extend_from_slice(&mpu_tlv(0x100, 3, false, 6, 0b00, &[4]));

        let run = || {
            let mut demuxer = demuxer_with_card();
            let mut rec = Recorder::default();
            feed(&mut demuxer, &mut rec, &stream_bytes);
            rec.video
                .into_iter()
                .map(|(pid, data)| (pid, data.payload))
                .collect::<Vec<_>>()
        };
        let first = run();
        let second = run();
        assert_eq!(first, second);
        assert_eq!(
            first,
            vec![
                (PacketId::new(0x100), vec![1, 2, 3]),
                (PacketId::new(0x100), vec![4]),
            ]
        );
    }
}
