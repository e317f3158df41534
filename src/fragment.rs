//! Reassembly of payloads that were split across multiple MMTP packets.
//!
//! Every packet-id with fragmentable content gets its own
//! [`FragmentAssembler`](struct.FragmentAssembler.html), held in a
//! [`FragmentAssemblerRegistry`](struct.FragmentAssemblerRegistry.html).  The assembler enforces
//! MMTP packet-sequence-number continuity: any gap throws away the partial buffer and parks the
//! assembler in `Init`, where it stays until the demultiplexer sees the next random access
//! point.

use crate::PacketId;
use log::warn;
use std::collections::HashMap;

/// How a payload relates to the fragment chain it may be part of.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum FragmentationIndicator {
    /// `0b00` - a complete unit in its own right
    NotFragmented,
    /// `0b01` - first fragment of a unit
    HeadFragment,
    /// `0b10` - neither first nor last
    MiddleFragment,
    /// `0b11` - last fragment of a unit
    TailFragment,
}
impl FragmentationIndicator {
    pub fn from(val: u8) -> FragmentationIndicator {
        match val {
            0b00 => FragmentationIndicator::NotFragmented,
            0b01 => FragmentationIndicator::HeadFragment,
            0b10 => FragmentationIndicator::MiddleFragment,
            0b11 => FragmentationIndicator::TailFragment,
            _ => panic!("invalid 2-bit value {}", val),
        }
    }
}

/// Assembler lifecycle.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum State {
    /// nothing may be assembled until the stream reaches a random access point
    Init,
    /// continuity established; waiting for a head fragment or complete unit
    NotStarted,
    /// a head fragment has been buffered and the tail is still outstanding
    InFragment,
}

/// Rebuilds one packet-id's fragmented units from their pieces.
pub struct FragmentAssembler {
    state: State,
    data: Vec<u8>,
    last_sequence_number: Option<u32>,
}
impl Default for FragmentAssembler {
    fn default() -> FragmentAssembler {
        FragmentAssembler {
            state: State::Init,
            data: vec![],
            last_sequence_number: None,
        }
    }
}
impl FragmentAssembler {
    pub fn state(&self) -> State {
        self.state
    }

    /// `true` while a partially assembled unit is buffered.
    pub fn in_fragment(&self) -> bool {
        self.state == State::InFragment
    }

    /// Establishes or verifies packet-sequence continuity ahead of the fragments carried by the
    /// packet with the given sequence number.  A gap discards the partial buffer and returns the
    /// assembler to `Init` (decode resumes at the next random access point).
    pub fn check_state(&mut self, packet_sequence_number: u32) {
        match self.state {
            State::Init => self.state = State::NotStarted,
            _ => {
                if let Some(last) = self.last_sequence_number {
                    if last.wrapping_add(1) != packet_sequence_number && last != packet_sequence_number
                    {
                        warn!(
                            "packet sequence discontinuity: {} follows {}",
                            packet_sequence_number, last
                        );
                        self.data.clear();
                        self.state = State::Init;
                        self.last_sequence_number = Some(packet_sequence_number);
                        return;
                    }
                }
            }
        }
        self.last_sequence_number = Some(packet_sequence_number);
    }

    /// Feed one piece.  Returns the complete unit on `NotFragmented` input, or on a
    /// `TailFragment` that closes a contiguous head..tail chain; otherwise accumulates (or
    /// drops orphan pieces) and returns `None`.
    pub fn assemble(
        &mut self,
        payload: &[u8],
        indicator: FragmentationIndicator,
        packet_sequence_number: u32,
    ) -> Option<Vec<u8>> {
        match indicator {
            FragmentationIndicator::NotFragmented => {
                if self.state == State::InFragment {
                    warn!("complete unit while a fragment chain was open; dropping the chain");
                    self.data.clear();
                }
                self.state = State::NotStarted;
                self.last_sequence_number = Some(packet_sequence_number);
                Some(payload.to_vec())
            }
            FragmentationIndicator::HeadFragment => {
                if self.state == State::InFragment {
                    warn!("head fragment while a fragment chain was open; dropping the chain");
                }
                self.data.clear();
                self.data.extend_from_slice(payload);
                self.state = State::InFragment;
                self.last_sequence_number = Some(packet_sequence_number);
                None
            }
            FragmentationIndicator::MiddleFragment => {
                if self.state != State::InFragment {
                    return None;
                }
                self.data.extend_from_slice(payload);
                self.last_sequence_number = Some(packet_sequence_number);
                None
            }
            FragmentationIndicator::TailFragment => {
                if self.state != State::InFragment {
                    return None;
                }
                self.data.extend_from_slice(payload);
                self.state = State::NotStarted;
                self.last_sequence_number = Some(packet_sequence_number);
                let complete = std::mem::take(&mut self.data);
                Some(complete)
            }
        }
    }

    pub fn reset(&mut self) {
        self.state = State::Init;
        self.data.clear();
        self.last_sequence_number = None;
    }
}

/// One assembler per packet-id, created lazily on first use and dropped only by
/// [`clear()`](#method.clear).
#[derive(Default)]
pub struct FragmentAssemblerRegistry {
    assemblers: HashMap<PacketId, FragmentAssembler>,
}
impl FragmentAssemblerRegistry {
    pub fn get(&mut self, pid: PacketId) -> &mut FragmentAssembler {
        self.assemblers.entry(pid).or_default()
    }

    pub fn clear(&mut self) {
        self.assemblers.clear();
    }

    /// Number of packet-ids that have needed an assembler so far.
    pub fn len(&self) -> usize {
        self.assemblers.len()
    }
    pub fn is_empty(&self) -> bool {
        self.assemblers.is_empty()
    }
}
