//! Coordination with the conditional-access smart card (the ACAS device of the Japanese 4K/8K
//! service).
//!
//! The card itself is an external collaborator: implement [`SmartCard`](trait.SmartCard.html)
//! over whatever device transport is available.  The [`Descrambler`](struct.Descrambler.html)
//! owns one card, feeds it the ECMs found in the signalling stream, and lends the resulting key
//! state to the MMTP decoder.  Card faults are never fatal; the multiplex's unscrambled parts
//! keep flowing and scrambled packets simply stay undecodable until a later ECM succeeds.

use log::warn;

/// Problems reported by a `SmartCard` implementation.
#[derive(Debug, PartialEq, Eq)]
pub enum CasError {
    /// the card transport is absent or lost
    NotConnected,
    /// the device rejected or failed the request
    Device(&'static str),
}

/// Selects which of the installed key pair a scrambled payload was encrypted with.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum KeyParity {
    Even,
    Odd,
}

/// Interface to the conditional-access device.
///
/// `decrypt_ecm()` must replace the card's installed key pair on success, after which
/// `decrypt_payload()` may be called any number of times until the next ECM.
pub trait SmartCard {
    fn init_card(&mut self) -> Result<(), CasError>;
    fn connect(&mut self) -> Result<(), CasError>;
    fn decrypt_ecm(&mut self, ecm: &[u8]) -> Result<(), CasError>;
    fn decrypt_payload(&self, payload: &mut [u8], parity: KeyParity) -> Result<(), CasError>;
}

/// Serialises access to the smart card and tracks whether any ECM has produced key material yet.
pub struct Descrambler {
    card: Option<Box<dyn SmartCard>>,
    ready: bool,
}
impl Descrambler {
    /// Takes ownership of the card and brings it up.  Initialisation failure is logged and
    /// swallowed; the descrambler then behaves as never-ready until `submit_ecm()` succeeds.
    pub fn new(mut card: Box<dyn SmartCard>) -> Descrambler {
        if let Err(e) = card.init_card().and_then(|_| card.connect()) {
            warn!("smart card initialisation failed: {:?}", e);
        }
        Descrambler {
            card: Some(card),
            ready: false,
        }
    }

    /// A descrambler with no card at all; scrambled packets stay undecodable.
    pub fn disconnected() -> Descrambler {
        Descrambler {
            card: None,
            ready: false,
        }
    }

    /// `true` once at least one ECM has yielded a key pair.
    pub fn ready(&self) -> bool {
        self.ready
    }

    /// Forwards an ECM to the card.  Failures are logged and suppressed.
    pub fn submit_ecm(&mut self, ecm: &[u8]) {
        let card = match self.card {
            Some(ref mut c) => c,
            None => return,
        };
        match card.decrypt_ecm(ecm) {
            Ok(()) => self.ready = true,
            Err(e) => warn!("ECM decryption failed: {:?}", e),
        }
    }

    /// Decrypts `payload` in place with the installed key of the given parity.  Returns `false`
    /// (after logging) on device fault.
    pub fn decrypt(&mut self, payload: &mut [u8], parity: KeyParity) -> bool {
        let card = match self.card {
            Some(ref mut c) => c,
            None => return false,
        };
        match card.decrypt_payload(payload, parity) {
            Ok(()) => true,
            Err(e) => {
                warn!("payload descrambling failed: {:?}", e);
                false
            }
        }
    }

    /// Forgets the key state; scrambled packets are undecodable again until the next ECM.
    pub fn reset(&mut self) {
        self.ready = false;
    }
}
