use core::fmt;
use heapless::String;

/// Largest payload the mesh transport carries in one packet.
pub const MAX_PAYLOAD_LEN: usize = 233;

/// Hop limit set on every reply.
pub const REPLY_HOP_LIMIT: u8 = 7;

/// A received text message and its link metadata.
#[derive(Debug, Clone, Copy)]
pub struct Inbound<'a> {
    /// Sender node number.
    pub from: u32,
    /// Raw payload bytes.
    pub payload: &'a [u8],
    /// Received signal strength, dBm.
    pub rx_rssi: i32,
    /// Signal to noise ratio, dB.
    pub rx_snr: f32,
    /// Hop limit the sender started with.
    pub hop_start: u8,
    /// Hop limit left on arrival.
    pub hop_limit: u8,
    /// The packet came through an MQTT gateway.
    pub via_mqtt: bool,
}

impl Inbound<'_> {
    /// Number of relays the message went through.
    pub fn hops_away(&self) -> u8 {
        self.hop_start.saturating_sub(self.hop_limit)
    }
}

/// An outbound text reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    to: u32,
    payload: String<MAX_PAYLOAD_LEN>,
}

impl Reply {
    pub(crate) fn new(to: u32, payload: String<MAX_PAYLOAD_LEN>) -> Self {
        Self { to, payload }
    }

    /// Destination node number.
    pub fn to(&self) -> u32 {
        self.to
    }

    /// Reply text.
    pub fn text(&self) -> &str {
        &self.payload
    }

    /// Reply bytes, exactly [`len`](Reply::len) long.
    pub fn payload(&self) -> &[u8] {
        self.payload.as_bytes()
    }

    /// Exact payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// `true` for an empty payload.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Hop limit to send with.
    pub fn hop_limit(&self) -> u8 {
        REPLY_HOP_LIMIT
    }

    /// Replies never request an acknowledgment.
    pub fn want_ack(&self) -> bool {
        false
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.payload)
    }
}

/// Outbound side of the mesh stack.
///
/// Sending is fire-and-forget: the dispatcher logs an error and carries on.
pub trait Transport {
    /// Error reported by the transport.
    type Error: fmt::Debug;

    /// Queue a reply for transmission.
    fn send(&mut self, reply: Reply) -> Result<(), Self::Error>;
}
