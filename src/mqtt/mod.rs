pub mod client;

/// An LWT message as received from the broker.
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}
