//! Fuzz target for inbound message decoding
//!
//! Untrusted text reaches `ClientMessage::decode_bounded` on every frame.
//!
//! # Strategy
//!
//! - Arbitrary bytes interpreted as (lossy) UTF-8 text
//! - Bounded decode with the default size limit
//!
//! # Invariants
//!
//! - Decoding NEVER panics
//! - Text over the limit MUST reject as `TooLarge`
//! - Anything that decodes re-encodes and decodes to the same message

#![no_main]

use libfuzzer_sys::fuzz_target;
use tandem_proto::{ClientMessage, ProtocolError};
use tandem_server::DriverConfig;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let max = DriverConfig::default().max_message_bytes;

    match ClientMessage::decode_bounded(&text, max) {
        Ok(message) => {
            let encoded = message.encode().expect("decoded message must encode");
            let again = ClientMessage::decode(&encoded).expect("encoded message must decode");
            assert_eq!(message, again);
        },
        Err(ProtocolError::TooLarge { size, max: limit }) => {
            assert!(size > limit);
        },
        Err(_) => {
            assert!(text.len() <= max);
        },
    }
});
