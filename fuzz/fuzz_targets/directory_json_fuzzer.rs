//! Fuzz target for wire-shaped JSON payloads
//!
//! Device directories and inbound envelopes are parsed from backend
//! responses and realtime events; neither parse may panic, and a parsed
//! directory must count its devices consistently.
//!
//! # Invariants
//!
//! - Parsing arbitrary text as a directory or envelope NEVER panics
//! - `device_count` equals the number of iterated device triples
//! - A parsed envelope round-trips through serialization

#![no_main]

use libfuzzer_sys::fuzz_target;
use quill_proto::{DeviceDirectory, InboundEnvelope};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(directory) = serde_json::from_str::<DeviceDirectory>(text) {
        assert_eq!(directory.device_count(), directory.iter_devices().count());
    }

    if let Ok(envelope) = serde_json::from_str::<InboundEnvelope>(text) {
        let json = serde_json::to_string(&envelope).expect("envelope must serialize");
        let reparsed: InboundEnvelope =
            serde_json::from_str(&json).expect("serialized envelope must parse");
        assert_eq!(reparsed, envelope);
    }
});
