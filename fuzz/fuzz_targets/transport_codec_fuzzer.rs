//! Fuzz target for the transport text codec
//!
//! The codec sits in front of every prekey and ciphertext that crosses
//! the wire, including attacker-controlled directory entries.
//!
//! # Invariants
//!
//! - `decode` NEVER panics on arbitrary text
//! - `decode(encode(b)) == b` for arbitrary binary `b`
//! - Anything that decodes re-encodes to an equivalent value

#![no_main]

use libfuzzer_sys::fuzz_target;
use quill_proto::codec;

fuzz_target!(|data: &[u8]| {
    // Arbitrary binary always encodes and round-trips.
    let encoded = codec::encode(data);
    let decoded = codec::decode(&encoded).expect("canonical encoding must decode");
    assert_eq!(decoded, data);

    // Arbitrary text must never panic; anything that decodes must
    // survive a second round trip.
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(bytes) = codec::decode(text) {
            let reencoded = codec::encode(&bytes);
            let redecoded = codec::decode(&reencoded).expect("re-encoding must decode");
            assert_eq!(bytes, redecoded);
        }
    }
});
