//! Fuzz target for WireFrame::decode
//!
//! This fuzzer tests frame decoding with arbitrary text to find:
//! - Parser crashes or panics
//! - Type confusion between the three frame shapes
//! - Malformed ack slots that bypass normalization
//!
//! The fuzzer should NEVER panic. All invalid inputs should return an error.

#![no_main]

use courier_proto::{AckBody, WireFrame};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    // Decoding arbitrary text should never panic, only return Err
    let Ok(frame) = WireFrame::decode(text) else {
        return;
    };

    // A decoded frame must re-encode, and ack slots must normalize
    let _ = frame.encode();
    if let WireFrame::Ack { error, data, .. } = frame {
        let _ = AckBody::from_slots(error, data);
    }
});
