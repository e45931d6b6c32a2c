//! Fuzz target for EventName::parse
//!
//! Arbitrary strings must either parse into a name that round-trips through
//! its display form, or return an error. Never panic.

#![no_main]

use courier_proto::EventName;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(name) = EventName::parse(text) {
        let rendered = name.to_string();
        let reparsed = EventName::parse(&rendered);
        assert_eq!(reparsed.as_ref(), Ok(&name));
    }
});
