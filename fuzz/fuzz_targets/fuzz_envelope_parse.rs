// Copyright (c) 2026 Ddns-node Contributors
// Licensed under the Apache-2.0 License.

#![no_main]
#![forbid(unsafe_code)]

use libfuzzer_sys::fuzz_target;

use ddns_node::core::message::Envelope;

fuzz_target!(|data: &[u8]| {
    // Best-effort: ensure the newline-delimited wire frame never panics on
    // arbitrary attacker-controlled input, over both UDP and TCP direct.
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = Envelope::from_line(s);
    }
});
