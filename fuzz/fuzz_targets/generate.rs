#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Anything that parses must generate or fail with an error, never panic.
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = hang10::generate_source(s);
    }
});
