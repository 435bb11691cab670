#![no_main]

use libfuzzer_sys::fuzz_target;
use trellis_host::Message;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(batch) = Message::parse_batch(text) {
        for message in batch {
            let wire = message.to_string();
            let reparsed = Message::parse(&wire).expect("rendered message must parse");
            assert_eq!(reparsed, message, "wire form {wire:?} is lossy");
        }
    }
});
