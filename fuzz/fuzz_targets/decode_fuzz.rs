#![no_main]
use chunkdelta::format;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must decode to an error, never a panic.
    let _ = format::decode_all(&[], data);

    if data.len() >= 2 {
        let split = data.len() / 2;
        let (old, delta) = data.split_at(split);
        let _ = format::decode_all(old, delta);
    }

    // Same input behind a valid header exercises the record parser.
    let mut framed = b"CDLT\x01\x04".to_vec();
    framed.extend_from_slice(data);
    let _ = format::decode_all(data, &framed);
});
