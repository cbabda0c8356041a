#![no_main]
use chunkdelta::delta::{DeltaEncoder, OpRecorder, apply_ops};
use chunkdelta::engine;
use chunkdelta::hash::config::DeltaOptions;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }

    let window_size = 1 + (data[0] % 16) as usize;
    let min_match = 1 + (data[1] % 32) as usize;
    let split = 3 + (data[2] as usize % (data.len() - 3));
    let old = &data[3..split];
    let new = &data[split..];

    let opts = DeltaOptions {
        window_size,
        min_match,
        block_size: 1 + (data[0] as usize >> 4) * 7,
        max_chain: 1 + (data[1] as usize >> 5),
        matching: true,
    };

    let encoder = DeltaEncoder::new(opts.clone()).unwrap();
    let mut ops = OpRecorder::new();
    encoder.encode(old, new, &mut ops).unwrap();
    assert_eq!(apply_ops(old, ops.ops()).unwrap(), new);

    let delta = engine::encode_with_options(old, new, &opts).unwrap();
    assert_eq!(engine::decode(old, &delta).unwrap(), new);
});
