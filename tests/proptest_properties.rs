use chunkdelta::delta::{DeltaEncoder, Op, OpRecorder, apply_ops};
use chunkdelta::engine;
use chunkdelta::hash::config::DeltaOptions;
use chunkdelta::hash::rolling::{MODULUS, PolyHash};
use proptest::prelude::*;

fn options(window_size: usize, min_match: usize, block_size: usize) -> DeltaOptions {
    DeltaOptions {
        window_size,
        min_match,
        block_size,
        ..Default::default()
    }
}

fn ops_for(old: &[u8], new: &[u8], opts: &DeltaOptions) -> Vec<Op> {
    let encoder = DeltaEncoder::new(opts.clone()).unwrap();
    let mut rec = OpRecorder::new();
    encoder.encode(old, new, &mut rec).unwrap();
    rec.into_ops()
}

/// Bytes drawn from a tiny alphabet so chunks repeat and hashes collide.
fn low_entropy(max: usize) -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(prop_oneof![Just(b'a'), Just(b'b'), Just(b'c')], 0..max)
}

/// Eight bytes whose hash equals that of eight zero bytes.
fn colliding_window() -> [u8; 8] {
    let mut v = MODULUS;
    let mut out = [0u8; 8];
    for digit in out.iter_mut().rev() {
        *digit = (v % 251) as u8;
        v /= 251;
    }
    out
}

/// Streams stitched from zero windows, colliding windows and one ordinary
/// window, behind a short misaligning prefix.
fn collision_rich(max_windows: usize) -> impl Strategy<Value = Vec<u8>> {
    (
        proptest::collection::vec(any::<u8>(), 0..8),
        proptest::collection::vec(0u8..3, 0..max_windows),
    )
        .prop_map(|(prefix, picks)| {
            let mut out = prefix;
            for pick in picks {
                match pick {
                    0 => out.extend_from_slice(&[0u8; 8]),
                    1 => out.extend_from_slice(&colliding_window()),
                    _ => out.extend_from_slice(b"ordinary"),
                }
            }
            out
        })
}

proptest! {
    #[test]
    fn prop_rolling_update_matches_full_hash(
        data in proptest::collection::vec(any::<u8>(), 1..512),
        window in 1usize..48,
    ) {
        prop_assume!(data.len() >= window);
        let hasher = PolyHash::new(window);
        let mut h = hasher.hash_of(&data[..window]);
        for start in 1..=data.len() - window {
            h = hasher.update(h, data[start + window - 1], data[start - 1]);
            prop_assert_eq!(h, hasher.hash_of(&data[start..start + window]), "start={}", start);
        }
    }

    #[test]
    fn prop_ops_reconstruct_new(
        old in proptest::collection::vec(any::<u8>(), 0..2048),
        new in proptest::collection::vec(any::<u8>(), 0..2048),
        window in 1usize..12,
        min_match in 1usize..24,
        block_size in 1usize..96,
    ) {
        let ops = ops_for(&old, &new, &options(window, min_match, block_size));
        prop_assert_eq!(apply_ops(&old[..], &ops).unwrap(), new);
    }

    #[test]
    fn prop_repetitive_inputs_reconstruct(
        old in low_entropy(600),
        new in low_entropy(600),
        window in 1usize..6,
        max_chain in 1usize..8,
    ) {
        let opts = DeltaOptions { max_chain, ..options(window, window * 2, 16) };
        let ops = ops_for(&old, &new, &opts);
        prop_assert_eq!(apply_ops(&old[..], &ops).unwrap(), new);
    }

    #[test]
    fn prop_colliding_windows_reconstruct(
        old in collision_rich(24),
        new in collision_rich(24),
        window in prop_oneof![Just(7usize), Just(8), Just(9), Just(16)],
        min_extra in 0usize..9,
        max_chain in 1usize..8,
        block_size in 1usize..40,
    ) {
        let min_match = window + min_extra;
        let opts = DeltaOptions { max_chain, ..options(window, min_match, block_size) };
        let ops = ops_for(&old, &new, &opts);
        for op in &ops {
            if let Op::Copy { len, .. } = op {
                prop_assert!(*len >= min_match as u64, "copy of {} < {}", len, min_match);
            }
        }
        prop_assert_eq!(apply_ops(&old[..], &ops).unwrap(), new);
    }

    #[test]
    fn prop_edited_copy_reconstructs_through_container(
        old in proptest::collection::vec(any::<u8>(), 64..4096),
        cut in any::<prop::sample::Index>(),
        insert in proptest::collection::vec(any::<u8>(), 0..64),
        level in 0u32..=9,
    ) {
        let at = cut.index(old.len());
        let mut new = old[..at].to_vec();
        new.extend_from_slice(&insert);
        new.extend_from_slice(&old[at..]);

        let delta = engine::encode_with_options(&old, &new, &DeltaOptions::for_level(level)).unwrap();
        prop_assert_eq!(engine::decode(&old, &delta).unwrap(), new);
    }

    #[test]
    fn prop_copies_respect_min_match(
        old in low_entropy(800),
        new in low_entropy(800),
        window in 1usize..8,
        extra in 0usize..16,
    ) {
        let min_match = window + extra;
        let ops = ops_for(&old, &new, &options(window, min_match, 32));
        for op in &ops {
            if let Op::Copy { len, .. } = op {
                prop_assert!(*len >= min_match as u64, "copy of {} < {}", len, min_match);
            }
        }
        prop_assert!(
            !ops.windows(2).any(|w| matches!(w, [Op::Add(_), Op::Add(_)])),
            "adjacent ADDs in {:?}",
            ops
        );
    }

    #[test]
    fn prop_identical_streams_are_one_copy(
        chunks in proptest::collection::vec(any::<u8>(), 1..256),
        window in 1usize..9,
    ) {
        let len = (chunks.len() / window).max(2) * window;
        let data: Vec<u8> = chunks.iter().copied().cycle().take(len).collect();
        let min_match = len.min(8).max(1);
        let ops = ops_for(&data, &data, &options(window, min_match, 13));
        prop_assert_eq!(ops, vec![Op::Copy { offset: 0, len: len as u64 }]);
    }

    #[test]
    fn prop_disjoint_content_is_one_add(
        old in proptest::collection::vec(0u8..128, 0..1024),
        new in proptest::collection::vec(128u8..=255, 1..1024),
        window in 1usize..8,
    ) {
        let ops = ops_for(&old, &new, &options(window, window, 64));
        prop_assert_eq!(ops, vec![Op::Add(new)]);
    }

    #[test]
    fn prop_short_old_never_copies(
        new in proptest::collection::vec(any::<u8>(), 0..512),
        window in 2usize..16,
        old_len in 0usize..16,
    ) {
        let old = &new[..old_len.min(window - 1).min(new.len())];
        let ops = ops_for(old, &new, &options(window, 1, 8));
        prop_assert!(ops.iter().all(|op| matches!(op, Op::Add(_))));
        prop_assert!(ops.len() <= 1);
    }
}

#[test]
fn concrete_scenario() {
    let ops = ops_for(
        b"ABCDEFGHIJKLMNOP",
        b"XYZEFGHIJKLMNOPQR",
        &DeltaOptions::default(),
    );
    assert_eq!(
        ops,
        vec![
            Op::Add(b"XYZ".to_vec()),
            Op::Copy { offset: 4, len: 12 },
            Op::Add(b"QR".to_vec()),
        ]
    );
}

#[test]
#[ignore = "performance properties are workload and machine dependent"]
fn perf_property_repetitive_input_not_quadratic() {
    use std::time::Instant;
    let old = vec![0u8; 4 * 1024 * 1024];
    let mut new = old.clone();
    for i in (0..new.len()).step_by(4096) {
        new[i] = 1;
    }

    let t0 = Instant::now();
    let delta = engine::encode(&old, &new).unwrap();
    let dt = t0.elapsed();
    assert_eq!(engine::decode(&old, &delta).unwrap(), new);
    assert!(dt.as_secs_f64() < 20.0, "encode took {:?}", dt);
}
