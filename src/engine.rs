// In-memory delta engine: encoder + container in one call.
//
//   encode: old/new byte slices -> serialised container
//   decode: old bytes + container -> new bytes

use crate::delta::encoder::{DeltaEncoder, EncodeError, EncodeStats};
use crate::delta::patch::DecodeError;
use crate::format::{self, RecordWriter};
use crate::hash::config::DeltaOptions;

/// Encode the delta from `old` to `new` with default options.
pub fn encode(old: &[u8], new: &[u8]) -> Result<Vec<u8>, EncodeError> {
    encode_with_options(old, new, &DeltaOptions::default())
}

/// Encode with custom options.
pub fn encode_with_options(
    old: &[u8],
    new: &[u8],
    opts: &DeltaOptions,
) -> Result<Vec<u8>, EncodeError> {
    encode_with_stats(old, new, opts).map(|(delta, _)| delta)
}

/// Encode and also return the encoder's statistics.
pub fn encode_with_stats(
    old: &[u8],
    new: &[u8],
    opts: &DeltaOptions,
) -> Result<(Vec<u8>, EncodeStats), EncodeError> {
    let encoder = DeltaEncoder::new(opts.clone())?;
    let mut writer = RecordWriter::new(Vec::with_capacity(new.len() / 4 + 16), opts.window_size)?;
    let stats = encoder.encode(old, new, &mut writer)?;
    Ok((writer.finish()?, stats))
}

/// Reconstruct the new stream from `old` and a container produced by [`encode`].
pub fn decode(old: &[u8], delta: &[u8]) -> Result<Vec<u8>, DecodeError> {
    format::decode_all(old, delta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::config::ConfigError;

    fn roundtrip(old: &[u8], new: &[u8]) {
        let delta = encode(old, new).expect("encode failed");
        let reconstructed = decode(old, &delta).expect("decode failed");
        assert_eq!(
            reconstructed,
            new,
            "roundtrip mismatch (old={}, new={}, delta={})",
            old.len(),
            new.len(),
            delta.len()
        );
    }

    #[test]
    fn roundtrip_identical() {
        let data = b"The quick brown fox jumps over the lazy dog.";
        roundtrip(data, data);
    }

    #[test]
    fn roundtrip_small_edit() {
        roundtrip(
            b"Hello, world! This is a test of the delta engine.",
            b"Hello, earth! This is a test of the delta engine.",
        );
    }

    #[test]
    fn roundtrip_no_old() {
        roundtrip(b"", b"ABCDEFGHIJKLMNOPQRSTUVWXYZ");
    }

    #[test]
    fn roundtrip_empty_new() {
        roundtrip(b"some old bytes", b"");
    }

    #[test]
    fn roundtrip_reordered_chunks() {
        roundtrip(
            b"AAAA BBBB CCCC DDDD EEEE FFFF GGGG HHHH",
            b"AAAA CCCC DDDD EEEE xxxx GGGG HHHH IIII",
        );
    }

    #[test]
    fn roundtrip_binary_data() {
        let old: Vec<u8> = (0..=255).cycle().take(4096).collect();
        let mut new = old.clone();
        new[100] = 0xFF;
        new[200] = 0x00;
        new[1000] = 0x42;
        roundtrip(&old, &new);
    }

    #[test]
    fn roundtrip_all_levels() {
        let old = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789abcdefghijklmnopqrstuvwxyz";
        let new = b"ABCDEFGHIJKLMNOP--CHANGED--UVWXYZ0123456789abcdefghijklmnopqrstuvwxyz!!!";

        for level in 0..=9 {
            let opts = DeltaOptions::for_level(level);
            let delta = encode_with_options(old, new, &opts).expect("encode failed");
            let reconstructed = decode(old, &delta).expect("decode failed");
            assert_eq!(reconstructed, new, "level {level} roundtrip failed");
        }
    }

    #[test]
    fn level_zero_stores_literally() {
        let old = b"0123456789abcdef";
        let (_, stats) = encode_with_stats(old, old, &DeltaOptions::for_level(0)).unwrap();
        assert_eq!(stats.copies, 0);
        assert_eq!(stats.adds, 1);
        assert_eq!(stats.literal_bytes, old.len() as u64);
    }

    #[test]
    fn delta_is_smaller_for_similar_data() {
        let old: Vec<u8> = (0..=255).cycle().take(8192).collect();
        let mut new = old.clone();
        new[4096] ^= 0xFF;
        let delta = encode(&old, &new).expect("encode failed");
        assert!(
            delta.len() < new.len() / 2,
            "delta ({}) should be much smaller than new ({})",
            delta.len(),
            new.len()
        );
    }

    #[test]
    fn invalid_options_rejected() {
        let opts = DeltaOptions {
            window_size: 0,
            ..Default::default()
        };
        let err = encode_with_options(b"a", b"b", &opts).unwrap_err();
        assert!(matches!(err, EncodeError::Config(ConfigError::ZeroWindow)));
    }

    #[test]
    fn oversized_window_rejected_before_hashing() {
        let opts = DeltaOptions {
            window_size: usize::MAX,
            ..Default::default()
        };
        let err = encode_with_options(b"abc", b"abc", &opts).unwrap_err();
        assert!(matches!(
            err,
            EncodeError::Config(ConfigError::WindowTooLarge(usize::MAX))
        ));
    }

    #[test]
    fn decode_rejects_foreign_data() {
        assert!(decode(b"", b"\xd6\xc3\xc4\x00").is_err());
    }
}
