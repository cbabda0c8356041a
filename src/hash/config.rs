// Encoder tuning: window size, minimum match, block size, chain limit.
//
// Levels 1-9 map onto a handful of matcher presets trading speed for ratio;
// level 0 disables matching altogether.

use crate::store::DEFAULT_BLOCK_SIZE;

/// Default chunk/window width in bytes.
pub const DEFAULT_WINDOW_SIZE: usize = 4;

/// Default minimum length for a COPY.
pub const DEFAULT_MIN_MATCH: usize = 8;

/// Default number of collision-chain entries probed per lookup.
pub const DEFAULT_MAX_CHAIN: usize = 64;

/// Largest accepted window.
pub const MAX_WINDOW_SIZE: usize = 1 << 20;

/// Largest accepted pooled block size.
pub const MAX_BLOCK_SIZE: usize = 1 << 30;

/// Default compression level.
pub const DEFAULT_LEVEL: u32 = 6;

/// Encoder configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaOptions {
    /// Chunk size of the old-stream index and width of the new-stream window.
    pub window_size: usize,
    /// Matches shorter than this are folded into the surrounding literal run.
    pub min_match: usize,
    /// Size of the pooled blocks both streams are read into.
    pub block_size: usize,
    /// Collision-chain entries probed per lookup or resynchronisation.
    pub max_chain: usize,
    /// When false, no index is built and the whole new stream becomes one ADD.
    pub matching: bool,
}

impl Default for DeltaOptions {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            min_match: DEFAULT_MIN_MATCH,
            block_size: DEFAULT_BLOCK_SIZE,
            max_chain: DEFAULT_MAX_CHAIN,
            matching: true,
        }
    }
}

impl DeltaOptions {
    /// Preset options for a compression level (0-9).
    ///
    /// - Level 0: store only, no matching
    /// - Levels 1-2: 16-byte windows, short chains
    /// - Levels 3-5: 8-byte windows
    /// - Level 6: 4-byte windows (default)
    /// - Levels 7-9: 4-byte windows, long chains
    pub fn for_level(level: u32) -> Self {
        let preset = config_for_level(level);
        Self {
            window_size: preset.window_size,
            min_match: preset.min_match,
            max_chain: preset.max_chain,
            matching: level > 0,
            ..Self::default()
        }
    }

    /// Reject option combinations the encoder cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        if self.window_size > MAX_WINDOW_SIZE {
            return Err(ConfigError::WindowTooLarge(self.window_size));
        }
        if self.min_match == 0 {
            return Err(ConfigError::ZeroMinMatch);
        }
        if self.block_size == 0 {
            return Err(ConfigError::ZeroBlockSize);
        }
        if self.block_size > MAX_BLOCK_SIZE {
            return Err(ConfigError::BlockSizeTooLarge(self.block_size as u64));
        }
        if self.max_chain == 0 {
            return Err(ConfigError::ZeroChain);
        }
        Ok(())
    }
}

/// Invalid encoder configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("window size must be at least 1 byte")]
    ZeroWindow,
    #[error("window size {0} exceeds the maximum of {MAX_WINDOW_SIZE} bytes")]
    WindowTooLarge(usize),
    #[error("minimum match length must be at least 1 byte")]
    ZeroMinMatch,
    #[error("block size must be at least 1 byte")]
    ZeroBlockSize,
    #[error("block size {0} exceeds the maximum of {MAX_BLOCK_SIZE} bytes")]
    BlockSizeTooLarge(u64),
    #[error("collision chain limit must be at least 1")]
    ZeroChain,
}

/// A named tuning preset.
#[derive(Debug, Clone, Copy)]
pub struct Preset {
    /// Name for display purposes.
    pub name: &'static str,
    pub window_size: usize,
    pub min_match: usize,
    pub max_chain: usize,
}

pub const FASTEST: Preset = Preset {
    name: "fastest",
    window_size: 16,
    min_match: 32,
    max_chain: 4,
};

pub const FAST: Preset = Preset {
    name: "fast",
    window_size: 8,
    min_match: 16,
    max_chain: 16,
};

pub const DEFAULT: Preset = Preset {
    name: "default",
    window_size: DEFAULT_WINDOW_SIZE,
    min_match: DEFAULT_MIN_MATCH,
    max_chain: DEFAULT_MAX_CHAIN,
};

pub const SLOW: Preset = Preset {
    name: "slow",
    window_size: 4,
    min_match: 8,
    max_chain: 1024,
};

/// Preset for a compression level. Level 0 shares the fastest preset but
/// `DeltaOptions::for_level` turns matching off for it.
pub fn config_for_level(level: u32) -> Preset {
    match level {
        0..=2 => FASTEST,
        3..=5 => FAST,
        6 => DEFAULT,
        _ => SLOW,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let opts = DeltaOptions::default();
        assert_eq!(opts.window_size, 4);
        assert_eq!(opts.min_match, 8);
        assert_eq!(opts.block_size, 8192);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn level_mapping() {
        assert_eq!(config_for_level(0).name, "fastest");
        assert_eq!(config_for_level(2).name, "fastest");
        assert_eq!(config_for_level(3).name, "fast");
        assert_eq!(config_for_level(5).name, "fast");
        assert_eq!(config_for_level(6).name, "default");
        assert_eq!(config_for_level(7).name, "slow");
        assert_eq!(config_for_level(9).name, "slow");
    }

    #[test]
    fn level_zero_disables_matching() {
        assert!(!DeltaOptions::for_level(0).matching);
        assert!(DeltaOptions::for_level(1).matching);
        assert_eq!(DeltaOptions::for_level(DEFAULT_LEVEL), DeltaOptions::default());
    }

    #[test]
    fn presets_keep_min_match_above_window() {
        for p in [FASTEST, FAST, DEFAULT, SLOW] {
            assert!(p.min_match >= p.window_size, "preset {}", p.name);
        }
    }

    #[test]
    fn invalid_options_rejected() {
        let bad = |f: fn(&mut DeltaOptions)| {
            let mut o = DeltaOptions::default();
            f(&mut o);
            o.validate().unwrap_err()
        };
        assert_eq!(bad(|o| o.window_size = 0), ConfigError::ZeroWindow);
        assert_eq!(bad(|o| o.min_match = 0), ConfigError::ZeroMinMatch);
        assert_eq!(bad(|o| o.block_size = 0), ConfigError::ZeroBlockSize);
        assert_eq!(bad(|o| o.max_chain = 0), ConfigError::ZeroChain);
    }

    #[test]
    fn oversized_options_rejected() {
        let mut o = DeltaOptions {
            window_size: usize::MAX,
            ..Default::default()
        };
        assert_eq!(o.validate(), Err(ConfigError::WindowTooLarge(usize::MAX)));
        o.window_size = MAX_WINDOW_SIZE;
        assert!(o.validate().is_ok());

        o.block_size = MAX_BLOCK_SIZE + 1;
        assert_eq!(
            o.validate(),
            Err(ConfigError::BlockSizeTooLarge(MAX_BLOCK_SIZE as u64 + 1))
        );
        o.block_size = MAX_BLOCK_SIZE;
        assert!(o.validate().is_ok());
    }
}
