// Polynomial rolling hash over a fixed-size byte window.
//
//   hash_of(b[0..w]) = Σ b[i] * M^(w-1-i)  mod P
//   update(h, new, old) = (M * ((P<<8 + h - factor*old) mod P) + new) mod P
//
// with P = 2^54 - 33, M = 251 and factor = M^(w-1) mod P. P is small enough
// that every intermediate fits in a u64 without wrapping:
//   factor*old < 255 * P < P<<8,   P<<8 + h < 2^63,   M * h + 255 < 2^62.

/// Hash modulus, the largest prime below 2^54.
pub const MODULUS: u64 = (1 << 54) - 33;

/// Per-byte multiplier.
pub const MULTIPLIER: u64 = 251;

/// `MODULUS << 8`: added before subtracting `factor * old` so the difference
/// never goes negative.
const MODULUS_SHIFTED: u64 = MODULUS << 8;

/// Rolling hash parameters for one window width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolyHash {
    window: usize,
    factor: u64,
}

impl PolyHash {
    /// Build hash parameters for windows of `window` bytes.
    ///
    /// # Panics
    /// If `window` is zero.
    pub fn new(window: usize) -> Self {
        assert!(window > 0, "hash window must be non-zero");
        Self {
            window,
            factor: pow_mod(MULTIPLIER, window as u64 - 1),
        }
    }

    /// Window width in bytes.
    #[inline]
    pub fn window(&self) -> usize {
        self.window
    }

    /// `M^(window-1) mod P`, the weight of the byte leaving the window.
    #[inline]
    pub fn factor(&self) -> u64 {
        self.factor
    }

    /// Full hash of the first `window` bytes of `bytes`.
    #[inline]
    pub fn hash_of(&self, bytes: &[u8]) -> u64 {
        debug_assert!(bytes.len() >= self.window);
        bytes[..self.window]
            .iter()
            .fold(0u64, |h, &b| (h * MULTIPLIER + b as u64) % MODULUS)
    }

    /// Full hash of a window delivered as several contiguous pieces.
    ///
    /// Used where a window straddles a block boundary.
    pub fn hash_of_segments<'a, I>(&self, segments: I) -> u64
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let mut h = 0u64;
        let mut seen = 0usize;
        for seg in segments {
            for &b in seg {
                h = (h * MULTIPLIER + b as u64) % MODULUS;
            }
            seen += seg.len();
        }
        debug_assert_eq!(seen, self.window);
        h
    }

    /// Slide the window by one byte: `old` leaves, `new` enters.
    ///
    /// Starting from `h = 0` and feeding the first `window` bytes with
    /// `old = 0` yields `hash_of` of those bytes.
    #[inline(always)]
    pub fn update(&self, h: u64, new: u8, old: u8) -> u64 {
        update(h, new, old, self.factor)
    }
}

/// Slide-by-one recurrence with an explicit `factor`.
#[inline(always)]
pub fn update(h: u64, new: u8, old: u8, factor: u64) -> u64 {
    debug_assert!(h < MODULUS && factor < MODULUS);
    let removed = (MODULUS_SHIFTED + h - factor * old as u64) % MODULUS;
    (MULTIPLIER * removed + new as u64) % MODULUS
}

/// `base^exp mod P` by square-and-multiply.
fn pow_mod(base: u64, mut exp: u64) -> u64 {
    let mut acc = 1u64;
    let mut sq = base % MODULUS;
    while exp > 0 {
        if exp & 1 == 1 {
            acc = mul_mod(acc, sq);
        }
        sq = mul_mod(sq, sq);
        exp >>= 1;
    }
    acc
}

/// Products of two residues need up to 108 bits.
#[inline]
fn mul_mod(a: u64, b: u64) -> u64 {
    ((a as u128 * b as u128) % MODULUS as u128) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    #[test]
    fn modulus_leaves_headroom() {
        // The largest intermediate in `update` must fit in a u64.
        assert!(MODULUS_SHIFTED.checked_add(MODULUS).is_some());
        assert!((MODULUS - 1).checked_mul(255).is_some());
        assert!((MODULUS - 1) * 255 < MODULUS_SHIFTED);
    }

    #[test]
    fn factor_is_power_of_multiplier() {
        assert_eq!(PolyHash::new(1).factor(), 1);
        assert_eq!(PolyHash::new(2).factor(), 251);
        assert_eq!(PolyHash::new(4).factor(), 251 * 251 * 251);
    }

    #[test]
    fn factor_agrees_with_repeated_multiplication() {
        for window in [5usize, 7, 8, 13, 64, 1000, 4097] {
            let slow = (1..window).fold(1u64, |acc, _| acc * MULTIPLIER % MODULUS);
            assert_eq!(PolyHash::new(window).factor(), slow, "window {window}");
        }
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn huge_window_factor_is_immediate() {
        // Fermat: M^(P-1) = 1 mod P, so a window of P bytes has factor 1.
        let h = PolyHash::new(MODULUS as usize);
        assert_eq!(h.factor(), 1);
        assert!(PolyHash::new(1 << 40).factor() < MODULUS);
    }

    #[test]
    fn hash_of_small_window() {
        let h = PolyHash::new(4);
        let expected = (b'A' as u64) * 251u64.pow(3)
            + (b'B' as u64) * 251u64.pow(2)
            + (b'C' as u64) * 251
            + b'D' as u64;
        assert_eq!(h.hash_of(b"ABCD"), expected % MODULUS);
    }

    #[test]
    fn priming_with_zero_old_bytes_matches_hash_of() {
        let h = PolyHash::new(6);
        let data = b"rolling";
        let primed = data[..6].iter().fold(0, |acc, &b| h.update(acc, b, 0));
        assert_eq!(primed, h.hash_of(data));
    }

    #[test]
    fn update_matches_full_hash_random() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for window in [1usize, 2, 3, 4, 8, 16, 31, 64] {
            let h = PolyHash::new(window);
            let data: Vec<u8> = (0..2048).map(|_| rng.random()).collect();
            let mut rolling = h.hash_of(&data);
            for p in 1..=data.len() - window {
                rolling = h.update(rolling, data[p + window - 1], data[p - 1]);
                assert_eq!(rolling, h.hash_of(&data[p..]), "window {window} pos {p}");
            }
        }
    }

    #[test]
    fn extreme_bytes_do_not_overflow() {
        let h = PolyHash::new(32);
        let data = [0xFFu8; 256];
        let mut rolling = h.hash_of(&data);
        for p in 1..=data.len() - 32 {
            rolling = h.update(rolling, 0xFF, 0xFF);
            assert!(rolling < MODULUS);
            assert_eq!(rolling, h.hash_of(&data[p..]));
        }
    }

    #[test]
    fn segmented_hash_matches_contiguous() {
        let h = PolyHash::new(10);
        let data = b"0123456789";
        let split = [&data[..3], &data[3..4], &data[4..]];
        assert_eq!(h.hash_of_segments(split), h.hash_of(data));
    }
}
