//! The engine's sole source of "randomness": a deterministic 64-bit integer
//! mix and its projection to `[0, 1)`. No floating-point RNG is used anywhere
//! in this crate (see `SPEC_FULL.md` §9 "Determinism mechanism").

/// FNV-like mix constant from the reference implementation.
pub const MIX_CONST: u64 = 0x9E37_79B9_7F4A_7C15;

/// Seed for `World::determinism_hash`.
pub const DETERMINISM_HASH_SEED: u64 = 0x51E7_71E5_E771_A9BF;

/// Salts distinguishing independent random streams drawn in the same tick
/// for the same entity id (package jitter, climate transition, fission alpha, ...).
pub mod salt {
    pub const CLIMATE_TRANSITION: u64 = 1;
    pub const PACKAGE_ADOPTION_JITTER: u64 = 2;
    pub const GROWTH_DAMPING: u64 = 3;
    pub const FISSION_ALPHA: u64 = 4;
    pub const JOIN_ADOPTION_JITTER: u64 = 5;
    pub const FISSION_FIELD_TIEBREAK: u64 = 6;
}

/// One round of the reference `mixHash(h, v)`: `h ^= v + MIX + (h<<6) + (h>>2)`.
#[inline]
pub fn mix_hash(h: u64, v: u64) -> u64 {
    h ^ v
        .wrapping_add(MIX_CONST)
        .wrapping_add(h << 6)
        .wrapping_add(h >> 2)
}

/// Folds an arbitrary `u64` through one round of `mix_hash` seeded with itself.
#[inline]
pub fn mix64(x: u64) -> u64 {
    mix_hash(x, x)
}

/// Uniform projection of a 64-bit hash to `[0, 1)`.
#[inline]
pub fn u01_from_u64(x: u64) -> f64 {
    (x as f64) / (u64::MAX as f64 + 1.0)
}

/// Builds the standard `(worldSeed, year, id, salt)` stream key and projects
/// it to a uniform `[0, 1)` value via `mix64`.
#[inline]
pub fn jitter01(world_seed: u64, year: i64, id: u64, salt: u64) -> f64 {
    let year_u = year as i64 as u64;
    let key = world_seed
        ^ year_u.wrapping_mul(MIX_CONST)
        ^ id.wrapping_mul(0xD6E8_FEB8_6659_FD93)
        ^ salt.wrapping_mul(0xBF58_476D_1CE4_E5B9);
    u01_from_u64(mix64(key))
}

/// Maps a uniform draw to `[lo, hi]`.
#[inline]
pub fn jitter_range(world_seed: u64, year: i64, id: u64, salt: u64, lo: f64, hi: f64) -> f64 {
    lo + (hi - lo) * jitter01(world_seed, year, id, salt)
}

/// Quantizes a real to an integer hash bucket at the given scale, matching
/// the reference's `hashDouble(v, scale)`. Non-finite values hash to all-ones
/// so that NaN/inf always perturbs the determinism hash rather than silently
/// aliasing to zero.
#[inline]
pub fn hash_double(v: f64, scale: f64) -> u64 {
    if !v.is_finite() {
        return u64::MAX;
    }
    (v * scale).round() as i64 as u64
}
