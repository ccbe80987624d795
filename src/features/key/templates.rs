//! Krumhansl-Kessler key profiles
//!
//! Tonal profiles from empirical probe-tone experiments; index 0 is the
//! tonic, 1 the minor second, up to 11 the major seventh.
//!
//! # Reference
//!
//! Krumhansl, C. L., & Kessler, E. J. (1982). Tracing the Dynamic Changes in
//! Perceived Tonal Organization in a Spatial Representation of Musical Keys.
//! *Psychological Review*, 89(4), 334-368.

/// Major key profile, tonic first
pub const MAJOR_PROFILE: [f32; 12] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];

/// Minor key profile, tonic first
pub const MINOR_PROFILE: [f32; 12] = [
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];

/// Rotate a profile so the tonic aligns with pitch class `root`
pub fn rotate_profile(profile: &[f32; 12], root: usize) -> [f32; 12] {
    let mut rotated = [0.0f32; 12];
    for (i, value) in rotated.iter_mut().enumerate() {
        *value = profile[(i + 12 - root) % 12];
    }
    rotated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotate_identity() {
        let rotated = rotate_profile(&MAJOR_PROFILE, 0);
        assert_eq!(rotated, MAJOR_PROFILE);
    }

    #[test]
    fn test_rotate_places_tonic_at_root() {
        // G major: the tonic weight must land on pitch class 7.
        let rotated = rotate_profile(&MAJOR_PROFILE, 7);
        assert_eq!(rotated[7], MAJOR_PROFILE[0]);
        // The fifth (D, pitch class 2) carries the dominant weight.
        assert_eq!(rotated[2], MAJOR_PROFILE[7]);
    }

    #[test]
    fn test_profiles_have_tonic_maximum() {
        assert!(MAJOR_PROFILE[1..].iter().all(|&v| v < MAJOR_PROFILE[0]));
        assert!(MINOR_PROFILE[1..].iter().all(|&v| v < MINOR_PROFILE[0]));
    }
}
