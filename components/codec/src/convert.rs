// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

const SIGN_MARK: u64 = 1 << 63;

/// Maps an f64 onto a u64 whose unsigned order matches the numeric order of
/// the source: positive doubles get the sign bit flipped, negative doubles
/// are bitwise negated.
#[inline]
pub fn encode_f64_to_comparable_u64(v: f64) -> u64 {
    let u: u64 = v.to_bits();
    if v.is_sign_positive() {
        u | SIGN_MARK
    } else {
        !u
    }
}

#[inline]
pub fn decode_comparable_u64_to_f64(u: u64) -> f64 {
    let u = if u & SIGN_MARK > 0 {
        u & (!SIGN_MARK)
    } else {
        !u
    };
    f64::from_bits(u)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f64_round_trip() {
        let cases = vec![
            0.0,
            -0.0,
            1.5,
            -1.5,
            f64::MAX,
            f64::MIN,
            f64::INFINITY,
            f64::NEG_INFINITY,
            1e-300,
            -1e-300,
        ];
        for &v in &cases {
            assert_eq!(v, decode_comparable_u64_to_f64(encode_f64_to_comparable_u64(v)));
        }
    }

    #[test]
    fn test_f64_order() {
        let mut cases = vec![
            f64::NEG_INFINITY,
            f64::MIN,
            -2.5,
            -1.0,
            -1e-300,
            0.0,
            1e-300,
            1.0,
            2.5,
            f64::MAX,
            f64::INFINITY,
        ];
        let mut encoded: Vec<u64> = cases.iter().map(|&v| encode_f64_to_comparable_u64(v)).collect();
        encoded.sort_unstable();
        cases.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let decoded: Vec<f64> = encoded
            .iter()
            .map(|&u| decode_comparable_u64_to_f64(u))
            .collect();
        assert_eq!(decoded, cases);
    }
}
