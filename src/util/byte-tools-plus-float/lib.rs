/* ************************************************************************ **
** This file is part of elph, and is licensed under EITHER the MIT license  **
** or the Apache 2.0 license, at your option.                               **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
**                                                                          **
** Be aware that not all of elph is provided under this permissive license, **
** and that the project as a whole is licensed under the GPL 3.0.           **
** ************************************************************************ */

//! byte-tools from crates.io, extended with `f64` slices.
//!
//! Like the functions of byte-tools, these panic when the lengths of
//! the source and destination disagree. The `_checked` variants are
//! for data of untrusted length.

pub use byte_tools::*;

pub fn read_f64v_le(dst: &mut [f64], src: &[u8]) {
    let mut bits = vec![0u64; dst.len()];
    read_u64v_le(&mut bits, src);
    for (f, b) in dst.iter_mut().zip(bits) {
        *f = f64::from_bits(b);
    }
}

pub fn write_f64v_le(dst: &mut [u8], src: &[f64]) {
    let bits: Vec<u64> = src.iter().map(|f| f.to_bits()).collect();
    write_u64v_le(dst, &bits);
}

/// Decode a whole buffer of `f64`s, or `None` if its length is not a multiple of 8.
pub fn read_f64v_le_checked(src: &[u8]) -> Option<Vec<f64>> {
    if src.len() % 8 != 0 {
        return None;
    }
    let mut out = vec![0.0; src.len() / 8];
    read_f64v_le(&mut out, src);
    Some(out)
}

pub fn f64v_to_le_bytes(src: &[f64]) -> Vec<u8> {
    let mut out = vec![0; 8 * src.len()];
    write_f64v_le(&mut out, src);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn little_endian() {
        let bytes = f64v_to_le_bytes(&[1.0, -0.0]);
        assert_eq!(&bytes[..8], &[0, 0, 0, 0, 0, 0, 0xf0, 0x3f]);
        assert_eq!(&bytes[8..], &[0, 0, 0, 0, 0, 0, 0, 0x80]);
    }

    #[test]
    fn bits_survive() {
        let values = [std::f64::consts::PI, 1e-310, -7.25e300, std::f64::INFINITY];
        let read = read_f64v_le_checked(&f64v_to_le_bytes(&values)).unwrap();
        let bits = |v: &[f64]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&read), bits(&values));
    }

    #[test]
    fn ragged_lengths() {
        assert_eq!(read_f64v_le_checked(&[0; 12]), None);
        assert_eq!(read_f64v_le_checked(&[]), Some(vec![]));
    }
}
