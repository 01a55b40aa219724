//! Quantization index modulation: one bit per coefficient.
//!
//! Bit 0 lives on the lattice `{k * S}`, bit 1 on `{k * S + S / 2}`. Decoding
//! picks whichever lattice is nearer, so any perturbation smaller than `S / 4`
//! leaves the bit intact.

use super::QIM_STEP;

/// Snap `coefficient` onto the lattice for `bit` using the shared step.
#[inline]
pub fn embed_bit(coefficient: f64, bit: u8) -> f64 {
    quantize(coefficient, bit, QIM_STEP)
}

/// Recover the bit carried by `coefficient` using the shared step.
#[inline]
pub fn extract_bit(coefficient: f64) -> u8 {
    dequantize(coefficient, QIM_STEP)
}

pub(crate) fn quantize(coefficient: f64, bit: u8, step: f64) -> f64 {
    let offset = lattice_offset(bit, step);
    ((coefficient - offset) / step).round() * step + offset
}

pub(crate) fn dequantize(coefficient: f64, step: f64) -> u8 {
    let d0 = lattice_distance(coefficient, 0, step);
    let d1 = lattice_distance(coefficient, 1, step);
    if d1 < d0 {
        1
    } else {
        0
    }
}

fn lattice_offset(bit: u8, step: f64) -> f64 {
    if bit & 1 == 1 {
        step / 2.0
    } else {
        0.0
    }
}

fn lattice_distance(coefficient: f64, bit: u8, step: f64) -> f64 {
    let shifted = coefficient - lattice_offset(bit, step);
    (shifted - (shifted / step).round() * step).abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lattice_law_over_range() {
        let mut c = -300.0;
        while c <= 300.0 {
            for bit in [0u8, 1] {
                assert_eq!(extract_bit(embed_bit(c, bit)), bit, "c={} bit={}", c, bit);
            }
            c += 0.37;
        }
    }

    #[test]
    fn test_embedded_values_sit_on_lattice() {
        let zero = embed_bit(7.3, 0);
        assert!((zero / QIM_STEP - (zero / QIM_STEP).round()).abs() < 1e-12);

        let one = embed_bit(7.3, 1);
        let shifted = (one - QIM_STEP / 2.0) / QIM_STEP;
        assert!((shifted - shifted.round()).abs() < 1e-12);
    }

    #[test]
    fn test_embed_moves_at_most_half_step() {
        let mut c = -50.0;
        while c <= 50.0 {
            for bit in [0u8, 1] {
                assert!((embed_bit(c, bit) - c).abs() <= QIM_STEP / 2.0 + 1e-9);
            }
            c += 0.11;
        }
    }

    #[test]
    fn test_tolerates_quarter_step_noise() {
        let noise = QIM_STEP / 4.0 - 0.01;
        for base in [-40.0, -3.0, 0.0, 5.5, 91.0] {
            for bit in [0u8, 1] {
                let q = embed_bit(base, bit);
                assert_eq!(extract_bit(q + noise), bit);
                assert_eq!(extract_bit(q - noise), bit);
            }
        }
    }

    #[test]
    fn test_custom_step() {
        assert_eq!(quantize(9.0, 0, 4.0), 8.0);
        assert_eq!(quantize(10.0, 1, 4.0), 10.0);
        assert_eq!(dequantize(10.0, 4.0), 1);
        assert_eq!(dequantize(8.4, 4.0), 0);
    }
}
