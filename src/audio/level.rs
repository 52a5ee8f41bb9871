/// Root-mean-square amplitude of a 16-bit PCM buffer, in raw sample units
/// (0 ..= 32768). Empty buffers read as silence.
#[inline]
pub fn rms_i16(samples: &[i16]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let energy: f64 = samples
        .iter()
        .map(|&s| {
            let s = f64::from(s);
            s * s
        })
        .sum::<f64>()
        / samples.len() as f64;
    energy.sqrt()
}

/// Decodes little-endian 16-bit PCM. A trailing odd byte is ignored.
pub fn decode_le_i16(bytes: &[u8], out: &mut Vec<i16>) {
    out.clear();
    out.extend(
        bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]])),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rms_of_constant_signal_is_its_magnitude() {
        assert!((rms_i16(&[1_000; 64]) - 1_000.0).abs() < 1e-9);
        assert!((rms_i16(&[-1_000, 1_000]) - 1_000.0).abs() < 1e-9);
    }

    #[test]
    fn rms_handles_extremes() {
        assert_eq!(rms_i16(&[]), 0.0);
        assert!((rms_i16(&[i16::MIN]) - 32_768.0).abs() < 1e-9);
    }

    #[test]
    fn decodes_little_endian_pairs() {
        let mut out = Vec::new();
        decode_le_i16(&[0x34, 0x12, 0xff, 0xff, 0x01], &mut out);
        assert_eq!(out, vec![0x1234, -1]);
    }
}
