// NOTE: Everything downstream of capture assumes 16-bit signed integer PCM.
// Capture delivers f32 and is converted with `to_pcm16` before analysis or encoding.

#[derive(Debug, Clone, Copy)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioFormat {
    pub const BITS_PER_SAMPLE: u16 = 16;

    /// Samples handed from the capture bridge to the recorder per block
    pub const BLOCK_SAMPLES: usize = 1024;

    /// Calculate number of samples for a given duration in seconds
    pub fn samples_for_duration(&self, seconds: f32) -> usize {
        (self.sample_rate as f32 * seconds * self.channels as f32) as usize
    }

    pub fn duration_of(&self, samples: usize) -> f32 {
        samples as f32 / (self.sample_rate as f32 * self.channels as f32)
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 1,
        }
    }
}

/// Convert f32 samples (-1.0 to 1.0) to i16
pub fn to_pcm16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_for_duration() {
        let format = AudioFormat::default();
        assert_eq!(format.samples_for_duration(15.0), 661_500);
        assert_eq!(format.samples_for_duration(0.5), 22_050);
    }

    #[test]
    fn test_to_pcm16_clamps() {
        let pcm = to_pcm16(&[0.0, 1.0, -1.0, 2.5, -3.0]);
        assert_eq!(pcm, vec![0, i16::MAX, -i16::MAX, i16::MAX, -i16::MAX]);
    }
}
