use serde::Serialize;

/// Full-scale magnitude of a 16-bit sample
const FULL_SCALE: f32 = 32768.0;

/// Peak level below which a recording is treated as silence (percent)
pub const SILENCE_THRESHOLD: f32 = 0.1;

/// Peak level below which recognition is likely to struggle (percent)
pub const LOW_THRESHOLD: f32 = 1.0;

/// Peak amplitude of a block as a percentage of full scale.
///
/// Returns 0.0 for an empty block.
pub fn signal_level(samples: &[i16]) -> f32 {
    let peak = samples
        .iter()
        .map(|s| s.unsigned_abs())
        .max()
        .unwrap_or(0);
    peak as f32 / FULL_SCALE * 100.0
}

/// Operator-facing classification of a peak level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalLevel {
    Silent,
    Low,
    Adequate,
}

impl SignalLevel {
    pub fn classify(percent: f32) -> Self {
        if percent < SILENCE_THRESHOLD {
            SignalLevel::Silent
        } else if percent < LOW_THRESHOLD {
            SignalLevel::Low
        } else {
            SignalLevel::Adequate
        }
    }

    pub fn warning(self) -> Option<&'static str> {
        match self {
            SignalLevel::Silent => Some("Very low signal level, the recording is probably silent"),
            SignalLevel::Low => Some("Low signal level, may not be enough for recognition"),
            SignalLevel::Adequate => None,
        }
    }

    /// Emit the warning for this level, with troubleshooting hints for silence
    pub fn log_warning(self, percent: f32) {
        match self {
            SignalLevel::Silent => {
                tracing::warn!("{} (max {:.2}%)", self.warning().unwrap_or_default(), percent);
                tracing::warn!("  - microphone disconnected or muted");
                tracing::warn!("  - no permission to access the microphone");
                tracing::warn!("  - input gain too low (check alsamixer)");
                tracing::warn!("  - wrong input device selected");
            }
            SignalLevel::Low => {
                tracing::warn!("{} (max {:.2}%)", self.warning().unwrap_or_default(), percent);
            }
            SignalLevel::Adequate => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_is_zero() {
        assert_eq!(signal_level(&[0; 4096]), 0.0);
        assert_eq!(signal_level(&[]), 0.0);
    }

    #[test]
    fn test_full_scale_is_hundred() {
        let mut block = vec![0i16; 1024];
        block[512] = i16::MIN;
        assert!((signal_level(&block) - 100.0).abs() < 0.01);

        block[512] = i16::MAX;
        assert!((signal_level(&block) - 100.0).abs() < 0.01);
    }

    #[test]
    fn test_negative_peak_counts() {
        assert!((signal_level(&[100, -16384, 200]) - 50.0).abs() < 0.001);
    }

    #[test]
    fn test_classify_thresholds() {
        assert_eq!(SignalLevel::classify(0.0), SignalLevel::Silent);
        assert_eq!(SignalLevel::classify(0.09), SignalLevel::Silent);
        assert_eq!(SignalLevel::classify(0.5), SignalLevel::Low);
        assert_eq!(SignalLevel::classify(1.0), SignalLevel::Adequate);
        assert!(SignalLevel::Adequate.warning().is_none());
    }
}
