use super::level::SignalLevel;
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// Samples examined by the distinct-value silence heuristic
const UNIQUE_WINDOW: usize = 1000;
const MIN_UNIQUE_VALUES: usize = 10;

/// Offline analysis of a saved WAV file
#[derive(Debug, Clone, Serialize)]
pub struct WavReport {
    pub path: PathBuf,
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub frames: u32,
    pub duration_secs: f32,
    pub max_amplitude: u32,
    pub min_amplitude: u32,
    pub avg_amplitude: f32,
    pub max_percent: f32,
    pub avg_percent: f32,
    pub unique_values: usize,
    pub signal: SignalLevel,
}

impl WavReport {
    pub fn analyze(path: &Path) -> Result<Self> {
        let mut reader = hound::WavReader::open(path)
            .with_context(|| format!("Failed to open WAV file: {:?}", path))?;
        let spec = reader.spec();

        if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample > 24 {
            anyhow::bail!(
                "Unsupported sample format: {:?} {} bits",
                spec.sample_format,
                spec.bits_per_sample
            );
        }

        let samples: Vec<i32> = reader
            .samples::<i32>()
            .collect::<Result<_, _>>()
            .context("Failed to read WAV samples")?;

        if samples.is_empty() {
            anyhow::bail!("WAV file contains no samples: {:?}", path);
        }

        let magnitudes = samples.iter().map(|s| s.unsigned_abs());
        let max_amplitude = magnitudes.clone().max().unwrap_or(0);
        let min_amplitude = magnitudes.clone().min().unwrap_or(0);
        let avg_amplitude = magnitudes.map(f64::from).sum::<f64>() / samples.len() as f64;

        let full_scale = (1u32 << (spec.bits_per_sample - 1)) as f32;
        let max_percent = max_amplitude as f32 / full_scale * 100.0;
        let avg_percent = avg_amplitude as f32 / full_scale * 100.0;

        let unique_values = samples
            .iter()
            .take(UNIQUE_WINDOW)
            .collect::<HashSet<_>>()
            .len();

        Ok(Self {
            path: path.to_path_buf(),
            channels: spec.channels,
            sample_rate: spec.sample_rate,
            bits_per_sample: spec.bits_per_sample,
            frames: reader.duration(),
            duration_secs: reader.duration() as f32 / spec.sample_rate as f32,
            max_amplitude,
            min_amplitude,
            avg_amplitude: avg_amplitude as f32,
            max_percent,
            avg_percent,
            unique_values,
            signal: SignalLevel::classify(max_percent),
        })
    }

    /// Few distinct values at the start of the file usually means a dead input
    pub fn suspected_silence(&self) -> bool {
        self.unique_values < MIN_UNIQUE_VALUES
    }
}

impl fmt::Display for WavReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "File:        {}", self.path.display())?;
        writeln!(f, "Channels:    {}", self.channels)?;
        writeln!(f, "Sample rate: {} Hz", self.sample_rate)?;
        writeln!(f, "Sample size: {} bits", self.bits_per_sample)?;
        writeln!(f, "Frames:      {}", self.frames)?;
        writeln!(f, "Duration:    {:.2} s", self.duration_secs)?;
        writeln!(
            f,
            "Max amplitude: {} ({:.2}%)",
            self.max_amplitude, self.max_percent
        )?;
        writeln!(
            f,
            "Avg amplitude: {:.1} ({:.2}%)",
            self.avg_amplitude, self.avg_percent
        )?;
        writeln!(f, "Min amplitude: {}", self.min_amplitude)?;
        match self.signal.warning() {
            Some(warning) => writeln!(f, "Warning: {}", warning)?,
            None => writeln!(f, "Signal level is sufficient for recognition")?,
        }
        if self.suspected_silence() {
            writeln!(
                f,
                "Warning: only {} distinct values in the first {} samples, suspected silence",
                self.unique_values, UNIQUE_WINDOW
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{SampleFormat, WavSpec, WavWriter};

    fn write_wav(path: &Path, samples: &[i16]) {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for s in samples {
            writer.write_sample(*s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_silent_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("silence.wav");
        write_wav(&path, &vec![0i16; 44100]);

        let report = WavReport::analyze(&path).unwrap();
        assert_eq!(report.frames, 44100);
        assert!((report.duration_secs - 1.0).abs() < 0.001);
        assert_eq!(report.max_amplitude, 0);
        assert_eq!(report.signal, SignalLevel::Silent);
        assert!(report.suspected_silence());
    }

    #[test]
    fn test_loud_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let samples: Vec<i16> = (0..4410)
            .map(|i| ((i as f32 * 0.05).sin() * 16384.0) as i16)
            .collect();
        write_wav(&path, &samples);

        let report = WavReport::analyze(&path).unwrap();
        assert!(report.max_percent > 49.0 && report.max_percent <= 50.0);
        assert_eq!(report.signal, SignalLevel::Adequate);
        assert!(!report.suspected_silence());
    }

    #[test]
    fn test_empty_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        write_wav(&path, &[]);

        assert!(WavReport::analyze(&path).is_err());
    }
}
