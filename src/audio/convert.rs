use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Sample rate and channel count the recognition service works best with
const TARGET_RATE: &str = "44100";
const TARGET_CHANNELS: &str = "1";

/// Convert any container ffmpeg understands to a mono 44.1kHz WAV next to the input.
///
/// WAV input is returned unchanged.
pub async fn normalize_to_wav(input: &Path) -> Result<PathBuf> {
    if is_wav(input) {
        return Ok(input.to_path_buf());
    }

    let output = input.with_extension("wav");
    tracing::info!("Converting {:?} -> {:?}", input, output);

    let result = Command::new("ffmpeg")
        .args(["-hide_banner", "-loglevel", "error", "-y", "-i"])
        .arg(input)
        .args(["-ac", TARGET_CHANNELS, "-ar", TARGET_RATE])
        .arg(&output)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await
        .context("Failed to spawn ffmpeg")?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        anyhow::bail!(
            "ffmpeg exited with {} converting {:?}: {}",
            result.status,
            input,
            stderr.trim()
        );
    }

    tracing::info!("Conversion complete: {:?}", output);
    Ok(output)
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wav_passes_through() {
        let path = Path::new("recordings/recording_20240101_120000.WAV");
        assert_eq!(normalize_to_wav(path).await.unwrap(), path);
    }

    #[test]
    fn test_is_wav() {
        assert!(is_wav(Path::new("a.wav")));
        assert!(!is_wav(Path::new("a.webm")));
        assert!(!is_wav(Path::new("wav")));
    }
}
