use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for flashshazam
#[derive(Parser, Debug)]
#[command(name = "flashshazam")]
#[command(about = "Record a few seconds of music, identify it and download the track")]
#[command(version)]
pub struct Cli {
    /// Configuration file (defaults to ~/.config/flashshazam/config.json)
    #[arg(short, long, global = true, env = "FLASHSHAZAM_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Interactive loop: Enter records, `l` reuses the newest recording, `q` quits
    Listen,

    /// List input devices
    Devices,

    /// Record from the microphone
    Record {
        /// Seconds to record
        #[arg(short, long)]
        duration: Option<u32>,

        /// Input device index (see `devices`)
        #[arg(long)]
        device: Option<usize>,
    },

    /// Inspect a WAV file's levels (defaults to the newest recording)
    Analyze { file: Option<PathBuf> },

    /// Identify the track in an audio file
    Recognize { file: PathBuf },

    /// Download a track by title and artist
    Download {
        #[arg(short, long)]
        title: String,

        #[arg(short, long)]
        artist: String,

        /// Catalog link to try before searching
        #[arg(short, long)]
        link: Option<String>,
    },

    /// Record (or load) audio, identify it and download the track
    Identify {
        /// Use this audio file instead of recording
        #[arg(short, long, conflicts_with = "last")]
        file: Option<PathBuf>,

        /// Use the newest file in the recordings directory
        #[arg(long)]
        last: bool,

        #[arg(short, long)]
        duration: Option<u32>,

        #[arg(long)]
        device: Option<usize>,
    },

    /// Serve the HTTP API
    Serve {
        #[arg(short, long, default_value = crate::server::DEFAULT_BIND)]
        bind: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_identify_file_conflicts_with_last() {
        let result = Cli::try_parse_from(["flashshazam", "identify", "--file", "a.wav", "--last"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_no_command_defaults_to_none() {
        let cli = Cli::try_parse_from(["flashshazam"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_download_args() {
        let cli = Cli::try_parse_from([
            "flashshazam",
            "download",
            "-t",
            "Around the World",
            "-a",
            "Daft Punk",
        ])
        .unwrap();
        match cli.command {
            Some(Command::Download { title, artist, link }) => {
                assert_eq!(title, "Around the World");
                assert_eq!(artist, "Daft Punk");
                assert!(link.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
