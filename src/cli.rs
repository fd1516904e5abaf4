use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "segforge")]
#[command(author, version, about = "Split videos into fixed-length parts and zip them")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Split one or more videos into parts and write a ZIP of all parts
    Split {
        /// Video files to split
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Part length in seconds (defaults to the configured value)
        #[arg(short, long)]
        duration: Option<u32>,

        /// Where to write the archive
        #[arg(short, long, default_value = "videos.zip")]
        output: PathBuf,

        /// Keep the session's uploads and segments instead of reclaiming them
        #[arg(long)]
        keep: bool,
    },

    /// Print the segment plan for a duration without touching any file
    Plan {
        /// Total media duration in seconds
        #[arg(long)]
        total: f64,

        /// Part length in seconds
        #[arg(short, long)]
        duration: u32,
    },

    /// Probe a media file and display duration and streams
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn split_parses_files_and_duration() {
        let cli = Cli::try_parse_from(["segforge", "split", "a.mp4", "b.mov", "-d", "5", "--keep"])
            .unwrap();
        match cli.command {
            Commands::Split {
                files,
                duration,
                output,
                keep,
            } => {
                assert_eq!(files, vec![PathBuf::from("a.mp4"), PathBuf::from("b.mov")]);
                assert_eq!(duration, Some(5));
                assert_eq!(output, PathBuf::from("videos.zip"));
                assert!(keep);
            }
            _ => panic!("expected split"),
        }
    }
}
