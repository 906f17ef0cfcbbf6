//! Command-line arguments

use clap::Parser;
use std::path::PathBuf;

/// Extract the audio track of a video through a ListenTube server
#[derive(Parser, Debug)]
#[command(name = "listentube-watch")]
#[command(about = "Submit a video, follow its extraction and save the audio", long_about = None)]
pub struct Cli {
    /// YouTube video link
    #[arg(value_name = "URL")]
    #[arg(value_hint = clap::ValueHint::Url)]
    pub url: String,

    /// Output audio format: mp3, m4a or opus
    #[arg(long, default_value = "mp3")]
    pub format: String,

    /// ListenTube server, usually the caching proxy
    #[arg(long, value_name = "URL")]
    #[arg(env = "LISTENTUBE_SERVER", default_value = "http://127.0.0.1:9001")]
    pub server: String,

    /// Directory the audio file is written to
    #[arg(long, value_name = "DIR", default_value = ".")]
    #[arg(value_hint = clap::ValueHint::DirPath)]
    pub output_dir: PathBuf,

    /// Status poll period
    #[arg(long, value_name = "MS", default_value_t = 2000)]
    pub poll_interval_ms: u64,
}
