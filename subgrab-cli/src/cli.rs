use std::path::PathBuf;

use clap::Parser;
use subgrab_engine::{Dialect, ProxyType};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Extract WebVTT subtitle tracks from HLS and DASH manifests", long_about = None)]
pub struct Args {
    /// Manifest URL. With --manifest-file it is only used to resolve relative URIs.
    pub url: String,

    /// Read the manifest body from a local file instead of fetching it
    #[arg(long, value_name = "PATH")]
    pub manifest_file: Option<PathBuf>,

    /// Manifest dialect, detected from the body and URL when omitted
    #[arg(long, value_enum)]
    pub dialect: Option<Dialect>,

    /// Title used in output file names
    #[arg(long, default_value = "subtitles")]
    pub title: String,

    /// Release year used in output file names
    #[arg(long)]
    pub year: Option<String>,

    /// Platform tag placed after the year, e.g. DSNP.WEB
    #[arg(long, default_value = "WEB")]
    pub source_tag: String,

    /// Directory the documents are written to
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Maximum number of segment requests in flight
    #[arg(long, default_value_t = 1000)]
    pub concurrency: usize,

    /// Per-segment timeout in seconds
    #[arg(long, default_value_t = 20)]
    pub timeout: u64,

    /// Retries for manifest and playlist requests
    #[arg(long, default_value_t = 8)]
    pub retries: u32,

    /// Extra request header ("Name: Value"), repeatable
    #[arg(short = 'H', long = "header", value_name = "HEADER")]
    pub headers: Vec<String>,

    /// Extra query parameter (key=value), repeatable
    #[arg(long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    /// Header for the fallback retrieval path, repeatable. Enables the fallback path.
    #[arg(long = "fallback-header", value_name = "HEADER")]
    pub fallback_headers: Vec<String>,

    #[arg(long)]
    pub user_agent: Option<String>,

    /// Proxy server URL
    #[arg(long)]
    pub proxy: Option<String>,

    #[arg(long, value_enum, default_value_t = ProxyType::Http)]
    pub proxy_type: ProxyType,

    #[arg(long, requires = "proxy")]
    pub proxy_user: Option<String>,

    #[arg(long, requires = "proxy_user")]
    pub proxy_pass: Option<String>,

    /// Only keep tracks in these languages (tag or English name), repeatable
    #[arg(long = "lang", value_name = "LANG")]
    pub languages: Vec<String>,

    /// Skip SDH tracks
    #[arg(long)]
    pub skip_sdh: bool,

    /// Only keep forced tracks in these languages, repeatable
    #[arg(long = "forced-lang", value_name = "LANG")]
    pub forced_languages: Vec<String>,

    /// Tag used in file names for tracks with an undetermined language
    #[arg(long, value_name = "TAG")]
    pub undetermined_tag: Option<String>,

    /// Print the available tracks and exit
    #[arg(long)]
    pub list: bool,

    /// Replace existing files in the output directory
    #[arg(long)]
    pub overwrite: bool,

    /// Delay between tracks in milliseconds
    #[arg(long, default_value_t = 300)]
    pub pacing_ms: u64,

    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    #[arg(short, long)]
    pub quiet: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeatable_options_collect() {
        let args = Args::try_parse_from([
            "subgrab",
            "https://cdn.example.com/master.m3u8",
            "-H",
            "Referer: https://example.com",
            "--header",
            "Origin: https://example.com",
            "--lang",
            "sv",
            "--lang",
            "Danish",
            "--dialect",
            "dash",
        ])
        .unwrap();
        assert_eq!(args.headers.len(), 2);
        assert_eq!(args.languages, vec!["sv", "Danish"]);
        assert_eq!(args.dialect, Some(Dialect::Dash));
        assert_eq!(args.concurrency, 1000);
        assert!(!args.list);
    }

    #[test]
    fn verbose_and_quiet_conflict() {
        let result = Args::try_parse_from(["subgrab", "https://x.test/a.mpd", "-v", "-q"]);
        assert!(result.is_err());
    }
}
