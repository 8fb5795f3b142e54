use std::time::Duration;

use subgrab_engine::config::merge_headers;
use subgrab_engine::{
    DownloaderConfig, ExtractorConfig, ProxyConfig, RetryPolicy, SubgrabError, TitleContext,
    TrackFilter,
};
use tracing::debug;
use url::Url;

use crate::cli::Args;
use crate::error::AppError;
use crate::utils::{parse_headers, parse_params};

/// Everything the binary needs, derived from the command line.
#[derive(Debug, Clone)]
pub struct ProgramConfig {
    pub manifest_url: Url,
    pub extractor: ExtractorConfig,
    pub filter: TrackFilter,
    pub context: TitleContext,
}

impl ProgramConfig {
    pub fn from_args(args: &Args) -> Result<Self, AppError> {
        let manifest_url = Url::parse(&args.url)
            .map_err(|e| SubgrabError::invalid_url(args.url.as_str(), e.to_string()))?;

        let mut downloader = DownloaderConfig {
            headers: parse_headers(&args.headers)?,
            params: parse_params(&args.params)?,
            proxy: proxy_from_args(args)?,
            ..DownloaderConfig::default()
        };
        if let Some(user_agent) = &args.user_agent {
            downloader.user_agent = user_agent.clone();
        }
        let downloader = DownloaderConfig::with_config(downloader);

        let mut extractor = ExtractorConfig::default()
            .with_concurrency(args.concurrency)
            .with_segment_timeout(Duration::from_secs(args.timeout))
            .with_manifest_retry(RetryPolicy {
                max_retries: args.retries,
                ..RetryPolicy::default()
            })
            .with_track_pacing(Duration::from_millis(args.pacing_ms));

        if !args.fallback_headers.is_empty() {
            // Same client settings as the primary path plus the extra headers.
            let mut fallback = downloader.clone();
            merge_headers(&mut fallback.headers, &parse_headers(&args.fallback_headers)?);
            extractor = extractor.with_fallback(fallback);
        }
        if let Some(tag) = &args.undetermined_tag {
            extractor = extractor.with_undetermined_language(tag.clone());
        }
        let extractor = extractor.with_downloader(downloader);

        let filter = TrackFilter {
            languages: args.languages.clone(),
            skip_sdh: args.skip_sdh,
            forced_languages: args.forced_languages.clone(),
        };

        let mut context = TitleContext::new(&args.title, &args.source_tag);
        if let Some(year) = &args.year {
            context = context.with_year(year.as_str());
        }

        debug!(url = %manifest_url, ?filter, "Program configuration built");
        Ok(Self {
            manifest_url,
            extractor,
            filter,
            context,
        })
    }
}

fn proxy_from_args(args: &Args) -> Result<Option<ProxyConfig>, AppError> {
    let Some(url) = &args.proxy else {
        return Ok(None);
    };
    let mut proxy = ProxyConfig::new(url.as_str(), args.proxy_type);
    match (&args.proxy_user, &args.proxy_pass) {
        (Some(user), Some(pass)) => proxy = proxy.with_auth(user.as_str(), pass.as_str()),
        (Some(_), None) => {
            return Err(AppError::InvalidInput(
                "--proxy-user requires --proxy-pass".to_string(),
            ));
        }
        _ => {}
    }
    Ok(Some(proxy))
}
