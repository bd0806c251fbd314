use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use console::style;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ytscribe::captions::CaptionsClient;
use ytscribe::cli::{Cli, Commands};
use ytscribe::config::Config;
use ytscribe::downloader::{MediaDownloader, VideoMetadata};
use ytscribe::gemini::{GeminiClient, ModelTier};
use ytscribe::orchestrator::{EscalationPolicy, Orchestrator, RetrievalRequest};
use ytscribe::strategies::{
    CaptionStrategy, DirectStrategy, DownloadStrategy, Granularity, RetrievalStrategy,
    StrategyKind,
};
use ytscribe::{output, reference, utils, ScribeError};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose {
        "ytscribe=debug"
    } else {
        "ytscribe=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Fetch {
            reference,
            granularity,
            model,
            output,
            no_save,
            languages,
            timestamps,
            force,
            max_retries,
            no_escalation,
            keep_audio,
            api_key,
        } => {
            run_fetch(FetchOptions {
                reference,
                granularity,
                model,
                output,
                no_save,
                languages,
                timestamps,
                force,
                max_retries,
                no_escalation,
                keep_audio,
                api_key,
            })
            .await
        }
        Commands::Languages { reference } => run_languages(&reference).await,
        Commands::Strategies => {
            let config = Config::load().await?;
            run_strategies(&config).await
        }
        Commands::Config { show } => {
            let config = Config::load().await?;
            if show {
                config.display();
            } else {
                println!("Configuration file: {}", Config::config_path()?.display());
                println!("Edit it to change defaults, or rerun with --show to inspect them.");
            }
            Ok(())
        }
    }
}

struct FetchOptions {
    reference: String,
    granularity: Granularity,
    model: Option<ModelTier>,
    output: Option<PathBuf>,
    no_save: bool,
    languages: Vec<String>,
    timestamps: bool,
    force: Option<StrategyKind>,
    max_retries: Option<u32>,
    no_escalation: bool,
    keep_audio: bool,
    api_key: Option<String>,
}

async fn run_fetch(options: FetchOptions) -> Result<()> {
    // Reject bad references before any configuration or network work.
    let reference = match reference::resolve(&options.reference) {
        Ok(reference) => reference,
        Err(e) => {
            eprintln!("{} {e}", style("error:").red().bold());
            std::process::exit(1);
        }
    };

    let config = Config::load().await?;

    let model = options.model.unwrap_or(config.gemini.model);
    let max_retries = options.max_retries.unwrap_or(config.gemini.max_retries);
    let preferred_languages = if options.languages.is_empty() {
        config.captions.preferred_languages.clone()
    } else {
        options.languages
    };
    let include_timestamps = options.timestamps || config.captions.include_timestamps;
    let keep_audio = options.keep_audio || config.app.keep_audio;
    let api_key = options
        .api_key
        .or_else(|| config.gemini.resolved_api_key());

    let downloader = MediaDownloader::new(
        &config.downloader.yt_dlp_path,
        &config.downloader.audio_quality,
    );

    let missing = utils::check_dependencies(&config.downloader.yt_dlp_path).await;
    if !missing.is_empty() {
        eprintln!("⚠️  Dependency check warnings:");
        for dep in &missing {
            eprintln!("   • {dep}");
        }
    }
    let yt_dlp_available = downloader.check_availability().await;

    // Capability checks happen out here; the orchestrator only ever sees
    // strategies that can actually run.
    let allowed = allowed_strategies(options.force, yt_dlp_available, api_key.is_some())?;

    // Best-effort metadata probe, used for display and output naming.
    let metadata = if yt_dlp_available {
        match downloader.probe(&reference.watch_url()).await {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::debug!("metadata probe failed: {e:#}");
                VideoMetadata::default()
            }
        }
    } else {
        VideoMetadata::default()
    };
    if let Some(title) = &metadata.title {
        println!("Title: {title}");
    }
    if let Some(duration) = metadata.duration_secs {
        println!("Duration: {}", utils::format_duration(duration));
    }
    if let Some(uploader) = &metadata.uploader {
        println!("Uploader: {uploader}");
    }

    let needs_gemini = allowed
        .iter()
        .any(|kind| matches!(kind, StrategyKind::Direct | StrategyKind::Download));
    let gemini = if needs_gemini {
        let key = api_key.clone().ok_or(ScribeError::MissingApiKey)?;
        Some(GeminiClient::new(
            key,
            model,
            Duration::from_secs(config.gemini.request_timeout_secs),
        )?)
    } else {
        None
    };

    let keep_audio_dir = keep_audio.then(|| {
        config
            .app
            .output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    });

    let mut strategies: Vec<Box<dyn RetrievalStrategy>> = Vec::new();
    for kind in &allowed {
        match kind {
            StrategyKind::Captions => strategies.push(Box::new(CaptionStrategy::new(
                CaptionsClient::new()?,
                preferred_languages.clone(),
                include_timestamps,
            ))),
            StrategyKind::Direct => {
                let client = gemini.clone().ok_or(ScribeError::MissingApiKey)?;
                strategies.push(Box::new(DirectStrategy::new(client)));
            }
            StrategyKind::Download => {
                let client = gemini.clone().ok_or(ScribeError::MissingApiKey)?;
                strategies.push(Box::new(DownloadStrategy::new(
                    downloader.clone(),
                    client,
                    Duration::from_secs(config.gemini.upload_poll_interval_secs),
                    Duration::from_secs(config.gemini.upload_timeout_secs),
                    keep_audio_dir.clone(),
                )));
            }
        }
    }

    let orchestrator = Orchestrator::new(strategies).with_policy(EscalationPolicy {
        escalate_on_direct_fatal: config.app.escalate_on_direct_fatal,
    });

    let mut request = RetrievalRequest::new(reference.clone(), options.granularity);
    request.strategies = allowed;
    request.max_retries = max_retries;
    request.escalation_enabled = !options.no_escalation;

    match orchestrator.run(&request).await {
        Ok(result) => {
            tracing::info!(
                strategy = %result.strategy,
                granularity = %result.granularity,
                "artifact produced"
            );
            if options.no_save {
                println!();
                println!("{}", result.artifact);
            } else {
                let path = output::resolve_output_path(
                    options.output,
                    config.app.output_dir.as_deref(),
                    metadata.title.as_deref(),
                    reference.id(),
                    result.granularity,
                );
                output::save_artifact(&path, &result.artifact)?;
                println!(
                    "{} {} (via {}) saved to: {}",
                    style("Done:").green().bold(),
                    result.granularity,
                    result.strategy,
                    path.display()
                );
            }
            Ok(())
        }
        Err(failure) => {
            eprintln!(
                "{} could not retrieve text for {}",
                style("error:").red().bold(),
                reference.source()
            );
            eprintln!("Attempts:");
            for (index, attempt) in failure.attempts.iter().enumerate() {
                eprintln!("  {}. {attempt}", index + 1);
            }
            std::process::exit(1);
        }
    }
}

/// Translate a forced strategy or the ambient capabilities into the ordered
/// strategy list the orchestrator is allowed to use.
fn allowed_strategies(
    force: Option<StrategyKind>,
    yt_dlp_available: bool,
    has_api_key: bool,
) -> Result<Vec<StrategyKind>> {
    if let Some(kind) = force {
        match kind {
            StrategyKind::Captions => {}
            StrategyKind::Direct => {
                if !has_api_key {
                    return Err(ScribeError::MissingApiKey.into());
                }
            }
            StrategyKind::Download => {
                if !yt_dlp_available {
                    return Err(ScribeError::DownloaderUnavailable(
                        "not found on PATH, install it from https://github.com/yt-dlp/yt-dlp"
                            .to_string(),
                    )
                    .into());
                }
                if !has_api_key {
                    return Err(ScribeError::MissingApiKey.into());
                }
            }
        }
        return Ok(vec![kind]);
    }

    let mut allowed = vec![StrategyKind::Captions];
    if has_api_key {
        allowed.push(StrategyKind::Direct);
        if yt_dlp_available {
            allowed.push(StrategyKind::Download);
        } else {
            tracing::warn!("yt-dlp not found, the download strategy is disabled");
        }
    } else {
        tracing::warn!("no Gemini API key, only the captions strategy is available");
    }
    Ok(allowed)
}

async fn run_languages(input: &str) -> Result<()> {
    let reference = match reference::resolve(input) {
        Ok(reference) => reference,
        Err(e) => {
            eprintln!("{} {e}", style("error:").red().bold());
            std::process::exit(1);
        }
    };

    let client = CaptionsClient::new()?;
    let tracks = client.list_tracks(reference.id()).await?;
    if tracks.is_empty() {
        println!("No caption tracks available for {}", reference.source());
        return Ok(());
    }

    println!("Available caption tracks:");
    for track in tracks {
        let name = track.language_name.as_deref().unwrap_or("unnamed");
        let marker = if track.is_auto_generated {
            " [auto-generated]"
        } else {
            ""
        };
        println!("  • {} ({name}){marker}", track.language_code);
    }
    Ok(())
}

async fn run_strategies(config: &Config) -> Result<()> {
    let downloader = MediaDownloader::new(
        &config.downloader.yt_dlp_path,
        &config.downloader.audio_quality,
    );
    let yt_dlp_available = downloader.check_availability().await;
    let has_api_key = config.gemini.resolved_api_key().is_some();

    println!("Retrieval strategies, in fallback order:");
    println!("  • captions - reuse existing caption tracks (always available)");
    println!(
        "  • direct   - Gemini processes the video URL ({})",
        if has_api_key {
            "ready"
        } else {
            "needs GEMINI_API_KEY"
        }
    );
    let download_status = match (yt_dlp_available, has_api_key) {
        (true, true) => "ready".to_string(),
        (false, _) => format!("needs {}", config.downloader.yt_dlp_path),
        (true, false) => "needs GEMINI_API_KEY".to_string(),
    };
    println!("  • download - yt-dlp audio upload to Gemini ({download_status})");

    let missing = utils::check_dependencies(&config.downloader.yt_dlp_path).await;
    if !missing.is_empty() {
        println!();
        println!("Missing tools:");
        for dep in missing {
            println!("  • {dep}");
        }
    }
    Ok(())
}
