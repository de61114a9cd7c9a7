//! CLI command definitions and handlers

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Subcommand;
use reelcast_core::config::ReelcastConfig;
use reelcast_core::network::{EffectiveType, ProductionProbeTransport, StaticHints};
use reelcast_core::quality::select_middle_quality;
use reelcast_core::{
    AdaptiveStreamingManager, NetworkClass, NetworkSpeedDetector, PlayerSession, QualityCatalog,
    ReelcastError, SpeedDetector, VideoAnalytics, select_optimal_quality,
};
use reelcast_sim::{DeterministicClock, DeterministicRng, NetworkProfile, random_viewing};
use tracing::info;
use url::Url;

/// Available CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Measure the network class against a running server
    Probe {
        /// Server the probe asset is downloaded from
        #[arg(long)]
        base_url: String,
        /// Downlink estimate in Mbps, as a browser would report it
        #[arg(long)]
        downlink: Option<f64>,
        /// Round-trip estimate in milliseconds
        #[arg(long)]
        rtt: Option<u32>,
        /// Connection type: slow-2g, 2g, 3g or 4g; any other type counts as fast
        #[arg(long)]
        effective_type: Option<EffectiveType>,
    },
    /// Show the quality catalog for a stream and the quality that would play
    Recommend {
        /// Stream URL of the video
        #[arg(long)]
        stream_url: String,
        /// Network class to select for: slow, medium or fast
        #[arg(long)]
        class: Option<NetworkClass>,
        /// Preferred quality label
        #[arg(long)]
        prefer: Option<String>,
        /// Point entries at `_720p` style variant files
        #[arg(long)]
        variants: bool,
        /// Keep only variants that answer a HEAD request
        #[arg(long, conflicts_with = "variants")]
        discover: bool,
    },
    /// Run the HTTP server
    Serve {
        /// Address to bind to
        #[arg(long)]
        host: Option<IpAddr>,
        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
        /// Directory holding the videos
        #[arg(long)]
        media_dir: PathBuf,
    },
    /// Play a seeded session over a simulated network
    Simulate {
        /// offline, slow-2g, 3g, congested-wifi, broadband or fiber
        #[arg(long, default_value = "broadband")]
        profile: NetworkProfile,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Stretches of playback in the session
        #[arg(long, default_value_t = 12)]
        segments: usize,
        /// Chance of a stall after each stretch
        #[arg(long, default_value_t = 0.2)]
        stall_rate: f64,
    },
}

/// Handle CLI commands
///
/// # Errors
/// - A URL argument could not be parsed
/// - The HTTP client, server or simulation failed
pub async fn handle_command(command: Commands) -> Result<()> {
    match command {
        Commands::Probe {
            base_url,
            downlink,
            rtt,
            effective_type,
        } => {
            let hints = StaticHints {
                downlink_mbps: downlink,
                effective_type,
                rtt_ms: rtt,
            };
            Ok(probe_network(&base_url, hints).await?)
        }
        Commands::Recommend {
            stream_url,
            class,
            prefer,
            variants,
            discover,
        } => Ok(
            recommend_quality(&stream_url, class, prefer.as_deref(), variants, discover).await?,
        ),
        Commands::Serve {
            host,
            port,
            media_dir,
        } => start_server(host, port, media_dir).await,
        Commands::Simulate {
            profile,
            seed,
            segments,
            stall_rate,
        } => run_simulation(profile, seed, segments, stall_rate).await,
    }
}

/// Message shown to the user for a failed command.
pub fn user_message(error: &anyhow::Error) -> String {
    match error.downcast_ref::<ReelcastError>() {
        Some(e) => e.user_message(),
        None => format!("{error:#}"),
    }
}

/// Exit status for a failed command: 2 for bad input, 1 otherwise.
pub fn exit_code(error: &anyhow::Error) -> i32 {
    match error.downcast_ref::<ReelcastError>() {
        Some(e) if e.is_user_error() => 2,
        _ => 1,
    }
}

/// Run all three probes against `base_url` and print the class.
///
/// # Errors
/// - `ReelcastError::Configuration` - `base_url` is not a valid URL
/// - `ReelcastError::Probe` - The HTTP client could not be built
pub async fn probe_network(base_url: &str, hints: StaticHints) -> reelcast_core::Result<()> {
    let config = ReelcastConfig::from_env();
    let probe_url = probe_url(base_url, &config.probe.probe_path)?;

    println!("Probing {probe_url}");
    let transport = ProductionProbeTransport::new(&config.probe)?;
    let detector = NetworkSpeedDetector::new(
        Arc::new(hints),
        Arc::new(transport),
        Some(probe_url),
        config.probe.clone(),
    );

    let class = detector.detect_speed().await;
    println!("Network class: {class}");
    Ok(())
}

/// Print the catalog for `stream_url` and the entry that would be played.
///
/// # Errors
/// - `ReelcastError::Configuration` - `stream_url` is not a valid URL
/// - `ReelcastError::Probe` - The HTTP client could not be built
/// - `ReelcastError::Catalog` - Variant discovery produced an invalid catalog
pub async fn recommend_quality(
    stream_url: &str,
    class: Option<NetworkClass>,
    preference: Option<&str>,
    variants: bool,
    discover: bool,
) -> reelcast_core::Result<()> {
    let config = ReelcastConfig::from_env();
    let catalog = if discover {
        let url = parse_url(stream_url)?;
        let transport = ProductionProbeTransport::new(&config.probe)?;
        QualityCatalog::discover(&url, &transport).await?
    } else if variants {
        QualityCatalog::with_variant_urls(stream_url)
    } else {
        QualityCatalog::for_stream_with_levels(stream_url, &config.streaming.quality_levels)
    };

    print_catalog(&catalog);

    let selected = match class {
        Some(class) => select_optimal_quality(catalog.as_slice(), class, preference),
        None => select_middle_quality(catalog.as_slice(), preference),
    };
    match (selected, class) {
        (Some(quality), Some(class)) => println!("\nSelected for {class}: {}", quality.label),
        (Some(quality), None) => println!("\nSelected: {}", quality.label),
        (None, _) => println!("\nNo quality available"),
    }
    Ok(())
}

/// Start the web server
///
/// # Errors
/// - Binding the listener or serving failed
pub async fn start_server(host: Option<IpAddr>, port: Option<u16>, media_dir: PathBuf) -> Result<()> {
    let mut config = ReelcastConfig::from_env();
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config.server.media_dir = media_dir;

    println!("Starting Reelcast server...");
    println!("URL: http://{}:{}", config.server.host, config.server.port);
    println!("Media: {}", config.server.media_dir.display());
    println!("{:-<50}", "");
    println!("Press Ctrl+C to stop the server");

    reelcast_web::run_server(config)
        .await
        .map_err(|e| anyhow::anyhow!("server failed: {e}"))
}

/// Detect the class of a simulated network, start a session on it and
/// replay a seeded viewing pattern, then print what analytics recorded.
///
/// # Errors
/// - The generated script stepped the clock out of range
pub async fn run_simulation(
    profile: NetworkProfile,
    seed: u64,
    segments: usize,
    stall_rate: f64,
) -> Result<()> {
    let config = ReelcastConfig::from_env();
    println!("Simulating {profile} network, seed {seed}");

    let detector = Arc::new(profile.detector(seed, config.probe.clone()));
    let manager = AdaptiveStreamingManager::new(detector, config.streaming.clone())
        .with_buffer_cutoffs(&config.player);
    let analytics = Arc::new(VideoAnalytics::new(&config.analytics));

    let video_id = "simulated";
    let mut session = PlayerSession::new(
        video_id,
        QualityCatalog::with_variant_urls("/media/simulated.mp4"),
        Arc::clone(&analytics),
        config.player.clone(),
    );
    session.start(&manager, None).await;
    println!("Network class: {}", manager.network_class());
    println!("Starting quality: {}", session.state().current_quality);

    let mut rng = DeterministicRng::from_seed(seed);
    let mut clock = DeterministicClock::new();
    let script = random_viewing(&mut rng, 600.0, segments, stall_rate);
    script
        .replay(&mut session, &mut clock)
        .context("simulation failed")?;
    info!(
        "Replayed {} steps on {} network with seed {}",
        script.steps().len(),
        profile,
        seed
    );

    let metrics = analytics.metrics(video_id);
    println!("{:-<50}", "");
    println!("Simulated time: {:.1}s", clock.elapsed().as_secs_f64());
    println!("Quality switches: {}", metrics.quality_switches.len());
    println!("Stalls: {}", metrics.buffering_events.len());
    println!("Total buffering: {} ms", metrics.total_buffering_ms());
    Ok(())
}

fn parse_url(url: &str) -> reelcast_core::Result<Url> {
    Url::parse(url).map_err(|e| ReelcastError::Configuration {
        reason: format!("invalid URL {url}: {e}"),
    })
}

/// Joins the configured probe path onto the server URL.
fn probe_url(base_url: &str, probe_path: &str) -> reelcast_core::Result<Url> {
    parse_url(base_url)?
        .join(probe_path)
        .map_err(|e| ReelcastError::Configuration {
            reason: format!("invalid probe path {probe_path}: {e}"),
        })
}

fn print_catalog(catalog: &QualityCatalog) {
    println!("{:<10} {:>7} {:>10}  URL", "Quality", "Height", "Bitrate");
    println!("{:-<60}", "");
    for quality in catalog.iter() {
        let bitrate = quality
            .bitrate
            .as_ref()
            .map(|b| b.to_string())
            .unwrap_or_default();
        let height = if quality.is_auto() {
            "-".to_string()
        } else {
            quality.height.to_string()
        };
        println!(
            "{:<10} {:>7} {:>10}  {}",
            quality.label, height, bitrate, quality.url
        );
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct TestCli {
        #[command(subcommand)]
        command: Commands,
    }

    fn parse(args: &[&str]) -> Commands {
        TestCli::try_parse_from(std::iter::once("reelcast").chain(args.iter().copied()))
            .unwrap()
            .command
    }

    #[test]
    fn test_probe_url_joins_path() {
        let url = probe_url("http://localhost:3000/app/", "/probe.svg").unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/probe.svg");
        assert!(probe_url("not a url", "/probe.svg").is_err());
    }

    #[test]
    fn test_probe_parses_hints() {
        let command = parse(&[
            "probe",
            "--base-url",
            "http://localhost:3000",
            "--downlink",
            "2.5",
            "--effective-type",
            "3g",
        ]);

        match command {
            Commands::Probe {
                downlink,
                rtt,
                effective_type,
                ..
            } => {
                assert_eq!(downlink, Some(2.5));
                assert_eq!(rtt, None);
                assert_eq!(effective_type, Some(EffectiveType::ThreeG));
            }
            _ => panic!("expected probe command"),
        }
    }

    #[test]
    fn test_recommend_parses_class() {
        let command = parse(&[
            "recommend",
            "--stream-url",
            "/api/videos/a/stream",
            "--class",
            "FAST",
            "--prefer",
            "480p",
        ]);

        match command {
            Commands::Recommend { class, prefer, .. } => {
                assert_eq!(class, Some(NetworkClass::Fast));
                assert_eq!(prefer.as_deref(), Some("480p"));
            }
            _ => panic!("expected recommend command"),
        }
    }

    #[test]
    fn test_recommend_rejects_unknown_class() {
        let result = TestCli::try_parse_from([
            "reelcast",
            "recommend",
            "--stream-url",
            "/s",
            "--class",
            "warp",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_simulate_defaults() {
        match parse(&["simulate"]) {
            Commands::Simulate {
                profile,
                seed,
                segments,
                ..
            } => {
                assert_eq!(profile, NetworkProfile::Broadband);
                assert_eq!(seed, 42);
                assert_eq!(segments, 12);
            }
            _ => panic!("expected simulate command"),
        }
    }

    #[tokio::test]
    async fn test_recommend_runs_offline() {
        recommend_quality("/api/videos/a/stream", Some(NetworkClass::Slow), None, false, false)
            .await
            .unwrap();
        recommend_quality("/media/a.mp4", None, Some("720p"), true, false)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_bad_url_is_reported_as_user_error() {
        let err = recommend_quality("not a url", None, None, false, true)
            .await
            .unwrap_err();
        assert!(matches!(err, ReelcastError::Configuration { .. }));

        let err = anyhow::Error::from(err);
        assert_eq!(user_message(&err), "Configuration error occurred");
        assert_eq!(exit_code(&err), 2);

        let other = anyhow::anyhow!("server failed: address in use");
        assert_eq!(user_message(&other), "server failed: address in use");
        assert_eq!(exit_code(&other), 1);
    }
}
