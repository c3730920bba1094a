use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use sentrycam::{
    DetectionLoop, HttpGeoLocator, HttpNotificationSender, MockFaceDetector, MockFrameSource,
    NoGeoLocator, Notifier, RegistryClient, SentrycamConfig,
};
use sentrycam::geo::GeoLocator;

#[derive(Parser, Debug)]
#[command(name = "sentrycam")]
#[command(about = "Camera monitor with face matching and rate-limited push notifications")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "sentrycam.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without starting the monitor")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, compact, pretty)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, compact, or pretty")]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle special modes that don't require full initialization
    if args.print_config {
        print_default_config();
        return Ok(());
    }

    init_logging(&args)?;

    info!("Starting Sentrycam v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = SentrycamConfig::load_from_file(&args.config)?;

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    config.validate()?;

    // Fetch the known-face roster once at startup; any failure degrades
    // to an empty registry and the monitor keeps running.
    let registry_client = RegistryClient::new(&config.api, config.notify.send_timeout());
    let registry = registry_client.fetch_or_empty().await;
    if registry.is_empty() {
        warn!("No known faces loaded; every detected face will classify as unknown");
    }

    let geo: Box<dyn GeoLocator> = if config.api.geolocation_url.is_empty() {
        Box::new(NoGeoLocator)
    } else {
        Box::new(HttpGeoLocator::new(&config.api, config.notify.send_timeout()))
    };

    let sender = HttpNotificationSender::new(&config.api, config.notify.send_timeout());
    let notifier = Notifier::new(&config.notify, &config.api, Box::new(sender), geo);

    // No hardware capture backend is linked in this build; the mock
    // source keeps the loop exercisable end to end. A deployment swaps
    // these two for its camera and vision implementations of FrameSource
    // and FaceDetector.
    warn!("No capture backend compiled in; running with the mock frame source");
    let camera = MockFrameSource::new(Vec::new());
    let detector = MockFaceDetector::empty();

    let mut detection = DetectionLoop::new(
        &config,
        Box::new(camera),
        Box::new(detector),
        registry,
        notifier,
    );

    tokio::select! {
        _ = detection.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
        }
    }

    Ok(())
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, fmt, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("sentrycam={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .boxed(),
        Some("pretty") => fmt::layer()
            .pretty()
            .with_target(true)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer().with_target(true).boxed()
        }
        None => fmt::layer().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(())
}

/// Print default configuration in TOML format
fn print_default_config() {
    println!("# Sentrycam Configuration File");
    println!("# This is the default configuration with all available options");
    println!();

    let default_config = r#"[camera]
# Seconds to wait before reopening the device after open failure
open_retry_seconds = 3
# Seconds to wait before retrying after a failed frame read
read_retry_seconds = 2

[detection]
# Maximum face-distance for a positive identity match
confidence_threshold = 0.6
# Mean-luma level below which a frame counts as blacked out
darkness_threshold = 10.0
# Per-pixel luma delta that counts as change for motion detection
motion_delta_threshold = 25
# Fraction of changed pixels that triggers a motion event
motion_area_fraction = 0.05

[api]
# Base URL shared by the face registry and notification services
base_url = ""
# Bearer token presented to both services
auth_token = ""
# Recipient identity (account email) for registry lookup and alerts
recipient = ""
# Optional geolocation endpoint used to enrich alert bodies
geolocation_url = ""

[notify]
# Minimum spacing between two alerts sharing an event key, in minutes
debounce_minutes = 15
# Delay before a failed send is retried, in minutes
retry_minutes = 5
# Timeout for a single outbound send, in seconds
send_timeout_seconds = 10
"#;

    println!("{}", default_config);
}
