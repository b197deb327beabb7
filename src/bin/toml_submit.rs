use anyhow::Context;
use clap::Parser;
use recycle_xp::app::runner::check_location;
use recycle_xp::core::ConfigProvider;
use recycle_xp::domain::model::{CaptureMethod, Coordinate};
use recycle_xp::domain::ports::ZoneSource;
use recycle_xp::utils::error::ErrorSeverity;
use recycle_xp::utils::{logger, validation::Validate};
use recycle_xp::{run_submission, LocalStorage, SimulatedFix, SubmissionRequest, TomlConfig};

#[derive(Parser)]
#[command(name = "toml-submit")]
#[command(about = "Recycling submission driven by a TOML configuration file")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "recycle-xp.toml")]
    config: String,

    /// Photo of the recyclable item
    #[arg(long)]
    image: Option<String>,

    #[arg(long, default_value = "gps")]
    method: CaptureMethod,

    #[arg(long, allow_hyphen_values = true, requires = "lon")]
    lat: Option<f64>,

    #[arg(long, allow_hyphen_values = true, requires = "lat")]
    lon: Option<f64>,

    #[arg(long, default_value = "10")]
    accuracy: f64,

    /// Confirm an eligible result and credit the XP
    #[arg(long)]
    confirm: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Dry run - check the location against the zones without classifying
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 初始化日誌
    logger::init(args.verbose, args.json_logs);

    tracing::info!("🚀 Starting TOML-based submission");
    tracing::info!("📁 Loading configuration from: {}", args.config);

    // 載入 TOML 配置
    let config = match TomlConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    tracing::info!("✅ Configuration loaded and validated successfully");
    display_config_summary(&config, &args);

    let storage = LocalStorage::new(".");
    let fix = match (args.lat, args.lon) {
        (Some(lat), Some(lon)) => Some(SimulatedFix {
            coordinate: Coordinate::new(lat, lon),
            accuracy_meters: args.accuracy,
        }),
        _ => None,
    };

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - nothing is classified or credited");
        let Some(fix) = fix else {
            println!("🔍 No --lat/--lon given; nothing to check.");
            return Ok(());
        };
        match check_location(&config, storage, fix.coordinate).await {
            Ok(verdict) => println!("📍 {}", verdict.message),
            Err(e) => exit_with(e),
        }
        return Ok(());
    }

    let image_path = args
        .image
        .as_deref()
        .context("--image is required unless --dry-run is set")?;
    let image = std::fs::read(image_path)
        .with_context(|| format!("Cannot read image '{}'", image_path))?;

    let request = SubmissionRequest {
        method: args.method,
        image,
        use_camera: false,
        fix,
        confirm: args.confirm,
    };

    match run_submission(&config, storage, request).await {
        Ok(report) => {
            let decision = &report.outcome.decision;
            if let Some(verdict) = &report.outcome.attempt.geofence {
                println!("📍 {}", verdict.message);
            }
            match (&decision.reason, &report.credit) {
                (None, Some(credit)) => {
                    println!("🎉 +{} XP credited (balance {})", credit.points, credit.balance)
                }
                (None, None) => println!("✅ Eligible for {} XP (not confirmed)", decision.points),
                (Some(reason), _) => println!("ℹ️ No XP for this attempt ({})", reason),
            }
        }
        Err(e) => exit_with(e),
    }

    Ok(())
}

fn exit_with(e: recycle_xp::XpError) {
    tracing::error!(
        "❌ Submission failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());

    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    if exit_code > 0 {
        std::process::exit(exit_code);
    }
}

fn display_config_summary(config: &TomlConfig, args: &Args) {
    println!("📋 Configuration Summary:");
    println!("  Classifier: {}", config.classifier_endpoint());
    match config.zone_source() {
        ZoneSource::CsvFile(path) => println!("  Zones: {} (CSV)", path),
        ZoneSource::Endpoint(url) => println!("  Zones: {}", url),
    }
    let options = config.position_options();
    println!(
        "  Positioning: high_accuracy={} timeout={}ms max_cache_age={}ms",
        options.high_accuracy, options.timeout_ms, options.max_cache_age_ms
    );
    println!(
        "  Reward: threshold {:.2}, scale {}",
        config.confidence_threshold(),
        config.points_scale()
    );
    println!("  Ledger: {} (user {})", config.ledger_path(), config.user_id());

    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }

    println!();
}
