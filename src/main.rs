use clap::Parser;
use recycle_xp::domain::model::Coordinate;
use recycle_xp::utils::error::ErrorSeverity;
use recycle_xp::utils::{logger, validation::Validate};
use recycle_xp::{
    run_submission, CliConfig, LocalStorage, RunReport, SimulatedFix, SubmissionRequest,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CliConfig::parse();

    // 初始化日誌
    logger::init(config.verbose, config.json_logs);

    tracing::info!("Starting recycle-xp CLI");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let storage = LocalStorage::new(".");
    let image = match std::fs::read(&config.image) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("❌ Cannot read image '{}': {}", config.image, e);
            std::process::exit(1);
        }
    };

    let fix = match (config.lat, config.lon) {
        (Some(lat), Some(lon)) => Some(SimulatedFix {
            coordinate: Coordinate::new(lat, lon),
            accuracy_meters: config.accuracy,
        }),
        _ => None,
    };

    let request = SubmissionRequest {
        method: config.method,
        image,
        use_camera: config.camera,
        fix,
        confirm: config.confirm,
    };

    match run_submission(&config, storage, request).await {
        Ok(report) => print_report(&report),
        Err(e) => {
            tracing::error!(
                "❌ Submission failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());

            // 根據錯誤嚴重程度決定退出碼
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
    }

    Ok(())
}

fn print_report(report: &RunReport) {
    let attempt = &report.outcome.attempt;
    let decision = &report.outcome.decision;

    if let Some(verdict) = &attempt.geofence {
        println!("📍 {}", verdict.message);
    }

    for prediction in &attempt.predictions {
        println!(
            "  {:<12} {:>5.1}%",
            prediction.material,
            prediction.confidence * 100.0
        );
    }

    match (&decision.reason, &report.credit) {
        (None, Some(credit)) => {
            println!("🎉 +{} XP credited (balance {})", credit.points, credit.balance);
        }
        (None, None) => {
            println!("✅ Eligible for {} XP. Re-run with --confirm to claim it.", decision.points);
        }
        (Some(reason), _) => {
            println!("ℹ️ No XP for this attempt ({})", reason);
        }
    }
}
