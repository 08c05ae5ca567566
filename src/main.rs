use clap::Parser;
use saas_skills::core::output;
use saas_skills::utils::error::ErrorSeverity;
use saas_skills::utils::{logger, validation::Validate};
use saas_skills::{load_catalog, CliConfig, Command, SkillRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    // 初始化日誌
    logger::init_cli_logger(config.verbose);

    tracing::info!("Starting saas-skills CLI");
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

    if let Err(e) = run(config).await {
        // 記錄詳細錯誤信息
        tracing::error!(
            "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        // 輸出用戶友好的錯誤信息
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        let exit_code = match e.severity() {
            ErrorSeverity::Low => 4,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        std::process::exit(exit_code);
    }

    Ok(())
}

async fn run(config: CliConfig) -> saas_skills::Result<()> {
    let params = config.command.call_params()?;
    let catalog = load_catalog(config.catalog.as_deref())?;

    match config.command {
        Command::Validate => {
            let operations: usize = catalog.services.iter().map(|s| s.operations.len()).sum();
            println!(
                "✅ Catalog '{}' is valid: {} services, {} operations",
                catalog.catalog.name,
                catalog.services.len(),
                operations
            );
        }
        Command::Services => {
            for service in &catalog.services {
                println!(
                    "{:<16} {:>3} ops  {}",
                    service.name,
                    service.operations.len(),
                    service.description.as_deref().unwrap_or("")
                );
            }
        }
        Command::Operations { service } => {
            let registry = SkillRegistry::with_default_transport(catalog)?;
            for op in registry.operations(&service)? {
                println!("{:<28} {:<6} {}", op.name, op.method, op.path);
                if !op.required.is_empty() {
                    println!("    required: {}", op.required.join(", "));
                }
                if !op.optional.is_empty() {
                    println!("    optional: {}", op.optional.join(", "));
                }
            }
        }
        Command::Call {
            service,
            operation,
            format,
            raw,
            ..
        } => {
            let registry = SkillRegistry::with_default_transport(catalog)?;
            let client = registry.client(&service)?;
            let response = client.call(&operation, &params).await?;

            // --raw 直接輸出原始回應
            if raw {
                println!("{}", serde_json::to_string_pretty(&response.body)?);
            } else {
                let op = client.definition().operation(&operation)?;
                let records = response.records(
                    op.response_key.as_deref(),
                    op.field_mapping.as_ref(),
                    op.max_records,
                );
                tracing::info!("✅ {} records from {}.{}", records.len(), service, operation);
                print!("{}", output::render(&records, format)?);
                if format == output::OutputFormat::Json {
                    println!();
                }
            }
        }
        Command::VerifyWebhook {
            service,
            payload_file,
            signature,
            timestamp,
        } => {
            let registry = SkillRegistry::with_default_transport(catalog)?;
            let verifier = registry.webhook_verifier(&service)?;
            let payload = std::fs::read(&payload_file)?;
            let event = verifier.handle(&payload, &signature, timestamp.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&event)?);
        }
    }

    Ok(())
}
