use clap::Parser;
use dialog_deploy::adapters::status::StatusProbe;
use dialog_deploy::config::{BuildArgs, CliConfig, Command, ServeArgs, StatusArgs};
use dialog_deploy::core::builder::read_manifest;
use dialog_deploy::core::port::resolve_port;
use dialog_deploy::domain::model::PortResolution;
use dialog_deploy::utils::{logger, validation::Validate};
use dialog_deploy::{ArtifactBuilder, DeployConfig, DeployError, ProcessEnv, ServiceLauncher};

#[tokio::main]
async fn main() {
    // .env 不覆蓋已存在的環境變數
    let dotenv = dotenvy::dotenv();

    let cli = CliConfig::parse();

    if cli.json_logs {
        logger::init_container_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    if let Ok(path) = dotenv {
        tracing::debug!("Loaded environment from {}", path.display());
    }
    tracing::debug!("CLI config: {:?}", cli);

    if let Err(e) = run(cli).await {
        tracing::error!(
            "❌ {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: CliConfig) -> Result<(), DeployError> {
    let mut config = DeployConfig::load(cli.config.as_deref())?;

    match &cli.command {
        Command::Build(args) => args.apply(&mut config),
        Command::Serve(args) => args.apply(&mut config),
        Command::Status(args) => args.apply(&mut config),
        Command::ResolvePort => {}
    }

    config.validate()?;
    tracing::debug!("✅ Configuration loaded and validated");

    match cli.command {
        Command::Build(args) => build(&config, &args).await,
        Command::Serve(args) => serve(&config, &args).await,
        Command::ResolvePort => {
            print_port(&resolve_port(&ProcessEnv));
            Ok(())
        }
        Command::Status(args) => status(&config, &args).await,
    }
}

async fn build(config: &DeployConfig, args: &BuildArgs) -> Result<(), DeployError> {
    let builder = ArtifactBuilder::new(config.trainer(), config.build_inputs(), config.artifact())
        .with_privilege(config.build_privilege())
        .with_monitoring(config.monitoring_enabled());

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - training will not run");
        let argv = builder.plan()?;
        println!("📋 Build Plan:");
        println!("  Artifact: {}", builder.artifact().path().display());
        println!("  Privilege: {:?}", config.build_privilege());
        println!("  Command: {}", argv.join(" "));
        return Ok(());
    }

    let outcome = builder.build().await?;
    println!("✅ Model artifact built: {}", outcome.artifact.path().display());
    println!("🕒 Built at: {}", outcome.manifest.built_at.to_rfc3339());
    Ok(())
}

async fn serve(config: &DeployConfig, args: &ServeArgs) -> Result<(), DeployError> {
    let launcher = ServiceLauncher::new(config.runner());
    let options = config.serve_options();

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - the server will not start");
        let (service, argv) = launcher.plan(options, &ProcessEnv);
        println!("📋 Serve Plan:");
        println!("  Model: {}", service.artifact.path().display());
        println!(
            "  Model present: {}",
            if service.artifact.is_present() { "yes" } else { "no" }
        );
        if let Ok(manifest) = read_manifest(&service.artifact) {
            println!("  Built at: {}", manifest.built_at.to_rfc3339());
        }
        println!("  Listen: {}:{}", service.host, service.port);
        println!("  Launch mode: {:?}", service.launch_mode);
        println!("  Command: {}", argv.join(" "));
        return Ok(());
    }

    launcher.launch(options, &ProcessEnv).await
}

async fn status(config: &DeployConfig, _args: &StatusArgs) -> Result<(), DeployError> {
    let url = config.status_url(&ProcessEnv);
    let probe = StatusProbe::new(&url, config.status_timeout())?;
    let status = probe.probe().await?;

    println!("✅ Engine at {} is up", status.url);
    println!("  {}", status.greeting);
    if let Some(version) = status.version {
        println!("  Version: {}", version);
    }
    Ok(())
}

fn print_port(resolution: &PortResolution) {
    match resolution {
        PortResolution::Override(port) => println!("{} (from PORT)", port),
        PortResolution::Default => println!("{} (default)", resolution.port()),
        PortResolution::Fallback { raw, reason } => println!(
            "{} (default, ignored PORT={:?}: {})",
            resolution.port(),
            raw,
            reason
        ),
    }
}
