//! Callback Service CLI
//!
//! 回调模拟服务的命令行入口点。

use std::path::Path;

use clap::Parser;
use tracing::info;

use callback_service::cli::{Cli, CommandRunner, Commands};
use callback_shared::{config::AppConfig, observability};

const SERVICE_NAME: &str = "callback-service";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 文件可选
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // --config-env 优先于 CALLBACK_ENV
    let env = cli
        .config_env
        .clone()
        .or_else(|| std::env::var("CALLBACK_ENV").ok())
        .unwrap_or_else(|| "development".to_string());
    let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());
    let config = AppConfig::load_from(SERVICE_NAME, &env, Path::new(&config_dir))?;

    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name)
        .with_log_level(cli.log_level.as_deref());
    let _guard = observability::init(&obs_config).await?;

    info!(environment = %config.environment, "配置加载完成");

    let runner = CommandRunner::new(config);

    match cli.command {
        Commands::Serve {
            port,
            watch,
            source,
        } => {
            runner.run_serve(port, watch, &source).await?;
        }
        Commands::Fire {
            scene,
            env,
            dry_run,
            vars,
            source,
        } => {
            runner
                .run_fire(&scene, env.as_deref(), dry_run, &vars, &source)
                .await?;
        }
        Commands::Run {
            scenario,
            env,
            dry_run,
            vars,
            source,
        } => {
            runner
                .run_scenario(&scenario, env.as_deref(), dry_run, &vars, &source)
                .await?;
        }
        Commands::List { source } => {
            runner.run_list(&source)?;
        }
        Commands::Validate { source } => {
            runner.run_validate(&source)?;
        }
    }

    Ok(())
}
