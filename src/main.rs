use clap::Parser;
use directories::ProjectDirs;
use folio_pulse::{
    cli::{self, Cli},
    config::{default_config_path, load_config},
    logging::{LoggingConfig, init_logging},
};
use tracing::Level;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = load_config(&config_path)?;

    let mut logging = LoggingConfig::from_env();
    if let Some(level) = config.log_level.as_deref().and_then(|l| l.parse::<Level>().ok()) {
        logging = logging.with_file_level(level);
    }
    if cli.debug {
        let log_dir = logging.log_dir.clone().or_else(|| {
            ProjectDirs::from("", "", "folio-pulse").map(|dirs| dirs.data_local_dir().join("logs"))
        });
        logging = logging.with_file_level(Level::DEBUG).with_log_dir(log_dir);
    }
    let _log_guard = init_logging(logging)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        "pulse starting up"
    );

    cli::execute(cli.command, &config).await?;
    Ok(())
}
