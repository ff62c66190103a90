use clap::Parser;
use tos_server::cli::{Cli, Commands, StaffCacheCommands};
use tos_server::config::TosConfig;
use tos_server::{cli, serve};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let mut config = TosConfig::load(&cli.config)?;
    if let Some(data_dir) = cli.data_dir {
        config.server.data_dir = data_dir;
    }

    match cli.command {
        Commands::Serve(args) => {
            if let Some(addr) = args.http_addr {
                config.server.http_addr = addr;
            }
            serve::run(config).await
        }
        Commands::StaffCache(StaffCacheCommands::Rebuild(args)) => cli::staff_cache::rebuild(args).await,
        Commands::Document(cmd) => cli::document::run(cmd, &config),
    }
}
