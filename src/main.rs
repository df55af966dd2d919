use clap::Parser;
use contractcmd::cli::{run_appendix, run_cr, run_msa, run_sow, Cli, Commands};
use contractcmd::config::Config;
use contractcmd::ContractEngine;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout carries command output
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;
    init_tracing(config.log_json);

    let engine = ContractEngine::from_config(&config)?;
    let actor = cli.actor();

    match cli.command {
        Commands::Msa(cmd) => run_msa(&engine, &config, &actor, cmd)?,
        Commands::Sow(cmd) => run_sow(&engine, &config, &actor, cmd)?,
        Commands::Cr(cmd) => run_cr(&engine, &config, &actor, cmd)?,
        Commands::Appendix(cmd) => run_appendix(&engine, &config, &actor, cmd)?,
    }

    Ok(())
}
