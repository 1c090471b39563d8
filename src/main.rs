use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use census_access::cli::{Args, Command};
use census_access::reports::{self, choropleth, composition, top_regions, ReportContext};
use census_access::ReportConfig;

fn init_tracing(log_json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if log_json {
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

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    let mut config = ReportConfig::load(args.config.as_deref()).context("loading configuration")?;
    args.apply_overrides(&mut config);
    info!(
        data_dir = %config.data_dir.display(),
        out_dir = %config.out_dir.display(),
        "starting"
    );

    let ctx = ReportContext::new(config, args.write_tables);
    let outputs = match &args.command {
        Command::TopRegions { .. } => vec![top_regions::run(&ctx, &ctx.config.top_regions)?],
        Command::Choropleth { .. } => vec![choropleth::run(&ctx, &ctx.config.choropleth)?],
        Command::Composition { name, .. } => vec![composition::run(&ctx, name)
            .with_context(|| format!("composition report '{name}'"))?],
        Command::All => reports::run_all(&ctx)?,
    };

    for output in &outputs {
        println!("{}\n", output.format_summary());
        if let Some(table) = &output.table {
            println!("table: {}\n", table.display());
        }
    }
    Ok(())
}
