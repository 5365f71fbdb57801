use adb_scrape::utils::{logger, validation::Validate};
use adb_scrape::{export, CliConfig, ScrapeOrchestrator};
use clap::Parser;
use std::path::Path;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();
    logger::init_cli_logger(cli.verbose);

    tracing::info!("Starting adb-scrape");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let config = cli.scrape_config();
    if let Err(e) = config.validate() {
        tracing::error!("Configuration validation failed: {}", e);
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }

    let mut orchestrator = ScrapeOrchestrator::new(&config)?;

    let records = if let Some(project_id) = &cli.project_id {
        match orchestrator.scrape_single(project_id).await {
            Some(record) => vec![record],
            None => {
                eprintln!("❌ Project {} could not be scraped", project_id);
                std::process::exit(1);
            }
        }
    } else {
        let mut records = Vec::new();
        while let Some(record) = orchestrator.next().await {
            records.push(record);
            if records.len() % 25 == 0 {
                tracing::info!("Collected {} records so far", records.len());
            }
        }
        records
    };

    let stats = orchestrator.stats();
    if let Some(cause) = orchestrator.abort_cause() {
        tracing::warn!(
            pages = stats.pages_scraped,
            records = records.len(),
            error = %cause,
            "scrape stopped early"
        );
        eprintln!(
            "⚠️ Stopped early after {} page(s) and {} record(s): {}",
            stats.pages_scraped,
            records.len(),
            cause
        );
    }

    export::write_records(Path::new(&cli.output), &records, cli.format)?;

    tracing::info!(
        pages = stats.pages_scraped,
        records = records.len(),
        details = stats.details_fetched,
        errors = stats.errors,
        "scrape finished"
    );
    println!("✅ Wrote {} record(s) to {}", records.len(), cli.output);

    Ok(())
}
