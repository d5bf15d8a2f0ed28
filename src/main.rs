use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use tagledger::{
    billing::CostExplorerApi,
    config::ExporterConfig,
    observability::init_tracing,
    pipeline::{self, ExtractionRequest, period::PeriodOverride},
    store::S3ParquetStore,
};

/// Extract cost-and-usage data partitioned by a cost-allocation tag and
/// land it in a date-partitioned parquet dataset.
#[derive(Parser, Debug)]
#[command(name = "tagledger", version, about)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, short, default_value = "tagledger.toml")]
    config: PathBuf,

    /// Cost-allocation tag key to partition spend by.
    #[arg(long)]
    monitored_tag: String,

    /// Explicit period start (YYYY-MM-DD, inclusive). When omitted the
    /// window defaults to yesterday through today in the configured
    /// timezone.
    #[arg(long, requires = "end_date")]
    start_date: Option<String>,

    /// Explicit period end (YYYY-MM-DD, exclusive).
    #[arg(long, requires = "start_date")]
    end_date: Option<String>,
}

impl Cli {
    fn period_override(&self) -> Option<PeriodOverride> {
        match (&self.start_date, &self.end_date) {
            (Some(start), Some(end)) => Some(PeriodOverride {
                start_date: start.clone(),
                end_date: end.clone(),
            }),
            _ => None,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match ExporterConfig::from_file(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("tagledger: {err}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config.observability);
    tracing::info!(
        config = %cli.config.display(),
        monitored_tag = %cli.monitored_tag,
        start_date = cli.start_date.as_deref(),
        end_date = cli.end_date.as_deref(),
        "starting extraction"
    );

    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
    if let Some(region) = &config.store.region {
        loader = loader.region(aws_config::Region::new(region.clone()));
    }
    let sdk_config = loader.load().await;

    let api = CostExplorerApi::new(&sdk_config);
    let store = S3ParquetStore::new(&sdk_config, config.store.clone());
    let request = ExtractionRequest {
        monitored_tag: cli.monitored_tag.clone(),
        period_override: cli.period_override(),
    };

    match pipeline::run(&config, &api, &store, &request).await {
        Ok(outcome) => {
            let report = outcome.report();
            tracing::info!(
                status_code = report.status_code,
                start_date = %report.execution_log.period_extracted.start_date,
                end_date = %report.execution_log.period_extracted.end_date,
                rows = report.execution_log.number_of_rows_written_into_s3,
                "extraction finished"
            );
            let rendered = serde_json::to_string_pretty(&report)
                .expect("execution report serialization should not fail");
            println!("{rendered}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %err, "extraction failed");
            eprintln!("tagledger: {err}");
            ExitCode::FAILURE
        }
    }
}
