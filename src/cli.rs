//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::adapters::csv_adapter::{CsvAdapter, read_price_file};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::sentiment_adapter::{ConstantSentiment, CsvSentimentAdapter};
use crate::adapters::text_report::TextReportAdapter;
use crate::domain::backtest::{BacktestConfig, BacktestOutcome, BacktestReport, Backtester};
use crate::domain::config_validation::{
    BacktestOverrides, build_backtest_config, build_risk_config, validate_config,
    validate_data_config, validate_sentiment_config,
};
use crate::domain::error::SentitraderError;
use crate::domain::fusion::fuse;
use crate::domain::risk::{RiskConfig, RiskPolicy};
use crate::domain::signal::{SignalReport, generate_signals};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::PriceDataPort;
use crate::ports::report_port::ReportPort;
use crate::ports::sentiment_port::SentimentPort;

#[derive(Parser, Debug)]
#[command(
    name = "sentitrader",
    about = "Technical and sentiment signal fusion with a bar-by-bar backtester"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        interval: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print indicator votes for the last bar of a price file
    Signals {
        #[arg(long)]
        csv: PathBuf,
        /// Sentiment score in [-1, 1] to fuse with the technical vote
        #[arg(long, allow_negative_numbers = true)]
        sentiment: Option<f64>,
    },
    /// Size a position with the risk policy
    Size {
        #[arg(long)]
        capital: f64,
        #[arg(long)]
        entry: f64,
        #[arg(long)]
        stop_loss: Option<f64>,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Validate a backtest configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            symbol,
            interval,
            output,
        } => run_backtest(&config, symbol, interval, output.as_deref()),
        Command::Signals { csv, sentiment } => run_signals(&csv, sentiment),
        Command::Size {
            capital,
            entry,
            stop_loss,
            config,
        } => run_size(capital, entry, stop_loss, config.as_deref()),
        Command::Validate { config } => run_validate(&config),
    }
}

fn fail(err: &SentitraderError) -> ExitCode {
    eprintln!("error: {err}");
    ExitCode::from(err)
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, SentitraderError> {
    FileConfigAdapter::from_file(path).map_err(|e| SentitraderError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Sentiment supplier named by the `[sentiment]` section: a CSV score file,
/// otherwise a constant (neutral when absent).
pub fn build_sentiment_source(
    config: &dyn ConfigPort,
) -> Result<Box<dyn SentimentPort>, SentitraderError> {
    validate_sentiment_config(config)?;
    match config
        .get_string("sentiment", "csv_path")
        .filter(|p| !p.trim().is_empty())
    {
        Some(path) => {
            let adapter = CsvSentimentAdapter::from_file(path.trim())?;
            info!(path = %path.trim(), scores = adapter.len(), "loaded sentiment scores");
            Ok(Box::new(adapter))
        }
        None => Ok(Box::new(ConstantSentiment(config.get_double(
            "sentiment",
            "constant",
            0.0,
        )))),
    }
}

pub fn build_price_source(config: &dyn ConfigPort) -> Result<CsvAdapter, SentitraderError> {
    validate_data_config(config)?;
    let dir = config
        .get_string("data", "csv_dir")
        .map(|d| d.trim().to_string())
        .unwrap_or_default();
    Ok(CsvAdapter::new(PathBuf::from(dir)))
}

/// Runs a configured backtest to completion, or until `cancel` fires.
pub async fn run_backtest_pipeline(
    config: &BacktestConfig,
    data: &dyn PriceDataPort,
    sentiment: &dyn SentimentPort,
    cancel: &CancellationToken,
) -> Result<BacktestReport, SentitraderError> {
    let (start, end) = config.window();
    let mut backtester = Backtester::new(data, sentiment, config.settings.clone());
    let outcome = backtester
        .run_backtest_until_cancelled(
            &config.symbol,
            config.interval,
            start,
            end,
            config.initial_capital,
            cancel,
        )
        .await?;

    match outcome {
        BacktestOutcome::Completed(report) => Ok(report),
        BacktestOutcome::NoData => Err(SentitraderError::NoData {
            symbol: config.symbol.clone(),
            interval: config.interval.to_string(),
        }),
    }
}

fn run_backtest(
    config_path: &Path,
    symbol: Option<String>,
    interval: Option<String>,
    output: Option<&Path>,
) -> ExitCode {
    match backtest_command(config_path, BacktestOverrides { symbol, interval }, output) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(&e),
    }
}

fn backtest_command(
    config_path: &Path,
    overrides: BacktestOverrides,
    output: Option<&Path>,
) -> Result<(), SentitraderError> {
    let adapter = load_config(config_path)?;
    let config = build_backtest_config(&adapter, &overrides)?;
    let data = build_price_source(&adapter)?;
    let sentiment = build_sentiment_source(&adapter)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let report = runtime.block_on(async {
        let cancel = CancellationToken::new();
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, stopping after the current bar");
                on_interrupt.cancel();
            }
        });
        run_backtest_pipeline(&config, &data, sentiment.as_ref(), &cancel).await
    })?;

    let reporter = TextReportAdapter;
    match output {
        Some(path) => {
            let path_str = path.to_string_lossy();
            reporter.write(&report, &path_str)?;
            info!(path = %path_str, "report written");
        }
        None => print!("{}", reporter.render(&report)),
    }
    Ok(())
}

pub fn format_signal_report(report: &SignalReport) -> String {
    let mut out = String::new();
    for vote in &report.votes {
        match (vote.vote, vote.reading) {
            (Some(v), Some(reading)) => out.push_str(&format!(
                "{:<5} {:<8} {}\n",
                vote.family.to_string(),
                v.to_string(),
                reading
            )),
            _ => out.push_str(&format!(
                "{:<5} {:<8} insufficient data\n",
                vote.family.to_string(),
                "null"
            )),
        }
    }
    out.push_str(&format!(
        "aggregate: {} (strength {:.2})\n",
        report.aggregate.vote, report.aggregate.strength
    ));
    out
}

fn run_signals(csv_path: &Path, sentiment: Option<f64>) -> ExitCode {
    let series = match read_price_file(csv_path) {
        Ok(series) => series,
        Err(e) => return fail(&e),
    };
    let Some(last) = series.last() else {
        return fail(&SentitraderError::NoData {
            symbol: csv_path.display().to_string(),
            interval: "file".to_string(),
        });
    };

    let report = generate_signals(series.bars());
    println!("{} bars, last {}", series.len(), last.timestamp.to_rfc3339());
    print!("{}", format_signal_report(&report));

    if let Some(score) = sentiment {
        if !(-1.0..=1.0).contains(&score) {
            return fail(&SentitraderError::ConfigInvalid {
                section: "cli".to_string(),
                key: "sentiment".to_string(),
                reason: "sentiment must be in [-1, 1]".to_string(),
            });
        }
        let decision = fuse(&report.aggregate, score);
        println!(
            "fused: {} (confidence {:.2})",
            decision.vote, decision.confidence
        );
    }
    ExitCode::SUCCESS
}

fn run_size(capital: f64, entry: f64, stop_loss: Option<f64>, config: Option<&Path>) -> ExitCode {
    let risk_config = match config {
        None => RiskConfig::default(),
        Some(path) => match load_config(path).and_then(|c| build_risk_config(&c)) {
            Ok(rc) => rc,
            Err(e) => return fail(&e),
        },
    };
    if !(capital > 0.0 && entry > 0.0) {
        return fail(&SentitraderError::ConfigInvalid {
            section: "cli".to_string(),
            key: "capital".to_string(),
            reason: "capital and entry must be positive".to_string(),
        });
    }

    // Sizing never reads the date.
    let policy = RiskPolicy::new(capital, risk_config, NaiveDate::MIN);
    let size = policy.size_position(entry, stop_loss);
    println!("size: {:.8}", size);
    println!("value: {:.2}", size * entry);
    if let Some(stop) = stop_loss {
        println!("risk at stop: {:.2}", size * (entry - stop).abs());
    }
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    let result = load_config(config_path).and_then(|adapter| validate_config(&adapter));
    match result {
        Ok(config) => {
            let (start, end) = config.window();
            println!(
                "Configuration valid: {} {} from {} to {}, capital {:.2}",
                config.symbol,
                config.interval,
                start.date_naive(),
                end.date_naive(),
                config.initial_capital
            );
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}
