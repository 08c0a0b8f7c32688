//! CLI definition and dispatch.

use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_store::JsonReportStore;
use crate::domain::combine::WeightedFactor;
use crate::domain::error::FactorError;
use crate::domain::function::REGISTRY;
use crate::domain::lab::{CombinationRequest, EvaluationRequest, FactorLab, check_expression};
use crate::domain::panel::{Interval, parse_timestamp};
use crate::domain::report::{Rankings, Report, ReportData, SortKey};
use crate::domain::result::Metrics;
use crate::domain::settings::AnalysisSettings;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "factorlab", about = "Factor expression research and quantile backtesting")]
pub struct Cli {
    /// INI configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Evaluate one factor expression and backtest it
    Evaluate {
        expression: String,
        #[arg(long)]
        symbol: String,
        #[arg(long, default_value = "1d")]
        interval: Interval,
        /// Forward return horizon in bars
        #[arg(long, default_value_t = 1)]
        periods: usize,
        /// Number of quantile layers (3, 5 or 10)
        #[arg(long, default_value_t = 5)]
        quantile: usize,
        #[arg(long, value_parser = parse_bound)]
        start: Option<NaiveDateTime>,
        #[arg(long, value_parser = parse_bound)]
        end: Option<NaiveDateTime>,
        /// Save the result as a named report
        #[arg(long)]
        save: Option<String>,
        #[arg(long, default_value = "")]
        description: String,
        /// Write the full result as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Combine weighted factors and backtest the composite
    Combine {
        /// Factor as EXPRESSION=WEIGHT (weight defaults to 1)
        #[arg(long = "factor", required = true)]
        factors: Vec<String>,
        #[arg(long)]
        symbol: String,
        #[arg(long, default_value = "1d")]
        interval: Interval,
        #[arg(long, default_value_t = 1)]
        periods: usize,
        #[arg(long, default_value_t = 5)]
        quantile: usize,
        #[arg(long, value_parser = parse_bound)]
        start: Option<NaiveDateTime>,
        #[arg(long, value_parser = parse_bound)]
        end: Option<NaiveDateTime>,
        #[arg(long)]
        save: Option<String>,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Parse an expression and print its normalized form
    Check { expression: String },
    /// List the function library
    Functions,
    /// List available symbols and intervals
    Symbols,
    /// Manage saved reports
    Reports {
        #[command(subcommand)]
        action: ReportsCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum ReportsCommand {
    /// List saved reports, ranked
    List {
        /// score, ic_mean, sharpe, sortino, win_rate or timestamp
        #[arg(long, default_value = "score")]
        sort: String,
        /// Show only the top N reports
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Print a saved report as JSON
    Show { id: String },
    /// Delete a saved report
    Delete { id: String },
}

fn parse_bound(value: &str) -> Result<NaiveDateTime, String> {
    parse_timestamp(value).ok_or_else(|| format!("invalid date '{value}' (expected YYYY-MM-DD)"))
}

/// Splits `EXPRESSION=WEIGHT` at the last `=`; a missing weight means 1.
pub fn parse_weighted_factor(value: &str) -> Result<WeightedFactor, FactorError> {
    let Some((expression, weight)) = value.rsplit_once('=') else {
        return Ok(WeightedFactor {
            expression: value.trim().to_string(),
            weight: 1.0,
        });
    };
    let weight = weight
        .trim()
        .parse::<f64>()
        .map_err(|_| FactorError::InvalidWeight {
            expression: expression.trim().to_string(),
            weight: f64::NAN,
        })?;
    Ok(WeightedFactor {
        expression: expression.trim().to_string(),
        weight,
    })
}

pub fn run(cli: Cli) -> ExitCode {
    let config = match load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    init_logging(cli.log_level.as_deref(), &config);

    match dispatch(cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: Option<&Path>) -> Result<FileConfigAdapter, FactorError> {
    match path {
        Some(p) => FileConfigAdapter::from_file(p),
        None => Ok(FileConfigAdapter::empty()),
    }
}

fn init_logging(flag: Option<&str>, config: &dyn ConfigPort) {
    let requested = flag
        .map(str::to_string)
        .or_else(|| config.get_string("log", "level"));
    let level = match requested.as_deref().map(Level::from_str) {
        Some(Ok(level)) => level,
        Some(Err(_)) => {
            eprintln!("warning: unknown log level, using info");
            Level::INFO
        }
        None => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("warning: logging already initialized");
    }
}

fn dispatch(command: Command, config: &FileConfigAdapter) -> Result<(), FactorError> {
    match command {
        Command::Evaluate {
            expression,
            symbol,
            interval,
            periods,
            quantile,
            start,
            end,
            save,
            description,
            output,
        } => {
            let request = EvaluationRequest {
                expression,
                symbol,
                interval,
                periods,
                quantile,
                start,
                end,
            };
            run_evaluate(config, &request, save, description, output.as_deref())
        }
        Command::Combine {
            factors,
            symbol,
            interval,
            periods,
            quantile,
            start,
            end,
            save,
            description,
            output,
        } => {
            let request = CombinationRequest {
                symbol,
                interval,
                periods,
                quantile,
                factors: factors
                    .iter()
                    .map(|f| parse_weighted_factor(f))
                    .collect::<Result<_, _>>()?,
                start,
                end,
            };
            run_combine(config, &request, save, description, output.as_deref())
        }
        Command::Check { expression } => run_check(&expression),
        Command::Functions => {
            run_functions();
            Ok(())
        }
        Command::Symbols => run_symbols(config),
        Command::Reports { action } => run_reports(config, action),
    }
}

/// Prints a caret under the failing position when `err` is a parse error.
fn with_context(err: FactorError, expression: &str) -> FactorError {
    if let FactorError::Parse(ref e) = err {
        eprintln!("{}", e.display_with_context(expression));
    }
    err
}

fn run_evaluate(
    config: &dyn ConfigPort,
    request: &EvaluationRequest,
    save: Option<String>,
    description: String,
    output: Option<&Path>,
) -> Result<(), FactorError> {
    let settings = AnalysisSettings::from_config(config)?;
    let data = build_data_port(config)?;
    let lab = FactorLab::new(data.as_ref(), &settings);

    let result = lab
        .evaluate(request)
        .map_err(|e| with_context(e, &request.expression))?;

    print_metrics(&request.expression, &result.metrics);
    write_output(output, &result)?;

    if let Some(name) = save {
        let report = Report::new(
            name,
            description,
            Some(request.expression.clone()),
            ReportData::Single(result),
        );
        save_report(config, &report)?;
    }
    Ok(())
}

fn run_combine(
    config: &dyn ConfigPort,
    request: &CombinationRequest,
    save: Option<String>,
    description: String,
    output: Option<&Path>,
) -> Result<(), FactorError> {
    let settings = AnalysisSettings::from_config(config)?;
    let data = build_data_port(config)?;
    let lab = FactorLab::new(data.as_ref(), &settings);

    let combined = lab.combine(request)?;

    let label = request
        .factors
        .iter()
        .map(|f| format!("{}*{}", f.weight, f.expression))
        .collect::<Vec<_>>()
        .join(" + ");
    print_metrics(&label, &combined.result.metrics);
    for detail in &combined.factor_details {
        println!(
            "  {:<40} weight {:>7.3}  ic {:>8.4}",
            detail.expression, detail.weight, detail.ic
        );
    }
    write_output(output, &combined)?;

    if let Some(name) = save {
        let report = Report::new(name, description, None, ReportData::Combination(combined));
        save_report(config, &report)?;
    }
    Ok(())
}

fn run_check(expression: &str) -> Result<(), FactorError> {
    let expr = check_expression(expression).map_err(|e| with_context(e, expression))?;
    println!("{expr}");
    Ok(())
}

fn run_functions() {
    for entry in REGISTRY {
        let signature = entry.function.signature();
        let mut args: Vec<String> = (1..=signature.series).map(|i| format!("x{i}")).collect();
        if signature.window {
            args.push("n".into());
        }
        let call = format!("{}({})", entry.name, args.join(", "));
        if entry.alias {
            println!("{:<28} alias of {}", call, entry.function.name());
        } else {
            println!("{:<28} {}", call, entry.function.description());
        }
    }
}

fn run_symbols(config: &dyn ConfigPort) -> Result<(), FactorError> {
    let data = build_data_port(config)?;
    let structure = data.list_structure()?;
    if structure.is_empty() {
        eprintln!("No symbols found");
    }
    for (symbol, intervals) in &structure {
        println!("{:<12} {}", symbol, intervals.join(", "));
    }
    Ok(())
}

fn run_reports(config: &dyn ConfigPort, action: ReportsCommand) -> Result<(), FactorError> {
    let store = build_report_port(config)?;
    let outcome = match action {
        ReportsCommand::List { sort, limit } => {
            let rankings = Rankings::top(store.list(SortKey::parse(&sort))?, limit);
            if rankings.total == 0 {
                eprintln!("No saved reports");
            } else {
                eprintln!("Showing {} of {} reports", rankings.reports.len(), rankings.total);
            }
            for s in &rankings.reports {
                println!(
                    "{:>3}. {}  {:<24} score {:>6.2}  ic {:>8.4}  sharpe {:>7.3}  win {:>5.1}%  {}",
                    s.rank,
                    s.id,
                    s.name,
                    s.score,
                    s.ic_mean,
                    s.sharpe,
                    s.win_rate * 100.0,
                    if s.is_valid_factor { "valid" } else { "invalid" }
                );
            }
            Ok(())
        }
        ReportsCommand::Show { id } => {
            let report = store.get(&id)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        ReportsCommand::Delete { id } => {
            store.delete(&id)?;
            eprintln!("Deleted report {id}");
            Ok(())
        }
    };
    store.close()?;
    outcome
}

fn print_metrics(label: &str, m: &Metrics) {
    println!("Factor:        {label}");
    println!("Observations:  {}", m.num_observations);
    println!(
        "IC:            mean {:.4}  std {:.4}  IR {:.3}  t {:.2}  p {:.4}",
        m.ic_mean, m.ic_std, m.ic_ir, m.t_stat, m.p_value
    );
    println!(
        "Long-short:    sharpe {:.3}  sortino {:.3}  win {:.1}%  max dd {:.2}%",
        m.sharpe,
        m.sortino,
        m.win_rate * 100.0,
        m.max_drawdown * 100.0
    );
    println!(
        "Quantiles:     {} layers  monotonic {}  spread {:.5}",
        m.n_quantiles, m.quantile_analysis.is_monotonic, m.quantile_analysis.spread
    );
    println!("Score:         {:.2}", m.score);
    println!("Validity:      {}", m.validity_reason);
}

fn write_output<T: Serialize>(path: Option<&Path>, value: &T) -> Result<(), FactorError> {
    if let Some(path) = path {
        fs::write(path, serde_json::to_string_pretty(value)?)?;
        eprintln!("Result written to {}", path.display());
    }
    Ok(())
}

fn save_report(config: &dyn ConfigPort, report: &Report) -> Result<(), FactorError> {
    let store = build_report_port(config)?;
    let id = store.save(report)?;
    store.close()?;
    eprintln!("Saved report {id}");
    Ok(())
}

fn require(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, FactorError> {
    config
        .get_string(section, key)
        .ok_or_else(|| FactorError::ConfigMissing {
            section: section.into(),
            key: key.into(),
        })
}

fn unknown_backend(section: &str, backend: &str) -> FactorError {
    FactorError::ConfigInvalid {
        section: section.into(),
        key: "backend".into(),
        reason: format!("unknown backend '{backend}'"),
    }
}

pub fn build_data_port(config: &dyn ConfigPort) -> Result<Box<dyn DataPort>, FactorError> {
    let backend = config
        .get_string("data", "backend")
        .unwrap_or_else(|| "csv".to_string());
    match backend.as_str() {
        "csv" => Ok(Box::new(CsvAdapter::new(PathBuf::from(require(
            config, "data", "dir",
        )?)))),
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            let adapter = crate::adapters::sqlite_adapter::SqliteAdapter::from_config(config)?;
            adapter.initialize_schema()?;
            Ok(Box::new(adapter))
        }
        other => Err(unknown_backend("data", other)),
    }
}

pub fn build_report_port(config: &dyn ConfigPort) -> Result<Box<dyn ReportPort>, FactorError> {
    let backend = config
        .get_string("reports", "backend")
        .unwrap_or_else(|| "json".to_string());
    match backend.as_str() {
        "json" => {
            let dir = config
                .get_string("reports", "dir")
                .unwrap_or_else(|| "reports".to_string());
            Ok(Box::new(JsonReportStore::open(dir)?))
        }
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            let adapter = crate::adapters::sqlite_adapter::SqliteAdapter::from_config(config)?;
            adapter.initialize_schema()?;
            Ok(Box::new(adapter))
        }
        other => Err(unknown_backend("reports", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weighted_factor_splits_at_last_equals() {
        let f = parse_weighted_factor("ts_mean(close, 5) = -0.5").unwrap();
        assert_eq!(f.expression, "ts_mean(close, 5)");
        assert_eq!(f.weight, -0.5);

        let plain = parse_weighted_factor("close").unwrap();
        assert_eq!(plain.weight, 1.0);

        assert!(matches!(
            parse_weighted_factor("close=heavy"),
            Err(FactorError::InvalidWeight { .. })
        ));
    }

    #[test]
    fn cli_parses_evaluate_arguments() {
        let cli = Cli::try_parse_from([
            "factorlab",
            "--config",
            "lab.ini",
            "evaluate",
            "ts_rank(close, 10)",
            "--symbol",
            "BTC",
            "--interval",
            "4h",
            "--quantile",
            "10",
            "--start",
            "2024-01-01",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("lab.ini")));
        match cli.command {
            Command::Evaluate {
                expression,
                interval,
                quantile,
                periods,
                start,
                ..
            } => {
                assert_eq!(expression, "ts_rank(close, 10)");
                assert_eq!(interval, Interval::Hours(4));
                assert_eq!(quantile, 10);
                assert_eq!(periods, 1);
                assert!(start.is_some());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn reports_list_takes_sort_and_limit() {
        let cli = Cli::try_parse_from([
            "factorlab", "reports", "list", "--sort", "sortino", "--limit", "5",
        ])
        .unwrap();
        match cli.command {
            Command::Reports {
                action: ReportsCommand::List { sort, limit },
            } => {
                assert_eq!(SortKey::parse(&sort), SortKey::Sortino);
                assert_eq!(limit, Some(5));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn cli_rejects_bad_interval_and_date() {
        let base = ["factorlab", "evaluate", "close", "--symbol", "X"];
        let with = |extra: [&'static str; 2]| base.iter().copied().chain(extra).collect::<Vec<_>>();
        assert!(Cli::try_parse_from(with(["--interval", "3x"])).is_err());
        assert!(Cli::try_parse_from(with(["--start", "soon"])).is_err());
    }

    #[test]
    fn combine_requires_a_factor() {
        assert!(Cli::try_parse_from(["factorlab", "combine", "--symbol", "BTC"]).is_err());
        let cli = Cli::try_parse_from([
            "factorlab",
            "combine",
            "--symbol",
            "BTC",
            "--factor",
            "close=1",
            "--factor",
            "volume=-1",
        ])
        .unwrap();
        match cli.command {
            Command::Combine { factors, .. } => assert_eq!(factors.len(), 2),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn unknown_backend_is_config_error() {
        let config = FileConfigAdapter::from_string("[data]\nbackend = parquet\n").unwrap();
        let err = build_data_port(&config).err().unwrap();
        assert!(matches!(err, FactorError::ConfigInvalid { .. }));
    }

    #[test]
    fn csv_backend_needs_a_directory() {
        let config = FileConfigAdapter::empty();
        let err = build_data_port(&config).err().unwrap();
        assert!(matches!(err, FactorError::ConfigMissing { .. }));
    }

    #[test]
    fn check_accepts_valid_and_rejects_unknown() {
        assert!(run_check("ts_mean(close, 5) / close").is_ok());
        assert!(matches!(run_check("foo(close, 5)"), Err(FactorError::Parse(_))));
    }
}
