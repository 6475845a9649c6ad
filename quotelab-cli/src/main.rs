//! quotelab CLI: run, sweep and synth commands.
//!
//! Commands:
//! - `run`: execute one backtest from a TOML run file
//! - `sweep`: grid search over the run file's `[sweep]` section
//! - `synth`: write synthetic Brownian bars as CSV

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use quotelab_core::engine::StopReason;
use quotelab_runner::data_loader::write_bars_csv;
use quotelab_runner::export::{export_run, write_sweep_json};
use quotelab_runner::{
    load_market_data, run_from_config, BacktestConfig, BacktestResult, Objective, ParamSweep, SweepReport,
    SyntheticConfig,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "quotelab", version, about = "quotelab: market-making backtests on OHLC bars")]
struct Cli {
    /// More log output (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one backtest and print a metrics summary.
    Run {
        /// Path to the TOML run file.
        #[arg(long)]
        config: PathBuf,

        /// Directory for result, metrics and snapshot files.
        #[arg(long)]
        out: Option<PathBuf>,

        /// Load `<SYMBOL>.csv` files from here instead of the configured source.
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Print the metrics as JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Grid search over the run file's [sweep] section.
    Sweep {
        #[arg(long)]
        config: PathBuf,

        /// Run grid points one at a time.
        #[arg(long, default_value_t = false)]
        sequential: bool,

        /// Override the objective: sharpe, total_return or sortino.
        #[arg(long)]
        objective: Option<Objective>,

        /// Write sweep.json here.
        #[arg(long)]
        out: Option<PathBuf>,

        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Rows shown in the ranking.
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Write synthetic bars, one `<SYMBOL>.csv` per symbol.
    Synth {
        #[arg(long = "symbol", required = true)]
        symbols: Vec<String>,

        #[arg(long, default_value_t = 1_000)]
        bars: usize,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Starting price.
        #[arg(long, default_value_t = 100.0)]
        x0: f64,

        /// Path speed.
        #[arg(long, default_value_t = 2.0)]
        delta: f64,

        #[arg(long)]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run {
            config,
            out,
            data_dir,
            json,
        } => run_cmd(config, out, data_dir, json),
        Commands::Sweep {
            config,
            sequential,
            objective,
            out,
            data_dir,
            top,
        } => sweep_cmd(config, sequential, objective, out, data_dir, top),
        Commands::Synth {
            symbols,
            bars,
            seed,
            x0,
            delta,
            out,
        } => synth_cmd(symbols, bars, seed, x0, delta, out),
    }
}

fn init_tracing(verbosity: u8) {
    let default_level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: &Path) -> Result<BacktestConfig> {
    BacktestConfig::from_path(path).with_context(|| format!("loading run file {}", path.display()))
}

fn run_cmd(config_path: PathBuf, out: Option<PathBuf>, data_dir: Option<PathBuf>, json: bool) -> Result<()> {
    let config = load_config(&config_path)?;
    let result = run_from_config(&config, data_dir.as_deref()).context("backtest failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result.metrics)?);
    } else {
        print_summary(&result);
    }

    if let Some(dir) = out {
        export_run(&dir, &result).with_context(|| format!("writing artifacts to {}", dir.display()))?;
        println!("Artifacts saved to: {}", dir.display());
    }
    Ok(())
}

fn sweep_cmd(
    config_path: PathBuf,
    sequential: bool,
    objective: Option<Objective>,
    out: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    top: usize,
) -> Result<()> {
    let config = load_config(&config_path)?;
    if config.sweep.is_none() {
        bail!("{} has no [sweep] section", config_path.display());
    }
    let loaded = load_market_data(&config.data, &config.symbol_names(), data_dir.as_deref())
        .context("loading market data")?;

    let mut sweep = ParamSweep::from_config(&config)?.with_parallelism(!sequential);
    if let Some(objective) = objective {
        sweep = sweep.with_objective(objective);
    }
    let report = sweep.run(&loaded.data)?;
    print_ranking(&report, top);

    if let Some(dir) = out {
        fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
        let path = dir.join("sweep.json");
        write_sweep_json(&path, &report).with_context(|| format!("writing {}", path.display()))?;
        println!("Sweep report saved to: {}", path.display());
    }
    if report.best.is_none() {
        bail!("every grid point failed");
    }
    Ok(())
}

fn synth_cmd(symbols: Vec<String>, bars: usize, seed: u64, x0: f64, delta: f64, out: PathBuf) -> Result<()> {
    let synthetic = SyntheticConfig {
        bars,
        seed,
        x0,
        delta,
        ..SyntheticConfig::default()
    };
    if let Err(reason) = synthetic.validate() {
        bail!("invalid synthetic settings: {reason}");
    }
    fs::create_dir_all(&out).with_context(|| format!("creating {}", out.display()))?;
    for symbol in &symbols {
        let path = out.join(format!("{symbol}.csv"));
        write_bars_csv(&path, &synthetic.generate_bars(symbol))
            .with_context(|| format!("writing {}", path.display()))?;
        info!(symbol = %symbol, bars, path = %path.display(), "synthetic bars written");
    }
    Ok(())
}

fn print_summary(result: &BacktestResult) {
    let m = &result.metrics;
    println!("=== Backtest {} ===", &result.run_id[..12.min(result.run_id.len())]);
    println!("Symbols:          {}", result.config.symbol_names().join(", "));
    println!("Steps:            {}", m.steps);
    println!(
        "Stop:             {} ({})",
        m.final_state,
        m.stop_reason.map_or_else(|| "-".to_string(), |r| r.to_string())
    );
    println!("Final equity:     {:.2}", m.final_equity);
    println!("Total return:     {:.4}%", m.total_return * 100.0);
    println!("Sharpe:           {:.3}", m.sharpe);
    println!("Sortino:          {:.3}", m.sortino);
    println!("Max drawdown:     {:.4}%", m.max_drawdown * 100.0);
    println!("Realized PnL:     {:.2}", m.realized_pnl);
    println!(
        "Fills:            {} ({} buys, {} sells, {} taker)",
        m.fill_count, m.buy_count, m.sell_count, m.taker_fill_count
    );
    println!("Volume/notional:  {:.4} / {:.2}", m.traded_volume, m.traded_notional);
    println!("Fees:             maker {:.2}, taker {:.2}", m.maker_fees, m.taker_fees);
    println!("Rejected orders:  {}", m.rejected_orders);
    for (symbol, qty) in &m.final_inventory {
        println!("Inventory {symbol:<8} {qty:.6}");
    }
    if m.stop_reason == Some(StopReason::EmergencyExit) {
        println!("WARNING: run ended in an emergency liquidation");
    }
}

fn print_ranking(report: &SweepReport, top: usize) {
    println!(
        "=== Sweep on {} by {:?} ({} runs, {} failed) ===",
        report.symbol,
        report.objective,
        report.entries.len(),
        report.failed_count()
    );
    for entry in report.top_n(top) {
        let params: Vec<String> = entry.params.iter().map(|(k, v)| format!("{k}={v}")).collect();
        match (&entry.score, &entry.error) {
            (Some(score), _) => println!("#{:<4} {:>10.4}  {}", entry.index, score, params.join(" ")),
            (None, Some(error)) => println!("#{:<4} {:>10}  {}  ({error})", entry.index, "failed", params.join(" ")),
            (None, None) => println!("#{:<4} {:>10}  {}", entry.index, "-", params.join(" ")),
        }
    }
}
