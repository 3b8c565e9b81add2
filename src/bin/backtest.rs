//! Backtest CLI
//!
//! Run backtests on historical candles.
//! Usage:
//!   cargo run --bin backtest -- run --symbol BTC/USD --strategy crossover
//!   cargo run --bin backtest -- compare --file candles.csv --strategies all --export out.csv

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use rust_decimal::prelude::ToPrimitive;
use signal_backtester::backtest::{
    export_csv, BacktestConfig, BacktestResult, Backtester, ComparisonReport, StrategyComparator,
    StrategyComparison, Trade,
};
use signal_backtester::config::{decimal_setting, Config};
use signal_backtester::data::{most_recent, Candle, CandleSource, CsvCandleSource};
use signal_backtester::strategy::{create_strategy, parse_strategy_list, SignalType, STRATEGY_NAMES};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "backtest")]
#[command(about = "Replay historical candles through trading strategies")]
struct Cli {
    /// Config file (defaults to config/default.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct DataArgs {
    /// Candle CSV file; overrides --symbol/--data-dir
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Symbol to load from the data directory (e.g., BTC/USD)
    #[arg(long, default_value = "BTC/USD")]
    symbol: String,

    /// Directory holding <SYMBOL>.csv files
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Only use the most recent N candles
    #[arg(short, long)]
    limit: Option<usize>,

    /// Initial balance, overrides the config file
    #[arg(short, long)]
    balance: Option<f64>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a single strategy backtest
    Run {
        #[command(flatten)]
        data: DataArgs,

        /// Strategy to run
        #[arg(short, long, default_value = "crossover")]
        strategy: String,

        /// Show individual trades
        #[arg(long)]
        trades: bool,
    },

    /// Compare multiple strategies
    Compare {
        #[command(flatten)]
        data: DataArgs,

        /// Strategies to compare (comma-separated, or "all")
        #[arg(short = 'S', long, default_value = "all")]
        strategies: String,

        /// Run strategies on all cores
        #[arg(long)]
        parallel: bool,

        /// Export results to CSV file
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// List available strategies
    List,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("signal_backtester=info".parse()?)
                .add_directive("backtest=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Run {
            data,
            strategy,
            trades,
        } => run_single_backtest(&config, &data, &strategy, trades),

        Commands::Compare {
            data,
            strategies,
            parallel,
            export,
        } => run_comparison(&config, &data, &strategies, parallel, export),

        Commands::List => {
            println!("\nAvailable strategies:");
            for name in STRATEGY_NAMES {
                println!("  - {}", name);
            }
            println!("\nUsage: backtest compare --strategies crossover,rsi,macd");
            println!("       backtest compare --strategies all");
            Ok(())
        }
    }
}

fn load_candles(data: &DataArgs) -> Result<Vec<Candle>> {
    match &data.file {
        Some(path) => Ok(most_recent(CsvCandleSource::load_file(path)?, data.limit)),
        None => CsvCandleSource::new(&data.data_dir).load_candles(&data.symbol, data.limit),
    }
}

fn backtest_config(config: &Config, data: &DataArgs) -> Result<BacktestConfig> {
    let mut backtest = BacktestConfig::from_settings(&config.backtest)?;
    if let Some(balance) = data.balance {
        backtest.initial_balance = decimal_setting("--balance", balance)?;
    }
    Ok(backtest)
}

fn run_single_backtest(config: &Config, data: &DataArgs, name: &str, show_trades: bool) -> Result<()> {
    let candles = load_candles(data)?;
    let mut strategy = create_strategy(name, &config.strategies)?;
    let mut backtester = Backtester::with_config(backtest_config(config, data)?);

    let result = backtester.backtest(strategy.as_mut(), &candles)?;

    print_header(strategy.name());
    print_period(&candles);
    print_result(&result);
    print_footer();

    if show_trades && !result.trades.is_empty() {
        println!();
        print_trades(&result.trades);
    }

    Ok(())
}

fn run_comparison(
    config: &Config,
    data: &DataArgs,
    strategies: &str,
    parallel: bool,
    export: Option<PathBuf>,
) -> Result<()> {
    let candles = load_candles(data)?;

    let mut set = parse_strategy_list(strategies)
        .iter()
        .map(|name| create_strategy(name, &config.strategies))
        .collect::<Result<Vec<_>>>()?;

    let comparator = StrategyComparator::with_config(backtest_config(config, data)?);
    let results = if parallel {
        comparator.compare_strategies_parallel(&mut set, &candles)?
    } else {
        comparator.compare_strategies(&mut set, &candles)?
    };

    print_comparison_results(&results, &candles);

    if let Some(path) = export {
        export_csv(&results, &path)?;
        println!("\nExported to: {}", path.display());
    }

    Ok(())
}

fn print_comparison_results(results: &[StrategyComparison], candles: &[Candle]) {
    println!();
    println!("\x1b[1;36m{}\x1b[0m", "═".repeat(78));
    println!("\x1b[1;36m                         STRATEGY COMPARISON\x1b[0m");
    println!("\x1b[1;36m{}\x1b[0m", "═".repeat(78));
    print_period(candles);

    // Table header
    println!(
        "┌{:─<17}┬{:─>8}┬{:─>10}┬{:─>9}┬{:─>11}┬{:─>11}┐",
        "", "", "", "", "", ""
    );
    println!(
        "│ {:15} │ {:>6} │ {:>8} │ {:>7} │ {:>9} │ {:>9} │",
        "Strategy", "Trades", "Win Rate", "Return", "Drawdown", "Sharpe"
    );
    println!(
        "├{:─<17}┼{:─>8}┼{:─>10}┼{:─>9}┼{:─>11}┼{:─>11}┤",
        "", "", "", "", "", ""
    );

    for comparison in results {
        let m = &comparison.result.metrics;

        let return_color = if m.total_return >= 0.0 {
            "\x1b[32m"
        } else {
            "\x1b[31m"
        };

        println!(
            "│ {:15} │ {:>6} │ {:>7.1}% │ {}{:>+6.2}%\x1b[0m │ {:>8.1}% │ {:>9.2} │",
            comparison.strategy_name,
            m.total_trades,
            m.win_rate * 100.0,
            return_color,
            m.total_return,
            -m.max_drawdown,
            m.sharpe_ratio
        );
    }

    println!(
        "└{:─<17}┴{:─>8}┴{:─>10}┴{:─>9}┴{:─>11}┴{:─>11}┘",
        "", "", "", "", "", ""
    );

    let report = ComparisonReport::from_results(results);
    println!();
    if let Some(best) = report.best_by_return {
        println!(
            "\x1b[1;32mBest Return:   {} ({:+.2}%)\x1b[0m",
            best.strategy_name, best.result.metrics.total_return
        );
    }
    if let Some(best) = report.best_by_win_rate {
        println!(
            "Best Win Rate: {} ({:.1}%)",
            best.strategy_name,
            best.result.metrics.win_rate * 100.0
        );
    }
    if let Some(best) = report.most_active {
        println!(
            "Most Active:   {} ({} trades)",
            best.strategy_name, best.result.metrics.total_trades
        );
    }

    println!("\x1b[1;36m{}\x1b[0m", "═".repeat(78));
}

fn print_header(name: &str) {
    println!();
    println!("\x1b[1;36m{}\x1b[0m", "═".repeat(55));
    println!("\x1b[1;36m         BACKTEST RESULTS: {}\x1b[0m", name);
    println!("\x1b[1;36m{}\x1b[0m", "═".repeat(55));
}

fn print_period(candles: &[Candle]) {
    if let (Some(first), Some(last)) = (candles.first(), candles.last()) {
        println!(
            "Period: {} → {} | Candles: {}",
            first.timestamp.format("%Y-%m-%d %H:%M"),
            last.timestamp.format("%Y-%m-%d %H:%M"),
            candles.len()
        );
    }
    println!();
}

fn print_result(result: &BacktestResult) {
    let m = &result.metrics;

    println!("\x1b[1;33mPERFORMANCE\x1b[0m");
    println!("  Total Trades:     {}", m.total_trades);
    println!(
        "  Win Rate:         {:.1}%  ({} wins / {} losses)",
        m.win_rate * 100.0,
        m.winning_trades,
        m.losing_trades
    );
    println!();

    let return_color = if m.total_return >= 0.0 {
        "\x1b[32m"
    } else {
        "\x1b[31m"
    };

    println!("\x1b[1;33mRETURN\x1b[0m");
    println!(
        "  Start:            ${:.2}",
        result.initial_balance.to_f64().unwrap_or(0.0)
    );
    println!(
        "  End:              {}${:.2} ({:+.2}%)\x1b[0m",
        return_color,
        result.final_balance.to_f64().unwrap_or(0.0),
        m.total_return
    );
    println!();

    println!("\x1b[1;33mRISK\x1b[0m");
    println!("  Max Drawdown:     {:.2}%", m.max_drawdown);
    println!("  Sharpe Ratio:     {:.2}", m.sharpe_ratio);
}

fn print_footer() {
    println!("\x1b[1;36m{}\x1b[0m", "═".repeat(55));
}

fn print_trades(trades: &[Trade]) {
    println!("\x1b[1;33mTRADES\x1b[0m");
    println!(
        "{:<20} {:>6} {:>12} {:>12} {:>6}",
        "Timestamp", "Side", "Price", "Qty", "Conf"
    );
    println!("{}", "-".repeat(60));

    for trade in trades {
        let side_color = match trade.trade_type {
            SignalType::Buy => "\x1b[32m",
            SignalType::Sell => "\x1b[31m",
            SignalType::Hold => "",
        };

        println!(
            "{:<20} {}{:>6}\x1b[0m {:>12.2} {:>12.6} {:>6.2}",
            trade.timestamp.format("%Y-%m-%d %H:%M:%S"),
            side_color,
            trade.trade_type.to_string(),
            trade.price.to_f64().unwrap_or(0.0),
            trade.quantity.to_f64().unwrap_or(0.0),
            trade.confidence
        );
    }
}
