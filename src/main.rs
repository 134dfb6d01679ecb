use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use pozole::prelude::*;
use std::path::PathBuf;
use tracing::warn;

#[derive(Parser)]
#[command(name = "pozole")]
#[command(about = "A vectorized backtesting engine for directional strategies", long_about = None)]
struct Cli {
    //log level, overridden by RUST_LOG
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    //run a backtest
    Run(RunArgs),

    //grid search the strategy's integer parameters
    Optimize {
        #[command(flatten)]
        run: RunArgs,

        //first parameter range as start:stop:step (stop exclusive)
        #[arg(long)]
        range1: ParamRange,

        //second parameter range (sma and mean reversion only)
        #[arg(long)]
        range2: Option<ParamRange>,
    },
}

#[derive(Args)]
struct RunArgs {
    //json configuration file, flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    //write the effective configuration to this json file
    #[arg(long)]
    save_config: Option<PathBuf>,

    //path to wide csv data file
    #[arg(long)]
    data: Option<PathBuf>,

    //symbol column to trade (eg EUR=, AAPL.O)
    #[arg(long)]
    symbol: Option<String>,

    //first date of the backtest (yyyy-mm-dd)
    #[arg(long)]
    start: Option<NaiveDate>,

    //last date of the backtest (yyyy-mm-dd)
    #[arg(long)]
    end: Option<NaiveDate>,

    //strategy type (sma, momentum, mean_reversion, linreg)
    #[arg(long)]
    strategy: Option<String>,

    //sma strategy parameters
    #[arg(long)]
    sma1: Option<usize>,

    #[arg(long)]
    sma2: Option<usize>,

    //momentum window
    #[arg(long)]
    momentum: Option<usize>,

    //mean reversion parameters
    #[arg(long)]
    sma: Option<usize>,

    #[arg(long)]
    threshold: Option<f64>,

    //linear regression parameters, ranges default to the backtest range
    #[arg(long)]
    lags: Option<usize>,

    #[arg(long)]
    fit_start: Option<NaiveDate>,

    #[arg(long)]
    fit_end: Option<NaiveDate>,

    #[arg(long)]
    predict_start: Option<NaiveDate>,

    #[arg(long)]
    predict_end: Option<NaiveDate>,

    //starting capital
    #[arg(long)]
    amount: Option<f64>,

    //proportional cost per position change
    #[arg(long)]
    transaction_cost: Option<f64>,

    //evaluate grid points on the calling thread
    #[arg(long)]
    sequential: bool,

    //keep rows with missing values in other columns
    #[arg(long)]
    keep_incomplete_rows: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    match cli.command {
        Commands::Run(args) => {
            let config = build_configuration(&args)?;
            run(&config)
        }
        Commands::Optimize {
            run,
            range1,
            range2,
        } => {
            let config = build_configuration(&run)?;
            let ranges: Vec<ParamRange> = std::iter::once(range1).chain(range2).collect();
            optimize(&config, &ranges)
        }
    }
}

fn build_configuration(args: &RunArgs) -> Result<BacktestConfiguration> {
    let mut config = match &args.config {
        Some(path) => BacktestConfiguration::from_json_file(path)
            .context(format!("Failed to load configuration from {:?}", path))?,
        None => BacktestConfiguration::default(),
    };

    if let Some(data) = &args.data {
        config.data.data_path = data.clone();
    }
    if args.keep_incomplete_rows {
        config.data.drop_incomplete_rows = false;
    }
    if let Some(symbol) = &args.symbol {
        config.symbol = symbol.clone();
    }
    if let Some(start) = args.start {
        config.range.start = start;
    }
    if let Some(end) = args.end {
        config.range.end = end;
    }
    if let Some(amount) = args.amount {
        config.amount = amount;
    }
    if let Some(cost) = args.transaction_cost {
        config.transaction_cost = cost;
    }
    if args.sequential {
        config.parallel = false;
    }

    if let Some(name) = &args.strategy {
        let strategy_type = StrategyType::parse(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown strategy: {}", name))?;
        if strategy_type != config.strategy.strategy_type() {
            config.strategy = default_params(strategy_type, config.range);
        }
    }

    apply_overrides(&mut config.strategy, args);

    if let Some(path) = &args.save_config {
        config
            .to_json_file(path)
            .context(format!("Failed to save configuration to {:?}", path))?;
    }

    Ok(config)
}

fn default_params(strategy_type: StrategyType, range: DateRange) -> StrategyParams {
    match strategy_type {
        StrategyType::SmaCrossover => StrategyParams::SmaCrossover(SmaParams::default()),
        StrategyType::Momentum => StrategyParams::Momentum(MomentumParams::default()),
        StrategyType::MeanReversion => StrategyParams::MeanReversion(MeanReversionParams::default()),
        StrategyType::LinearRegression => {
            StrategyParams::LinearRegression(LinearRegressionParams {
                lags: 3,
                fit_range: range,
                predict_range: range,
            })
        }
    }
}

fn apply_overrides(params: &mut StrategyParams, args: &RunArgs) {
    let name = params.name();
    let mut ignored = Vec::new();

    match params {
        StrategyParams::SmaCrossover(p) => {
            if let Some(v) = args.sma1 {
                p.fast_window = v;
            }
            if let Some(v) = args.sma2 {
                p.slow_window = v;
            }
        }
        StrategyParams::Momentum(p) => {
            if let Some(v) = args.momentum {
                p.window = v;
            }
        }
        StrategyParams::MeanReversion(p) => {
            if let Some(v) = args.sma {
                p.window = v;
            }
            if let Some(v) = args.threshold {
                p.threshold = v;
            }
        }
        StrategyParams::LinearRegression(p) => {
            if let Some(v) = args.lags {
                p.lags = v;
            }
            if let Some(v) = args.fit_start {
                p.fit_range.start = v;
            }
            if let Some(v) = args.fit_end {
                p.fit_range.end = v;
            }
            if let Some(v) = args.predict_start {
                p.predict_range.start = v;
            }
            if let Some(v) = args.predict_end {
                p.predict_range.end = v;
            }
        }
    }

    //flags meant for another strategy
    let strategy_type = params.strategy_type();
    if strategy_type != StrategyType::SmaCrossover && (args.sma1.is_some() || args.sma2.is_some()) {
        ignored.push("--sma1/--sma2");
    }
    if strategy_type != StrategyType::Momentum && args.momentum.is_some() {
        ignored.push("--momentum");
    }
    if strategy_type != StrategyType::MeanReversion
        && (args.sma.is_some() || args.threshold.is_some())
    {
        ignored.push("--sma/--threshold");
    }
    if strategy_type != StrategyType::LinearRegression && args.lags.is_some() {
        ignored.push("--lags");
    }
    for flag in ignored {
        warn!(strategy = name, flag, "flag does not apply to strategy, ignored");
    }
}

fn prepare(config: &BacktestConfiguration) -> Result<Backtester> {
    println!("Pozole Backtesting Engine");
    println!("=========================\n");

    let loader = SeriesLoader::new(config.data.clone());
    let mut backtester = Backtester::new(config.backtest_config())?;

    println!("Loading {} from {:?}...", config.symbol, config.data.data_path);
    backtester
        .load(&loader, &config.symbol, &config.range)
        .context(format!(
            "Failed to load {} from {:?}",
            config.symbol, config.data.data_path
        ))?;

    if let Some(data) = backtester.data() {
        let prices = data.prices().points();
        if let (Some(first), Some(last)) = (prices.first(), prices.last()) {
            println!("Loaded {} prices for {}", prices.len(), data.symbol());
            println!("Date range: {} to {}\n", first.timestamp, last.timestamp);
        }
    }

    backtester
        .set_parameters(config.strategy.clone())
        .context("Invalid strategy parameters")?;

    Ok(backtester)
}

fn run(config: &BacktestConfiguration) -> Result<()> {
    let mut backtester = prepare(config)?;

    println!("Running backtest...\n");
    let run = backtester.run_strategy()?;

    println!("Backtest Results");
    println!("================\n");
    run.summary(config.amount).pretty_print_table(&run.params);

    Ok(())
}

fn optimize(config: &BacktestConfiguration, ranges: &[ParamRange]) -> Result<()> {
    let mut backtester = prepare(config)?;

    println!("Optimizing {}...\n", config.strategy.name());
    let best = backtester
        .optimize_parameters(ranges)
        .context("Optimization failed")?;

    println!("Best grid point: {:?}", best.point);
    println!("Best performance: {:.2}\n", best.performance);

    if let Some(run) = backtester.results() {
        println!("Backtest Results");
        println!("================\n");
        run.summary(config.amount).pretty_print_table(&run.params);
    }

    Ok(())
}
