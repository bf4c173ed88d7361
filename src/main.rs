use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tuliptrader::agents::{Agent, AgentCheckpoint, BuyAndHoldAgent, HoldAgent, RandomAgent};
use tuliptrader::config::Settings;
use tuliptrader::environments::{CoinEnvSetup, CryptoTradingEnv, Sense};
use tuliptrader::io::{read_kraken_history_with_stats, write_candles, MarketScenario, SyntheticDataGenerator};
use tuliptrader::preprocessing::CryptoHistoryTradingProcessor;
use tuliptrader::training::{learn, replay, EpisodeReport, EvalCallback};
use tuliptrader::Result;

#[derive(Parser)]
#[command(name = "tuliptrader")]
#[command(about = "Reinforcement-learning harness for crypto trading", long_about = None)]
struct Cli {
    /// Settings file (defaults to ./tuliptrader.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add indicators and labels to a price history and write the table
    Prepare {
        /// Kraken OHLCVT export (defaults to data.path)
        #[arg(short, long)]
        input: Option<PathBuf>,

        #[arg(short, long, default_value = "local_output/prepared.csv")]
        output: PathBuf,
    },

    /// Train an agent on the train partition, evaluating on validation
    Train {
        #[arg(short, long)]
        input: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value_t = AgentKind::Random)]
        agent: AgentKind,

        /// Passes over the training data (defaults to training.epochs)
        #[arg(short, long)]
        epochs: Option<usize>,

        #[arg(short, long)]
        seed: Option<u64>,
    },

    /// Replay a saved agent over the trade partition
    Replay {
        /// Saved agent (defaults to <model_dir>/best_model.json)
        #[arg(short, long)]
        model: Option<PathBuf>,

        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Validation share; what follows validation is the trade partition
        #[arg(long, default_value_t = 0.1)]
        val_size: f64,

        /// Override env.commission
        #[arg(long)]
        commission: Option<f64>,

        #[arg(long)]
        deterministic: bool,

        /// Where to write the trading ledger
        #[arg(long, default_value = "local_output/history.csv")]
        history: PathBuf,
    },

    /// Write synthetic price history in the Kraken format
    Synth {
        #[arg(short, long)]
        output: PathBuf,

        /// uptrend, downtrend, sideways, volatile or crash
        #[arg(long, default_value = "sideways")]
        scenario: MarketScenario,

        #[arg(short, long, default_value_t = 1000)]
        days: usize,

        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AgentKind {
    Random,
    BuyAndHold,
    Hold,
}

impl AgentKind {
    fn build(self, seed: u64) -> Box<dyn Agent> {
        match self {
            AgentKind::Random => Box::new(RandomAgent::new(seed)),
            AgentKind::BuyAndHold => Box::new(BuyAndHoldAgent::new()),
            AgentKind::Hold => Box::new(HoldAgent),
        }
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();
    let settings = match &cli.config {
        Some(path) => Settings::from_file(path)?,
        None => Settings::load()?,
    };

    match cli.command {
        Commands::Prepare { input, output } => prepare(&settings, input, &output),
        Commands::Train {
            input,
            agent,
            epochs,
            seed,
        } => train(&settings, input, agent, epochs, seed),
        Commands::Replay {
            model,
            input,
            val_size,
            commission,
            deterministic,
            history,
        } => {
            let model = model.unwrap_or_else(|| settings.output.model_dir.join("best_model.json"));
            run_replay(
                &settings,
                &model,
                input,
                val_size,
                commission,
                deterministic,
                &history,
            )
        }
        Commands::Synth {
            output,
            scenario,
            days,
            seed,
        } => synth(&output, scenario, days, seed),
    }
}

fn setup_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tuliptrader=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Load the price history and run indicator and label preprocessing
fn load_processor(settings: &Settings, input: Option<PathBuf>) -> Result<CryptoHistoryTradingProcessor> {
    let path = input.unwrap_or_else(|| settings.data.path.clone());
    let (candles, stats) = read_kraken_history_with_stats(&path)?;
    tracing::info!(
        "Loaded {} candles from {:?} ({} rows skipped)",
        candles.len(),
        path,
        stats.skipped_rows
    );

    let mut processor = CryptoHistoryTradingProcessor::new(
        candles,
        &settings.data.technical_indicators,
        settings.data.fall_quantile,
        settings.data.rise_quantile,
    )?;
    processor.preprocess_data()?;

    if let Some((q1, q2)) = processor.quantile_thresholds() {
        tracing::info!("Label thresholds: fall <= {:.5} < neutral <= {:.5} < rise", q1, q2);
    }

    Ok(processor)
}

fn prepare(settings: &Settings, input: Option<PathBuf>, output: &Path) -> Result<()> {
    let processor = load_processor(settings, input)?;
    let table = processor.prep_data();

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    table.write_csv(output)?;

    tracing::info!(
        "Wrote {} rows x {} derived columns to {:?}",
        table.len(),
        table.columns().len(),
        output
    );
    Ok(())
}

fn train(
    settings: &Settings,
    input: Option<PathBuf>,
    kind: AgentKind,
    epochs: Option<usize>,
    seed: Option<u64>,
) -> Result<()> {
    let processor = load_processor(settings, input)?;
    let (train, val, _trade) =
        processor.make_subsets(settings.data.train_size, settings.data.val_size)?;

    let setup = CoinEnvSetup::from_settings(settings);
    let train_len = train.len();
    let mut train_env = setup.create_env(train, Sense::Train)?;
    let eval_env = setup.create_env(val, Sense::Validation)?;

    let eval_freq = match settings.training.eval_freq {
        0 => train_len,
        n => n,
    };
    let mut callback = EvalCallback::new(eval_env, settings.training.n_eval_episodes, eval_freq)
        .with_deterministic(settings.training.deterministic_eval)
        .with_best_model_save_path(&settings.output.model_dir);

    let epochs = epochs.unwrap_or(settings.training.epochs);
    let mut agent = kind.build(seed.unwrap_or(settings.training.seed));

    let summary = learn(
        agent.as_mut(),
        &mut train_env,
        train_len * epochs,
        Some(&mut callback),
    )?;

    println!("\nRun {}", callback.run_id());
    println!("  Agent:              {}", agent.name());
    println!("  Timesteps:          {}", summary.timesteps);
    println!("  Episodes:           {}", summary.episodes);
    if let Some(mean) = summary.mean_episode_reward() {
        println!("  Mean train reward:  {:.2}", mean);
    }
    if let Some(best) = callback.best_mean_reward() {
        println!("  Best eval reward:   {:.2}", best);
    }
    if let Some(path) = callback.best_model_path() {
        println!("  Best agent:         {:?}", path);
    }

    Ok(())
}

fn run_replay(
    settings: &Settings,
    model: &Path,
    input: Option<PathBuf>,
    val_size: f64,
    commission: Option<f64>,
    deterministic: bool,
    history: &Path,
) -> Result<()> {
    let checkpoint = AgentCheckpoint::load(model)?;
    tracing::info!(
        "Loaded {:?} from run {} (mean reward {:.2} at {} timesteps)",
        checkpoint.agent,
        checkpoint.run_id,
        checkpoint.mean_reward,
        checkpoint.timesteps
    );

    let processor = load_processor(settings, input)?;
    let (_, _, trade) = processor.make_subsets(settings.data.train_size, val_size)?;

    let mut setup = CoinEnvSetup::from_settings(settings);
    if let Some(commission) = commission {
        setup.commission = commission;
    }

    let mut env = CryptoTradingEnv::new(trade, setup.env_params())?;
    let steps = env.episode_length();
    let mut agent = checkpoint.agent.into_agent();
    replay(agent.as_mut(), &mut env, steps, deterministic)?;

    if let Some(parent) = history.parent() {
        std::fs::create_dir_all(parent)?;
    }
    env.write_history(history)?;
    tracing::info!("Wrote trading ledger to {:?}", history);

    EpisodeReport::from_history(env.history(), setup.initial_balance, setup.commission)
        .print_report();
    Ok(())
}

fn synth(output: &Path, scenario: MarketScenario, days: usize, seed: u64) -> Result<()> {
    let mut generator = SyntheticDataGenerator::new(seed);
    let candles = generator.generate(scenario, days);

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    write_candles(output, &candles)?;

    tracing::info!("Wrote {} {} candles to {:?}", candles.len(), scenario, output);
    Ok(())
}
