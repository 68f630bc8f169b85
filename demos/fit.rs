//! Learning unknown utilities from examples.
//!
//! Run with:
//! ```bash
//! cargo run --example fit -- --method adaptive [example files...]
//! ```
//!
//! Without files, a built-in example set generated by `late = -20` and
//! `sunny = 5` is used.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use meu_rs::circuit::{NnfBuilder, NnfCircuit};
use meu_rs::data::{parse_examples, read_examples};
use meu_rs::learner::{LearnerConfig, ULearner};
use meu_rs::report::LogReporter;
use meu_rs::weight::{Component, RawWeight};

const BUILTIN: &str = "\
evidence(traffic, true). evidence(sunny, true). utility(-15).
---
evidence(traffic, true). evidence(sunny, false). utility(-20).
---
observe(\\+traffic). observe(sunny). utility(5).
---
observe(\\+traffic). observe(\\+sunny). utility(0).
---
evidence(sunny). utility(1).
---
evidence(\\+sunny). utility(-4).
";

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Method {
    Plain,
    Adaptive,
    LeftOut,
}

#[derive(Debug, Parser)]
#[command(author, version, about = "Fit unknown utilities to examples")]
struct Cli {
    /// Example files, blocks separated by `---`
    files: Vec<PathBuf>,

    #[arg(long, value_enum, default_value = "adaptive")]
    method: Method,

    #[arg(long, default_value = "100")]
    epochs: usize,

    #[arg(long, default_value = "0.4")]
    learning_rate: f64,

    /// Examples per step (default: all)
    #[arg(long)]
    batch_size: Option<usize>,

    /// Held-out fraction for the left-out method
    #[arg(long, default_value = "0.3")]
    left_out: f64,

    #[arg(long, default_value = "0")]
    seed: u64,
}

/// `traffic` (0.2) and `sunny` (0.7) independent; `late ↔ traffic`.
fn commute() -> NnfCircuit {
    let mut b = NnfBuilder::new();
    let traffic = b.atom("traffic", 1, RawWeight::Prob(0.2));
    let sunny = b.atom("sunny", 2, RawWeight::Prob(0.7));
    let late = b.atom("late", 3, RawWeight::True);
    let (t, nt) = (b.literal(traffic), b.literal(-traffic));
    let (s, ns) = (b.literal(sunny), b.literal(-sunny));
    let (l, nl) = (b.literal(late), b.literal(-late));
    let jam = b.and([t, l]);
    let clear = b.and([nt, nl]);
    let road = b.or([jam, clear]);
    let weather = b.or([s, ns]);
    let root = b.and([road, weather]);
    b.finish(root)
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let cli = Cli::parse();

    let examples = if cli.files.is_empty() {
        parse_examples(BUILTIN)?
    } else {
        read_examples(&cli.files)?
    };
    println!("{} examples", examples.len());

    let utilities = vec![
        ("late".to_string(), Component::Unknown(None)),
        ("sunny".to_string(), Component::Unknown(None)),
    ];
    let config = LearnerConfig {
        batch_size: cli.batch_size.unwrap_or(examples.len()),
        max_epoch: cli.epochs,
        learning_rate: cli.learning_rate,
        left_out: cli.left_out,
        seed: cli.seed,
        ..LearnerConfig::default()
    };
    let (increase, decrease) = (config.increase_rate, config.decrease_rate);
    let mut learner = ULearner::with_reporter(commute(), &utilities, &examples, config, Box::new(LogReporter))?;

    let learned = match cli.method {
        Method::Plain => learner.learn()?,
        Method::Adaptive => learner.learn_adaptive_rate(increase, decrease)?,
        Method::LeftOut => learner.learn_adaptive_rate_left_out(increase, decrease, cli.left_out)?,
    };

    for (atom, utility) in &learned {
        println!("utility({}) = {:.4}", atom, utility);
    }
    let log = learner.log();
    if let (Some(first), Some(last)) = (log.mse.first(), log.mse.last()) {
        println!("MSE {:.6} -> {:.6} over {} records", first, last, log.mse.len());
    }

    Ok(())
}
