//! Best decision for the umbrella problem.
//!
//! Run with:
//! ```bash
//! cargo run --example umbrella -- --rain 0.3 --umbrella-cost -2 --wet-cost -10
//! ```

use clap::Parser;
use meu_rs::circuit::{Circuit, NnfBuilder, NnfCircuit};
use meu_rs::maxeu::{get_best_decision, map_task};
use meu_rs::program::CompiledProgram;
use meu_rs::report::LogReporter;
use meu_rs::weight::{Component, RawWeight};

#[derive(Debug, Parser)]
#[command(author, version, about = "Maximum expected utility of taking an umbrella")]
struct Cli {
    /// Probability of rain
    #[arg(long, default_value = "0.3")]
    rain: f64,

    /// Utility of carrying the umbrella
    #[arg(long, default_value = "-2", allow_hyphen_values = true)]
    umbrella_cost: f64,

    /// Utility of getting wet
    #[arg(long, default_value = "-10", allow_hyphen_values = true)]
    wet_cost: f64,

    /// Also print the circuit in .nnf format
    #[arg(long)]
    nnf: bool,
}

/// `umbrella` is a decision on top; `wet ↔ rain ∧ ¬umbrella`.
fn umbrella(p_rain: f64) -> NnfCircuit {
    let mut b = NnfBuilder::new();
    let u = b.atom("umbrella", 1, RawWeight::Decision);
    let r = b.atom("rain", 2, RawWeight::Prob(p_rain));
    let w = b.atom("wet", 3, RawWeight::True);
    let (lu, lnu) = (b.literal(u), b.literal(-u));
    let (lr, lnr) = (b.literal(r), b.literal(-r));
    let (lw, lnw) = (b.literal(w), b.literal(-w));
    let rain_dry = b.and([lr, lnw]);
    let no_rain = b.and([lnr, lnw]);
    let rain_wet = b.and([lr, lw]);
    let covered = b.or([rain_dry, no_rain]);
    let exposed = b.or([rain_wet, no_rain]);
    let take = b.and([lu, covered]);
    let leave = b.and([lnu, exposed]);
    let root = b.or([take, leave]);
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

    let circuit = umbrella(cli.rain);
    println!("circuit: {} nodes, variables {:?}", circuit.size(), circuit.variables());
    if cli.nnf {
        print!("{}", meu_rs::nnf::to_nnf_string(&circuit));
    }

    let program = CompiledProgram::new(circuit)
        .with_utility("umbrella", Component::Known(cli.umbrella_cost))
        .with_utility("wet", Component::Known(cli.wet_cost))
        .with_query("wet")
        .with_query("rain");

    let best = get_best_decision(&program, &LogReporter)?;
    println!("best decisions = {:?}", best.decisions);
    println!("expected utility = {}", best.expected_utility);
    println!(
        "size = {}, compile time = {:?}, runtime = {:?}",
        best.size, best.compile_time, best.runtime
    );

    for (query, result) in map_task(&program, &LogReporter)? {
        println!(
            "{}: P = {:.4}, EU = {:.4}, decisions = {:?}",
            query, result.prob, result.eu, result.decisions
        );
    }

    Ok(())
}
