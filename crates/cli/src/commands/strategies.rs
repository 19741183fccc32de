//! Lists the strategy library.

use clap::Args;
use optdesk_strategy::StrategyLibrary;

/// Arguments for the strategies command.
#[derive(Args, Debug, Clone)]
pub struct StrategiesArgs {
    /// Print parameters alongside each id
    #[arg(short, long)]
    pub verbose: bool,
}

pub fn run_strategies(args: &StrategiesArgs) {
    let library = StrategyLibrary::with_builtins();

    println!("\n{}", "=".repeat(60));
    println!("REGISTERED STRATEGIES ({})", library.len());
    println!("{}", "=".repeat(60));

    for descriptor in library.descriptors() {
        println!("{:<28} {:?}", descriptor.id().as_str(), descriptor.instrument_class());
        if args.verbose {
            for (name, value) in descriptor.params() {
                println!("    {name:<24} {value}");
            }
        }
    }
    println!("{}", "=".repeat(60));
}
