use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use config_file::FromConfigFile;
use ndarray::{Array1, Array2};

use fleetdp::reward::RewardModel;
use fleetdp::solver::{self, SolverOptions};
use fleetdp::state::state_index;
use fleetdp::transition::{action_transfer, demand_operator, return_operator};
use fleetdp::{FleetConfig, Mdp};

/// Command line argument parser.
#[derive(Parser, Debug)]
#[command(about = "Solve the two-depot fleet rebalancing MDP", long_about = None)]
struct Args {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print per-depot demand and return operator tables.
    Probs,
    /// Print the expected reward of every transfer for a state.
    Reward { a: usize, b: usize },
    /// Solve for the optimal policy and print it as a grid.
    Solve {
        #[arg(long, value_enum, default_value = "policy")]
        method: Method,
        /// Write the greedy-transfer grid to this CSV file.
        #[arg(long)]
        policy_csv: Option<PathBuf>,
        /// Write the value-function grid to this CSV file.
        #[arg(long)]
        value_csv: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Method {
    Policy,
    Value,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => FleetConfig::from_config_file(path)?,
        None => FleetConfig::default(),
    };
    config.validate()?;

    match &args.command {
        Commands::Probs => show_probs(&config)?,
        Commands::Reward { a, b } => show_reward(&config, *a, *b)?,
        Commands::Solve {
            method,
            policy_csv,
            value_csv,
        } => solve(&config, *method, policy_csv.as_deref(), value_csv.as_deref())?,
    }
    Ok(())
}

fn show_probs(config: &FleetConfig) -> Result<(), Box<dyn Error>> {
    let k = config.capacity;
    print_operator(
        &demand_operator(config.demand_rate_a, k)?,
        "Depot A demand operator",
    );
    print_operator(
        &return_operator(config.return_rate_a, k)?,
        "Depot A return operator",
    );
    print_operator(
        &demand_operator(config.demand_rate_b, k)?,
        "Depot B demand operator",
    );
    print_operator(
        &return_operator(config.return_rate_b, k)?,
        "Depot B return operator",
    );
    Ok(())
}

/// Print a to-from operator with "cars before" as columns.
fn print_operator(op: &Array2<f64>, title: &str) {
    println!("\n=== {title} ===");
    print!("cars before:");
    for from in 0..op.ncols() {
        print!("{from:8}");
    }
    println!();
    for (to, row) in op.rows().into_iter().enumerate() {
        print!("after {to:>3} | ");
        for p in row.iter() {
            print!("{p:7.4} ");
        }
        println!();
    }
}

fn show_reward(config: &FleetConfig, a: usize, b: usize) -> Result<(), Box<dyn Error>> {
    if a > config.capacity || b > config.capacity {
        return Err(format!(
            "state ({a}, {b}) is outside capacity {}",
            config.capacity
        )
        .into());
    }
    let rewards = RewardModel::build(config)?;
    let state = state_index(a, b, config.capacity);
    println!("Expected reward at state ({a}, {b}):");
    for action in 0..config.n_actions() {
        let transfer = action_transfer(action, config.transfer_max);
        println!("  transfer {transfer:>3}: {:8.2}", rewards.reward(state, action));
    }
    Ok(())
}

fn solve(
    config: &FleetConfig,
    method: Method,
    policy_csv: Option<&std::path::Path>,
    value_csv: Option<&std::path::Path>,
) -> Result<(), Box<dyn Error>> {
    let mdp = Mdp::from_config(config)?;
    let opts = SolverOptions::default();
    let (policy, v) = match method {
        Method::Policy => solver::policy_iteration(&mdp, config.gamma, config.theta, &opts)?,
        Method::Value => solver::value_iteration(&mdp, config.gamma, config.theta, &opts)?,
    };

    let k = config.capacity;
    println!("Optimal net transfer per state (rows: cars at A, columns: cars at B)");
    print!("      ");
    for b in 0..=k {
        print!("{b:4}");
    }
    println!();
    for a in (0..=k).rev() {
        print!("A {a:>3} |");
        for b in 0..=k {
            let transfer = greedy_transfer(&policy, a, b, config);
            print!("{transfer:4}");
        }
        println!();
    }
    println!(
        "Expected discounted return from a uniform start: {:.2}",
        mdp.initial_dist().dot(&v)
    );

    if let Some(path) = policy_csv {
        write_policy_csv(path, &policy, config)?;
    }
    if let Some(path) = value_csv {
        write_value_csv(path, &v, config)?;
    }
    Ok(())
}

/// Transfer displayed for a state: the lowest-index greedy action.
fn greedy_transfer(policy: &Array2<f64>, a: usize, b: usize, config: &FleetConfig) -> i32 {
    let row = policy.row(state_index(a, b, config.capacity));
    let mut best = 0;
    for (action, &p) in row.iter().enumerate() {
        if p > row[best] {
            best = action;
        }
    }
    debug_assert!(row[best] > 0.0);
    action_transfer(best, config.transfer_max)
}

fn write_policy_csv(
    path: &std::path::Path,
    policy: &Array2<f64>,
    config: &FleetConfig,
) -> Result<(), Box<dyn Error>> {
    let mut wtr = csv::Writer::from_path(path)?;
    for a in 0..=config.capacity {
        let row: Vec<String> = (0..=config.capacity)
            .map(|b| greedy_transfer(policy, a, b, config).to_string())
            .collect();
        wtr.write_record(&row)?;
    }
    wtr.flush()?;
    Ok(())
}

fn write_value_csv(
    path: &std::path::Path,
    v: &Array1<f64>,
    config: &FleetConfig,
) -> Result<(), Box<dyn Error>> {
    let mut wtr = csv::Writer::from_path(path)?;
    for a in 0..=config.capacity {
        let row: Vec<String> = (0..=config.capacity)
            .map(|b| format!("{:.6}", v[state_index(a, b, config.capacity)]))
            .collect();
        wtr.write_record(&row)?;
    }
    wtr.flush()?;
    Ok(())
}
