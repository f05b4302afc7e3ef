//! partial-equilibrium CLI
//!
//! Solve nested CES market models from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Solve a model file with the solver it names (simplex by default)
//! partial-equilibrium solve --input model.json
//!
//! # Particle swarm, four parallel restarts, JSON output
//! partial-equilibrium solve --input model.json --method swarm --restarts 4 --format json
//!
//! # Evaluate the model at given prices
//! partial-equilibrium evaluate --input model.json --prices 1.0,0.97
//!
//! # Generate a random model for testing
//! partial-equilibrium generate --depth 3 --branching 4 --seed 7
//! ```

use partial_equilibrium::core::solution::Solution;
use partial_equilibrium::equilibrium::objective::EquilibriumObjective;
use partial_equilibrium::equilibrium::report::EquilibriumReport;
use partial_equilibrium::model::file::ModelFile;
use partial_equilibrium::optimization::parallel::minimize_parallel;
use partial_equilibrium::optimization::simplex::SimplexConfig;
use partial_equilibrium::optimization::swarm::SwarmConfig;
use partial_equilibrium::optimization::{Method, OptimizationResult, Termination};
use partial_equilibrium::simulation::random_tree::{generate_random_definition, TreeConfig};
use std::io;
use std::process;

fn print_usage() {
    eprintln!(
        r#"partial-equilibrium — nested CES partial-equilibrium solver

USAGE:
    partial-equilibrium <COMMAND> [OPTIONS]

COMMANDS:
    solve       Find market-clearing prices for a model file
    evaluate    Evaluate a model file at fixed prices
    generate    Generate a random balanced model (for testing)
    help        Show this message

OPTIONS (solve):
    --input <FILE>        Path to JSON model file
    --method <NAME>       simplex or swarm (default: the file's solver, else simplex)
    --iterations <N>      Override the iteration budget
    --seed <N>            Seed for reproducible runs
    --restarts <N>        Independent parallel restarts (default: the file's, else 1)
    --progress            Write progress lines to stderr (single run only)
    --format <FORMAT>     Output format: text (default) or json

OPTIONS (evaluate):
    --input <FILE>        Path to JSON model file
    --prices <LIST>       Comma-separated prices for the variable markets
                          (default: their initial prices)
    --format <FORMAT>     Output format: text (default) or json

OPTIONS (generate):
    --depth <N>           Levels below the root (default: 2)
    --branching <N>       Sub-markets per aggregate (default: 3)
    --max-shock <X>       Largest leaf tariff (default: 0.1)
    --seed <N>            Seed for the generator
    --output <FILE>       Write to file instead of stdout

LOGGING:
    RUST_LOG=info|debug   Solver diagnostics on stderr

EXAMPLES:
    partial-equilibrium solve --input model.json
    partial-equilibrium solve --input model.json --method swarm --restarts 8 --seed 1
    partial-equilibrium evaluate --input model.json --prices 1.0,0.97
    partial-equilibrium generate --depth 3 --branching 2 --output model.json"#
    );
}

/// JSON output schema for a solve.
#[derive(serde::Serialize)]
struct SolveOutput {
    method: String,
    restarts: usize,
    iterations: usize,
    evaluations: usize,
    termination: Termination,
    report: EquilibriumReport,
}

fn next_value<'a>(args: &'a [String], i: &mut usize, what: &str) -> &'a str {
    *i += 1;
    args.get(*i).map(String::as_str).unwrap_or_else(|| {
        eprintln!("{} requires {}", args[*i - 1], what);
        process::exit(1);
    })
}

fn parse_number<T: std::str::FromStr>(value: &str, flag: &str) -> T {
    value.parse().unwrap_or_else(|_| {
        eprintln!("{} requires a number, got '{}'", flag, value);
        process::exit(1);
    })
}

fn load_objective(path: &str) -> (ModelFile, EquilibriumObjective) {
    let file = ModelFile::load(path).unwrap_or_else(|e| {
        eprintln!("Error loading '{}': {}", path, e);
        process::exit(1);
    });
    let tree = file.model.build().unwrap_or_else(|e| {
        eprintln!("Invalid model: {}", e);
        process::exit(1);
    });
    let objective = EquilibriumObjective::new(tree, file.evaluation).unwrap_or_else(|e| {
        eprintln!("Invalid evaluation settings: {}", e);
        process::exit(1);
    });
    (file, objective)
}

/// Switch to `name`, carrying over the search box, budget and seed.
fn switch_method(method: Method, name: &str) -> Method {
    let (lower, upper, iterations, seed) = match &method {
        Method::Simplex(c) => (c.lower_bound, c.upper_bound, c.iterations, c.seed),
        Method::Swarm(c) => (c.lower_bound, c.upper_bound, c.iterations, c.seed),
    };
    match (name, method) {
        ("simplex", m @ Method::Simplex(_)) | ("swarm", m @ Method::Swarm(_)) => m,
        ("simplex", _) => Method::Simplex(SimplexConfig {
            seed,
            ..SimplexConfig::new(0, lower, upper, iterations)
        }),
        ("swarm", _) => Method::Swarm(SwarmConfig {
            seed,
            ..SwarmConfig::new(0, lower, upper, iterations)
        }),
        (other, _) => {
            eprintln!("Unknown method '{}': expected simplex or swarm", other);
            process::exit(1);
        }
    }
}

fn cmd_solve(args: &[String]) {
    let mut input_path = None;
    let mut method_name: Option<String> = None;
    let mut iterations: Option<usize> = None;
    let mut seed: Option<u64> = None;
    let mut restarts: Option<usize> = None;
    let mut progress = false;
    let mut format = "text".to_string();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--input" => input_path = Some(next_value(args, &mut i, "a file path").to_string()),
            "--method" => {
                method_name = Some(next_value(args, &mut i, "'simplex' or 'swarm'").to_string())
            }
            "--iterations" => {
                iterations = Some(parse_number(next_value(args, &mut i, "a number"), "--iterations"))
            }
            "--seed" => seed = Some(parse_number(next_value(args, &mut i, "a number"), "--seed")),
            "--restarts" => {
                restarts = Some(parse_number(next_value(args, &mut i, "a number"), "--restarts"))
            }
            "--progress" => progress = true,
            "--format" => format = next_value(args, &mut i, "'text' or 'json'").to_string(),
            _ => {
                eprintln!("Unknown option: {}", args[i]);
                process::exit(1);
            }
        }
        i += 1;
    }

    let path = input_path.unwrap_or_else(|| {
        eprintln!("Error: --input <FILE> is required");
        process::exit(1);
    });

    let (file, mut objective) = load_objective(&path);
    let mut method = file.solver.clone().unwrap_or_default();
    if let Some(name) = &method_name {
        method = switch_method(method, name);
    }
    method = method.with_dimensions(objective.dimensions());
    if let Some(n) = iterations {
        method = method.with_iterations(n);
    }
    if let Some(s) = seed {
        method = method.with_seed(s);
    }
    let restarts = restarts.or(file.restarts).unwrap_or(1);
    if !progress_supported(progress, restarts) {
        eprintln!("Warning: --progress is ignored with {} parallel restarts", restarts);
    }

    let result: Result<OptimizationResult, _> = if restarts > 1 {
        minimize_parallel(&method, restarts, || {
            let mut run = objective.clone();
            move |x: &[f64]| run.evaluate(x)
        })
    } else {
        let mut run = objective.clone();
        let sink = progress.then(|| Box::new(io::stderr()) as Box<dyn io::Write + Send>);
        method.minimize_with_progress(|x: &[f64]| run.evaluate(x), sink)
    };
    let result = result.unwrap_or_else(|e| {
        eprintln!("Solver configuration error: {}", e);
        process::exit(1);
    });

    if let Err(e) = objective.apply(&result.best) {
        eprintln!("Error applying solution: {}", e);
        process::exit(1);
    }
    let report = EquilibriumReport::from_tree(objective.tree(), file.evaluation.aggregation)
        .with_solution(result.best.clone());

    if format == "json" {
        let output = SolveOutput {
            method: method.name().to_string(),
            restarts,
            iterations: result.iterations,
            evaluations: result.evaluations,
            termination: result.termination,
            report,
        };
        let json = serde_json::to_string_pretty(&output).unwrap_or_else(|e| {
            eprintln!("Error serializing output: {}", e);
            process::exit(1);
        });
        println!("{}", json);
    } else {
        println!(
            "Solved with {} ({} restart(s)): {} iterations, {} evaluations, stopped by {:?}\n",
            method.name(),
            restarts,
            result.iterations,
            result.evaluations,
            result.termination
        );
        println!("{}", report);
    }
}

fn cmd_evaluate(args: &[String]) {
    let mut input_path = None;
    let mut prices: Option<Vec<f64>> = None;
    let mut format = "text".to_string();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--input" => input_path = Some(next_value(args, &mut i, "a file path").to_string()),
            "--prices" => {
                let list = next_value(args, &mut i, "a comma-separated list");
                prices = Some(
                    list.split(',')
                        .map(|s| parse_number(s.trim(), "--prices"))
                        .collect(),
                );
            }
            "--format" => format = next_value(args, &mut i, "'text' or 'json'").to_string(),
            _ => {
                eprintln!("Unknown option: {}", args[i]);
                process::exit(1);
            }
        }
        i += 1;
    }

    let path = input_path.unwrap_or_else(|| {
        eprintln!("Error: --input <FILE> is required");
        process::exit(1);
    });

    let (file, mut objective) = load_objective(&path);
    let prices = prices.unwrap_or_else(|| {
        objective
            .variable_markets()
            .iter()
            .map(|&id| objective.tree()[id].initial_price())
            .collect()
    });
    let value = objective.try_evaluate(&prices).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        process::exit(1);
    });
    let report = EquilibriumReport::from_tree(objective.tree(), file.evaluation.aggregation)
        .with_solution(Solution::new(value, prices));

    if format == "json" {
        let json = serde_json::to_string_pretty(&report).unwrap_or_else(|e| {
            eprintln!("Error serializing output: {}", e);
            process::exit(1);
        });
        println!("{}", json);
    } else {
        println!("{}", report);
    }
}

fn cmd_generate(args: &[String]) {
    let mut config = TreeConfig::default();
    let mut output_path: Option<String> = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--depth" => config.depth = parse_number(next_value(args, &mut i, "a number"), "--depth"),
            "--branching" => {
                config.branching = parse_number(next_value(args, &mut i, "a number"), "--branching")
            }
            "--max-shock" => {
                config.max_shock = parse_number(next_value(args, &mut i, "a number"), "--max-shock")
            }
            "--seed" => {
                config.seed = Some(parse_number(next_value(args, &mut i, "a number"), "--seed"))
            }
            "--output" => output_path = Some(next_value(args, &mut i, "a file path").to_string()),
            _ => {
                eprintln!("Unknown option: {}", args[i]);
                process::exit(1);
            }
        }
        i += 1;
    }

    let definition = generate_random_definition(&config);
    let markets = definition.count();
    let solver = SimplexConfig {
        seed: config.seed,
        ..SimplexConfig::new(config.leaf_count(), 0.1, 5.0, 2000)
    };
    let file = ModelFile::new(definition).with_solver(Method::Simplex(solver));

    if let Some(path) = output_path {
        file.save(&path).unwrap_or_else(|e| {
            eprintln!("Error writing to '{}': {}", path, e);
            process::exit(1);
        });
        eprintln!(
            "Generated {} markets ({} variable leaves) → {}",
            markets,
            config.leaf_count(),
            path
        );
    } else {
        let json = serde_json::to_string_pretty(&file).unwrap_or_else(|e| {
            eprintln!("Error serializing model: {}", e);
            process::exit(1);
        });
        println!("{}", json);
    }
}

fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let command = args[1].as_str();
    let rest = &args[2..];

    match command {
        "solve" => cmd_solve(rest),
        "evaluate" => cmd_evaluate(rest),
        "generate" => cmd_generate(rest),
        "help" | "--help" | "-h" => print_usage(),
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            process::exit(1);
        }
    }
}

/// Progress lines come from a single run; parallel restarts have no sink.
fn progress_supported(progress: bool, restarts: usize) -> bool {
    !progress || restarts <= 1
}
