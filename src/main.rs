mod error;
mod params;
mod events;
mod auction;
mod policies;
mod simulationrun;
mod evaluation;
mod charts;
mod logger;
mod utils;
mod scenarios;


use logger::{Logger, LogEvent, ConsoleReceiver, FileReceiver, sanitize_filename};
use params::{MarketConfig, MarketParams};
use std::path::{Path, PathBuf};

use scenarios::get_scenario_catalog;
use utils::TOTAL_SIMULATION_RUNS;
use std::sync::atomic::Ordering;

const DEFAULT_SCENARIO: &str = "policy_comparison";
const DEFAULT_PARAMS_RUNS: usize = 10;

/// Attach a file receiver, reporting on stderr when the file cannot be opened
fn add_file_receiver(logger: &mut Logger, path: &Path, events: Vec<LogEvent>) -> Option<logger::ReceiverId> {
    match FileReceiver::new(path, events) {
        Ok(receiver) => Some(logger.add_receiver(receiver)),
        Err(e) => {
            eprintln!("Warning: cannot open log file {}: {}", path.display(), e);
            None
        }
    }
}

/// Load a market from JSON and compare the standard policies on it
fn run_params_file(file: &str, num_runs: usize) -> Result<(), Box<dyn std::error::Error>> {
    let config = MarketConfig::from_json_file(Path::new(file))?;
    let params = MarketParams::new(config)?;

    let mut logger = Logger::new();
    logger.add_receiver(ConsoleReceiver::new(vec![LogEvent::Evaluation, LogEvent::Scenario, LogEvent::Validation]));
    let scenario_name = Path::new(file)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "params".to_string());
    let receiver_id = add_file_receiver(
        &mut logger,
        &PathBuf::from(format!("log/{}/scenario.log", sanitize_filename(&scenario_name))),
        vec![LogEvent::Evaluation, LogEvent::Scenario],
    );

    let result = scenarios::compare_standard_policies(&scenario_name, params, num_runs, &mut logger);

    if let Some(id) = receiver_id {
        logger.remove_receiver(id);
    }
    result.map(|_| ())
}

fn main() {
    let raw_args: Vec<String> = std::env::args().collect();

    // Parse and filter out --verbose and --fastbreak arguments
    let mut args = Vec::new();
    let mut skip_next = false;
    let mut fastbreak = false;
    for (i, arg) in raw_args.iter().enumerate() {
        if skip_next {
            skip_next = false;
            continue;
        }
        if arg == "--verbose" {
            if i + 1 < raw_args.len() && raw_args[i+1] == "events" {
                utils::VERBOSE_EVENTS.store(true, Ordering::Relaxed);
                skip_next = true;
            }
            continue;
        }
        if arg == "--fastbreak" {
            fastbreak = true;
            continue;
        }
        args.push(arg.clone());
    }

    // Check if "params" argument is provided
    if args.len() > 1 && args[1] == "params" {
        if args.len() < 3 {
            eprintln!("Usage: {} params <file.json> [num_runs]", args[0]);
            std::process::exit(1);
        }
        let num_runs = if args.len() > 3 {
            match args[3].parse::<usize>() {
                Ok(n) => n,
                Err(_) => {
                    eprintln!("Error: Invalid num_runs parameter '{}'. Expected a number.", args[3]);
                    std::process::exit(1);
                }
            }
        } else {
            DEFAULT_PARAMS_RUNS
        };
        if let Err(e) = run_params_file(&args[2], num_runs) {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
        return;
    }

    let scenario_arg = if args.len() > 1 { args[1].clone() } else { DEFAULT_SCENARIO.to_string() };

    // Parse iterations parameter if present
    let iterations = if args.len() > 2 {
        match args[2].parse::<u64>() {
            Ok(n) => n,
            Err(_) => {
                eprintln!("Error: Invalid iterations parameter '{}'. Expected a number.", args[2]);
                std::process::exit(1);
            }
        }
    } else {
        1
    };

    // Parse optional starting seed offset if present
    let start_offset = if args.len() > 3 {
        match args[3].parse::<u64>() {
            Ok(n) => n,
            Err(_) => {
                eprintln!("Error: Invalid start seed offset '{}'. Expected a number.", args[3]);
                std::process::exit(1);
            }
        }
    } else {
        0
    };

    // Get all scenarios from the catalog
    let all_scenarios = get_scenario_catalog();

    // Filter scenarios: if "all", use all scenarios; otherwise filter to the named scenario
    let scenarios: Vec<_> = if scenario_arg == "all" {
        all_scenarios.clone()
    } else {
        match all_scenarios.iter().find(|s| s.short_name == scenario_arg) {
            Some(scenario) => vec![scenario.clone()],
            None => {
                eprintln!("Error: Scenario '{}' not found.", scenario_arg);
                eprintln!("Available scenarios:");
                for s in &all_scenarios {
                    eprintln!("  - {}", s.short_name);
                }
                std::process::exit(1);
            }
        }
    };

    // Scenario details go to the console only for a single named scenario run once
    let mut logger = Logger::new();
    if scenario_arg != "all" && iterations == 1 {
        logger.add_receiver(ConsoleReceiver::new(vec![LogEvent::Validation, LogEvent::Scenario]));
    } else {
        logger.add_receiver(ConsoleReceiver::new(vec![LogEvent::Validation]));
    }
    let summary_receiver_id = add_file_receiver(&mut logger, &PathBuf::from("log/summary.log"), vec![LogEvent::Validation]);

    TOTAL_SIMULATION_RUNS.store(0, Ordering::Relaxed);

    if iterations > 1 {
        logln!(&mut logger, LogEvent::Validation, "Running {} {} times...\n", scenario_arg, iterations);
    } else {
        logln!(&mut logger, LogEvent::Validation, "Running {}...\n", scenario_arg);
    }

    let mut failures = 0;

    // Outer loop for scenarios
    'scenarios: for scenario in &scenarios {
        log!(&mut logger, LogEvent::Validation, "{}: ", scenario.short_name);

        // Add scenario-level receiver
        let scenario_receiver_id = add_file_receiver(
            &mut logger,
            &PathBuf::from(format!("log/{}/scenario.log", sanitize_filename(scenario.short_name))),
            vec![LogEvent::Scenario, LogEvent::Evaluation],
        );

        // Inner loop for iterations, each one shifts the scenario seed
        for seed_offset in start_offset..(start_offset + iterations) {
            if iterations > 1 {
                log!(&mut logger, LogEvent::Validation, "[{}/{}] ", seed_offset - start_offset + 1, iterations);
            }
            match (scenario.run)(scenario.short_name, seed_offset, &mut logger) {
                Ok(()) => {
                    if iterations > 1 {
                        logln!(&mut logger, LogEvent::Validation, "✓");
                    } else {
                        logln!(&mut logger, LogEvent::Validation, "✓ PASSED");
                    }
                }
                Err(e) => {
                    failures += 1;
                    if iterations > 1 {
                        logln!(&mut logger, LogEvent::Validation, "✗");
                    } else {
                        logln!(&mut logger, LogEvent::Validation, "✗ FAILED: {}", e);
                    }
                    if fastbreak {
                        if let Some(id) = scenario_receiver_id {
                            logger.remove_receiver(id);
                        }
                        logln!(&mut logger, LogEvent::Validation, "\nStopping scenario execution due to failure (--fastbreak enabled)");
                        logln!(&mut logger, LogEvent::Validation, "Error at seed offset {}: {}", seed_offset, e);
                        break 'scenarios;
                    }
                }
            }
            // Flush to ensure validation is written to summary.log
            let _ = logger.flush();
        }

        if let Some(id) = scenario_receiver_id {
            logger.remove_receiver(id);
        }
    }

    let final_count = TOTAL_SIMULATION_RUNS.load(Ordering::Relaxed);
    logln!(&mut logger, LogEvent::Validation, "\nTotal simulation runs completed: {}", final_count);

    if let Some(id) = summary_receiver_id {
        logger.remove_receiver(id);
    }
    let _ = logger.flush();

    if failures > 0 {
        std::process::exit(1);
    }
}
