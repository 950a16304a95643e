use std::process::ExitCode;

use clap::Parser;
use log::info;

use edgesim_core::Simulation;
use edgesim_offload::experiment::Experiment;
use edgesim_offload::{EdgeSimulation, SimulationConfig};

#[derive(Parser, Debug)]
#[clap(about, long_about = None)]
struct Args {
    /// Simulation config file
    #[clap(short, long, default_value = "configs/hangar.yaml")]
    config: String,

    /// Run the experiment described in the config instead of a single simulation
    #[clap(short, long)]
    experiment: bool,

    /// Number of threads for running experiment
    #[clap(short, long, default_value = "4")]
    threads: usize,

    /// Output directory for task records or experiment results
    #[clap(short, long)]
    output: Option<String>,
}

fn init_logger() {
    use env_logger::Builder;
    use std::io::Write;
    Builder::from_default_env()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();
}

fn run_single(config: SimulationConfig, output: Option<String>) -> Result<(), String> {
    let sim = Simulation::new();
    let mut edge_sim = EdgeSimulation::new(sim, config).map_err(|e| e.to_string())?;
    let stats = edge_sim.run().map_err(|e| e.to_string())?;
    info!("Simulation finished at {:.3}", edge_sim.current_time());
    stats.print_summary("hangar inspection offloading");
    if let Some(dir) = output {
        std::fs::create_dir_all(&dir).map_err(|e| e.to_string())?;
        let path = format!("{}/tasks.csv", dir);
        edge_sim.save_records(&path).map_err(|e| e.to_string())?;
        info!("Task records saved to {}", path);
    }
    Ok(())
}

fn run_experiment(config: SimulationConfig, threads: usize, output: Option<String>) -> Result<(), String> {
    let experiment = Experiment::new(config, output).map_err(|e| e.to_string())?;
    let results = experiment.run(threads).map_err(|e| e.to_string())?;
    for result in results {
        match &result.error {
            Some(e) => println!("run {} {:?} failed: {}", result.id, result.params, e),
            None => {
                println!("run {} {:?}", result.id, result.params);
                for (key, value) in &result.results {
                    println!("- {}: {:.4}", key, value);
                }
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    init_logger();
    let args = Args::parse();

    let result = SimulationConfig::from_file(&args.config)
        .map_err(|e| e.to_string())
        .and_then(|config| {
            if args.experiment {
                run_experiment(config, args.threads, args.output)
            } else {
                run_single(config, args.output)
            }
        });
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
