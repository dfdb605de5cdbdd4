use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

use coupled_fem::driver::run_to_final_time;
use coupled_fem::{LogSink, OutputSink, PhysicsModule, SimulationConfig};

#[derive(Parser)]
#[command(name = "fem_driver")]
#[command(about = "Implicit time stepping for coupled thermal and solid finite-element models")]
#[command(version)]
struct Cli {
    /// TOML input file
    #[arg(short, long)]
    input_file: PathBuf,

    /// Override the final time from the input file
    #[arg(long)]
    t_final: Option<f64>,

    /// Override the time step from the input file
    #[arg(long)]
    dt: Option<f64>,
}

fn run(cli: &Cli) -> coupled_fem::Result<()> {
    info!("Input file: {}", cli.input_file.display());
    let mut config = SimulationConfig::from_file(&cli.input_file)?;

    if let Some(t_final) = cli.t_final {
        info!("Overriding t_final: {} -> {}", config.t_final, t_final);
        config.t_final = t_final;
    }
    if let Some(dt) = cli.dt {
        info!("Overriding dt: {} -> {}", config.dt, dt);
        config.dt = dt;
    }
    config.print_summary();

    let mut coupler = config.build_coupler()?;
    coupler.complete_setup()?;

    let mut sink = LogSink;
    let mut sinks: [&mut dyn OutputSink; 1] = [&mut sink];
    let summary = run_to_final_time(&mut coupler, config.t_final, config.dt, &mut sinks)?;
    info!("Reached t = {:.6e} after {} cycles", summary.final_time, summary.steps);
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
