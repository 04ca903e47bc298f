use clap::error::ErrorKind;
use clap::Parser;
use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::env;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;

use coba_bench::benchmark::Benchmark;
use coba_bench::config::{BenchmarkConfig, ConfigOptions, DEFAULT_DIR, DEFAULT_SIMTIME};
use coba_bench::engine::local::LocalEngine;
use coba_bench::engine::EngineGuard;
use coba_bench::error::BenchError;

/// Vogels-Abbott COBA network benchmark (Brette et al., 2007)
#[derive(Parser, Debug)]
struct Args {
    /// Simulation time (in seconds)
    #[arg(long, default_value_t = DEFAULT_SIMTIME)]
    simtime: f64,
    /// Network scale, relative to 4000 neurons
    #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
    networkscale: i64,
    /// The number of timesteps of synaptic delay
    #[arg(long = "num_timesteps_delay", default_value_t = 1, allow_negative_numbers = true)]
    num_timesteps_delay: i64,
    /// Turns off spike recording to reduce IO
    #[arg(long)]
    fast: bool,
    /// Basename for network saving
    #[arg(long)]
    save: Option<PathBuf>,
    /// Output directory
    #[arg(long, default_value = DEFAULT_DIR)]
    dir: PathBuf,
    /// File with EE connections (network scale 1 only)
    #[arg(long)]
    fee: Option<PathBuf>,
    /// File with EI connections (network scale 1 only)
    #[arg(long)]
    fei: Option<PathBuf>,
    /// File with IE connections (network scale 1 only)
    #[arg(long)]
    fie: Option<PathBuf>,
    /// File with II connections (network scale 1 only)
    #[arg(long)]
    fii: Option<PathBuf>,
    /// The seed used for network sampling and initial states
    #[arg(long, default_value_t = 1)]
    seed: u64,
}

impl From<Args> for ConfigOptions {
    fn from(args: Args) -> Self {
        ConfigOptions {
            simtime: args.simtime,
            networkscale: args.networkscale,
            num_timesteps_delay: args.num_timesteps_delay,
            fast: args.fast,
            save: args.save,
            dir: args.dir,
            fee: args.fee,
            fei: args.fei,
            fie: args.fie,
            fii: args.fii,
            seed: args.seed,
        }
    }
}

fn init_logger() -> Result<(), BenchError> {
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{d(%H:%M:%S%.3f)} {l} - {m}\n")))
        .build();

    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(LevelFilter::Info))
        .map_err(|e| BenchError::IOError(e.to_string()))?;

    log4rs::init_config(config).map_err(|e| BenchError::IOError(e.to_string()))?;
    Ok(())
}

fn exit_code(error: &BenchError) -> u8 {
    u8::try_from(error.exit_code()).unwrap_or(1)
}

/// Parse and validate the command line. On failure, returns the exit code of the process.
fn configure<I, T>(argv: I) -> Result<BenchmarkConfig, u8>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let args = Args::try_parse_from(argv).map_err(|e| {
        if let Err(io_err) = e.print() {
            log::error!("Cannot print the usage: {}", io_err);
        }
        match e.kind() {
            // help and version requests are not failures
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
            _ => 1,
        }
    })?;

    BenchmarkConfig::build(args.into()).map_err(|e| {
        log::error!("{}", e);
        exit_code(&e)
    })
}

fn run(config: &BenchmarkConfig) -> Result<(), BenchError> {
    log::info!("{:?}", config);

    let mut engine = EngineGuard::new(LocalEngine::from_env(config.seed())?);
    let report = Benchmark::new(config).run(&mut *engine)?;
    log::info!(
        "Benchmark done: {} neurons, {} synapses, {:.3}s elapsed",
        report.num_neurons,
        report.num_synapses,
        report.timing.elapsed
    );
    Ok(())
}

fn main() -> ExitCode {
    if let Err(e) = init_logger() {
        eprintln!("error: {}", e);
        return ExitCode::from(1);
    }

    let config = match configure(env::args_os()) {
        Ok(config) => config,
        Err(code) => return ExitCode::from(code),
    };

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}
