use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use nxsan_instrument::{AccessInstrumenter, output_file_name};

/// Generates instrumentation function calls to the nxsan runtime for all
/// store and load instructions to memory.
#[derive(Parser)]
#[command(name = "nxsan-instrument", version)]
struct Cli {
    /// Output file pattern. The original file name will be substituted where
    /// '{}' is present.
    #[arg(long, default_value = "{}_nxsan.ll")]
    out: String,

    /// Input LLIR module files.
    files: Vec<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.files.is_empty() {
        println!("No input files.");
        return ExitCode::FAILURE;
    }

    for file in &cli.files {
        let mut instrumenter = AccessInstrumenter::new(file);
        let result = match instrumenter.generate_ir() {
            Ok(result) => result,
            Err(err) => {
                // Per-file failures are reported without aborting the batch.
                println!("nxsan-instrument: {err}");
                continue;
            }
        };

        let stem = file.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        let out_path = file.with_file_name(output_file_name(&cli.out, &stem));
        if let Err(err) = std::fs::write(&out_path, &result.ir) {
            println!("nxsan-instrument: failed to write {}: {err}", out_path.display());
        }
    }

    ExitCode::SUCCESS
}
