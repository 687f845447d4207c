use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

/// Translates Nand2Tetris VM source into HACK assembly.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// A single `.vm` file, or a directory containing `.vm` files
    path: PathBuf,

    /// Increase log verbosity (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    env_logger::Builder::new().filter_level(level).init();

    match vmcore::driver::translate(&cli.path) {
        Ok(output) => {
            println!("Translation finished. Output written to {}", output.display());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
