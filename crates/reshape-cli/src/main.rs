use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, bail};
use clap::Parser;
use reshape_engine::{ProcessingContext, Processor, RunOutcome, Slot, default_state};
use reshape_events::global;
use reshape_io::default_factory;

#[derive(Parser, Debug)]
#[command(name = "reshape", about = "Stream a tabular file through a header mapping")]
struct Cli {
    /// Language code for user-facing messages.
    #[arg(short = 'l', long = "lang", default_value = "en")]
    lang: String,

    /// Source file (.csv, .tsv, .xlsx); append ::<sheet> for workbooks.
    input_path: String,

    /// Destination file of the same family as the input.
    output_path: PathBuf,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let bus = global();
    let state = default_state();
    let factory = default_factory();

    state.update_control("ui.language", cli.lang);
    state.update_control(
        "processing.output_path",
        cli.output_path.display().to_string(),
    );

    // Mirror engine status lines onto stderr for the operator.
    bus.on("status.update", |event| {
        if let Some(msg) = event.payload.str_value("msg") {
            eprintln!("{msg}");
        }
    })
    .expect("exact topic subscription cannot fail");

    let (path, sheet) = reshape_engine::parse_source_id(&cli.input_path);
    let mut input = factory
        .create(std::path::Path::new(&path))
        .with_context(|| format!("cannot open {path}"))?;
    if let Some(sheet) = &sheet {
        // Single-table back-ends ignore the request.
        let _ = input.set_sheet(sheet);
    }
    let headers = input
        .get_headers(None)
        .with_context(|| format!("cannot read headers of {path}"))?;
    if headers.is_empty() {
        bail!("{path} has no header row to map");
    }

    // Identity mapping: one single-source slot per input column.
    let mapping: Vec<Slot> = headers.into_iter().map(Slot::single).collect();
    let ctx = ProcessingContext::new(cli.input_path, mapping);

    let processor = Processor::new(bus, state, factory);
    match processor.run(&ctx) {
        RunOutcome::Completed(path) => {
            eprintln!("wrote {}", path.display());
            Ok(())
        }
        RunOutcome::Canceled(_) => bail!("processing was canceled"),
        RunOutcome::Failed | RunOutcome::Skipped => bail!("processing failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_parse_with_language_flag() {
        let cli = Cli::try_parse_from(["reshape", "-l", "sv", "in.csv", "out.csv"]).unwrap();
        assert_eq!(cli.lang, "sv");
        assert_eq!(cli.input_path, "in.csv");
        assert_eq!(cli.output_path, PathBuf::from("out.csv"));
    }

    #[test]
    fn language_defaults_to_english() {
        let cli = Cli::try_parse_from(["reshape", "in.csv", "out.csv"]).unwrap();
        assert_eq!(cli.lang, "en");
    }

    #[test]
    fn missing_arguments_fail_parsing() {
        assert!(Cli::try_parse_from(["reshape", "in.csv"]).is_err());
    }
}
