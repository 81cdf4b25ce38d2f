//! elfmangle - Convert non-volatile memory images between firmware layouts.
//!
//! Reads the memory layout from one or two ELF files, loads an image into the
//! first layout, carries field values over to the second and writes the
//! result.

use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use elfmangle::display::{format_layout, PrintContent, ShowFields};
use elfmangle::{convert, ConversionOptions, ImageFormat, OverrideList, DEFAULT_SECTION};

/// Convert non-volatile memory images between firmware layouts.
#[derive(Parser, Debug)]
#[command(name = "elfmangle")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// ELF file describing the input layout
    in_map: PathBuf,

    /// ELF file describing the output layout (defaults to the input layout)
    out_map: Option<PathBuf>,

    /// ELF section holding the memory content
    #[arg(short = 'j', long, default_value = DEFAULT_SECTION)]
    section: String,

    /// Image file to load into the input layout
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Format of the input image (auto, raw, ihex)
    #[arg(short = 'I', long, default_value = "auto", value_parser = ImageFormat::from_str)]
    input_format: ImageFormat,

    /// Image file to write from the output layout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Format of the output image (raw, ihex)
    #[arg(short = 'O', long, default_value = "ihex", value_parser = parse_output_format)]
    output_format: ImageFormat,

    /// Override field content, e.g. "nvm_unique=3930 02" (repeatable)
    #[arg(short = 'D', long = "define", value_name = "FIELD=BYTES,...", action = ArgAction::Append)]
    defines: Vec<String>,

    /// Set the serial number of the unique system identification (1-65535)
    #[arg(long, value_name = "NUMBER", value_parser = clap::value_parser!(u16).range(1..))]
    set_serial: Option<u16>,

    /// Print field contents (pretty or hex)
    #[arg(
        short,
        long,
        value_name = "FORMAT",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "pretty",
        value_parser = PrintContent::from_str
    )]
    print: Option<PrintContent>,

    /// Show field offsets within the section
    #[arg(short, long)]
    addresses: bool,

    /// Show symbol names instead of field descriptions
    #[arg(short = 'S', long)]
    symbols: bool,

    /// Show field sizes in bytes
    #[arg(short = 'F', long)]
    field_size: bool,

    /// Skip checksum verification and update
    #[arg(long)]
    no_post_process: bool,

    /// Verbosity level (0=quiet, 1=warnings, 2=info, 3=debug)
    #[arg(short, long, default_value = "1")]
    verbosity: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbosity);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            let code = e
                .downcast_ref::<elfmangle::Error>()
                .map_or(1, |e| e.result_code().exit_code());
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

fn setup_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        _ => Level::DEBUG,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .without_time()
        .finish();

    tracing::subscriber::set_global_default(subscriber).ok();
}

fn parse_output_format(s: &str) -> std::result::Result<ImageFormat, String> {
    match ImageFormat::from_str(s)? {
        ImageFormat::Auto => Err("output format must be raw or ihex".to_string()),
        format => Ok(format),
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut overrides = OverrideList::new();
    for define in &cli.defines {
        overrides
            .push(define)
            .with_context(|| format!("Failed to record override: {}", define))?;
    }
    if let Some(serial) = cli.set_serial {
        overrides
            .push_serial(serial)
            .with_context(|| format!("Failed to record serial number {}", serial))?;
    }

    if cli.input.is_some() && cli.input.as_deref() == cli.output.as_deref() {
        bail!("Input and output image must be different files");
    }

    let options = ConversionOptions {
        section: cli.section,
        input_image: cli.input,
        input_format: cli.input_format,
        output_image: cli.output,
        output_format: cli.output_format,
        overrides,
        skip_post_process: cli.no_post_process,
        verbosity: cli.verbosity,
    };

    let summary = convert(&cli.in_map, cli.out_map.as_deref(), &options)
        .with_context(|| format!("Failed to convert: {}", cli.in_map.display()))?;

    let mut show = ShowFields::empty();
    show.set(ShowFields::ADDRESS, cli.addresses);
    show.set(ShowFields::SYMBOL, cli.symbols);
    show.set(ShowFields::BYTE_SIZE, cli.field_size);
    if cli.print.is_some() || !show.is_empty() {
        print!(
            "{}",
            format_layout(&summary.layout, show, cli.print.unwrap_or_default())
        );
    }

    if let Some(transfer) = &summary.transfer {
        info!(
            "Transferred {} fields, {} not found in source",
            transfer.matched,
            transfer.missing.len()
        );
    }
    info!(
        "{} fields changed, {} overrides applied",
        summary.layout.changed_symbols().count(),
        summary.overrides.applied
    );

    Ok(())
}
