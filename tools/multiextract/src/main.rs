use anyhow::Context;
use clap::{ArgAction, Parser};
use log::{error, info, warn};
use multiextract::logger::{StderrLogger, level_for};
use multiextract::{
    BlockSource, Container, DEFAULT_BLOCK_SIZE, DEFAULT_SUFFIX, DirectorySink, ExtractOptions,
    FailurePolicy, FileSource, Validation, inspect,
};
use std::path::PathBuf;
use std::process::ExitCode;

/// Extract the images embedded in a legacy multi-image firmware container.
#[derive(Debug, Parser)]
#[command(name = "multiextract", version, about)]
struct Cli {
    /// Multi-image container to read (file or block device).
    #[arg(value_name = "IMAGE")]
    image: PathBuf,

    /// Directory that receives the extracted images; created if missing.
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Extension appended to each extracted image's name.
    #[arg(long, value_name = "EXT", default_value = DEFAULT_SUFFIX)]
    suffix: String,

    /// Copy block size in bytes.
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_BLOCK_SIZE)]
    block_size: usize,

    /// Stop at the first sub-image that fails instead of continuing.
    #[arg(long)]
    fail_fast: bool,

    /// Check magic values and header/data CRC-32 checksums.
    #[arg(long)]
    verify: bool,

    /// Read the size table even if the image type is not "multi".
    #[arg(long)]
    any_type: bool,

    /// Print the container layout instead of extracting.
    #[arg(short, long)]
    list: bool,

    /// More log output; repeat for trace output.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn options(&self) -> ExtractOptions {
        ExtractOptions::default()
            .with_suffix(self.suffix.as_str())
            .with_block_size(self.block_size)
            .with_failure_policy(if self.fail_fast {
                FailurePolicy::FailFast
            } else {
                FailurePolicy::Continue
            })
            .with_validation(if self.verify {
                Validation::all()
            } else {
                Validation::default()
            })
            .with_require_multi(!self.any_type)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = StderrLogger::new(level_for(cli.verbose, cli.quiet)).init() {
        eprintln!("Failed to install logger: {e}");
    }

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns `Ok(false)` if the container was read but some sub-images failed.
fn run(cli: &Cli) -> anyhow::Result<bool> {
    let options = cli.options();
    let source = FileSource::open(&cli.image)?;

    let container = Container::read(&source, &options)
        .with_context(|| format!("Failed to read container {}", cli.image.display()))?;

    if cli.list {
        return Ok(list(&source, &container));
    }

    let mut sink = DirectorySink::create_dir(&cli.output_dir).with_context(|| {
        format!(
            "Failed to create output directory {}",
            cli.output_dir.display()
        )
    })?;

    let total = container.table().len();
    let summary = container.walk(&source, &mut sink, &options).run();

    info!(
        "Extracted {} of {total} images to {}",
        summary.extracted.len(),
        sink.root().display()
    );
    if summary.skipped > 0 {
        warn!("{} images were not attempted", summary.skipped);
    }

    Ok(summary.is_success())
}

/// Print the outer header and every sub-image's placement to stdout.
fn list<S: BlockSource + ?Sized>(source: &S, container: &Container) -> bool {
    let header = container.header();
    println!(
        "{:?}: type {}, os {}, arch {}, compression {}, {} bytes",
        header.name_lossy(),
        header.image_type,
        header.os,
        header.arch,
        header.compression,
        source.len()
    );

    let mut ok = true;
    for sub in container.sub_images() {
        match inspect(source, sub) {
            Ok(inner) => println!(
                "  [{:2}] {:#010x} {:>10} bytes  {:<32} type {}, size {}",
                sub.index,
                sub.offset,
                sub.declared_length,
                inner.name_lossy(),
                inner.image_type,
                inner.size
            ),
            Err(e) => {
                ok = false;
                println!(
                    "  [{:2}] {:#010x} {:>10} bytes  <unreadable>",
                    sub.index, sub.offset, sub.declared_length
                );
                error!("{e}");
            }
        }
    }
    ok
}
