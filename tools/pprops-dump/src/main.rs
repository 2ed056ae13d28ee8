// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! pprops-dump - inspect PlainProps batch blobs
//!
//! Validates blobs, prints them as YAML, rebuilds blobs from YAML and
//! compares the schemas of two batches.

use anyhow::{bail, Context as _};
use clap::{Parser, Subcommand, ValueEnum};
use plainprops::{
    detect_format, diff_schemas, parse_yaml, print_yaml, read_batch, BatchView, SchemaDiff,
    SchemaFormat,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "pprops-dump")]
#[command(about = "Inspect, dump and rebuild PlainProps batch blobs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a blob and print a summary
    Check {
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Name format (auto-detect if not specified)
        #[arg(long, value_enum)]
        format: Option<NameFormat>,
    },

    /// Print a StableNames blob as YAML
    Dump {
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output YAML file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Rebuild a blob from a YAML dump
    Parse {
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output blob file
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Compare the schemas of two StableNames blobs
    Diff {
        #[arg(value_name = "LEFT")]
        left: PathBuf,

        #[arg(value_name = "RIGHT")]
        right: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum NameFormat {
    Stable,
    InMemory,
}

impl From<NameFormat> for SchemaFormat {
    fn from(format: NameFormat) -> Self {
        match format {
            NameFormat::Stable => SchemaFormat::StableNames,
            NameFormat::InMemory => SchemaFormat::InMemoryNames,
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { input, format } => cmd_check(&input, format)?,
        Commands::Dump { input, output } => cmd_dump(&input, output.as_deref())?,
        Commands::Parse { input, output } => cmd_parse(&input, &output)?,
        Commands::Diff { left, right } => cmd_diff(&left, &right)?,
    }

    Ok(())
}

fn read_file(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn open<'b>(path: &Path, bytes: &'b [u8], format: Option<SchemaFormat>) -> anyhow::Result<BatchView<'b>> {
    let format = match format {
        Some(format) => format,
        None => detect_format(bytes).with_context(|| format!("detecting format of {}", path.display()))?,
    };
    log::debug!("{}: {:?}, {} bytes", path.display(), format, bytes.len());
    read_batch(bytes, format).with_context(|| format!("invalid blob {}", path.display()))
}

fn cmd_check(input: &Path, format: Option<NameFormat>) -> anyhow::Result<()> {
    let bytes = read_file(input)?;
    let view = open(input, &bytes, format.map(SchemaFormat::from))?;
    for i in 0..view.objects.len() {
        view.read_object(i)
            .with_context(|| format!("object {} of {}", i, input.display()))?;
    }

    println!("[OK] {} ({:?})", input.display(), view.format);
    println!("  bytes:   {}", bytes.len());
    match &view.names {
        Some(names) => println!("  names:   {}", names.len()),
        None => println!("  names:   in-memory"),
    }
    println!("  structs: {}", view.schemas.structs.len());
    println!("  enums:   {}", view.schemas.enums.len());
    println!("  objects: {}", view.objects.len());
    Ok(())
}

fn cmd_dump(input: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let bytes = read_file(input)?;
    let view = open(input, &bytes, None)?;
    if view.format != SchemaFormat::StableNames {
        bail!("{} has no name table; only StableNames blobs can be dumped", input.display());
    }
    let yaml = print_yaml(&view)?;
    match output {
        Some(path) => {
            std::fs::write(path, yaml).with_context(|| format!("writing {}", path.display()))?;
            println!("[OK] {} -> {}", input.display(), path.display());
        }
        None => print!("{}", yaml),
    }
    Ok(())
}

fn cmd_parse(input: &Path, output: &Path) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(input).with_context(|| format!("reading {}", input.display()))?;
    let blob = parse_yaml(&text).with_context(|| format!("parsing {}", input.display()))?;
    std::fs::write(output, &blob).with_context(|| format!("writing {}", output.display()))?;
    println!("[OK] {} -> {} ({} bytes)", input.display(), output.display(), blob.len());
    Ok(())
}

fn cmd_diff(left: &Path, right: &Path) -> anyhow::Result<()> {
    let (lb, rb) = (read_file(left)?, read_file(right)?);
    let lv = open(left, &lb, Some(SchemaFormat::StableNames))?;
    let rv = open(right, &rb, Some(SchemaFormat::StableNames))?;
    let diffs = diff_schemas(&lv, &rv)?;
    if diffs.is_empty() {
        println!("[OK] schemas match");
        return Ok(());
    }
    for diff in &diffs {
        match diff {
            SchemaDiff::OnlyInLeft(name) => println!("  - {}", name),
            SchemaDiff::OnlyInRight(name) => println!("  + {}", name),
            SchemaDiff::Changed(name) => println!("  ~ {}", name),
        }
    }
    bail!("{} schema differences", diffs.len())
}
