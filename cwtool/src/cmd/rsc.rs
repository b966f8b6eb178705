use std::path::PathBuf;

use anyhow::{Context, Result};
use argh::FromArgs;
use cwlib::{
    format::rsc::RscArchive,
    util::file::{map_file, write_file},
};

#[derive(FromArgs, PartialEq, Debug)]
/// process GAME.RSC archives
#[argh(subcommand, name = "rsc")]
pub struct Args {
    #[argh(subcommand)]
    command: SubCommand,
}

#[derive(FromArgs, PartialEq, Debug)]
#[argh(subcommand)]
enum SubCommand {
    Extract(ExtractArgs),
}

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// extract every file of a GAME.RSC archive
#[argh(subcommand, name = "extract")]
pub struct ExtractArgs {
    #[argh(positional)]
    /// input file
    input: PathBuf,
    #[argh(positional)]
    /// output directory
    output: PathBuf,
}

pub fn run(args: Args) -> Result<()> {
    match args.command {
        SubCommand::Extract(c_args) => extract(c_args),
    }
}

fn extract(args: ExtractArgs) -> Result<()> {
    let data = map_file(&args.input)?;
    let archive = RscArchive::read(&data)
        .with_context(|| format!("Failed to read archive '{}'", args.input.display()))?;
    for directory in &archive.directories {
        log::info!(
            "Directory {} ({}): {} files",
            directory.index,
            directory.name,
            directory.entries.len()
        );
        for entry in &directory.entries {
            log::debug!("{} offset {:#X} size {:#X}", entry.name, entry.offset, entry.size);
            let path = args.output.join(&directory.name).join(&entry.name);
            write_file(&path, archive.entry_data(&data, entry)?)?;
        }
    }
    let index = serde_json::to_vec_pretty(&archive)?;
    write_file(args.output.join("entries.json"), index)?;
    Ok(())
}
