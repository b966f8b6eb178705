use std::path::PathBuf;

use anyhow::Result;
use argh::FromArgs;
use cwlib::{
    format::tim::{decode_tim, TimHeader},
    util::file::{map_file, write_png},
};

#[derive(FromArgs, PartialEq, Debug)]
/// process TIM textures
#[argh(subcommand, name = "tim")]
pub struct Args {
    #[argh(subcommand)]
    command: SubCommand,
}

#[derive(FromArgs, PartialEq, Debug)]
#[argh(subcommand)]
enum SubCommand {
    Convert(ConvertArgs),
}

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// converts a TIM file to PNG
#[argh(subcommand, name = "convert")]
pub struct ConvertArgs {
    #[argh(positional)]
    /// input TIM
    input: PathBuf,
    #[argh(option, short = 'o')]
    /// output PNG (default: input with .png extension)
    output: Option<PathBuf>,
}

pub fn run(args: Args) -> Result<()> {
    match args.command {
        SubCommand::Convert(c_args) => convert(c_args),
    }
}

fn convert(args: ConvertArgs) -> Result<()> {
    let data = map_file(&args.input)?;
    let head = TimHeader::read(&data)?;
    log::info!("Texture info:");
    log::info!("  Format: {}", head.bit_depth);
    log::info!("  Size: {}x{}", head.width * head.bit_depth.pixels_per_word(), head.height);
    log::info!("  Palettes: {} of {} colors", head.palette_count, head.palette_entries);
    log::info!("  VRAM position: {}, {}", head.vram_x, head.vram_y);

    let bitmap = decode_tim(&data)?;
    let path = args.output.unwrap_or_else(|| args.input.with_extension("png"));
    write_png(&path, &bitmap.to_rgba_image())
}
