use std::path::PathBuf;

use anyhow::{Context, Result};
use argh::FromArgs;
use cwlib::{
    format::{
        binder::FaceTextureBinder,
        hierarchy::{resolve_ship, ObjectPart, SHIP_POINTER_SLOT},
        sstate::SaveState,
        vmem::{locate_textures, TextureRegion},
    },
    util::{
        file::{create_dir, map_file, write_file, write_png},
        obj::{write_mtl, AxisPolicy, Material, ObjBuilder},
    },
};

#[derive(FromArgs, PartialEq, Debug)]
/// process ePSXe save states
#[argh(subcommand, name = "sstate")]
pub struct Args {
    #[argh(subcommand)]
    command: SubCommand,
}

#[derive(FromArgs, PartialEq, Debug)]
#[argh(subcommand)]
enum SubCommand {
    Extract(ExtractArgs),
}

#[derive(FromArgs, PartialEq, Debug)]
/// extracts the selected ship and its textures to OBJ
#[argh(subcommand, name = "extract")]
pub struct ExtractArgs {
    #[argh(positional)]
    /// input save state (plain or gzip)
    state: PathBuf,
    #[argh(positional)]
    /// output directory
    out_dir: PathBuf,
    #[argh(option, default = "0.1")]
    /// vertex scale (default 0.1)
    scale: f32,
    #[argh(option, default = "SHIP_POINTER_SLOT", from_str_fn(parse_hex))]
    /// address of the selected ship pointer in RAM, in hex (default 0x1A75A8)
    ship_pointer: usize,
    #[argh(switch)]
    /// bind textures whose VMEM flag has no known correction
    keep_unknown_flags: bool,
}

fn parse_hex(value: &str) -> Result<usize, String> {
    let digits = value.trim_start_matches("0x").trim_start_matches("0X");
    usize::from_str_radix(digits, 16).map_err(|e| format!("invalid hex address '{value}': {e}"))
}

pub fn run(args: Args) -> Result<()> {
    match args.command {
        SubCommand::Extract(c_args) => extract(c_args),
    }
}

fn extract(args: ExtractArgs) -> Result<()> {
    let data = map_file(&args.state)?;
    let state = SaveState::parse(&data)
        .with_context(|| format!("Failed to load '{}'", args.state.display()))?;

    let parts = resolve_ship(state.ram(), args.ship_pointer)
        .with_context(|| format!("Failed to resolve ship at {:#X}", args.ship_pointer))?;
    let regions = locate_textures(state.ram());
    log::info!("Found {} model parts, {} texture regions", parts.len(), regions.len());

    let mut binder = FaceTextureBinder::new(&regions).lenient(args.keep_unknown_flags);
    let obj = ship_obj(&parts, &mut binder, args.scale);

    // Decode every texture before writing anything.
    let textures = binder
        .materials()
        .enumerate()
        .map(|(i, region)| {
            let bitmap = region
                .decode(state.vram())
                .with_context(|| format!("Failed to decode texture at {:#X}", region.offset))?;
            Ok((i, bitmap.to_rgba_image_cropped(region.width as usize)))
        })
        .collect::<Result<Vec<_>>>()?;
    let materials = (0..textures.len())
        .map(|i| Material { name: format!("tex{i}"), texture: format!("tex{i}.png") })
        .collect::<Vec<_>>();

    create_dir(&args.out_dir)?;
    write_file(args.out_dir.join("out.obj"), obj)?;
    write_file(args.out_dir.join("out.mtl"), write_mtl(&materials))?;
    for (i, image) in textures {
        write_png(args.out_dir.join(format!("tex{i}.png")), &image)?;
    }
    Ok(())
}

fn ship_obj(parts: &[ObjectPart], binder: &mut FaceTextureBinder, scale: f32) -> String {
    let mut obj = ObjBuilder::new(AxisPolicy::memory_dump(scale));
    obj.mtllib("out.mtl");
    let mut unbound = 0usize;
    for part in parts {
        obj.object(&format!("Object_{}", part.index + 1));
        for (mesh, world) in part.meshes.iter().zip(&part.world_vertices) {
            let base = obj.next_vertex();
            for &v in world {
                obj.push_vertex(v);
            }
            for face in &mesh.faces {
                let indices =
                    face.vertex_indices.iter().map(|&v| base + v as usize).collect::<Vec<_>>();
                match binder.bind(face) {
                    Ok(binding) => {
                        let region = &binder.regions()[binding.region];
                        obj.usemtl(&format!("tex{}", binding.material));
                        let tex_coords = face
                            .uv_coords
                            .iter()
                            .map(|&uv| {
                                let (u, v) = page_uv(region, uv);
                                obj.push_tex_coord(u, v)
                            })
                            .collect::<Vec<_>>();
                        obj.face(&indices, Some(&tex_coords));
                    }
                    Err(e) => {
                        log::debug!("Part {} face at {:#X}: {e}", part.index, face.offset);
                        unbound += 1;
                        obj.face(&indices, None);
                    }
                }
            }
        }
    }
    if unbound > 0 {
        log::warn!("{unbound} faces have no matching texture");
    }
    obj.finish()
}

/// Maps a page-relative texel to texture coordinates, V pointing up.
fn page_uv(region: &TextureRegion, [u, v]: [u8; 2]) -> (f32, f32) {
    let u = (u as f32 - region.x_on_page as f32) / region.width as f32;
    let v = 1.0 - (v as f32 - region.y_on_page as f32) / region.height as f32;
    (u, v)
}
