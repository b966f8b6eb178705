use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{ensure, Context, Result};
use argh::FromArgs;
use cwlib::{
    format::{
        bitmap::Bitmap,
        hierarchy::{resolve_model, ObjectPart},
        model::ModelFile,
        tim::decode_tim,
    },
    util::{
        cache::BitmapCache,
        file::{create_dir, file_name, list_files, map_file, write_file, write_png},
        obj::{AxisPolicy, ObjBuilder},
    },
};
use rayon::prelude::*;

#[derive(FromArgs, PartialEq, Debug)]
/// process model files from GAME.RSC
#[argh(subcommand, name = "model")]
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
/// converts every model file in a directory to OBJ
#[argh(subcommand, name = "convert")]
pub struct ConvertArgs {
    #[argh(positional)]
    /// directory of model files
    meshes: PathBuf,
    #[argh(positional)]
    /// directory of TEX_<id>.TIM files
    textures: PathBuf,
    #[argh(positional)]
    /// output directory
    out_dir: PathBuf,
    #[argh(switch)]
    /// also write the decoded model as JSON
    model_info: bool,
    #[argh(switch)]
    /// do not apply scaling, rotation or translation
    no_transform: bool,
    #[argh(switch)]
    /// do not invert the Y axis
    no_inverse_axis: bool,
    #[argh(switch)]
    /// write every model directly into the output directory
    no_subdirectories: bool,
    #[argh(switch)]
    /// do not convert textures
    no_textures: bool,
}

pub fn run(args: Args) -> Result<()> {
    match args.command {
        SubCommand::Convert(c_args) => convert(c_args),
    }
}

fn convert(args: ConvertArgs) -> Result<()> {
    let files = list_files(&args.meshes)?;
    ensure!(!files.is_empty(), "No model files found in '{}'", args.meshes.display());
    create_dir(&args.out_dir)?;

    let cache = BitmapCache::new();
    let failed = convert_all(&files, &args, &cache);
    if failed > 0 {
        log::error!("{failed} of {} models failed", files.len());
    } else {
        log::info!("Converted {} models", files.len());
    }
    Ok(())
}

/// Converts every file, logging failures. Returns the number of failures.
fn convert_all(files: &[PathBuf], args: &ConvertArgs, cache: &BitmapCache<i16>) -> usize {
    files
        .par_iter()
        .filter(|path| match convert_model(path, args, cache) {
            Ok(()) => false,
            Err(e) => {
                log::error!("Failed to convert {}: {e:?}", path.display());
                true
            }
        })
        .count()
}

/// A decoded model, ready to be written.
#[derive(Debug)]
struct ModelOutput {
    name: String,
    obj: String,
    info: Option<Vec<u8>>,
    texture_ids: Vec<i16>,
}

/// Decodes one model file without touching the output directory.
fn build_model(path: &Path, args: &ConvertArgs) -> Result<ModelOutput> {
    let name = file_name(path)?;
    let data = map_file(path)?;
    let model = ModelFile::read(&data)?;
    log::info!(
        "Parsed {name}: {} objects, {} textures",
        model.objects.len(),
        model.texture_ids.len()
    );

    let parts = if args.no_transform { None } else { Some(resolve_model(&model)?) };
    let obj = model_obj(&model, parts.as_deref(), !args.no_inverse_axis);
    let info = if args.model_info { Some(serde_json::to_vec_pretty(&model)?) } else { None };
    Ok(ModelOutput { name, obj, info, texture_ids: model.texture_ids })
}

fn convert_model(path: &Path, args: &ConvertArgs, cache: &BitmapCache<i16>) -> Result<()> {
    let ModelOutput { name, obj, info, texture_ids } = build_model(path, args)?;

    let out_dir = if args.no_subdirectories { args.out_dir.clone() } else { args.out_dir.join(&name) };
    write_file(out_dir.join(format!("{name}.obj")), obj)?;
    if let Some(info) = info {
        write_file(out_dir.join(format!("{name}.json")), info)?;
    }

    if !args.no_textures {
        for (index, &id) in texture_ids.iter().enumerate() {
            let path = out_dir.join(format!("tex_{index}.png"));
            if let Err(e) = convert_texture(&args.textures, id, cache, &path) {
                log::error!("{name}: failed to convert texture {id}: {e:?}");
            }
        }
    }
    Ok(())
}

/// Writes one `o` group per object. Without resolved parts, vertices are
/// emitted as stored.
fn model_obj(model: &ModelFile, parts: Option<&[ObjectPart]>, inverse_axis: bool) -> String {
    let mut obj = ObjBuilder::new(AxisPolicy::container(inverse_axis));
    for (i, object) in model.objects.iter().enumerate() {
        obj.object(&format!("Object_{}", object.index));
        for (m, mesh) in object.meshes.iter().enumerate() {
            let base = obj.next_vertex();
            match parts.and_then(|p| p.get(i)).and_then(|p| p.world_vertices.get(m)) {
                Some(world) => {
                    for &v in world {
                        obj.push_vertex(v);
                    }
                }
                None => {
                    for v in &mesh.vertices {
                        obj.push_vertex(v.to_vec3());
                    }
                }
            }
            for face in &mesh.faces {
                let indices =
                    face.vertex_indices.iter().map(|&v| base + v as usize).collect::<Vec<_>>();
                obj.face(&indices, None);
            }
        }
    }
    obj.finish()
}

fn convert_texture(dir: &Path, id: i16, cache: &BitmapCache<i16>, out: &Path) -> Result<()> {
    let bitmap: Arc<Bitmap> = cache.get_or_try_insert_with(id, || -> Result<Bitmap> {
        let path = dir.join(format!("TEX_{id}.TIM"));
        let data = map_file(&path)?;
        decode_tim(&data).with_context(|| format!("Failed to decode '{}'", path.display()))
    })?;
    write_png(out, &bitmap.to_rgba_image())
}
