//! `GAME.RSC` archive: sixteen directories of DOS-named files addressed
//! through a shared file-offset table.

use anyhow::{bail, ensure, Context, Result};
use serde_derive::Serialize;
use zerocopy::{FromBytes, FromZeroes, LittleEndian, I16, I32, U32};

pub const DIRECTORY_COUNT: usize = 16;
const DIRECTORY_TABLE: usize = 0x4;

/// Directory table entry.
#[derive(Clone, Debug, FromBytes, FromZeroes)]
#[repr(C, packed)]
struct DirectoryHeader {
    entries_ptr: I32<LittleEndian>,
    file_count: I32<LittleEndian>,
}

/// Directory entry, stride `0x14`.
#[derive(Clone, Debug, FromBytes, FromZeroes)]
#[repr(C, packed)]
struct FileEntry {
    name: [u8; 12],
    _unk: U32<LittleEndian>,
    offset_index: I16<LittleEndian>,
    _unk2: I16<LittleEndian>,
}

/// File-offset table entry, stride 8, after a leading count.
#[derive(Clone, Debug, FromBytes, FromZeroes)]
#[repr(C, packed)]
struct OffsetEntry {
    offset: I32<LittleEndian>,
    _unk: I32<LittleEndian>,
}

fn read_struct<T: FromBytes>(data: &[u8], offset: usize, what: &str) -> Result<T> {
    data.get(offset..)
        .and_then(T::read_from_prefix)
        .with_context(|| format!("{what} at {offset:#X} is out of bounds"))
}

/// Output name of directory `index`.
pub fn directory_name(index: usize) -> String {
    match index {
        0 => "levels",
        2 => "levels-loading-screens_and_item-descriptions",
        4 => "models_maybe",
        5 => "dummy_files",
        6 => "levels_scripts",
        8 => "menu_related_maybe",
        9 => "levels_ground_related_maybe",
        10 => "levels_tga_files",
        11 => "levels_environment_data",
        12 => "strings",
        13 => "levels_ingame_messages",
        14 => "levels_briefings_debriefings",
        15 => "animations_maybe",
        _ => return format!("directory_{index}"),
    }
    .to_string()
}

#[derive(Clone, Debug, Serialize)]
pub struct RscEntry {
    pub name: String,
    pub offset_index: i16,
    pub offset: u32,
    pub size: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct RscDirectory {
    pub index: usize,
    pub name: String,
    pub entries_ptr: u32,
    pub entries: Vec<RscEntry>,
}

#[derive(Clone, Debug, Serialize)]
pub struct RscArchive {
    pub offset_table: u32,
    /// Non-empty directories only.
    pub directories: Vec<RscDirectory>,
}

impl RscArchive {
    pub fn read(data: &[u8]) -> Result<Self> {
        let offset_table = read_struct::<I32<LittleEndian>>(data, 0, "offset table pointer")?.get();
        let offset_table = usize::try_from(offset_table)
            .with_context(|| format!("Invalid offset table pointer {offset_table}"))?;
        let offsets = read_offsets(data, offset_table)?;

        let mut directories = Vec::new();
        for index in 0..DIRECTORY_COUNT {
            let header: DirectoryHeader = read_struct(
                data,
                DIRECTORY_TABLE + index * std::mem::size_of::<DirectoryHeader>(),
                "directory header",
            )?;
            let file_count = header.file_count.get();
            if file_count <= 0 {
                continue;
            }
            let entries_ptr = header.entries_ptr.get();
            ensure!(entries_ptr >= 0, "Directory {index} has negative entry pointer {entries_ptr}");

            let name = directory_name(index);
            let entries = (0..file_count as usize)
                .map(|i| {
                    let at = entries_ptr as usize + i * std::mem::size_of::<FileEntry>();
                    read_entry(data, at, &offsets)
                        .with_context(|| format!("Failed to read entry {i} of {name}"))
                })
                .collect::<Result<Vec<_>>>()?;
            log::debug!("Directory {index} ({name}): {} files", entries.len());
            directories.push(RscDirectory {
                index,
                name,
                entries_ptr: entries_ptr as u32,
                entries,
            });
        }
        Ok(Self { offset_table: offset_table as u32, directories })
    }

    /// Slices an entry's contents out of the archive.
    pub fn entry_data<'a>(&self, data: &'a [u8], entry: &RscEntry) -> Result<&'a [u8]> {
        let start = entry.offset as usize;
        data.get(start..start + entry.size as usize).with_context(|| {
            format!(
                "Entry {} ({:#X}..{:#X}) extends past archive end {:#X}",
                entry.name,
                start,
                start + entry.size as usize,
                data.len()
            )
        })
    }
}

/// File offsets; the archive end is appended so every file has a successor.
fn read_offsets(data: &[u8], offset_table: usize) -> Result<Vec<u32>> {
    let count = read_struct::<I32<LittleEndian>>(data, offset_table, "offset table count")?.get();
    ensure!(count >= 0, "Negative offset table count {count}");
    let mut offsets = (0..count as usize)
        .map(|i| {
            let at = offset_table + 4 + i * std::mem::size_of::<OffsetEntry>();
            let entry: OffsetEntry = read_struct(data, at, "offset table entry")?;
            let offset = entry.offset.get();
            ensure!(offset >= 0, "Offset table entry {i} is negative ({offset})");
            Ok(offset as u32)
        })
        .collect::<Result<Vec<_>>>()?;
    offsets.push(data.len() as u32);
    Ok(offsets)
}

fn read_entry(data: &[u8], at: usize, offsets: &[u32]) -> Result<RscEntry> {
    let entry: FileEntry = read_struct(data, at, "directory entry")?;
    let name = String::from_utf8_lossy(&entry.name).replace('\0', "");
    let offset_index = entry.offset_index.get();
    let index = usize::try_from(offset_index)
        .ok()
        .filter(|&i| i + 1 < offsets.len())
        .with_context(|| format!("{name}: offset index {offset_index} out of range"))?;
    let (offset, next) = (offsets[index], offsets[index + 1]);
    if next < offset {
        bail!("{name}: next file offset {next:#X} precedes {offset:#X}");
    }
    Ok(RscEntry { name, offset_index, offset, size: next - offset })
}
