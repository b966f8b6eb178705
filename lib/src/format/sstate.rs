//! ePSXe save states: main RAM and VRAM snapshots of a running game.

use std::borrow::Cow;

use anyhow::{ensure, Result};

use crate::{
    format::vmem::{VRAM_HEIGHT, VRAM_ROW_BYTES},
    util::compression::decompress_buffer,
};

pub const SSTATE_MAGIC: &[u8; 5] = b"ePSXe";
pub const RAM_OFFSET: usize = 0x1BA;
pub const RAM_SIZE: usize = 0x200000;
pub const VRAM_OFFSET: usize = 0x2733DF;
pub const VRAM_SIZE: usize = VRAM_ROW_BYTES * VRAM_HEIGHT;

pub struct SaveState<'a> {
    data: Cow<'a, [u8]>,
}

impl<'a> SaveState<'a> {
    /// Accepts plain or gzip-compressed states.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let data = decompress_buffer(data)?;
        ensure!(data.starts_with(SSTATE_MAGIC), "Provided file is not an ePSXe save state");
        ensure!(
            data.len() >= VRAM_OFFSET + VRAM_SIZE,
            "Save state is truncated ({:#X} bytes, expected at least {:#X})",
            data.len(),
            VRAM_OFFSET + VRAM_SIZE
        );
        Ok(Self { data })
    }

    /// Main RAM; offsets are PSX addresses with the segment bits dropped.
    pub fn ram(&self) -> &[u8] { &self.data[RAM_OFFSET..RAM_OFFSET + RAM_SIZE] }

    /// VRAM as 512 rows of 1024 16-bit words.
    pub fn vram(&self) -> &[u8] { &self.data[VRAM_OFFSET..VRAM_OFFSET + VRAM_SIZE] }
}
