pub mod binder;
pub mod bitmap;
pub mod face;
pub mod hierarchy;
pub mod mesh;
pub mod model;
pub mod rsc;
pub mod sstate;
pub mod tim;
pub mod vmem;

use std::fmt::{Debug, Display, Formatter, Write};

use binrw::binread;

/// Selects the face tag table, mesh header layout and hierarchy composition
/// rule. The two source formats are never mixed within one decode.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum FormatContext {
    /// Mesh files extracted from `GAME.RSC`.
    Container,
    /// Structures resident in a main RAM dump.
    MemoryDump,
}

impl Display for FormatContext {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        f.write_str(match self {
            FormatContext::Container => "container",
            FormatContext::MemoryDump => "memory dump",
        })
    }
}

#[binread]
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct FourCC(pub [u8; 4]);

impl Display for FourCC {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for c in self.0 {
            f.write_char(c as char)?;
        }
        Ok(())
    }
}

impl Debug for FourCC {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_char('"')?;
        Display::fmt(self, f)?;
        f.write_char('"')
    }
}

impl PartialEq<[u8; 4]> for FourCC {
    fn eq(&self, other: &[u8; 4]) -> bool { &self.0 == other }
}

/// Returns the four bytes at `offset` if the buffer is long enough.
#[inline]
pub fn peek_four_cc(data: &[u8], offset: usize) -> Option<FourCC> {
    let bytes = data.get(offset..offset.checked_add(4)?)?;
    Some(FourCC([bytes[0], bytes[1], bytes[2], bytes[3]]))
}
