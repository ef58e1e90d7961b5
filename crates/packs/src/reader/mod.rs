//! Pack readers.
//!
//! The set of formats is closed, so dispatch goes through the [`Reader`] enum
//! picked from a [`PackFormat`] rather than through open-ended registration.
//! Readers are synchronous and meant to be driven from a blocking task.

mod extracted;
mod nedb;
mod plutonium;

pub use self::extracted::ExtractedReader;
pub use self::nedb::NeDbReader;
pub use self::plutonium::PlutoniumReader;
use crate::error::{ErrorKind, Result};
use crate::models::{DocumentType, LoadedPack, PackFormat};
use std::path::Path;

/// Turns one pack on disk into items.
///
/// Individual records that cannot be read end up in
/// [`LoadedPack::rejected`]; an `Err` means the pack as a whole was unusable.
pub trait PackReader {
    fn load_pack(&self, path: &Path, source_name: &str) -> Result<LoadedPack>;
}

#[derive(Debug, Clone)]
pub enum Reader {
    NeDb(NeDbReader),
    Plutonium(PlutoniumReader),
    /// JSON produced by the extraction helper from a LevelDB pack.
    Extracted(ExtractedReader),
}
impl Reader {
    /// Reader for a pack of the given format.
    ///
    /// LevelDB packs are read from the directory the extraction helper wrote,
    /// which is why the declared type and pack name are needed here.
    pub fn for_format(format: PackFormat, declared_type: Option<DocumentType>, pack_name: &str) -> Option<Self> {
        match format {
            PackFormat::NeDb => Some(Self::NeDb(NeDbReader)),
            PackFormat::PlutoniumJson => Some(Self::Plutonium(PlutoniumReader)),
            PackFormat::LevelDb => Some(Self::Extracted(ExtractedReader::new(declared_type, pack_name))),
            PackFormat::Unknown => None,
        }
    }
}
impl PackReader for Reader {
    fn load_pack(&self, path: &Path, source_name: &str) -> Result<LoadedPack> {
        match self {
            Self::NeDb(reader) => reader.load_pack(path, source_name),
            Self::Plutonium(reader) => reader.load_pack(path, source_name),
            Self::Extracted(reader) => reader.load_pack(path, source_name),
        }
    }
}

/// Load a pack whose format needs no external help.
pub fn load_pack(format: PackFormat, path: &Path, source_name: &str) -> Result<LoadedPack> {
    if !format.is_readable_in_process() {
        exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf()));
    }
    match Reader::for_format(format, None, "") {
        Some(reader) => reader.load_pack(path, source_name),
        None => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
    }
}

/// `file` or `file:line`, for rejected-record locations.
pub(crate) fn location(path: &Path, line: Option<usize>) -> String {
    let file = path.file_name().map(|f| f.to_string_lossy()).unwrap_or_else(|| path.to_string_lossy());
    match line {
        Some(line) => format!("{file}:{line}"),
        None => file.into_owned(),
    }
}
