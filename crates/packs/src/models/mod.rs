mod document;
mod format;
mod item;
mod pack;

pub use self::document::DocumentType;
pub use self::format::PackFormat;
pub use self::item::{CompendiumItem, LoadedPack, RawData, Rejected};
pub use self::pack::PackDescriptor;
