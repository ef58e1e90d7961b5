use crate::models::{DocumentType, PackFormat};
use std::path::PathBuf;

/// One discovered pack, ready to be loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackDescriptor {
    /// Pack name as declared by the manifest (or the filesystem name when
    /// discovered without one).
    pub name: String,
    /// Absolute path to the pack file or directory.
    pub path: PathBuf,
    pub format: PackFormat,
    pub declared_type: Option<DocumentType>,
    /// Detected system display label.
    pub system: Option<String>,
    /// Directory name of the module or system the pack belongs to.
    pub source_name: String,
}
impl PackDescriptor {
    /// Name of the pack on disk, which is what the extraction helper expects
    /// (manifest names and directory names are allowed to differ).
    pub fn filesystem_name(&self) -> String {
        let name = match self.format {
            PackFormat::NeDb => self.path.file_stem(),
            _ => self.path.file_name(),
        };
        name.map(|name| name.to_string_lossy().into_owned()).unwrap_or_else(|| self.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filesystem_name_strips_extension() {
        let pack = PackDescriptor {
            name: "features-dnd5e".to_string(),
            path: PathBuf::from("/data/modules/foo/packs/feats-dnd5e.db"),
            format: PackFormat::NeDb,
            declared_type: None,
            system: None,
            source_name: "foo".to_string(),
        };
        assert_eq!(pack.filesystem_name(), "feats-dnd5e");
    }
}
