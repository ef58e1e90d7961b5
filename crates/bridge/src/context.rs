use std::fmt::{Display, Formatter, Result as FmtResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageType {
    System,
    Module,
}
impl PackageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "System",
            Self::Module => "Module",
        }
    }
}
impl Display for PackageType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// The package the helper should open a pack from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageContext {
    pub id: String,
    pub package_type: PackageType,
}
impl PackageContext {
    /// Derive the package from the name of the directory a pack was found in.
    ///
    /// Game systems are addressed as systems; official module directories are
    /// sometimes renamed, so those are matched on a fragment of their name.
    pub fn for_source(source_name: &str) -> Self {
        const SYSTEMS: [&str; 3] = ["dnd5e", "pf2e", "pf1"];
        const MODULES: [(&str, &str); 2] = [
            ("dungeon-masters-guide", "dnd-dungeon-masters-guide"),
            ("players-handbook", "dnd-players-handbook"),
        ];
        if let Some(system) = SYSTEMS.iter().find(|s| s.eq_ignore_ascii_case(source_name)) {
            return Self { id: system.to_string(), package_type: PackageType::System };
        }
        let id = MODULES
            .iter()
            .find(|(fragment, _)| source_name.contains(fragment))
            .map_or(source_name, |(_, id)| *id);
        Self { id: id.to_string(), package_type: PackageType::Module }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("dnd5e", "dnd5e", PackageType::System)]
    #[case("PF2E", "pf2e", PackageType::System)]
    #[case("dnd-players-handbook-2024", "dnd-players-handbook", PackageType::Module)]
    #[case("my-dungeon-masters-guide", "dnd-dungeon-masters-guide", PackageType::Module)]
    #[case("some-homebrew-module", "some-homebrew-module", PackageType::Module)]
    fn contexts(#[case] source: &str, #[case] id: &str, #[case] package_type: PackageType) {
        assert_eq!(PackageContext::for_source(source), PackageContext { id: id.to_string(), package_type });
    }
}
