use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// On-disk layout of a compendium pack.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PackFormat {
    /// Legacy single-file JSON-Lines database (`*.db`).
    NeDb,
    /// Current binary key-value directory (contains `CURRENT` and `LOCK`).
    /// Only readable after extraction through the external helper.
    LevelDb,
    /// Directory of flat JSON exports (`spells.json`, `monsters.json`, ...).
    PlutoniumJson,
    #[default]
    Unknown,
}
impl PackFormat {
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            PackFormat::NeDb => "nedb",
            PackFormat::LevelDb => "leveldb",
            PackFormat::PlutoniumJson => "plutonium-json",
            PackFormat::Unknown => "unknown",
        }
    }

    /// Whether items can be read in-process, without the extraction helper.
    #[inline]
    #[must_use]
    pub fn is_readable_in_process(&self) -> bool {
        matches!(self, PackFormat::NeDb | PackFormat::PlutoniumJson)
    }
}

impl Display for PackFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

impl AsRef<str> for PackFormat {
    fn as_ref(&self) -> &'static str {
        self.as_str()
    }
}

impl FromStr for PackFormat {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "nedb" => PackFormat::NeDb,
            "leveldb" => PackFormat::LevelDb,
            "plutonium-json" | "plutonium" => PackFormat::PlutoniumJson,
            _ => PackFormat::Unknown,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(PackFormat::NeDb)]
    #[case(PackFormat::LevelDb)]
    #[case(PackFormat::PlutoniumJson)]
    #[case(PackFormat::Unknown)]
    fn stored_name_parses_back(#[case] format: PackFormat) {
        assert_eq!(format.as_str().parse::<PackFormat>().unwrap(), format);
    }

    #[test]
    fn unrecognised_names_are_unknown() {
        assert_eq!("rocksdb".parse::<PackFormat>().unwrap(), PackFormat::Unknown);
    }
}
