//! Append-only CSV log of conflict-resolution losers, for human review.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use grimoire_cache::Candidate;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const HEADER: &str = "WinnerSourceFile,WinnerName,WinnerType,LoserSourceFile,LoserName,LoserType";

pub struct CollisionLog<W: Write> {
    writer: W,
    path: PathBuf,
    records: u64,
}

impl CollisionLog<BufWriter<File>> {
    /// Create (or truncate) the log file.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).or_raise(|| ErrorKind::CollisionLog(path.clone()))?;
        }
        let file = File::create(&path).or_raise(|| ErrorKind::CollisionLog(path.clone()))?;
        Ok(Self::new(BufWriter::new(file), path))
    }
}

impl<W: Write> CollisionLog<W> {
    pub fn new(writer: W, path: impl Into<PathBuf>) -> Self {
        Self { writer, path: path.into(), records: 0 }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one winner/loser pair. The header precedes the first record.
    pub fn record(&mut self, winner: &Candidate, loser: &Candidate) -> Result<()> {
        if self.records == 0 {
            writeln!(self.writer, "{HEADER}").or_raise(|| ErrorKind::CollisionLog(self.path.clone()))?;
        }
        let fields = [
            &winner.source_name,
            &winner.name,
            &winner.item_type,
            &loser.source_name,
            &loser.name,
            &loser.item_type,
        ];
        let line = fields.iter().map(|f| quote(f)).collect::<Vec<_>>().join(",");
        writeln!(self.writer, "{line}").or_raise(|| ErrorKind::CollisionLog(self.path.clone()))?;
        self.records += 1;
        Ok(())
    }

    /// Flush the log and return the number of records written.
    pub fn finish(mut self) -> Result<u64> {
        self.writer.flush().or_raise(|| ErrorKind::CollisionLog(self.path.clone()))?;
        Ok(self.records)
    }
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(source: &str, name: &str) -> Candidate {
        Candidate {
            id: format!("{source}-{name}"),
            name: name.to_string(),
            item_type: "spell".to_string(),
            system: Some("D&D 5e".to_string()),
            source_name: source.to_string(),
            pack_seq: 0,
            item_seq: 0,
        }
    }

    #[test]
    fn header_then_quoted_records() {
        let mut buffer = Vec::new();
        let mut log = CollisionLog::new(&mut buffer, "collisions.csv");
        log.record(&candidate("dnd5e", "Fireball"), &candidate("some-homebrew-module", "Fireball")).unwrap();
        log.record(&candidate("dnd5e", "The \"Big\" One"), &candidate("other", "The \"Big\" One")).unwrap();
        assert_eq!(log.finish().unwrap(), 2);

        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], HEADER);
        assert_eq!(lines[1], r#""dnd5e","Fireball","spell","some-homebrew-module","Fireball","spell""#);
        assert_eq!(lines[2], r#""dnd5e","The ""Big"" One","spell","other","The ""Big"" One","spell""#);
    }

    #[test]
    fn empty_log_has_no_header() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("logs/collisions.csv");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "stale").unwrap();
        assert_eq!(CollisionLog::create(&path).unwrap().finish().unwrap(), 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }
}
