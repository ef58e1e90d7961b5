//! Extraction of LevelDB compendium packs.
//!
//! LevelDB packs can only be decoded by the platform's own CLI, which is
//! driven through a PowerShell script. Everything about that process (how it
//! is found, how it is invoked, and how its output is interpreted) stays
//! behind the [`Extractor`] trait.

mod cli;
mod context;
pub mod error;
mod program;

pub use crate::cli::{BridgeOptions, CliBridge, DEFAULT_PROGRAM_ARGS, DEFAULT_SCRIPT, DEFAULT_TIMEOUT};
pub use crate::context::{PackageContext, PackageType};
use crate::error::Result;
pub use crate::program::CANDIDATES as PROGRAM_CANDIDATES;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// One pack to extract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractRequest {
    /// Name of the pack directory on disk.
    pub pack_name: String,
    /// Name of the module or system directory the pack belongs to.
    pub source_name: String,
}
impl ExtractRequest {
    pub fn new(pack_name: impl Into<String>, source_name: impl Into<String>) -> Self {
        Self { pack_name: pack_name.into(), source_name: source_name.into() }
    }
}

/// Directory of extracted JSON files, removed when dropped.
#[derive(Debug)]
pub struct ExtractedDir {
    path: PathBuf,
}
impl ExtractedDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
impl Drop for ExtractedDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove extracted pack directory");
        }
    }
}

/// Converts a LevelDB pack into a directory of JSON documents.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, request: &ExtractRequest) -> Result<ExtractedDir>;

    /// The command that [`extract`](Self::extract) would run, for dry runs.
    fn command_line(&self, _request: &ExtractRequest) -> Option<String> {
        None
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::ops::Deref;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    /// Write a fake helper script and a bridge that runs it through `sh`.
    fn fake_helper(dir: &TempDir, body: &str) -> CliBridge {
        let script = dir.path().join("fake-extract.sh");
        std::fs::write(&script, body).unwrap();
        let options = BridgeOptions::default()
            .with_program("sh")
            .with_program_args(Vec::<String>::new())
            .with_script(&script)
            .with_working_dir(dir.path())
            .with_timeout(Duration::from_secs(5));
        CliBridge::new(options).unwrap()
    }

    #[tokio::test]
    async fn successful_extraction_is_cleaned_up_on_drop() {
        let dir = TempDir::new().unwrap();
        let bridge = fake_helper(
            &dir,
            r#"
            # $2 = pack, $4 = package id, $6 = package type
            out="$PWD/out-$2"
            mkdir -p "$out"
            printf '{"name": "%s"}' "$4-$6" > "$out/doc.json"
            echo "Unpacking $2 from $4"
            echo "$out"
            "#,
        );
        let extracted = bridge.extract(&ExtractRequest::new("monsters", "dnd5e")).await.unwrap();
        let path = extracted.path().to_path_buf();
        assert_eq!(path, dir.path().join("out-monsters"));
        let doc = std::fs::read_to_string(path.join("doc.json")).unwrap();
        assert_eq!(doc, r#"{"name": "dnd5e-System"}"#);
        drop(extracted);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn non_zero_exit_reports_stderr_summary() {
        let dir = TempDir::new().unwrap();
        let bridge = fake_helper(&dir, "echo 'Extraction failed: pack spells is locked' >&2\nexit 1\n");
        let err = bridge.extract(&ExtractRequest::new("spells", "pf2e")).await.unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::Failed(summary) if summary == "pack spells is locked"));
    }

    #[tokio::test]
    async fn silent_failure_still_has_a_message() {
        let dir = TempDir::new().unwrap();
        let bridge = fake_helper(&dir, "exit 1\n");
        let err = bridge.extract(&ExtractRequest::new("spells", "pf2e")).await.unwrap_err();
        assert!(!(*err).to_string().is_empty());
    }

    #[tokio::test]
    async fn timeout_kills_the_helper() {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("slow.sh");
        std::fs::write(&script, "exec sleep 30\n").unwrap();
        let options = BridgeOptions::default()
            .with_program("sh")
            .with_program_args(Vec::<String>::new())
            .with_script(&script)
            .with_timeout(Duration::from_millis(300));
        let bridge = CliBridge::new(options).unwrap();

        let started = Instant::now();
        let err = bridge.extract(&ExtractRequest::new("slow", "dnd5e")).await.unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn missing_output_directory() {
        let dir = TempDir::new().unwrap();
        let bridge = fake_helper(&dir, "echo 'all done'\necho /definitely/not/here\n");
        let err = bridge.extract(&ExtractRequest::new("spells", "dnd5e")).await.unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::MissingOutput));
    }

    #[test]
    fn missing_script_is_rejected_up_front() {
        let dir = TempDir::new().unwrap();
        let options = BridgeOptions::default().with_program("sh").with_working_dir(dir.path());
        let err = CliBridge::new(options).unwrap_err();
        assert!(matches!(err.deref(), ErrorKind::ScriptNotFound(_)));
    }

    #[test]
    fn command_line_for_module_pack() {
        let dir = TempDir::new().unwrap();
        let bridge = fake_helper(&dir, "exit 0\n");
        let command = bridge.command_line(&ExtractRequest::new("feats", "dnd-players-handbook")).unwrap();
        assert!(command.ends_with("-PackName feats -PackageId dnd-players-handbook -PackageType Module"));
    }

    #[test]
    fn verbose_passes_debug_flag() {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("x.sh");
        std::fs::write(&script, "exit 0\n").unwrap();
        let options = BridgeOptions::default().with_program("sh").with_script(&script).with_verbose(true);
        let bridge = CliBridge::new(options).unwrap();
        let command = bridge.command_line(&ExtractRequest::new("feats", "pf1")).unwrap();
        assert!(command.contains("-File"));
        assert!(command.ends_with("-PackageType System -ShowDebug"));
    }

    #[test]
    fn dropping_a_missing_directory_is_quiet() {
        let dir = TempDir::new().unwrap();
        drop(ExtractedDir::new(dir.path().join("never-created")));
    }
}
