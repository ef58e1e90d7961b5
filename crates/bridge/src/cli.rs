use crate::context::PackageContext;
use crate::error::{ErrorKind, Result};
use crate::{ExtractRequest, ExtractedDir, Extractor, program};
use async_trait::async_trait;
use exn::{OptionExt, ResultExt};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::instrument;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(90);
pub const DEFAULT_SCRIPT: &str = "tools/foundry-extract.ps1";
pub const DEFAULT_PROGRAM_ARGS: [&str; 5] =
    ["-ExecutionPolicy", "Bypass", "-NoProfile", "-NonInteractive", "-File"];

/// How long to keep draining output once the helper has exited.
const STREAM_GRACE: Duration = Duration::from_secs(2);

/// The helper keeps its configuration in one process-global location, so no
/// two invocations may overlap anywhere in the process.
static EXTRACTION_GATE: Mutex<()> = Mutex::const_new(());

#[derive(Debug, Clone)]
pub struct BridgeOptions {
    /// Program running the script; discovered on `PATH` when unset.
    pub program: Option<PathBuf>,
    /// Arguments placed between the program and the script path.
    pub program_args: Vec<String>,
    pub script: PathBuf,
    /// Working directory for the helper. Relative script paths and relative
    /// output directories are resolved against it.
    pub working_dir: Option<PathBuf>,
    pub timeout: Duration,
    /// Ask the helper for debug output.
    pub verbose: bool,
}
impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            program: None,
            program_args: DEFAULT_PROGRAM_ARGS.iter().map(ToString::to_string).collect(),
            script: PathBuf::from(DEFAULT_SCRIPT),
            working_dir: None,
            timeout: DEFAULT_TIMEOUT,
            verbose: false,
        }
    }
}
impl BridgeOptions {
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = Some(program.into());
        self
    }

    pub fn with_program_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.program_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_script(mut self, script: impl Into<PathBuf>) -> Self {
        self.script = script.into();
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.working_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}

/// Extracts LevelDB packs by running the Foundry CLI helper script.
#[derive(Debug, Clone)]
pub struct CliBridge {
    program: PathBuf,
    script: PathBuf,
    options: BridgeOptions,
}

impl CliBridge {
    /// Locate the helper program and script. Fails when either is missing, so
    /// a misconfigured bridge is noticed before any pack is attempted.
    pub fn new(options: BridgeOptions) -> Result<Self> {
        let program = program::discover(options.program.as_deref())?;
        let script = options.resolve(&options.script);
        if !script.is_file() {
            exn::bail!(ErrorKind::ScriptNotFound(script));
        }
        tracing::debug!(program = %program.display(), script = %script.display(), "Extraction helper ready");
        Ok(Self { program, script, options })
    }

    fn arguments(&self, request: &ExtractRequest) -> Vec<String> {
        let context = PackageContext::for_source(&request.source_name);
        let mut args = self.options.program_args.clone();
        args.push(self.script.to_string_lossy().into_owned());
        args.extend([
            "-PackName".to_string(),
            request.pack_name.clone(),
            "-PackageId".to_string(),
            context.id,
            "-PackageType".to_string(),
            context.package_type.to_string(),
        ]);
        if self.options.verbose {
            args.push("-ShowDebug".to_string());
        }
        args
    }

    async fn run(&self, request: &ExtractRequest) -> Result<PathBuf> {
        let mut command = Command::new(&self.program);
        command
            .args(self.arguments(request))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.options.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().or_raise(|| ErrorKind::Spawn)?;
        let stdout = spawn_line_reader(child.stdout.take().ok_or_raise(|| ErrorKind::Spawn)?, "stdout");
        let stderr = spawn_line_reader(child.stderr.take().ok_or_raise(|| ErrorKind::Spawn)?, "stderr");

        let status = match tokio::time::timeout(self.options.timeout, child.wait()).await {
            Ok(status) => status.or_raise(|| ErrorKind::Io)?,
            Err(_) => {
                if let Err(e) = child.kill().await {
                    tracing::warn!(error = %e, "Failed to kill timed out extraction helper");
                }
                exn::bail!(ErrorKind::Timeout(self.options.timeout.as_secs()));
            },
        };
        let stdout = drain(stdout).await;
        let stderr = drain(stderr).await;
        if !stderr.is_empty() {
            tracing::warn!(pack = %request.pack_name, stderr = %stderr.join("\n"), "Extraction helper wrote to stderr");
        }

        if !status.success() {
            exn::bail!(ErrorKind::Failed(error_summary(&stderr, status.code())));
        }
        let base = self.options.working_dir.as_deref();
        output_directory(&stdout, base).ok_or_raise(|| ErrorKind::MissingOutput)
    }
}

#[async_trait]
impl Extractor for CliBridge {
    #[instrument(skip(self), fields(pack = %request.pack_name, source = %request.source_name))]
    async fn extract(&self, request: &ExtractRequest) -> Result<ExtractedDir> {
        let _gate = EXTRACTION_GATE.lock().await;
        tracing::debug!(command = %self.command_line(request).unwrap_or_default(), "Running extraction helper");
        let dir = self.run(request).await?;
        tracing::info!(output = %dir.display(), "Extracted pack");
        Ok(ExtractedDir::new(dir))
    }

    fn command_line(&self, request: &ExtractRequest) -> Option<String> {
        let mut parts = vec![quote(&self.program.to_string_lossy())];
        parts.extend(self.arguments(request).iter().map(|arg| quote(arg)));
        Some(parts.join(" "))
    }
}

fn spawn_line_reader<R>(stream: R, name: &'static str) -> JoinHandle<Vec<String>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        let mut collected = Vec::new();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    tracing::trace!(stream = name, line = %line, "Extraction helper output");
                    collected.push(line);
                },
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!(stream = name, error = %e, "Stopped reading extraction helper output");
                    break;
                },
            }
        }
        collected
    })
}

/// Collected lines of a reader task. Gives up after a grace period, since a
/// grandchild of the helper can hold the pipe open after the helper exits.
async fn drain(task: JoinHandle<Vec<String>>) -> Vec<String> {
    match tokio::time::timeout(STREAM_GRACE, task).await {
        Ok(Ok(lines)) => lines,
        Ok(Err(e)) => {
            tracing::debug!(error = %e, "Extraction helper output reader failed");
            Vec::new()
        },
        Err(_) => {
            tracing::debug!("Extraction helper output still open after exit");
            Vec::new()
        },
    }
}

/// The helper prints the directory it extracted to as its last line of
/// output, interleaved with its own log lines: the last non-empty line that
/// names an existing directory wins.
pub(crate) fn output_directory(stdout: &[String], base: Option<&Path>) -> Option<PathBuf> {
    stdout.iter().rev().map(|line| line.trim()).filter(|line| !line.is_empty()).find_map(|line| {
        let path = match base {
            Some(base) if Path::new(line).is_relative() => base.join(line),
            _ => PathBuf::from(line),
        };
        path.is_dir().then_some(path)
    })
}

/// One-line summary of what went wrong, for the pack result.
pub(crate) fn error_summary(stderr: &[String], code: Option<i32>) -> String {
    const MARKER: &str = "failed:";
    let marked = stderr.iter().rev().find_map(|line| {
        let at = line.to_ascii_lowercase().find(MARKER)?;
        let summary = line[at + MARKER.len()..].trim();
        (!summary.is_empty()).then(|| summary.to_string())
    });
    if let Some(summary) = marked {
        return summary;
    }
    if let Some(last) = stderr.iter().rev().map(|l| l.trim()).find(|l| !l.is_empty()) {
        return last.to_string();
    }
    match code {
        Some(code) => format!("extraction helper exited with code {code}"),
        None => "extraction helper was terminated by a signal".to_string(),
    }
}

fn quote(arg: &str) -> String {
    if !arg.is_empty() && !arg.contains(|c: char| c.is_whitespace() || c == '"') {
        arg.to_string()
    } else {
        format!("\"{}\"", arg.replace('"', "\\\""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    fn lines(text: &[&str]) -> Vec<String> {
        text.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn last_existing_directory_wins() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("first");
        let second = dir.path().join("second");
        std::fs::create_dir(&first).unwrap();
        std::fs::create_dir(&second).unwrap();
        let stdout = vec![
            "Unpacking...".to_string(),
            first.display().to_string(),
            format!("  {}  ", second.display()),
            dir.path().join("missing").display().to_string(),
            String::new(),
        ];
        assert_eq!(output_directory(&stdout, None), Some(second));
    }

    #[test]
    fn relative_output_resolves_against_working_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("out")).unwrap();
        assert_eq!(output_directory(&lines(&["out"]), Some(dir.path())), Some(dir.path().join("out")));
        assert_eq!(output_directory(&lines(&["Done."]), Some(dir.path())), None);
    }

    #[rstest]
    #[case(&["noise", "Unpack failed: pack not found", "at line 3"], Some(1), "pack not found")]
    #[case(&["something broke", ""], Some(1), "something broke")]
    #[case(&[], Some(2), "extraction helper exited with code 2")]
    #[case(&[], None, "extraction helper was terminated by a signal")]
    fn summaries(#[case] stderr: &[&str], #[case] code: Option<i32>, #[case] expected: &str) {
        assert_eq!(error_summary(&lines(stderr), code), expected);
    }

    #[rstest]
    #[case("plain", "plain")]
    #[case("with space", "\"with space\"")]
    #[case("", "\"\"")]
    fn quoting(#[case] arg: &str, #[case] expected: &str) {
        assert_eq!(quote(arg), expected);
    }
}
