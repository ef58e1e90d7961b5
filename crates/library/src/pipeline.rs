//! The build pipeline.
//!
//! A single producer walks the sources in a stable order, extracting LevelDB
//! packs one at a time through the [`Extractor`], and queues every pack for a
//! pool of workers. Each worker holds its own cache session, reads the packs
//! it is handed, tags their items and stores them. Once the producer and every
//! worker have finished, the cache is finalised in one sequential pass.

use crate::discover::discover_packs;
use crate::error::{ErrorKind, Result};
use crate::progress::{BuildEvent, PackResult, Progress, ProgressUpdate};
use crate::report::BuildReport;
use crate::resolve::{Priorities, finalize_to};
use crate::sources::order_sources;
use async_stream::stream;
use exn::ResultExt;
use futures::Stream;
use grimoire_bridge::{ExtractRequest, ExtractedDir, Extractor};
use grimoire_cache::{Database, Repository, Session};
use grimoire_packs::{CompendiumItem, PackDescriptor, PackFormat, PackReader, Reader, SystemDetectionMap, TargetSystems};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use tokio::task::JoinHandle;
use tracing::instrument;
use uuid::Uuid;

pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_CACHE_PATH: &str = "compendium.sqlite";
pub const DEFAULT_COLLISION_LOG: &str = "compendium-collisions.csv";

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub cache_path: PathBuf,
    /// Where losers of conflict resolution are logged; `None` disables the log.
    pub collision_log: Option<PathBuf>,
    /// Number of persistence workers.
    pub workers: usize,
    pub targets: TargetSystems,
    pub priorities: Priorities,
}
impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            cache_path: PathBuf::from(DEFAULT_CACHE_PATH),
            collision_log: Some(PathBuf::from(DEFAULT_COLLISION_LOG)),
            workers: DEFAULT_WORKERS,
            targets: TargetSystems::default(),
            priorities: Priorities::default(),
        }
    }
}
impl BuildOptions {
    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = path.into();
        self
    }

    pub fn with_collision_log(mut self, path: Option<PathBuf>) -> Self {
        self.collision_log = path;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_targets(mut self, targets: TargetSystems) -> Self {
        self.targets = targets;
        self
    }

    pub fn with_priorities(mut self, priorities: Priorities) -> Self {
        self.priorities = priorities;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            exn::bail!(ErrorKind::Options("at least one worker is required"));
        }
        if self.priorities.is_empty() {
            exn::bail!(ErrorKind::Options("the priority list is empty"));
        }
        Ok(())
    }
}

/// A pack as the pipeline would handle it, without doing any work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedPack {
    pub pack: PackDescriptor,
    /// The extraction command, for LevelDB packs.
    pub command: Option<String>,
}

enum Payload {
    Path(PathBuf),
    Extracted(ExtractedDir),
}
impl Payload {
    fn path(&self) -> &Path {
        match self {
            Self::Path(path) => path,
            Self::Extracted(dir) => dir.path(),
        }
    }
}

struct WorkItem {
    pack: PackDescriptor,
    sequence: u32,
    payload: Payload,
}

type Queue = Arc<Mutex<UnboundedReceiver<WorkItem>>>;

#[derive(Clone)]
pub struct Pipeline {
    options: BuildOptions,
    extractor: Option<Arc<dyn Extractor>>,
}

impl Pipeline {
    pub fn new(options: BuildOptions) -> Self {
        Self { options, extractor: None }
    }

    /// Extractor for LevelDB packs. Without one, every LevelDB pack fails.
    pub fn with_extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Packs of every source, in the order they are processed.
    fn discover(&self, sources: &[PathBuf]) -> Vec<PackDescriptor> {
        let mut sources = sources.to_vec();
        order_sources(&mut sources);
        let mut systems = SystemDetectionMap::new();
        sources.iter().flat_map(|source| discover_packs(source, &self.options.targets, &mut systems)).collect()
    }

    /// Discover packs without extracting, reading or writing anything.
    pub fn plan(&self, sources: &[PathBuf]) -> Vec<PlannedPack> {
        self.discover(sources)
            .into_iter()
            .map(|pack| {
                let command = match (&self.extractor, pack.format) {
                    (Some(extractor), PackFormat::LevelDb) => {
                        extractor.command_line(&ExtractRequest::new(pack.filesystem_name(), &pack.source_name))
                    },
                    _ => None,
                };
                PlannedPack { pack, command }
            })
            .collect()
    }

    /// Rebuild the cache from `sources`.
    ///
    /// Individual packs failing never fails the build; check
    /// [`BuildReport::is_success`]. Only an unusable cache or a crashed worker
    /// is an error.
    #[instrument(skip_all, fields(sources = sources.len(), workers = self.options.workers))]
    pub async fn build(&self, sources: &[PathBuf], progress: impl Progress + 'static) -> Result<BuildReport> {
        self.options.validate()?;
        let progress: Arc<dyn Progress> = Arc::new(progress);

        progress.on_progress(ProgressUpdate::detail("Discovering compendium packs..."));
        let packs = self.discover(sources);
        tracing::info!(packs = packs.len(), "Discovered compendium packs");
        progress.on_progress(ProgressUpdate::max(packs.len() as u64, "Processing compendium packs..."));

        let sessions = u32::try_from(self.options.workers).unwrap_or(u32::MAX);
        let db = Database::create_fresh(&self.options.cache_path, sessions).await.or_raise(|| ErrorKind::Cache)?;

        let (sender, receiver) = unbounded_channel();
        let queue: Queue = Arc::new(Mutex::new(receiver));
        let workers: Vec<JoinHandle<Vec<(u32, PackResult)>>> = (0..self.options.workers)
            .map(|id| tokio::spawn(worker(id, db.clone(), queue.clone(), progress.clone())))
            .collect();

        let mut results = Vec::new();
        for (sequence, pack) in packs.into_iter().enumerate() {
            let sequence = u32::try_from(sequence).unwrap_or(u32::MAX);
            let payload = if pack.format == PackFormat::LevelDb {
                match self.extract(&pack).await {
                    Ok(dir) => Payload::Extracted(dir),
                    Err(message) => {
                        progress.on_progress(ProgressUpdate::increment(format!("Failed: {}", pack.name)));
                        let result = PackResult::failed(&pack.name, &pack.source_name, message);
                        progress.on_pack_result(&result);
                        results.push((sequence, result));
                        continue;
                    },
                }
            } else {
                Payload::Path(pack.path.clone())
            };
            if let Err(unsent) = sender.send(WorkItem { pack, sequence, payload }) {
                let WorkItem { pack, sequence, .. } = unsent.0;
                let result = PackResult::failed(&pack.name, &pack.source_name, "no worker available");
                progress.on_pack_result(&result);
                results.push((sequence, result));
            }
        }
        drop(sender);

        // Nothing may be finalised until every worker has drained the queue.
        for handle in workers {
            results.extend(handle.await.or_raise(|| ErrorKind::Worker)?);
        }
        results.sort_by_key(|(sequence, _)| *sequence);

        progress.on_progress(ProgressUpdate::detail("Resolving conflicts..."));
        let repo = Repository::from(&db);
        let finalized =
            finalize_to(&repo, &self.options.priorities, self.options.collision_log.as_deref()).await?;
        let items = repo.count().await.or_raise(|| ErrorKind::Cache)?;
        db.close().await;

        let report = BuildReport {
            packs: results.into_iter().map(|(_, result)| result).collect(),
            items,
            groups: finalized.groups,
            collisions: finalized.collisions,
        };
        tracing::info!(
            succeeded = report.succeeded().count(),
            failed = report.failed().count(),
            items = report.items,
            groups = report.groups,
            collisions = report.collisions,
            "Compendium cache built",
        );
        progress.on_progress(ProgressUpdate::detail("Compendium cache built"));
        Ok(report)
    }

    /// [`build`](Self::build), reported as a stream of [`BuildEvent`]s.
    pub fn build_stream(&self, sources: Vec<PathBuf>) -> impl Stream<Item = Result<BuildEvent>> + '_ {
        stream! {
            yield Ok(BuildEvent::Started);
            let (sender, mut receiver) = unbounded_channel::<BuildEvent>();
            let pipeline = self.clone();
            let handle = tokio::spawn(async move { pipeline.build(&sources, sender).await });
            while let Some(event) = receiver.recv().await {
                yield Ok(event);
            }
            let finished = match handle.await {
                Ok(result) => result,
                Err(e) => Err(e).or_raise(|| ErrorKind::Worker),
            };
            yield finished.map(BuildEvent::Finished);
        }
    }

    async fn extract(&self, pack: &PackDescriptor) -> std::result::Result<ExtractedDir, String> {
        let Some(extractor) = &self.extractor else {
            tracing::error!(pack = %pack.name, source = %pack.source_name, "No extraction helper for LevelDB pack");
            return Err("no extraction helper configured".to_string());
        };
        let request = ExtractRequest::new(pack.filesystem_name(), &pack.source_name);
        extractor.extract(&request).await.map_err(|e| {
            tracing::error!(pack = %pack.name, source = %pack.source_name, error = ?e, "Failed to extract pack");
            (*e).to_string()
        })
    }
}

async fn worker(id: usize, db: Database, queue: Queue, progress: Arc<dyn Progress>) -> Vec<(u32, PackResult)> {
    let mut session = db.session().await;
    if let Err(e) = &session {
        tracing::error!(worker = id, error = ?e, "Worker could not open a cache session");
    }
    let mut results = Vec::new();
    loop {
        let next = queue.lock().await.recv().await;
        let Some(work) = next else { break };
        progress.on_progress(ProgressUpdate::increment(format!("Processing: {}", work.pack.name)));
        let (name, source, sequence) = (work.pack.name.clone(), work.pack.source_name.clone(), work.sequence);
        let result = match session.as_mut() {
            Ok(session) => process(work, session).await,
            Err(_) => PackResult::failed(&name, &source, "no cache session available"),
        };
        match &result.error {
            None => tracing::info!(worker = id, pack = %name, source = %source, items = result.item_count, "Loaded pack"),
            Some(error) => tracing::error!(worker = id, pack = %name, source = %source, error = %error, "Failed to load pack"),
        }
        progress.on_pack_result(&result);
        results.push((sequence, result));
    }
    results
}

async fn process(work: WorkItem, session: &mut Session) -> PackResult {
    let WorkItem { pack, sequence, payload } = work;
    let Some(reader) = Reader::for_format(pack.format, pack.declared_type.clone(), &pack.filesystem_name()) else {
        return PackResult::failed(&pack.name, &pack.source_name, format!("unsupported pack format: {}", pack.format));
    };
    let source = pack.source_name.clone();
    let loaded = tokio::task::spawn_blocking(move || {
        let loaded = reader.load_pack(payload.path(), &source);
        // Extracted JSON is removed as soon as it has been read.
        drop(payload);
        loaded
    })
    .await;
    let loaded = match loaded {
        Ok(Ok(loaded)) => loaded,
        Ok(Err(e)) => return PackResult::failed(&pack.name, &pack.source_name, (*e).to_string()),
        Err(e) => return PackResult::failed(&pack.name, &pack.source_name, format!("reader task failed: {e}")),
    };
    if !loaded.rejected.is_empty() {
        tracing::warn!(pack = %pack.name, source = %pack.source_name, rejected = loaded.rejected.len(), "Pack had unreadable records");
    }
    if loaded.is_empty() && pack.format == PackFormat::LevelDb {
        return PackResult::failed(&pack.name, &pack.source_name, "extraction produced no items");
    }

    let items: Vec<CompendiumItem> = loaded
        .items
        .into_iter()
        .enumerate()
        .map(|(position, item)| {
            item.with_id(Uuid::new_v4().to_string())
                .with_system(pack.system.clone())
                .with_position(sequence, u32::try_from(position).unwrap_or(u32::MAX))
        })
        .collect();
    match session.insert_items(&items).await {
        Ok(stored) => PackResult::succeeded(&pack.name, &pack.source_name, stored),
        Err(e) => {
            tracing::error!(pack = %pack.name, source = %pack.source_name, error = ?e, "Failed to store pack");
            PackResult::failed(&pack.name, &pack.source_name, format!("unable to store items: {}", *e))
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discover::tests::leveldb;
    use async_trait::async_trait;
    use futures::StreamExt;
    use grimoire_bridge::error::{ErrorKind as BridgeErrorKind, Result as BridgeResult};
    use serde_json::{Value, json};
    use std::sync::Mutex as StdMutex;
    use tempfile::TempDir;

    fn nedb(path: &Path, documents: &[Value]) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let lines: Vec<String> = documents.iter().map(Value::to_string).collect();
        std::fs::write(path, lines.join("\n")).unwrap();
    }

    fn spell(id: &str, name: &str) -> Value {
        json!({"_id": id, "name": name, "type": "spell"})
    }

    /// A data directory with a system and a homebrew module that both ship
    /// Fireball. Neither declares a system relationship.
    fn library() -> (TempDir, Vec<PathBuf>) {
        let dir = TempDir::new().unwrap();
        let system = dir.path().join("systems/dnd5e");
        nedb(&system.join("packs/spells.db"), &[spell("a", "Fireball"), spell("b", "Shield")]);
        std::fs::write(
            system.join("system.json"),
            r#"{"packs": [{"name": "spells", "path": "packs/spells.db", "type": "Item"}]}"#,
        )
        .unwrap();
        let module = dir.path().join("modules/some-homebrew-module");
        nedb(&module.join("packs/homebrew-spells.db"), &[spell("a", "Fireball"), spell("c", "Wish")]);
        std::fs::write(
            module.join("module.json"),
            r#"{"packs": [{"name": "homebrew-spells", "path": "packs/homebrew-spells.db", "type": "Item"}]}"#,
        )
        .unwrap();
        // Module listed first to show systems are read first regardless of input.
        (dir, vec![module, system])
    }

    fn options(dir: &TempDir) -> BuildOptions {
        BuildOptions::default()
            .with_cache_path(dir.path().join("cache/compendium.sqlite"))
            .with_collision_log(Some(dir.path().join("cache/collisions.csv")))
    }

    #[derive(Default)]
    struct Recorder {
        results: StdMutex<Vec<PackResult>>,
        increments: StdMutex<u64>,
    }
    impl Progress for Recorder {
        fn on_progress(&self, update: ProgressUpdate) {
            *self.increments.lock().unwrap() += update.overall_increment.unwrap_or(0);
        }

        fn on_pack_result(&self, result: &PackResult) {
            self.results.lock().unwrap().push(result.clone());
        }
    }

    /// Writes one JSON document per listed name, or fails as told.
    struct FakeExtractor {
        output: PathBuf,
        documents: Vec<(&'static str, Value)>,
    }
    #[async_trait]
    impl Extractor for FakeExtractor {
        async fn extract(&self, request: &ExtractRequest) -> BridgeResult<ExtractedDir> {
            match request.pack_name.as_str() {
                "broken" => exn::bail!(BridgeErrorKind::Failed("pack broken is locked".to_string())),
                "slow" => exn::bail!(BridgeErrorKind::Timeout(90)),
                _ => {},
            }
            let dir = self.output.join(format!("{}-{}", request.source_name, request.pack_name));
            std::fs::create_dir_all(&dir).unwrap();
            if request.pack_name != "hollow" {
                for (stem, document) in &self.documents {
                    std::fs::write(dir.join(format!("{stem}.json")), document.to_string()).unwrap();
                }
            }
            Ok(ExtractedDir::new(dir))
        }

        fn command_line(&self, request: &ExtractRequest) -> Option<String> {
            Some(format!("extract -PackName {} -Source {}", request.pack_name, request.source_name))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn system_item_wins_over_homebrew_duplicate() {
        let (dir, sources) = library();
        let recorder = Arc::new(Recorder::default());
        let report = Pipeline::new(options(&dir)).build(&sources, recorder.clone()).await.unwrap();

        assert!(report.is_success());
        assert_eq!(report.items, 4);
        assert_eq!(report.groups, 3);
        assert_eq!(report.collisions, 1);
        let order: Vec<_> = report.packs.iter().map(|p| p.pack_name.as_str()).collect();
        assert_eq!(order, vec!["spells", "homebrew-spells"]);
        assert_eq!(recorder.results.lock().unwrap().len(), 2);
        assert_eq!(*recorder.increments.lock().unwrap(), 2);

        let db = Database::connect(dir.path().join("cache/compendium.sqlite")).await.unwrap();
        let repo = Repository::from(&db);
        let fireball = repo.find_primary("spell", "Fireball", None).await.unwrap().unwrap();
        assert_eq!(fireball.source_name, "dnd5e");
        assert_eq!(fireball.source_id, "a");
        assert_ne!(fireball.id, "a");
        let candidates = repo.find_all_candidates("spell", "Fireball", None).await.unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates.iter().filter(|c| c.is_primary).count(), 1);
        db.close().await;

        let log = std::fs::read_to_string(dir.path().join("cache/collisions.csv")).unwrap();
        assert!(log.contains(r#""dnd5e","Fireball","spell","some-homebrew-module","Fireball","spell""#));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn game_system_beats_module_sharing_its_prefix() {
        let dir = TempDir::new().unwrap();
        let goblin = json!({"_id": "g", "name": "Goblin", "type": "npc"});
        let mut sources = Vec::new();
        for (source, manifest) in [("modules/pf1-statblock-converter", "module.json"), ("systems/pf1", "system.json")] {
            let source = dir.path().join(source);
            nedb(&source.join("packs/bestiary.db"), std::slice::from_ref(&goblin));
            std::fs::write(
                source.join(manifest),
                r#"{"packs": [{"name": "bestiary", "path": "packs/bestiary.db", "type": "Actor"}]}"#,
            )
            .unwrap();
            sources.push(source);
        }
        let report = Pipeline::new(options(&dir)).build(&sources, ()).await.unwrap();
        assert_eq!(report.items, 2);
        assert_eq!(report.collisions, 1);
        let order: Vec<_> = report.packs.iter().map(|p| p.source_name.as_str()).collect();
        assert_eq!(order, vec!["pf1", "pf1-statblock-converter"]);

        let db = Database::connect(dir.path().join("cache/compendium.sqlite")).await.unwrap();
        let repo = Repository::from(&db);
        let winner = repo.find_primary("npc", "Goblin", None).await.unwrap().unwrap();
        assert_eq!(winner.source_name, "pf1");
        db.close().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn rebuilding_replaces_the_previous_cache() {
        let (dir, sources) = library();
        let pipeline = Pipeline::new(options(&dir));
        pipeline.build(&sources, ()).await.unwrap();
        let report = pipeline.build(&sources, ()).await.unwrap();
        assert_eq!(report.items, 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn extraction_failures_are_isolated() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("modules/dnd-monsters-manual");
        for pack in ["beasts", "broken", "slow", "hollow"] {
            leveldb(&source.join("packs").join(pack));
        }
        nedb(&source.join("packs/spells.db"), &[spell("s", "Shield")]);
        let extractor = FakeExtractor {
            output: dir.path().join("extracted"),
            documents: vec![("Wolf_1", json!({"name": "Wolf", "type": "npc"})), ("Owl_2", json!({"name": "Owl"}))],
        };
        let pipeline = Pipeline::new(options(&dir)).with_extractor(Arc::new(extractor));
        let report = pipeline.build(&[source], ()).await.unwrap();

        let outcome: Vec<_> =
            report.packs.iter().map(|p| (p.pack_name.as_str(), p.success, p.item_count)).collect();
        assert_eq!(
            outcome,
            vec![("beasts", true, 2), ("broken", false, 0), ("hollow", false, 0), ("slow", false, 0), ("spells", true, 1)]
        );
        let broken = &report.packs[1];
        assert_eq!(broken.error.as_deref(), Some("pack broken is locked"));
        assert_eq!(report.packs[2].error.as_deref(), Some("extraction produced no items"));
        assert!(report.packs[3].error.as_deref().is_some_and(|e| e.contains("timed out")));
        assert!(report.is_success());
        // Extracted directories are cleaned up once read.
        assert!(!dir.path().join("extracted/dnd-monsters-manual-beasts").exists());
    }

    /// Runs a shell script as the extraction helper. `locked` exits non-zero,
    /// `stuck` outlives the timeout and every other pack yields one wolf.
    #[cfg(unix)]
    fn shell_helper(dir: &TempDir) -> grimoire_bridge::CliBridge {
        let script = dir.path().join("extract.sh");
        std::fs::write(
            &script,
            r#"
            case "$2" in
                locked) echo "Extraction failed: pack $2 is locked" >&2; exit 1 ;;
                stuck) exec sleep 30 ;;
            esac
            out="$PWD/extracted-$4-$2"
            mkdir -p "$out"
            printf '{"name": "Wolf", "type": "npc"}' > "$out/Wolf_1.json"
            echo "Unpacking $2"
            echo "$out"
            "#,
        )
        .unwrap();
        let options = grimoire_bridge::BridgeOptions::default()
            .with_program("sh")
            .with_program_args(Vec::<String>::new())
            .with_script(&script)
            .with_working_dir(dir.path())
            .with_timeout(std::time::Duration::from_secs(1));
        grimoire_bridge::CliBridge::new(options).unwrap()
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn helper_exit_codes_and_timeouts_fail_only_their_pack() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("modules/dnd-monsters-manual");
        for pack in ["beasts", "locked", "stuck"] {
            leveldb(&source.join("packs").join(pack));
        }
        nedb(&source.join("packs/spells.db"), &[spell("s", "Shield")]);
        let pipeline = Pipeline::new(options(&dir)).with_extractor(Arc::new(shell_helper(&dir)));
        let report = pipeline.build(&[source], ()).await.unwrap();

        let outcome: Vec<_> =
            report.packs.iter().map(|p| (p.pack_name.as_str(), p.success, p.item_count)).collect();
        assert_eq!(
            outcome,
            vec![("beasts", true, 1), ("locked", false, 0), ("spells", true, 1), ("stuck", false, 0)]
        );
        assert_eq!(report.packs[1].error.as_deref(), Some("pack locked is locked"));
        assert!(report.packs[3].error.as_deref().is_some_and(|e| e.contains("timed out after 1s")));
        assert_eq!(report.items, 2);
        assert!(!dir.path().join("extracted-dnd-monsters-manual-beasts").exists());

        let db = Database::connect(dir.path().join("cache/compendium.sqlite")).await.unwrap();
        let repo = Repository::from(&db);
        assert!(repo.find_primary("npc", "Wolf", None).await.unwrap().is_some());
        assert!(repo.find_primary("spell", "Shield", None).await.unwrap().is_some());
        db.close().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn leveldb_without_extractor_fails_the_pack() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("systems/pf2e");
        leveldb(&source.join("packs/bestiary"));
        let report = Pipeline::new(options(&dir)).build(&[source], ()).await.unwrap();
        assert!(!report.is_success());
        assert_eq!(report.packs[0].error.as_deref(), Some("no extraction helper configured"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn many_packs_across_workers_keep_one_primary_per_identity() {
        let dir = TempDir::new().unwrap();
        let mut sources = Vec::new();
        for module in ["alpha", "beta", "gamma", "delta", "epsilon", "zeta"] {
            let source = dir.path().join("modules").join(module);
            for pack in 0..4 {
                let documents: Vec<_> = (0..25).map(|i| spell(&format!("{i}"), &format!("Spell {i}"))).collect();
                nedb(&source.join(format!("packs/pack-{pack}.db")), &documents);
            }
            sources.push(source);
        }
        let options = options(&dir).with_workers(6);
        let report = Pipeline::new(options).build(&sources, ()).await.unwrap();
        assert_eq!(report.packs.len(), 24);
        assert!(report.packs.iter().all(|p| p.success && p.item_count == 25));
        assert_eq!(report.items, 600);
        assert_eq!(report.groups, 25);
        assert_eq!(report.collisions, 575);

        let db = Database::connect(dir.path().join("cache/compendium.sqlite")).await.unwrap();
        let repo = Repository::from(&db);
        let spells = repo.list_by_type("spell").await.unwrap();
        assert_eq!(spells.len(), 25);
        // With no prefix matching, the first pack of the first source wins.
        assert!(spells.iter().all(|s| s.source_name == "alpha" && s.pack_seq == 0));
        db.close().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stream_starts_and_finishes() {
        let (dir, sources) = library();
        let pipeline = Pipeline::new(options(&dir));
        let events: Vec<_> = pipeline.build_stream(sources).collect().await;
        assert!(matches!(events.first(), Some(Ok(BuildEvent::Started))));
        assert!(matches!(events.last(), Some(Ok(BuildEvent::Finished(report))) if report.items == 4));
        let packs = events.iter().filter(|e| matches!(e, Ok(BuildEvent::Pack(_)))).count();
        assert_eq!(packs, 2);
    }

    #[tokio::test]
    async fn invalid_options_are_rejected() {
        let dir = TempDir::new().unwrap();
        let pipeline = Pipeline::new(options(&dir).with_workers(0));
        let err = pipeline.build(&[], ()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Options(_)));
    }

    #[test]
    fn plan_lists_packs_and_commands() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("systems/dnd5e");
        leveldb(&source.join("packs/monsters"));
        nedb(&source.join("packs/spells.db"), &[spell("a", "Fireball")]);
        let extractor = FakeExtractor { output: dir.path().join("out"), documents: Vec::new() };
        let plan = Pipeline::new(options(&dir)).with_extractor(Arc::new(extractor)).plan(&[source]);

        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].pack.name, "monsters");
        assert_eq!(plan[0].command.as_deref(), Some("extract -PackName monsters -Source dnd5e"));
        assert_eq!(plan[1].command, None);
        assert!(!dir.path().join("cache").exists());
    }
}
