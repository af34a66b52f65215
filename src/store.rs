// OpenSpace Hub - Artifact Store
//
// Serialized, audited, backed-up file writes under the workspace root.
// One global FIFO write queue drained by a dedicated worker thread:
// writes across all paths are serialized (concurrency 1), which keeps
// the backup/audit/version reasoning trivial at some throughput cost.
// Every overwrite snapshots the prior content into a rolling history
// directory; every write appends one line to the append-only audit log
// and notifies subscribers with a FILE_CHANGED event.

use crate::config::{ARTIFACTS_DIR, EVENTS_FILE, HISTORY_DIR, HubConfig};
use crate::errors::{HubError, HubResult};
use crate::paths::{relative_key, resolve_real_path};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Who caused a mutation. "user" covers everything the Hub did not do
/// itself (editor saves, external tools).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Actor {
    User,
    Agent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditAction {
    Create,
    Update,
}

/// One immutable line of the events.ndjson audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub ts: String,
    pub artifact: String,
    pub action: AuditAction,
    pub actor: Actor,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    pub size_bytes: u64,
}

/// Notification delivered to subscribers after a write (or an external
/// change detected by the watcher).
#[derive(Debug, Clone)]
pub struct FileChanged {
    pub path: String,
    pub actor: Actor,
}

#[derive(Debug, Clone)]
pub struct WriteOptions {
    pub actor: Actor,
    pub reason: String,
    pub tool_call_id: Option<String>,
}

impl WriteOptions {
    pub fn agent(reason: &str) -> Self {
        Self { actor: Actor::Agent, reason: reason.to_string(), tool_call_id: None }
    }
}

type Subscriber = Box<dyn Fn(&FileChanged) + Send>;

struct WriteJob {
    abs: PathBuf,
    key: String,
    content: Vec<u8>,
    opts: WriteOptions,
    reply: Sender<HubResult<()>>,
}

pub struct ArtifactStore {
    root: PathBuf,
    echo_window: Duration,
    tx: Mutex<Sender<WriteJob>>,
    /// Self-write echo markers: normalized relative path → last write.
    in_flight: Arc<Mutex<HashMap<String, Instant>>>,
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
}

impl ArtifactStore {
    /// Open the store over an existing workspace root and start the
    /// write-queue worker.
    pub fn open(root: &Path, config: &HubConfig) -> HubResult<Arc<Self>> {
        let root = root.canonicalize()?;
        std::fs::create_dir_all(root.join(ARTIFACTS_DIR))?;

        let (tx, rx) = mpsc::channel::<WriteJob>();
        let in_flight = Arc::new(Mutex::new(HashMap::new()));
        let subscribers: Arc<Mutex<Vec<Subscriber>>> = Arc::new(Mutex::new(Vec::new()));

        let worker_root = root.clone();
        let worker_in_flight = Arc::clone(&in_flight);
        let worker_subscribers = Arc::clone(&subscribers);
        let history_limit = config.history_limit;
        std::thread::Builder::new()
            .name("artifact-write-queue".to_string())
            .spawn(move || {
                run_worker(worker_root, history_limit, rx, worker_in_flight, worker_subscribers);
            })?;

        Ok(Arc::new(Self {
            root,
            echo_window: Duration::from_millis(config.echo_window_ms),
            tx: Mutex::new(tx),
            in_flight,
            subscribers,
        }))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write an artifact. Blocks until the queued write has fully landed
    /// (backup taken, bytes renamed into place, audit line appended).
    pub fn write(&self, rel_path: &str, content: &[u8], opts: WriteOptions) -> HubResult<()> {
        let abs = resolve_real_path(&self.root, rel_path)
            .map_err(|_| HubError::PathEscape(rel_path.to_string()))?;
        let key = relative_key(&self.root, &abs);

        let (reply_tx, reply_rx) = mpsc::channel();
        let job = WriteJob { abs, key, content: content.to_vec(), opts, reply: reply_tx };

        let tx = self.tx.lock().expect("write queue sender poisoned").clone();
        tx.send(job).map_err(|_| worker_gone())?;
        reply_rx.recv().map_err(|_| worker_gone())?
    }

    /// Read an artifact's current bytes. Fails if the file does not exist.
    pub fn read(&self, rel_path: &str) -> HubResult<Vec<u8>> {
        let abs = resolve_real_path(&self.root, rel_path)
            .map_err(|_| HubError::PathEscape(rel_path.to_string()))?;
        Ok(std::fs::read(abs)?)
    }

    /// Register a FILE_CHANGED subscriber.
    pub fn subscribe(&self, f: impl Fn(&FileChanged) + Send + 'static) {
        self.subscribers.lock().expect("subscriber list poisoned").push(Box::new(f));
    }

    /// Report an externally-observed change (called by the watcher).
    /// Returns false when the change is a suppressed self-write echo.
    pub fn notify_external(&self, rel_path: &str) -> bool {
        {
            let mut in_flight = self.in_flight.lock().expect("echo marker map poisoned");
            in_flight.retain(|_, marked| marked.elapsed() < self.echo_window);
            if in_flight.contains_key(rel_path) {
                return false;
            }
        }
        let event = FileChanged { path: rel_path.to_string(), actor: Actor::User };
        dispatch(&self.subscribers, &event);
        true
    }
}

fn worker_gone() -> HubError {
    HubError::Io(std::io::Error::other("artifact write queue worker terminated"))
}

fn dispatch(subscribers: &Arc<Mutex<Vec<Subscriber>>>, event: &FileChanged) {
    for sub in subscribers.lock().expect("subscriber list poisoned").iter() {
        sub(event);
    }
}

// ============================================================================
// WRITE QUEUE WORKER — drains jobs strictly FIFO
// ============================================================================

fn run_worker(
    root: PathBuf,
    history_limit: usize,
    rx: Receiver<WriteJob>,
    in_flight: Arc<Mutex<HashMap<String, Instant>>>,
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
) {
    // Tie-breaker for backups taken within one timestamp granule. Keeps
    // lexicographic order == write order.
    let mut backup_seq: u64 = 0;

    while let Ok(job) = rx.recv() {
        // Mark before touching the filesystem so watcher events raised
        // mid-write are already suppressed.
        mark(&in_flight, &job.key);

        let existed = job.abs.exists();
        let action = if existed { AuditAction::Update } else { AuditAction::Create };

        if existed {
            backup_seq += 1;
            if let Err(e) = backup_artifact(&root, history_limit, &job.key, &job.abs, backup_seq) {
                log::warn!("Backup failed for {}: {}", job.key, e);
            }
        }

        let result = perform_write(&job);
        let ok = result.is_ok();

        // Refresh the marker so the suppression window counts from
        // completion, outlasting the watcher debounce.
        mark(&in_flight, &job.key);

        if ok {
            if let Err(e) = append_audit(&root, &job, action) {
                log::warn!("Audit append failed for {}: {}", job.key, e);
            }
            let event = FileChanged { path: job.key.clone(), actor: job.opts.actor };
            dispatch(&subscribers, &event);
        }

        let _ = job.reply.send(result);
    }
}

fn mark(in_flight: &Arc<Mutex<HashMap<String, Instant>>>, key: &str) {
    in_flight
        .lock()
        .expect("echo marker map poisoned")
        .insert(key.to_string(), Instant::now());
}

/// The primary write: parent dirs, temp file, fsync, rename. A partial
/// write is never observable at the target path.
fn perform_write(job: &WriteJob) -> HubResult<()> {
    if let Some(parent) = job.abs.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file_name = job
        .abs
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    let tmp = job.abs.with_file_name(format!("{file_name}.tmp"));

    let write_result = (|| -> std::io::Result<()> {
        let mut f = std::fs::File::create(&tmp)?;
        f.write_all(&job.content)?;
        f.sync_all()?;
        std::fs::rename(&tmp, &job.abs)?;
        Ok(())
    })();

    if write_result.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    Ok(write_result?)
}

/// Snapshot the current content into the history directory, then prune
/// to the newest `history_limit` entries by filename sort order.
fn backup_artifact(
    root: &Path,
    history_limit: usize,
    key: &str,
    abs: &Path,
    seq: u64,
) -> std::io::Result<()> {
    let history = root.join(HISTORY_DIR).join(key);
    std::fs::create_dir_all(&history)?;

    // Fixed-width timestamp: lexicographic filename order is chronological.
    let ts = Utc::now().format("%Y-%m-%dT%H-%M-%S-%3fZ");
    let backup = history.join(format!("v{ts}-{seq:06}.bak"));
    std::fs::copy(abs, &backup)?;

    let mut entries: Vec<String> = std::fs::read_dir(&history)?
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.ends_with(".bak"))
        .collect();
    entries.sort();
    if entries.len() > history_limit {
        let excess = entries.len() - history_limit;
        for name in entries.into_iter().take(excess) {
            if let Err(e) = std::fs::remove_file(history.join(&name)) {
                log::warn!("History prune failed for {}/{}: {}", key, name, e);
            }
        }
    }
    Ok(())
}

fn append_audit(root: &Path, job: &WriteJob, action: AuditAction) -> std::io::Result<()> {
    let event = AuditEvent {
        ts: Utc::now().to_rfc3339(),
        artifact: job.key.clone(),
        action,
        actor: job.opts.actor,
        reason: job.opts.reason.clone(),
        tool_call_id: job.opts.tool_call_id.clone(),
        size_bytes: job.content.len() as u64,
    };
    let line = serde_json::to_string(&event)
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    let mut f = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(root.join(EVENTS_FILE))?;
    writeln!(f, "{line}")?;
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;

    fn open_store(dir: &tempfile::TempDir) -> Arc<ArtifactStore> {
        ArtifactStore::open(dir.path(), &HubConfig::default()).unwrap()
    }

    fn audit_lines(dir: &tempfile::TempDir) -> Vec<AuditEvent> {
        let raw = std::fs::read_to_string(dir.path().join(EVENTS_FILE)).unwrap_or_default();
        raw.lines().map(|l| serde_json::from_str(l).unwrap()).collect()
    }

    #[test]
    fn write_creates_file_and_audit_line() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        store.write("notes/a.txt", b"hello", WriteOptions::agent("initial draft")).unwrap();

        let content = std::fs::read_to_string(dir.path().join("notes/a.txt")).unwrap();
        assert_eq!(content, "hello");

        let events = audit_lines(&dir);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].artifact, "notes/a.txt");
        assert_eq!(events[0].action, AuditAction::Create);
        assert_eq!(events[0].actor, Actor::Agent);
        assert_eq!(events[0].size_bytes, 5);
    }

    #[test]
    fn overwrite_records_update_and_backup() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        store.write("a.txt", b"one", WriteOptions::agent("v1")).unwrap();
        store.write("a.txt", b"two", WriteOptions::agent("v2")).unwrap();

        let events = audit_lines(&dir);
        assert_eq!(events[1].action, AuditAction::Update);

        let history = dir.path().join(HISTORY_DIR).join("a.txt");
        let backups: Vec<_> = std::fs::read_dir(&history).unwrap().collect();
        assert_eq!(backups.len(), 1);

        // Backup holds the pre-overwrite content.
        let entry = std::fs::read_dir(&history).unwrap().next().unwrap().unwrap();
        assert_eq!(std::fs::read_to_string(entry.path()).unwrap(), "one");
    }

    #[test]
    fn history_pruned_to_rolling_window() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        for i in 0..25 {
            store
                .write("a.txt", format!("rev {i}").as_bytes(), WriteOptions::agent("loop"))
                .unwrap();
        }

        let history = dir.path().join(HISTORY_DIR).join("a.txt");
        let count = std::fs::read_dir(&history).unwrap().count();
        assert_eq!(count, 20, "24 backups should prune to exactly 20");
    }

    #[test]
    fn no_tmp_residue_after_write() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        store.write("b.txt", b"data", WriteOptions::agent("w")).unwrap();

        let residue: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(residue.is_empty());
    }

    #[test]
    fn escape_rejected_before_io() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        let err = store.write("../outside.txt", b"x", WriteOptions::agent("w")).unwrap_err();
        assert!(matches!(err, HubError::PathEscape(_)));
    }

    #[test]
    fn later_write_observes_earlier_write() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        store.write("c.txt", b"first", WriteOptions::agent("w1")).unwrap();
        store.write("c.txt", b"second", WriteOptions::agent("w2")).unwrap();
        assert_eq!(store.read("c.txt").unwrap(), b"second");
    }

    #[test]
    fn read_missing_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        assert!(store.read("missing.txt").is_err());
    }

    #[test]
    fn subscriber_sees_agent_write() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        let (tx, rx) = channel();
        store.subscribe(move |ev| {
            let _ = tx.send((ev.path.clone(), ev.actor));
        });

        store.write("d.txt", b"x", WriteOptions::agent("w")).unwrap();
        let (path, actor) = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(path, "d.txt");
        assert_eq!(actor, Actor::Agent);
    }

    #[test]
    fn self_write_echo_suppressed() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);
        store.write("e.txt", b"x", WriteOptions::agent("w")).unwrap();

        // The watcher reporting the store's own write is swallowed.
        assert!(!store.notify_external("e.txt"));
        // A genuinely external path goes through as a user change.
        let (tx, rx) = channel();
        store.subscribe(move |ev| {
            let _ = tx.send(ev.actor);
        });
        assert!(store.notify_external("unrelated.txt"));
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), Actor::User);
    }
}
