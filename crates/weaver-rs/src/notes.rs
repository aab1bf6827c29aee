//! Shared note log visible to both agents.
//!
//! Notes are short free-form entries either agent (or the user) can leave for
//! the other. The most recent ones are prepended to every outgoing message as
//! a digest, and Junior can read and write them through the `context_read` and
//! `context_write` tools.
//!
//! The log is bounded to [`NOTE_CAPACITY`] entries, newest first, and is saved
//! as a pretty-printed JSON array after every mutation. The snapshot is taken
//! under the log lock but written after it is released, so readers never wait
//! on the disk. Persistence failures are logged and otherwise ignored: notes
//! are advisory.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Maximum number of notes kept. Older notes are evicted first.
pub const NOTE_CAPACITY: usize = 50;

/// Longest note body shown in a prompt digest, in characters.
const DIGEST_NOTE_CHARS: usize = 200;

/// Who wrote a note.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NoteAuthor {
    Senior,
    Junior,
    User,
}

impl std::fmt::Display for NoteAuthor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NoteAuthor::Senior => write!(f, "senior"),
            NoteAuthor::Junior => write!(f, "junior"),
            NoteAuthor::User => write!(f, "user"),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Note {
    pub id: String,
    pub author: NoteAuthor,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Capacity-bounded note log, optionally backed by a JSON file.
#[derive(Debug)]
pub struct SharedNotes {
    path: Option<PathBuf>,
    notes: RwLock<Vec<Note>>,
    /// Bumped under the write lock on every mutation.
    revision: AtomicU64,
    /// Revision last written to `path`; serializes file writes.
    saved: Mutex<u64>,
}

/// Serialized log tagged with the revision it was taken at.
struct Snapshot {
    revision: u64,
    data: String,
}

impl SharedNotes {
    /// Notes that live only in memory.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            notes: RwLock::new(Vec::new()),
            revision: AtomicU64::new(0),
            saved: Mutex::new(0),
        }
    }

    /// Load notes from `path`, creating the parent directory if needed.
    ///
    /// A missing file starts an empty log. A corrupt file is logged and
    /// ignored; it is overwritten on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!("Cannot create notes directory {}: {e}", parent.display());
        }

        let notes = match std::fs::read_to_string(&path) {
            Ok(data) => match serde_json::from_str::<Vec<Note>>(&data) {
                Ok(mut notes) => {
                    notes.truncate(NOTE_CAPACITY);
                    debug!("Loaded {} shared notes from {}", notes.len(), path.display());
                    notes
                }
                Err(e) => {
                    warn!("Ignoring corrupt notes file {}: {e}", path.display());
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };

        Self {
            path: Some(path),
            notes: RwLock::new(notes),
            revision: AtomicU64::new(0),
            saved: Mutex::new(0),
        }
    }

    /// `~/.weaver/shared.json`, or `None` if there is no home directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".weaver").join("shared.json"))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Add a note and return its id.
    pub fn write(&self, author: NoteAuthor, content: impl Into<String>, tags: Vec<String>) -> String {
        let id: String = uuid::Uuid::new_v4().simple().to_string().chars().take(12).collect();
        let note = Note {
            id: id.clone(),
            author,
            content: content.into(),
            created_at: Utc::now(),
            tags,
        };

        let snapshot = {
            let mut notes = self.write_lock();
            notes.insert(0, note);
            notes.truncate(NOTE_CAPACITY);
            self.snapshot(&notes)
        };
        self.save(snapshot);
        id
    }

    pub fn read(&self, id: &str) -> Option<Note> {
        self.read_lock().iter().find(|n| n.id == id).cloned()
    }

    /// Up to `limit` notes, newest first.
    ///
    /// `author` keeps only that author's notes. A non-empty `tags` keeps notes
    /// carrying at least one of the tags.
    pub fn list(&self, limit: usize, author: Option<NoteAuthor>, tags: &[String]) -> Vec<Note> {
        self.read_lock()
            .iter()
            .filter(|n| author.is_none_or(|a| n.author == a))
            .filter(|n| tags.is_empty() || n.tags.iter().any(|t| tags.contains(t)))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn delete(&self, id: &str) -> bool {
        let snapshot = {
            let mut notes = self.write_lock();
            let before = notes.len();
            notes.retain(|n| n.id != id);
            if notes.len() == before {
                return false;
            }
            self.snapshot(&notes)
        };
        self.save(snapshot);
        true
    }

    pub fn clear(&self) {
        let snapshot = {
            let mut notes = self.write_lock();
            notes.clear();
            self.snapshot(&notes)
        };
        self.save(snapshot);
    }

    pub fn len(&self) -> usize {
        self.read_lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_lock().is_empty()
    }

    /// Digest of the newest `limit` notes for prompt injection, or `""` when
    /// there are none.
    pub fn format_for_prompt(&self, limit: usize) -> String {
        let notes = self.list(limit, None, &[]);
        if notes.is_empty() {
            return String::new();
        }

        let mut out = String::from("## Shared Notes\n\n");
        for note in &notes {
            out.push_str(&format!("- [{}] {}\n", note.author, clip(&note.content)));
        }
        out
    }

    /// Serialize the log. Call with the write lock held so revisions follow
    /// mutation order.
    fn snapshot(&self, notes: &[Note]) -> Option<Snapshot> {
        self.path.as_ref()?;
        let revision = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
        match serde_json::to_string_pretty(notes) {
            Ok(data) => Some(Snapshot { revision, data }),
            Err(e) => {
                warn!("Cannot serialize shared notes: {e}");
                None
            }
        }
    }

    /// Write `snapshot` unless a newer one already reached the file.
    fn save(&self, snapshot: Option<Snapshot>) {
        let (Some(path), Some(snapshot)) = (&self.path, snapshot) else {
            return;
        };
        let mut saved = self.saved.lock().unwrap_or_else(|e| e.into_inner());
        if snapshot.revision <= *saved {
            debug!(revision = snapshot.revision, "Skipping stale notes snapshot");
            return;
        }
        match std::fs::write(path, snapshot.data) {
            Ok(()) => *saved = snapshot.revision,
            Err(e) => warn!("Cannot save shared notes to {}: {e}", path.display()),
        }
    }

    fn read_lock(&self) -> RwLockReadGuard<'_, Vec<Note>> {
        self.notes.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_lock(&self) -> RwLockWriteGuard<'_, Vec<Note>> {
        self.notes.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn clip(content: &str) -> String {
    if content.chars().count() <= DIGEST_NOTE_CHARS {
        return content.to_string();
    }
    let clipped: String = content.chars().take(DIGEST_NOTE_CHARS).collect();
    format!("{clipped}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_and_read_back() {
        let notes = SharedNotes::in_memory();
        let id = notes.write(NoteAuthor::Senior, "use snake_case", vec!["style".into()]);
        assert_eq!(id.len(), 12);
        let note = notes.read(&id).unwrap();
        assert_eq!(note.author, NoteAuthor::Senior);
        assert_eq!(note.content, "use snake_case");
        assert_eq!(note.tags, vec!["style"]);
        assert!(notes.read("missing").is_none());
    }

    #[test]
    fn newest_first_and_capacity() {
        let notes = SharedNotes::in_memory();
        for i in 0..NOTE_CAPACITY + 5 {
            notes.write(NoteAuthor::Junior, format!("note {i}"), Vec::new());
        }
        assert_eq!(notes.len(), NOTE_CAPACITY);
        let all = notes.list(usize::MAX, None, &[]);
        assert_eq!(all[0].content, format!("note {}", NOTE_CAPACITY + 4));
        assert_eq!(all.last().unwrap().content, "note 5");
    }

    #[test]
    fn list_filters_by_author_and_tags() {
        let notes = SharedNotes::in_memory();
        notes.write(NoteAuthor::Senior, "a", vec!["api".into()]);
        notes.write(NoteAuthor::Junior, "b", vec!["db".into()]);
        notes.write(NoteAuthor::Junior, "c", vec!["api".into(), "db".into()]);

        let junior = notes.list(10, Some(NoteAuthor::Junior), &[]);
        assert_eq!(junior.len(), 2);

        let api = notes.list(10, None, &["api".to_string()]);
        let contents: Vec<&str> = api.iter().map(|n| n.content.as_str()).collect();
        assert_eq!(contents, vec!["c", "a"]);

        assert_eq!(notes.list(1, None, &[]).len(), 1);
    }

    #[test]
    fn delete_and_clear() {
        let notes = SharedNotes::in_memory();
        let id = notes.write(NoteAuthor::User, "x", Vec::new());
        notes.write(NoteAuthor::User, "y", Vec::new());
        assert!(notes.delete(&id));
        assert!(!notes.delete(&id));
        assert_eq!(notes.len(), 1);
        notes.clear();
        assert!(notes.is_empty());
    }

    #[test]
    fn digest_format() {
        let notes = SharedNotes::in_memory();
        assert_eq!(notes.format_for_prompt(10), "");

        notes.write(NoteAuthor::Senior, "x".repeat(250), Vec::new());
        notes.write(NoteAuthor::Junior, "done", Vec::new());
        let digest = notes.format_for_prompt(10);
        assert!(digest.starts_with("## Shared Notes\n\n- [junior] done\n"));
        assert!(digest.contains(&format!("- [senior] {}...\n", "x".repeat(200))));
    }

    #[test]
    fn persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("shared.json");

        let notes = SharedNotes::open(&path);
        let id = notes.write(NoteAuthor::Junior, "persist me", vec!["t".into()]);
        assert!(path.exists());

        let reloaded = SharedNotes::open(&path);
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.read(&id).unwrap().content, "persist me");

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"author\": \"junior\""));
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.json");
        std::fs::write(&path, "{not json").unwrap();

        let notes = SharedNotes::open(&path);
        assert!(notes.is_empty());
        notes.write(NoteAuthor::User, "fresh", Vec::new());
        assert_eq!(SharedNotes::open(&path).len(), 1);
    }

    #[test]
    fn concurrent_writers_all_reach_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.json");
        let notes = std::sync::Arc::new(SharedNotes::open(&path));

        let writers: Vec<_> = (0..8)
            .map(|w| {
                let notes = notes.clone();
                std::thread::spawn(move || {
                    for i in 0..5 {
                        notes.write(NoteAuthor::Junior, format!("w{w} n{i}"), Vec::new());
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        assert_eq!(notes.len(), 40);
        assert_eq!(SharedNotes::open(&path).len(), 40);
    }

    #[test]
    fn stale_snapshot_does_not_overwrite_newer_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.json");
        let notes = SharedNotes::open(&path);

        let stale = notes.snapshot(&[]);
        notes.write(NoteAuthor::User, "first", Vec::new());
        notes.write(NoteAuthor::User, "second", Vec::new());
        notes.save(stale);

        assert_eq!(SharedNotes::open(&path).len(), 2);
    }
}
