use rampup_core::types::now_ms;
use rampup_core::{Error, Paths, ProfileDelta, Result, Session, Turn, UserProfile};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_type")]
enum SessionLine {
    #[serde(rename = "metadata")]
    Metadata {
        id: String,
        created_at_ms: i64,
        updated_at_ms: i64,
        profile: UserProfile,
    },
    #[serde(untagged)]
    Turn(Turn),
}

struct Slot {
    session: Session,
    /// At most one in-flight orchestration call per session.
    busy: bool,
}

/// Owns all conversation state. Sessions are auto-created at load, strictly
/// serialized per id, and mutated only through `TurnGuard::commit`.
#[derive(Clone)]
pub struct SessionStore {
    paths: Paths,
    idle_timeout_secs: u64,
    inner: Arc<Mutex<HashMap<String, Slot>>>,
}

impl SessionStore {
    pub fn new(paths: Paths, idle_timeout_secs: u64) -> Self {
        Self {
            paths,
            idle_timeout_secs,
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Slot>>> {
        self.inner
            .lock()
            .map_err(|e| Error::Storage(format!("Lock error: {}", e)))
    }

    /// Load a session, creating it if absent. `SessionNotFound` is not an
    /// error at load time.
    pub fn load_or_create(&self, session_id: &str) -> Result<Session> {
        let mut map = self.lock()?;
        let slot = self.ensure_loaded(&mut map, session_id)?;
        Ok(slot.session.clone())
    }

    fn ensure_loaded<'a>(
        &self,
        map: &'a mut HashMap<String, Slot>,
        session_id: &str,
    ) -> Result<&'a mut Slot> {
        if !map.contains_key(session_id) {
            let session = match self.read_file(session_id)? {
                Some(session) => session,
                None => {
                    debug!(session_id = %session_id, "Creating new session");
                    Session::new(session_id, now_ms())
                }
            };
            map.insert(session_id.to_string(), Slot { session, busy: false });
        }
        Ok(map.get_mut(session_id).expect("slot just inserted"))
    }

    /// Claim the session for one turn. A concurrent turn gets `SessionBusy`;
    /// an idle-expired session gets `SessionExpired` so the front end can
    /// restart context.
    pub fn begin_turn(&self, session_id: &str) -> Result<TurnGuard> {
        let mut map = self.lock()?;
        let idle_timeout = self.idle_timeout_secs;
        let slot = self.ensure_loaded(&mut map, session_id)?;

        if slot.busy {
            return Err(Error::SessionBusy(session_id.to_string()));
        }
        if !slot.session.turns.is_empty()
            && slot.session.is_idle_expired(now_ms(), idle_timeout)
        {
            return Err(Error::SessionExpired(session_id.to_string()));
        }

        slot.busy = true;
        Ok(TurnGuard {
            store: self.clone(),
            session: slot.session.clone(),
            committed: false,
        })
    }

    /// The single mutation point: append both turns, apply the profile
    /// delta, persist, release. Nothing is observable until this succeeds.
    fn commit(
        &self,
        session_id: &str,
        user_turn: Turn,
        assistant_turn: Turn,
        delta: Option<&ProfileDelta>,
    ) -> Result<Session> {
        let mut map = self.lock()?;
        let slot = map
            .get_mut(session_id)
            .ok_or_else(|| Error::Session(format!("session {} vanished mid-turn", session_id)))?;

        // Stage on a clone so a validation or IO failure leaves the slot
        // untouched.
        let mut staged = slot.session.clone();
        if let Some(delta) = delta {
            staged.profile.apply(delta)?;
        }
        staged.turns.push(user_turn);
        staged.turns.push(assistant_turn);
        staged.updated_at_ms = now_ms();

        self.write_file(&staged)?;

        slot.session = staged;
        slot.busy = false;
        Ok(slot.session.clone())
    }

    fn release(&self, session_id: &str) {
        if let Ok(mut map) = self.inner.lock() {
            if let Some(slot) = map.get_mut(session_id) {
                slot.busy = false;
            }
        }
    }

    /// Out-of-band profile edit (e.g. HR pre-filling role/team). Rejected
    /// while a turn is in flight.
    pub fn update_profile(&self, session_id: &str, delta: &ProfileDelta) -> Result<UserProfile> {
        let mut map = self.lock()?;
        let slot = self.ensure_loaded(&mut map, session_id)?;
        if slot.busy {
            return Err(Error::SessionBusy(session_id.to_string()));
        }

        let mut staged = slot.session.clone();
        staged.profile.apply(delta)?;
        staged.updated_at_ms = now_ms();
        self.write_file(&staged)?;
        slot.session = staged;
        Ok(slot.session.profile.clone())
    }

    /// Drop sessions idle beyond the timeout. Busy sessions are skipped.
    pub fn expire_idle(&self, now_ms: i64) -> Result<usize> {
        let mut map = self.lock()?;
        let idle_timeout = self.idle_timeout_secs;
        let expired: Vec<String> = map
            .iter()
            .filter(|(_, slot)| !slot.busy && slot.session.is_idle_expired(now_ms, idle_timeout))
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            map.remove(id);
            let path = self.paths.session_file(id);
            if path.exists() {
                if let Err(e) = std::fs::remove_file(&path) {
                    warn!(session_id = %id, error = %e, "Failed to remove expired session file");
                }
            }
            info!(session_id = %id, "Expired idle session");
        }
        Ok(expired.len())
    }

    /// Tear a session down entirely (front-end restart after expiry).
    pub fn reset(&self, session_id: &str) -> Result<()> {
        let mut map = self.lock()?;
        map.remove(session_id);
        let path = self.paths.session_file(session_id);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        Ok(())
    }

    /// Session ids known on disk.
    pub fn list(&self) -> Result<Vec<String>> {
        let dir = self.paths.sessions_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("jsonl") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn read_file(&self, session_id: &str) -> Result<Option<Session>> {
        let path = self.paths.session_file(session_id);
        if !path.exists() {
            return Ok(None);
        }

        let file = File::open(&path)?;
        let reader = BufReader::new(file);
        let mut session = Session::new(session_id, now_ms());

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<SessionLine>(&line) {
                Ok(SessionLine::Metadata {
                    created_at_ms,
                    updated_at_ms,
                    profile,
                    ..
                }) => {
                    session.created_at_ms = created_at_ms;
                    session.updated_at_ms = updated_at_ms;
                    session.profile = profile;
                }
                Ok(SessionLine::Turn(turn)) => {
                    session.turns.push(turn);
                }
                Err(e) => {
                    debug!(error = %e, "Failed to parse session line, skipping");
                }
            }
        }

        Ok(Some(session))
    }

    fn write_file(&self, session: &Session) -> Result<()> {
        let path = self.paths.session_file(&session.id);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = File::create(&path)?;
        let metadata = SessionLine::Metadata {
            id: session.id.clone(),
            created_at_ms: session.created_at_ms,
            updated_at_ms: session.updated_at_ms,
            profile: session.profile.clone(),
        };
        writeln!(file, "{}", serde_json::to_string(&metadata)?)?;
        for turn in &session.turns {
            writeln!(file, "{}", serde_json::to_string(turn)?)?;
        }
        Ok(())
    }
}

/// Exclusive claim on a session for one orchestration call. Dropping the
/// guard without committing (error, cancellation) releases the session with
/// no state change.
pub struct TurnGuard {
    store: SessionStore,
    session: Session,
    committed: bool,
}

impl TurnGuard {
    /// Snapshot taken when the turn began.
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn commit(
        mut self,
        user_turn: Turn,
        assistant_turn: Turn,
        delta: Option<&ProfileDelta>,
    ) -> Result<Session> {
        let result = self
            .store
            .commit(&self.session.id, user_turn, assistant_turn, delta);
        if result.is_ok() {
            self.committed = true;
        }
        result
    }
}

impl std::fmt::Debug for TurnGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnGuard")
            .field("session_id", &self.session.id)
            .field("committed", &self.committed)
            .finish_non_exhaustive()
    }
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        if !self.committed {
            self.store.release(&self.session.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rampup_core::Speaker;

    fn test_store(idle_timeout_secs: u64) -> (SessionStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base(dir.path().to_path_buf());
        paths.ensure_dirs().unwrap();
        (SessionStore::new(paths, idle_timeout_secs), dir)
    }

    fn exchange(store: &SessionStore, id: &str, question: &str, answer: &str) -> Session {
        let guard = store.begin_turn(id).unwrap();
        guard
            .commit(
                Turn::user(question, now_ms()),
                Turn::assistant(answer, now_ms()),
                None,
            )
            .unwrap()
    }

    #[test]
    fn test_append_then_load_is_ordered() {
        let (store, _dir) = test_store(3600);
        exchange(&store, "s1", "hello", "hi there");
        let session = exchange(&store, "s1", "what about badges?", "security desk, day one");

        assert_eq!(session.turns.len(), 4);
        assert_eq!(session.turns[0].speaker, Speaker::User);
        assert_eq!(session.last_turn().unwrap().content, "security desk, day one");

        let reloaded = store.load_or_create("s1").unwrap();
        assert_eq!(reloaded.turns.len(), 4);
        assert_eq!(
            reloaded.last_turn().unwrap().content,
            "security desk, day one"
        );
    }

    #[test]
    fn test_concurrent_turn_gets_session_busy() {
        let (store, _dir) = test_store(3600);
        let guard = store.begin_turn("s1").unwrap();

        let err = store.begin_turn("s1").unwrap_err();
        assert!(matches!(err, Error::SessionBusy(_)));

        // A different session is unaffected.
        assert!(store.begin_turn("s2").is_ok());

        guard
            .commit(
                Turn::user("q", now_ms()),
                Turn::assistant("a", now_ms()),
                None,
            )
            .unwrap();
        assert!(store.begin_turn("s1").is_ok());
    }

    #[test]
    fn test_dropped_guard_releases_without_mutation() {
        let (store, _dir) = test_store(3600);
        {
            let _guard = store.begin_turn("s1").unwrap();
            // Cancelled mid-dispatch: guard dropped uncommitted.
        }
        let session = store.load_or_create("s1").unwrap();
        assert!(session.turns.is_empty());
        assert!(store.begin_turn("s1").is_ok());
    }

    #[test]
    fn test_commit_applies_profile_delta_atomically() {
        let (store, _dir) = test_store(3600);
        let guard = store.begin_turn("s1").unwrap();
        let delta = ProfileDelta {
            role: Some("engineer".to_string()),
            readiness_score: Some(62),
            ..Default::default()
        };
        let session = guard
            .commit(
                Turn::user("q", now_ms()),
                Turn::assistant("a", now_ms()),
                Some(&delta),
            )
            .unwrap();
        assert_eq!(session.profile.role.as_deref(), Some("engineer"));
        assert_eq!(session.profile.readiness_score, Some(62));
    }

    #[test]
    fn test_invalid_delta_rejects_whole_commit() {
        let (store, _dir) = test_store(3600);
        let guard = store.begin_turn("s1").unwrap();
        let delta = ProfileDelta {
            readiness_score: Some(150),
            ..Default::default()
        };
        let err = guard
            .commit(
                Turn::user("q", now_ms()),
                Turn::assistant("a", now_ms()),
                Some(&delta),
            )
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        // No partial update observable.
        let session = store.load_or_create("s1").unwrap();
        assert!(session.turns.is_empty());
        assert_eq!(session.profile.readiness_score, None);
    }

    #[test]
    fn test_expired_session_surfaces() {
        let (store, _dir) = test_store(0);
        exchange(&store, "s1", "q", "a");
        std::thread::sleep(std::time::Duration::from_millis(5));

        let err = store.begin_turn("s1").unwrap_err();
        assert!(matches!(err, Error::SessionExpired(_)));

        store.reset("s1").unwrap();
        let session = store.load_or_create("s1").unwrap();
        assert!(session.turns.is_empty());
    }

    #[test]
    fn test_expire_idle_counts() {
        let (store, _dir) = test_store(0);
        exchange(&store, "s1", "q", "a");
        exchange(&store, "s2", "q", "a");
        std::thread::sleep(std::time::Duration::from_millis(5));

        let expired = store.expire_idle(now_ms()).unwrap();
        assert_eq!(expired, 2);
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_update_profile_out_of_band() {
        let (store, _dir) = test_store(3600);
        let delta = ProfileDelta {
            team: Some("platform".to_string()),
            ..Default::default()
        };
        let profile = store.update_profile("s1", &delta).unwrap();
        assert_eq!(profile.team.as_deref(), Some("platform"));
    }
}
