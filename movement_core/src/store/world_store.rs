//! The snapshot-backed world store and its scoped sessions.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard};

use tracing::{debug, info};
use world_rules::{
    Embedding, NearbyScene, NodeLabel, Position, PositionLookup, Scene, SceneId, SimilarScene,
    UserId, WorldResult, WorldState,
};

use super::snapshot::{load_world, save_world};
use super::{SpatialStore, StoreConnector, StoreError, StoreResult};

/// Default cap on concurrently open sessions.
pub const DEFAULT_MAX_SESSIONS: usize = 64;

/// Users and scenes held in memory, optionally mirrored to a JSON file.
///
/// With a snapshot path, each write is applied to a copy of the world, the
/// copy is saved, and only then swapped in; a failed save leaves the store
/// unchanged.
#[derive(Debug)]
pub struct WorldStore {
    state: RwLock<WorldState>,
    snapshot_path: Option<PathBuf>,
    open_sessions: AtomicUsize,
    max_sessions: usize,
    closed: AtomicBool,
}

impl WorldStore {
    /// A store that lives only in memory.
    pub fn in_memory() -> Self {
        Self::from_state(WorldState::new())
    }

    /// A memory-only store seeded with `state`.
    pub fn from_state(state: WorldState) -> Self {
        Self {
            state: RwLock::new(state),
            snapshot_path: None,
            open_sessions: AtomicUsize::new(0),
            max_sessions: DEFAULT_MAX_SESSIONS,
            closed: AtomicBool::new(false),
        }
    }

    /// Open a store backed by the snapshot at `path`, creating an empty world if absent.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let state = load_world(path)?;
        info!(
            path = %path.display(),
            users = state.users.len(),
            scenes = state.scenes.len(),
            "opened world store"
        );
        Ok(Self {
            snapshot_path: Some(path.to_path_buf()),
            ..Self::from_state(state)
        })
    }

    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions;
        self
    }

    /// Refuse new sessions. Sessions already handed out keep working.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn reopen(&self) {
        self.closed.store(false, Ordering::SeqCst);
    }

    /// Number of sessions currently checked out.
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }

    /// A copy of the whole world.
    pub fn snapshot(&self) -> StoreResult<WorldState> {
        Ok(self.read()?.clone())
    }

    /// Check out a session directly, outside any [`StoreConnector`] bound.
    pub fn session(&self) -> StoreResult<WorldSession<'_>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store is closed".to_string()));
        }
        let previous = self.open_sessions.fetch_add(1, Ordering::SeqCst);
        if previous >= self.max_sessions {
            self.open_sessions.fetch_sub(1, Ordering::SeqCst);
            return Err(StoreError::Unavailable(format!(
                "session limit of {} reached",
                self.max_sessions
            )));
        }
        debug!(open_sessions = previous + 1, "store session acquired");
        Ok(WorldSession { store: self })
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, WorldState>> {
        self.state.read().map_err(|_| StoreError::Poisoned)
    }

    fn write<T>(&self, apply: impl FnOnce(&mut WorldState) -> WorldResult<T>) -> StoreResult<T> {
        let mut guard = self.state.write().map_err(|_| StoreError::Poisoned)?;
        match &self.snapshot_path {
            None => Ok(apply(&mut guard)?),
            Some(path) => {
                let mut next = guard.clone();
                let value = apply(&mut next)?;
                save_world(path, &next)?;
                *guard = next;
                Ok(value)
            }
        }
    }
}

impl Default for WorldStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl StoreConnector for WorldStore {
    type Session<'a> = WorldSession<'a>;

    fn connect(&self) -> StoreResult<WorldSession<'_>> {
        self.session()
    }
}

impl<'s> StoreConnector for &'s WorldStore {
    type Session<'a> = WorldSession<'s> where Self: 'a;

    fn connect(&self) -> StoreResult<WorldSession<'s>> {
        (*self).session()
    }
}

impl StoreConnector for Arc<WorldStore> {
    type Session<'a> = WorldSession<'a>;

    fn connect(&self) -> StoreResult<WorldSession<'_>> {
        self.as_ref().session()
    }
}

/// A checked-out connection to a [`WorldStore`]. Released on drop.
#[derive(Debug)]
pub struct WorldSession<'a> {
    store: &'a WorldStore,
}

impl Drop for WorldSession<'_> {
    fn drop(&mut self) {
        let previous = self.store.open_sessions.fetch_sub(1, Ordering::SeqCst);
        debug!(open_sessions = previous.saturating_sub(1), "store session released");
    }
}

impl SpatialStore for WorldSession<'_> {
    fn get_position(&self, user_id: &UserId) -> StoreResult<PositionLookup> {
        if let Some(user) = self.store.read()?.get_user(user_id) {
            return Ok(PositionLookup::Found(user.position));
        }
        // Another request may have provisioned the user between the two locks.
        let lookup = self.store.write(|world| Ok(world.ensure_user(user_id)))?;
        if lookup.was_provisioned() {
            info!(user_id = %user_id, "provisioned user at origin");
        }
        Ok(lookup)
    }

    fn set_position(&self, user_id: &UserId, position: Position) -> StoreResult<bool> {
        self.store
            .write(|world| Ok(world.set_user_position(user_id, position)))
    }

    fn create_user(&self, user_id: &UserId, position: Position) -> StoreResult<()> {
        self.store.write(|world| {
            world.upsert_user(user_id, position);
            Ok(())
        })
    }

    fn create_scene(&self, scene: Scene) -> StoreResult<SceneId> {
        self.store.write(|world| Ok(world.add_scene(scene)))
    }

    fn find_scene_by_text(&self, query: &str, limit: usize) -> StoreResult<Vec<Scene>> {
        Ok(self
            .store
            .read()?
            .scenes_matching_text(query, limit)
            .into_iter()
            .cloned()
            .collect())
    }

    fn find_nearby_scenes(&self, position: Position, radius: f64) -> StoreResult<Vec<NearbyScene>> {
        Ok(self.store.read()?.nearby_scenes(position, radius))
    }

    fn declare_vector_index(&self, label: NodeLabel, dimension: usize) -> StoreResult<()> {
        self.store
            .write(|world| world.declare_vector_index(label, dimension))
    }

    fn store_embedding(
        &self,
        node_id: &SceneId,
        embedding: Embedding,
        label: NodeLabel,
    ) -> StoreResult<()> {
        self.store
            .write(|world| world.attach_embedding(label, node_id, embedding))
    }

    fn store_embeddings(&self, records: Vec<super::EmbeddingRecord>) -> StoreResult<()> {
        // One snapshot write for the whole batch.
        self.store.write(|world| {
            for record in records {
                world.attach_embedding(record.label, &record.node_id, record.embedding)?;
            }
            Ok(())
        })
    }

    fn find_nearest_by_embedding(
        &self,
        embedding: &Embedding,
        label: NodeLabel,
        min_similarity: f32,
        limit: usize,
    ) -> StoreResult<Vec<SimilarScene>> {
        Ok(self
            .store
            .read()?
            .nearest_by_embedding(embedding, label, min_similarity, limit)?)
    }
}
