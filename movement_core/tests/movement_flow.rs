//! End-to-end movement requests against a real world store.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::f64::consts::FRAC_PI_4;
use std::panic::{self, AssertUnwindSafe};

use movement_core::{
    CompletionRequest, EmbeddingOracle, LanguageOracle, MatchSource, MovementConfig,
    MovementFailure, MovementOrchestrator, OracleError, Resolution, SpatialStore, StoreConnector,
    StoreError, StoreResult, WorldSession, WorldStore,
};
use world_rules::{
    Compass, Embedding, NearbyScene, NodeLabel, Position, PositionLookup, Scene, SceneId,
    SimilarScene, UserId, EMBEDDING_DIM,
};

struct Script {
    replies: RefCell<VecDeque<Result<String, OracleError>>>,
    prompts: RefCell<Vec<CompletionRequest>>,
}

impl Script {
    fn new(replies: &[&str]) -> Self {
        Self {
            replies: RefCell::new(replies.iter().map(|r| Ok(r.to_string())).collect()),
            prompts: RefCell::new(Vec::new()),
        }
    }
}

impl LanguageOracle for Script {
    fn complete(&self, request: &CompletionRequest) -> Result<String, OracleError> {
        self.prompts.borrow_mut().push(request.clone());
        self.replies
            .borrow_mut()
            .pop_front()
            .unwrap_or(Err(OracleError::Timeout))
    }
}

/// Always embeds onto the first axis, so a scene's similarity is its first component.
struct AxisEmbedder;

impl EmbeddingOracle for AxisEmbedder {
    fn embed(&self, _text: &str) -> Result<Vec<f32>, OracleError> {
        let mut v = vec![0.0; EMBEDDING_DIM];
        v[0] = 1.0;
        Ok(v)
    }
}

fn embedding_with_similarity(target: f32) -> Embedding {
    let mut v = vec![0.0; EMBEDDING_DIM];
    v[0] = target;
    v[1] = (1.0 - target * target).sqrt();
    Embedding::new(v).unwrap()
}

fn cave_world() -> WorldStore {
    let store = WorldStore::in_memory();
    {
        let session = store.session().unwrap();
        session
            .declare_vector_index(NodeLabel::Scene, EMBEDDING_DIM)
            .unwrap();
        let cave = session
            .create_scene(
                Scene::new(
                    "一个神秘的洞穴入口，周围长满了荧光蘑菇。",
                    Position::new(1.0, FRAC_PI_4),
                )
                .with_id("scene_001"),
            )
            .unwrap();
        session
            .store_embedding(&cave, embedding_with_similarity(0.82), NodeLabel::Scene)
            .unwrap();
    }
    store
}

fn orchestrator<'s>(
    store: &'s WorldStore,
    replies: &[&str],
) -> MovementOrchestrator<&'s WorldStore, Script, AxisEmbedder> {
    MovementOrchestrator::new(store, Script::new(replies), AxisEmbedder, MovementConfig::default())
}

fn stored_position(store: &WorldStore, user: &UserId) -> Option<Position> {
    store.snapshot().unwrap().get_user(user).map(|u| u.position)
}

#[test]
fn test_unknown_user_is_provisioned_then_moved_east() {
    let store = WorldStore::in_memory();
    let user = UserId::from("test_user");
    assert!(store.snapshot().unwrap().get_user(&user).is_none());

    let result = orchestrator(&store, &["", "E,1.0"]).process_movement(&user, "向东走一步");

    assert!(result.success, "{}", result.message);
    assert_eq!(stored_position(&store, &user), result.new_position);
    let pos = result.new_position.unwrap();
    assert!((pos.r - 1.0).abs() < 1e-9);
    assert!(pos.theta.abs() < 1e-9);
    assert_eq!(store.open_sessions(), 0);
}

#[test]
fn test_northeast_step_uses_polar_delta() {
    let store = WorldStore::in_memory();
    let user = UserId::from("wanderer");
    {
        let session = store.session().unwrap();
        session.create_user(&user, Position::new(2.0, 1.0)).unwrap();
    }

    let result = orchestrator(&store, &["", "NE,0.5"]).process_movement(&user, "往东北方向走半步");

    let pos = result.new_position.unwrap();
    let expected_dr = 0.5 * FRAC_PI_4.cos();
    let expected_dt = 0.5 * FRAC_PI_4.sin();
    assert!((pos.r - (2.0 + expected_dr)).abs() < 1e-9);
    assert!((pos.theta - (1.0 + expected_dt)).abs() < 1e-9);
    assert_eq!(
        result.resolution,
        Some(Resolution::Step(movement_core::Step {
            direction: Compass::NE,
            distance: 0.5
        }))
    );
}

#[test]
fn test_semantic_destination_jump() {
    let store = cave_world();
    let user = UserId::from("explorer");

    let result = orchestrator(&store, &["洞穴"]).process_movement(&user, "去神秘的洞穴");

    assert!(result.success);
    assert_eq!(result.new_position, Some(Position::new(1.0, FRAC_PI_4)));
    let nearby: Vec<_> = result
        .nearby_scenes
        .iter()
        .flatten()
        .map(|n| n.scene.id.as_str())
        .collect();
    assert_eq!(nearby, vec!["scene_001"]);
    match result.resolution {
        Some(Resolution::Destination {
            scene_id,
            source,
            similarity,
        }) => {
            assert_eq!(scene_id.as_str(), "scene_001");
            assert_eq!(source, MatchSource::Semantic);
            assert!((similarity.unwrap() - 0.82).abs() < 1e-4);
        }
        other => panic!("unexpected resolution {other:?}"),
    }
    assert_eq!(
        stored_position(&store, &user),
        Some(Position::new(1.0, FRAC_PI_4))
    );
}

#[test]
fn test_low_similarity_falls_back_to_substring() {
    let store = WorldStore::in_memory();
    {
        let session = store.session().unwrap();
        session
            .declare_vector_index(NodeLabel::Scene, EMBEDDING_DIM)
            .unwrap();
        let id = session
            .create_scene(Scene::new("The flooded Cavern", Position::new(3.0, 0.5)).with_id("cavern"))
            .unwrap();
        session
            .store_embedding(&id, embedding_with_similarity(0.55), NodeLabel::Scene)
            .unwrap();
    }
    let user = UserId::from("diver");

    let result = orchestrator(&store, &["cavern"]).process_movement(&user, "swim to the cavern");

    assert!(result.success);
    assert_eq!(result.new_position, Some(Position::new(3.0, 0.5)));
    assert!(matches!(
        result.resolution,
        Some(Resolution::Destination {
            source: MatchSource::Substring,
            similarity: None,
            ..
        })
    ));
}

#[test]
fn test_low_similarity_without_text_match_is_not_found() {
    let store = WorldStore::in_memory();
    {
        let session = store.session().unwrap();
        session
            .declare_vector_index(NodeLabel::Scene, EMBEDDING_DIM)
            .unwrap();
        let id = session
            .create_scene(Scene::new("a sunny meadow", Position::new(3.0, 0.5)))
            .unwrap();
        session
            .store_embedding(&id, embedding_with_similarity(0.55), NodeLabel::Scene)
            .unwrap();
    }
    let user = UserId::from("diver");

    let result = orchestrator(&store, &["洞穴"]).process_movement(&user, "去洞穴");

    assert!(!result.success);
    assert_eq!(
        result.failure,
        Some(MovementFailure::DestinationNotFound("洞穴".to_string()))
    );
    assert_eq!(stored_position(&store, &user), Some(Position::ORIGIN));
}

#[test]
fn test_unparsable_direction_is_not_understood() {
    let store = WorldStore::in_memory();
    let user = UserId::from("confused");

    let result = orchestrator(&store, &["", "UP,1.0"]).process_movement(&user, "fly upwards");

    assert!(!result.success);
    assert_eq!(result.message, "command not understood");
    assert_eq!(stored_position(&store, &user), Some(Position::ORIGIN));
}

#[test]
fn test_oversized_step_is_clamped() {
    let store = WorldStore::in_memory();
    let user = UserId::from("sprinter");

    let result = orchestrator(&store, &["", "E,5.0"]).process_movement(&user, "run east");

    assert_eq!(result.new_position, Some(Position::new(2.0, 0.0)));
}

#[test]
fn test_prompts_use_configured_sampling() {
    let store = WorldStore::in_memory();
    let script = Script::new(&["", "S,1.0"]);
    MovementOrchestrator::new(&store, &script, AxisEmbedder, MovementConfig::default())
        .process_movement(&UserId::from("u"), "head south");

    let prompts = script.prompts.borrow();
    assert_eq!(prompts.len(), 2);
    assert_eq!(prompts[0].max_tokens, 50);
    assert_eq!(prompts[1].max_tokens, 10);
    assert!(prompts[0].prompt.contains("head south"));
    assert!(prompts[1].prompt.contains("head south"));
}

/// Wraps a [`WorldStore`] and injects faults into selected operations.
struct FlakyStore {
    inner: WorldStore,
    fail_writes: bool,
    fail_nearby: bool,
    fail_similarity: bool,
    panic_in_similarity: bool,
}

impl FlakyStore {
    fn new(inner: WorldStore) -> Self {
        Self {
            inner,
            fail_writes: false,
            fail_nearby: false,
            fail_similarity: false,
            panic_in_similarity: false,
        }
    }
}

struct FlakySession<'a> {
    inner: WorldSession<'a>,
    owner: &'a FlakyStore,
}

fn injected() -> StoreError {
    StoreError::Unavailable("injected fault".to_string())
}

impl SpatialStore for FlakySession<'_> {
    fn get_position(&self, user_id: &UserId) -> StoreResult<PositionLookup> {
        self.inner.get_position(user_id)
    }

    fn set_position(&self, user_id: &UserId, position: Position) -> StoreResult<bool> {
        if self.owner.fail_writes {
            return Err(injected());
        }
        self.inner.set_position(user_id, position)
    }

    fn create_user(&self, user_id: &UserId, position: Position) -> StoreResult<()> {
        self.inner.create_user(user_id, position)
    }

    fn create_scene(&self, scene: Scene) -> StoreResult<SceneId> {
        self.inner.create_scene(scene)
    }

    fn find_scene_by_text(&self, query: &str, limit: usize) -> StoreResult<Vec<Scene>> {
        self.inner.find_scene_by_text(query, limit)
    }

    fn find_nearby_scenes(&self, position: Position, radius: f64) -> StoreResult<Vec<NearbyScene>> {
        if self.owner.fail_nearby {
            return Err(injected());
        }
        self.inner.find_nearby_scenes(position, radius)
    }

    fn declare_vector_index(&self, label: NodeLabel, dimension: usize) -> StoreResult<()> {
        self.inner.declare_vector_index(label, dimension)
    }

    fn store_embedding(
        &self,
        node_id: &SceneId,
        embedding: Embedding,
        label: NodeLabel,
    ) -> StoreResult<()> {
        self.inner.store_embedding(node_id, embedding, label)
    }

    fn find_nearest_by_embedding(
        &self,
        embedding: &Embedding,
        label: NodeLabel,
        min_similarity: f32,
        limit: usize,
    ) -> StoreResult<Vec<SimilarScene>> {
        if self.owner.panic_in_similarity {
            panic!("similarity backend crashed");
        }
        if self.owner.fail_similarity {
            return Err(injected());
        }
        self.inner
            .find_nearest_by_embedding(embedding, label, min_similarity, limit)
    }
}

impl StoreConnector for FlakyStore {
    type Session<'a> = FlakySession<'a>;

    fn connect(&self) -> StoreResult<FlakySession<'_>> {
        Ok(FlakySession {
            inner: self.inner.session()?,
            owner: self,
        })
    }
}

fn flaky_orchestrator(
    store: FlakyStore,
    replies: &[&str],
) -> MovementOrchestrator<FlakyStore, Script, AxisEmbedder> {
    MovementOrchestrator::new(store, Script::new(replies), AxisEmbedder, MovementConfig::default())
}

#[test]
fn test_failed_write_after_step_reports_update_failure() {
    let mut store = FlakyStore::new(WorldStore::in_memory());
    store.fail_writes = true;
    let orchestrator = flaky_orchestrator(store, &["", "E,1.0"]);
    let user = UserId::from("stuck");

    let result = orchestrator.process_movement(&user, "east");

    assert!(!result.success);
    assert_eq!(result.message, "failed to update position");
    assert_eq!(result.new_position, None);
    assert_eq!(
        stored_position(&orchestrator.store().inner, &user),
        Some(Position::ORIGIN)
    );
    assert_eq!(orchestrator.store().inner.open_sessions(), 0);
}

#[test]
fn test_failed_write_after_destination_reports_update_failure() {
    let mut store = FlakyStore::new(cave_world());
    store.fail_writes = true;
    let orchestrator = flaky_orchestrator(store, &["洞穴"]);

    let result = orchestrator.process_movement(&UserId::from("explorer"), "去神秘的洞穴");

    assert_eq!(result.failure, Some(MovementFailure::UpdateFailed));
    assert_eq!(orchestrator.store().inner.open_sessions(), 0);
}

#[test]
fn test_nearby_failure_keeps_persisted_step() {
    let mut store = FlakyStore::new(WorldStore::in_memory());
    store.fail_nearby = true;
    let orchestrator = flaky_orchestrator(store, &["", "N,1.0"]);
    let user = UserId::from("blind");

    let result = orchestrator.process_movement(&user, "north");

    assert!(!result.success);
    assert_eq!(result.failure, Some(MovementFailure::NearbyUnavailable));
    let pos = result.new_position.unwrap();
    assert!(pos.r.abs() < 1e-9);
    assert!((pos.theta - 1.0).abs() < 1e-9);
    assert_eq!(stored_position(&orchestrator.store().inner, &user), Some(pos));
}

#[test]
fn test_similarity_fault_reports_store_unavailable() {
    let mut store = FlakyStore::new(cave_world());
    store.fail_similarity = true;
    let orchestrator = flaky_orchestrator(store, &["洞穴"]);

    let result = orchestrator.process_movement(&UserId::from("explorer"), "去神秘的洞穴");

    assert_eq!(result.message, "store unavailable");
    assert_eq!(orchestrator.store().inner.open_sessions(), 0);
}

#[test]
fn test_sessions_are_released_on_every_path() {
    let store = cave_world();
    let user = UserId::from("busy");
    let runs: [&[&str]; 4] = [&["洞穴"], &["", "W,0.3"], &["", "nonsense"], &["atlantis"]];
    for replies in runs {
        orchestrator(&store, replies).process_movement(&user, "go somewhere");
        assert_eq!(store.open_sessions(), 0);
    }
}

#[test]
fn test_exhausted_session_pool_fails_cleanly() {
    let store = WorldStore::in_memory().with_max_sessions(1);
    let _held = store.session().unwrap();

    let result = orchestrator(&store, &["", "E,1.0"]).process_movement(&UserId::from("u"), "east");

    assert_eq!(result.failure, Some(MovementFailure::PositionUnavailable));
    assert_eq!(store.open_sessions(), 1);
}

#[test]
fn test_session_is_released_when_a_panic_unwinds() {
    let mut store = FlakyStore::new(cave_world());
    store.panic_in_similarity = true;
    let orchestrator = flaky_orchestrator(store, &["洞穴"]);

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        orchestrator.process_movement(&UserId::from("explorer"), "去神秘的洞穴")
    }));

    assert!(outcome.is_err());
    assert_eq!(orchestrator.store().inner.open_sessions(), 0);
    assert!(orchestrator.store().inner.session().is_ok());
}
