//! Movement orchestration - one command, one position update.
//!
//! Each request runs two ordered phases over a single store session:
//! 1. **Destination**: if the command names a place, jump to the matching scene
//! 2. **Direction**: otherwise, take one clamped compass step and look around
//!
//! The session is dropped on every return path, and a panic unwinding out of
//! `process_movement` drops it too.

mod result;

pub use result::*;

use tracing::{info, warn};
use world_rules::{to_delta, NearbyScene, Position, UserId};

use crate::config::MovementConfig;
use crate::oracle::{EmbeddingOracle, LanguageOracle};
use crate::resolver::{extract_destination, DestinationResolver, DirectionResolver, PromptSettings};
use crate::store::{SpatialStore, StoreConnector};

/// Composes the store, the language oracle and the embedding oracle.
///
/// Holds no per-request state; concurrent calls only share the store, and
/// concurrent moves of the same user resolve last-writer-wins.
pub struct MovementOrchestrator<C, L, E> {
    store: C,
    language: L,
    destinations: DestinationResolver<E>,
    config: MovementConfig,
    prompts: PromptSettings,
}

impl<C, L, E> MovementOrchestrator<C, L, E>
where
    C: StoreConnector,
    L: LanguageOracle,
    E: EmbeddingOracle,
{
    pub fn new(store: C, language: L, embedder: E, config: MovementConfig) -> Self {
        Self {
            destinations: DestinationResolver::new(embedder, &config),
            store,
            language,
            config,
            prompts: PromptSettings::default(),
        }
    }

    pub fn with_prompt_settings(mut self, prompts: PromptSettings) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn store(&self) -> &C {
        &self.store
    }

    pub fn config(&self) -> &MovementConfig {
        &self.config
    }

    /// Resolve `command` for `user_id` and persist the result.
    ///
    /// Never fails at the call site; every problem becomes a failed
    /// [`MovementResult`].
    pub fn process_movement(&self, user_id: &UserId, command: &str) -> MovementResult {
        let session = match self.store.connect() {
            Ok(session) => session,
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "could not open store session");
                return MovementResult::failed(MovementFailure::PositionUnavailable);
            }
        };

        let current = match session.get_position(user_id) {
            Ok(lookup) => lookup.position(),
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "could not read position");
                return MovementResult::failed(MovementFailure::PositionUnavailable);
            }
        };

        if let Some(phrase) = extract_destination(&self.language, command, &self.prompts) {
            return self.travel_to_destination(&session, user_id, &phrase);
        }

        self.step_in_direction(&session, user_id, current, command)
    }

    fn travel_to_destination<S: SpatialStore>(
        &self,
        session: &S,
        user_id: &UserId,
        phrase: &str,
    ) -> MovementResult {
        let found = match self.destinations.resolve(session, phrase) {
            Ok(found) => found,
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "destination lookup failed");
                return MovementResult::failed(MovementFailure::StoreUnavailable);
            }
        };

        let Some(destination) = found else {
            info!(user_id = %user_id, phrase, "destination not found");
            return MovementResult::failed(MovementFailure::DestinationNotFound(phrase.to_string()));
        };

        let target = destination.scene.position;
        if !self.persist(session, user_id, target) {
            return MovementResult::failed(MovementFailure::UpdateFailed);
        }

        info!(
            user_id = %user_id,
            scene_id = %destination.scene.id,
            source = ?destination.source,
            "arrived at destination"
        );
        MovementResult {
            success: true,
            message: format!("arrived at: {}", destination.scene.description),
            new_position: Some(target),
            resolution: Some(Resolution::Destination {
                scene_id: destination.scene.id.clone(),
                source: destination.source,
                similarity: destination.similarity,
            }),
            nearby_scenes: Some(vec![NearbyScene {
                scene: destination.scene,
                distance: 0.0,
            }]),
            failure: None,
        }
    }

    fn step_in_direction<S: SpatialStore>(
        &self,
        session: &S,
        user_id: &UserId,
        current: Position,
        command: &str,
    ) -> MovementResult {
        let directions = DirectionResolver::new(&self.language, &self.prompts);
        let Some(step) = directions.resolve(command) else {
            info!(user_id = %user_id, "command not understood");
            return MovementResult::failed(MovementFailure::NotUnderstood);
        };

        let next = current.offset(to_delta(step.direction, step.distance));
        if !self.persist(session, user_id, next) {
            return MovementResult::failed(MovementFailure::UpdateFailed);
        }
        info!(
            user_id = %user_id,
            direction = %step.direction,
            distance = step.distance,
            r = next.r,
            theta = next.theta,
            "moved"
        );

        match session.find_nearby_scenes(next, self.config.nearby_radius) {
            Ok(nearby) => MovementResult {
                success: true,
                message: format!("moved to {next}"),
                new_position: Some(next),
                nearby_scenes: Some(nearby),
                resolution: Some(Resolution::Step(step)),
                failure: None,
            },
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "nearby lookup failed after move");
                MovementResult {
                    new_position: Some(next),
                    resolution: Some(Resolution::Step(step)),
                    ..MovementResult::failed(MovementFailure::NearbyUnavailable)
                }
            }
        }
    }

    fn persist<S: SpatialStore>(&self, session: &S, user_id: &UserId, position: Position) -> bool {
        match session.set_position(user_id, position) {
            Ok(true) => true,
            Ok(false) => {
                warn!(user_id = %user_id, "position write matched no user");
                false
            }
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "position write failed");
                false
            }
        }
    }
}
