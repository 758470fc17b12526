//! Destination resolution: phrase extraction, then semantic match, then substring match.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use world_rules::{Embedding, NodeLabel, Scene, SimilarScene, WorldError};

use super::PromptSettings;
use crate::config::MovementConfig;
use crate::oracle::{prompts, CompletionRequest, EmbeddingOracle, LanguageOracle};
use crate::store::{SpatialStore, StoreError, StoreResult};

/// Characters an oracle may wrap around an otherwise empty or bare phrase.
const QUOTE_CHARS: &[char] = &['"', '\'', '`', '“', '”', '「', '」', '《', '》'];

/// Ask the language oracle for the destination named in `command`.
///
/// Returns `None` for an empty answer or any oracle failure.
pub fn extract_destination<L: LanguageOracle>(
    oracle: &L,
    command: &str,
    settings: &PromptSettings,
) -> Option<String> {
    let request = CompletionRequest::new(
        prompts::destination_prompt(command),
        settings.destination_temperature,
        settings.destination_max_tokens,
    );
    match oracle.complete(&request) {
        Ok(raw) => clean_phrase(&raw),
        Err(err) => {
            warn!(error = %err, "destination extraction failed, treating as no destination");
            None
        }
    }
}

fn clean_phrase(raw: &str) -> Option<String> {
    let phrase = raw.trim().trim_matches(QUOTE_CHARS).trim();
    (!phrase.is_empty()).then(|| phrase.to_string())
}

/// Which path of the pipeline produced a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchSource {
    /// Embedding similarity at or above the floor.
    Semantic,
    /// Case-insensitive substring of a scene description.
    Substring,
}

/// A resolved destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestinationMatch {
    pub scene: Scene,
    pub source: MatchSource,
    /// Present for semantic matches only.
    pub similarity: Option<f32>,
}

/// Resolves a destination phrase to a scene.
///
/// The canonical pipeline is [`resolve_semantic`](Self::resolve_semantic)
/// first and [`resolve_by_text`](Self::resolve_by_text) only when the
/// semantic path finds nothing.
#[derive(Debug, Clone)]
pub struct DestinationResolver<E> {
    embedder: E,
    similarity_floor: f32,
    text_fallback_limit: usize,
}

impl<E: EmbeddingOracle> DestinationResolver<E> {
    pub fn new(embedder: E, config: &MovementConfig) -> Self {
        Self {
            embedder,
            similarity_floor: config.similarity_floor,
            text_fallback_limit: config.text_fallback_limit,
        }
    }

    /// Semantic match first, substring fallback second.
    pub fn resolve<S: SpatialStore + ?Sized>(
        &self,
        store: &S,
        phrase: &str,
    ) -> StoreResult<Option<DestinationMatch>> {
        if let Some(hit) = self.resolve_semantic(store, phrase)? {
            debug!(scene_id = %hit.scene.id, similarity = hit.similarity, "semantic destination match");
            return Ok(Some(DestinationMatch {
                scene: hit.scene,
                source: MatchSource::Semantic,
                similarity: Some(hit.similarity),
            }));
        }

        let fallback = self.resolve_by_text(store, phrase)?;
        if let Some(scene) = &fallback {
            debug!(scene_id = %scene.id, "substring destination match");
        }
        Ok(fallback.map(|scene| DestinationMatch {
            scene,
            source: MatchSource::Substring,
            similarity: None,
        }))
    }

    /// Best embedding match at or above the similarity floor.
    ///
    /// An embedding oracle failure, a vector of the wrong width or a store
    /// without a scene vector index yields `Ok(None)`; it never falls back to
    /// a different dimension.
    pub fn resolve_semantic<S: SpatialStore + ?Sized>(
        &self,
        store: &S,
        phrase: &str,
    ) -> StoreResult<Option<SimilarScene>> {
        let Some(query) = self.embed(phrase) else {
            return Ok(None);
        };
        let mut hits =
            match store.find_nearest_by_embedding(&query, NodeLabel::Scene, self.similarity_floor, 1) {
                Ok(hits) => hits,
                Err(StoreError::World(WorldError::MissingVectorIndex(_))) => {
                    debug!("no scene vector index declared, skipping semantic match");
                    return Ok(None);
                }
                Err(err) => return Err(err),
            };
        Ok(if hits.is_empty() {
            None
        } else {
            Some(hits.swap_remove(0))
        })
    }

    /// First scene, in store order, whose description contains `phrase`.
    pub fn resolve_by_text<S: SpatialStore + ?Sized>(
        &self,
        store: &S,
        phrase: &str,
    ) -> StoreResult<Option<Scene>> {
        let scenes = store.find_scene_by_text(phrase, self.text_fallback_limit)?;
        Ok(scenes.into_iter().next())
    }

    fn embed(&self, phrase: &str) -> Option<Embedding> {
        let raw = match self.embedder.embed(phrase) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(error = %err, "embedding oracle failed");
                return None;
            }
        };
        match Embedding::new(raw) {
            Ok(embedding) => Some(embedding),
            Err(err) => {
                warn!(error = %err, "embedding oracle returned an unusable vector");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::OracleError;
    use crate::store::WorldStore;
    use std::cell::RefCell;
    use world_rules::{Position, EMBEDDING_DIM};

    struct FixedEmbedder(Result<Vec<f32>, OracleError>);

    impl EmbeddingOracle for FixedEmbedder {
        fn embed(&self, _text: &str) -> Result<Vec<f32>, OracleError> {
            self.0.clone()
        }
    }

    struct Answer {
        reply: Result<String, OracleError>,
        seen: RefCell<Vec<CompletionRequest>>,
    }

    impl LanguageOracle for Answer {
        fn complete(&self, request: &CompletionRequest) -> Result<String, OracleError> {
            self.seen.borrow_mut().push(request.clone());
            self.reply.clone()
        }
    }

    fn answer(reply: Result<&str, OracleError>) -> Answer {
        Answer {
            reply: reply.map(str::to_string),
            seen: RefCell::new(Vec::new()),
        }
    }

    fn query_axis() -> Vec<f32> {
        let mut v = vec![0.0; EMBEDDING_DIM];
        v[0] = 1.0;
        v
    }

    fn with_similarity(target: f32) -> Embedding {
        let mut v = vec![0.0; EMBEDDING_DIM];
        v[0] = target;
        v[1] = (1.0 - target * target).sqrt();
        Embedding::new(v).unwrap()
    }

    fn store_with(scenes: Vec<(Scene, Option<f32>)>) -> WorldStore {
        let store = WorldStore::in_memory();
        {
            let session = store.session().unwrap();
            session
                .declare_vector_index(NodeLabel::Scene, EMBEDDING_DIM)
                .unwrap();
            for (scene, similarity) in scenes {
                let id = session.create_scene(scene).unwrap();
                if let Some(s) = similarity {
                    session
                        .store_embedding(&id, with_similarity(s), NodeLabel::Scene)
                        .unwrap();
                }
            }
        }
        store
    }

    #[test]
    fn test_extract_destination_variants() {
        let settings = PromptSettings::default();
        assert_eq!(
            extract_destination(&answer(Ok(" 洞穴 \n")), "去神秘的洞穴", &settings).as_deref(),
            Some("洞穴")
        );
        assert_eq!(extract_destination(&answer(Ok("")), "向前走", &settings), None);
        assert_eq!(extract_destination(&answer(Ok("\"\"")), "向前走", &settings), None);
        assert_eq!(
            extract_destination(&answer(Ok("“the old mill”")), "go", &settings).as_deref(),
            Some("the old mill")
        );
        assert_eq!(
            extract_destination(&answer(Err(OracleError::Timeout)), "go", &settings),
            None
        );
    }

    #[test]
    fn test_extract_destination_uses_destination_sampling() {
        let oracle = answer(Ok(""));
        extract_destination(&oracle, "walk", &PromptSettings::default());
        let seen = oracle.seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].max_tokens, 50);
        assert!((seen[0].temperature - 0.1).abs() < f32::EPSILON);
    }

    #[test]
    fn test_semantic_hit_above_floor() {
        let store = store_with(vec![(
            Scene::new("一个神秘的洞穴入口", Position::new(1.0, 0.785)).with_id("cave"),
            Some(0.82),
        )]);
        let resolver =
            DestinationResolver::new(FixedEmbedder(Ok(query_axis())), &MovementConfig::default());
        let session = store.session().unwrap();

        let hit = resolver.resolve(&session, "洞穴").unwrap().unwrap();
        assert_eq!(hit.scene.id.as_str(), "cave");
        assert_eq!(hit.source, MatchSource::Semantic);
        assert!((hit.similarity.unwrap() - 0.82).abs() < 1e-4);
    }

    #[test]
    fn test_semantic_below_floor_is_none() {
        let store = store_with(vec![(
            Scene::new("a quiet grove", Position::ORIGIN),
            Some(0.55),
        )]);
        let resolver =
            DestinationResolver::new(FixedEmbedder(Ok(query_axis())), &MovementConfig::default());
        let session = store.session().unwrap();

        assert!(resolver.resolve_semantic(&session, "grove?").unwrap().is_none());
        // The substring path does not match either, so the pipeline yields nothing.
        assert!(resolver.resolve(&session, "cavern").unwrap().is_none());
    }

    #[test]
    fn test_substring_fallback_when_semantic_misses() {
        let store = store_with(vec![
            (Scene::new("Windy CLIFF edge", Position::new(2.0, 1.0)).with_id("b"), Some(0.3)),
            (Scene::new("cliff path", Position::new(1.0, 1.0)).with_id("a"), None),
        ]);
        let resolver =
            DestinationResolver::new(FixedEmbedder(Ok(query_axis())), &MovementConfig::default());
        let session = store.session().unwrap();

        let hit = resolver.resolve(&session, "cliff").unwrap().unwrap();
        assert_eq!(hit.source, MatchSource::Substring);
        assert_eq!(hit.scene.id.as_str(), "a");
        assert!(hit.similarity.is_none());
    }

    #[test]
    fn test_undeclared_index_falls_back_to_text() {
        let store = WorldStore::in_memory();
        let session = store.session().unwrap();
        session
            .create_scene(Scene::new("Old lighthouse", Position::new(3.0, 0.2)).with_id("light"))
            .unwrap();
        let resolver =
            DestinationResolver::new(FixedEmbedder(Ok(query_axis())), &MovementConfig::default());

        assert!(resolver.resolve_semantic(&session, "lighthouse").unwrap().is_none());
        let hit = resolver.resolve(&session, "lighthouse").unwrap().unwrap();
        assert_eq!(hit.source, MatchSource::Substring);
        assert_eq!(hit.scene.id.as_str(), "light");
    }

    #[test]
    fn test_embedding_failures_fall_back_to_text() {
        let store = store_with(vec![(
            Scene::new("Sunken temple", Position::new(0.5, 0.5)).with_id("temple"),
            Some(0.99),
        )]);
        let session = store.session().unwrap();

        let wrong_width = DestinationResolver::new(
            FixedEmbedder(Ok(vec![1.0; 384])),
            &MovementConfig::default(),
        );
        assert!(wrong_width.resolve_semantic(&session, "temple").unwrap().is_none());
        let hit = wrong_width.resolve(&session, "temple").unwrap().unwrap();
        assert_eq!(hit.source, MatchSource::Substring);

        let offline = DestinationResolver::new(
            FixedEmbedder(Err(OracleError::Transport("connection refused".into()))),
            &MovementConfig::default(),
        );
        assert!(offline.resolve_semantic(&session, "temple").unwrap().is_none());
        assert_eq!(
            offline.resolve(&session, "TEMPLE").unwrap().unwrap().scene.id.as_str(),
            "temple"
        );
    }
}
