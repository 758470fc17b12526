//! Direction resolution: command text to a clamped compass step.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use world_rules::{clamp_step, Compass};

use super::PromptSettings;
use crate::oracle::{prompts, CompletionRequest, LanguageOracle};

/// A resolved directional step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub direction: Compass,
    /// Always within `[MIN_STEP, MAX_STEP]`.
    pub distance: f64,
}

/// Asks the language oracle for a `DIRECTION,DISTANCE` pair.
#[derive(Debug, Clone)]
pub struct DirectionResolver<L> {
    oracle: L,
    temperature: f32,
    max_tokens: u32,
}

impl<L: LanguageOracle> DirectionResolver<L> {
    pub fn new(oracle: L, settings: &PromptSettings) -> Self {
        Self {
            oracle,
            temperature: settings.direction_temperature,
            max_tokens: settings.direction_max_tokens,
        }
    }

    /// Resolve `command` into a step, or `None` if the oracle gave nothing usable.
    pub fn resolve(&self, command: &str) -> Option<Step> {
        let request = CompletionRequest::new(
            prompts::direction_prompt(command),
            self.temperature,
            self.max_tokens,
        );
        let raw = match self.oracle.complete(&request) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(error = %err, "direction oracle failed");
                return None;
            }
        };

        let step = parse_step(&raw);
        match &step {
            Some(step) => debug!(direction = %step.direction, distance = step.distance, "resolved step"),
            None => debug!(raw = %raw, "unparsable direction reply"),
        }
        step
    }
}

/// Parse a `DIRECTION,DISTANCE` reply and clamp the distance into `[MIN_STEP, MAX_STEP]`.
///
/// Only the first non-empty line is read. The direction must be one of the
/// eight upper-case tokens and the distance a finite number. An ASCII or a
/// full-width comma separates the two.
pub fn parse_step(raw: &str) -> Option<Step> {
    let line = raw.lines().map(str::trim).find(|l| !l.is_empty())?;
    let mut parts = line.split([',', '，']);
    let direction = parts.next()?.trim().parse::<Compass>().ok()?;
    let distance = parts.next()?.trim().parse::<f64>().ok()?;
    if parts.next().is_some() || !distance.is_finite() {
        return None;
    }
    Some(Step {
        direction,
        distance: clamp_step(distance),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::OracleError;

    struct Reply(Result<&'static str, OracleError>);

    impl LanguageOracle for Reply {
        fn complete(&self, _request: &CompletionRequest) -> Result<String, OracleError> {
            self.0.clone().map(str::to_string)
        }
    }

    fn resolver(reply: Result<&'static str, OracleError>) -> DirectionResolver<Reply> {
        DirectionResolver::new(Reply(reply), &PromptSettings::default())
    }

    #[test]
    fn test_parse_valid_replies() {
        assert_eq!(
            parse_step("E,1.0"),
            Some(Step {
                direction: Compass::E,
                distance: 1.0
            })
        );
        assert_eq!(
            parse_step("  NW , 0.5\n"),
            Some(Step {
                direction: Compass::NW,
                distance: 0.5
            })
        );
        assert_eq!(parse_step("SE，2").unwrap().direction, Compass::SE);
    }

    #[test]
    fn test_distance_is_clamped() {
        assert_eq!(parse_step("N,5.0").unwrap().distance, 2.0);
        assert_eq!(parse_step("S,0.01").unwrap().distance, 0.1);
        assert_eq!(parse_step("W,-4").unwrap().distance, 0.1);
    }

    #[test]
    fn test_rejects_malformed_replies() {
        for raw in [
            "",
            "E",
            "east,1.0",
            "e,1.0",
            "NNE,1.0",
            "E,far",
            "E,1.0,2.0",
            "E,NaN",
            "E,inf",
            "I cannot determine a direction.",
        ] {
            assert_eq!(parse_step(raw), None, "accepted {raw:?}");
        }
    }

    #[test]
    fn test_resolver_maps_oracle_failure_to_none() {
        assert!(resolver(Err(OracleError::Timeout)).resolve("向东走一步").is_none());
        assert!(resolver(Ok("not sure")).resolve("dance").is_none());
    }

    #[test]
    fn test_resolver_infers_step() {
        let step = resolver(Ok("NE,0.5")).resolve("到处逛逛").unwrap();
        assert_eq!(step.direction, Compass::NE);
        assert_eq!(step.distance, 0.5);

        let step = resolver(Ok("E,5.0")).resolve("run east as far as you can").unwrap();
        assert_eq!(step.distance, 2.0);
    }
}
