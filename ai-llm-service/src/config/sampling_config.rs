//! Sampling parameters sent with every generation request.

use serde::{Deserialize, Serialize};

use crate::error_handler::{Result, env_opt_f32, env_opt_u32, validate_range_f32};

/// Generation sampling knobs.
///
/// Defaults favour factual answers over legal text: low temperature, a
/// moderate nucleus and a mild repetition penalty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Determinism vs. diversity (0.0 = greedy).
    pub temperature: f32,
    /// Sample only among the `top_k` most likely tokens.
    pub top_k: u32,
    /// Nucleus sampling cutoff.
    pub top_p: f32,
    /// Penalty applied to already generated tokens (1.0 = off).
    pub repeat_penalty: f32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            top_k: 50,
            top_p: 0.9,
            repeat_penalty: 1.1,
        }
    }
}

impl SamplingConfig {
    /// Reads `LLM_TEMPERATURE`, `LLM_TOP_K`, `LLM_TOP_P`, `LLM_REPEAT_PENALTY`,
    /// falling back to [`Default`] per field, then validates the result.
    pub fn from_env() -> Result<Self> {
        let d = Self::default();
        let cfg = Self {
            temperature: env_opt_f32("LLM_TEMPERATURE")?.unwrap_or(d.temperature),
            top_k: env_opt_u32("LLM_TOP_K")?.unwrap_or(d.top_k),
            top_p: env_opt_f32("LLM_TOP_P")?.unwrap_or(d.top_p),
            repeat_penalty: env_opt_f32("LLM_REPEAT_PENALTY")?.unwrap_or(d.repeat_penalty),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Checks every field against the range accepted by both providers.
    pub fn validate(&self) -> Result<()> {
        validate_range_f32("temperature", self.temperature, 0.0, 2.0)?;
        validate_range_f32("top_p", self.top_p, 0.0, 1.0)?;
        validate_range_f32("repeat_penalty", self.repeat_penalty, 0.0, 2.0)?;
        Ok(())
    }
}
