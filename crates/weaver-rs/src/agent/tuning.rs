//! Per-model generation settings for Junior.
//!
//! Local models differ a lot in how they behave with the same request. The
//! table is keyed on a case-insensitive substring of the model name; the
//! first match wins and anything unmatched gets the defaults.

use std::time::Duration;

/// Generation parameters and HTTP timeout for one Junior model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelTuning {
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for ModelTuning {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            temperature: 0.7,
            timeout: Duration::from_secs(120),
        }
    }
}

/// Devstral writes long docstrings and spends a while on tool-call
/// generation, so it gets a bigger budget, a longer timeout and a low
/// temperature.
const DEVSTRAL: ModelTuning = ModelTuning {
    max_tokens: 16_384,
    temperature: 0.15,
    timeout: Duration::from_secs(300),
};

const TABLE: &[(&str, ModelTuning)] = &[("devstral", DEVSTRAL)];

impl ModelTuning {
    /// Look up the settings for `model`.
    pub fn for_model(model: &str) -> Self {
        let lower = model.to_lowercase();
        TABLE
            .iter()
            .find(|(pattern, _)| lower.contains(pattern))
            .map(|(_, tuning)| *tuning)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn devstral_is_matched_case_insensitively() {
        let tuning = ModelTuning::for_model("mistralai/Devstral-Small-2505");
        assert_eq!(tuning.max_tokens, 16_384);
        assert_eq!(tuning.temperature, 0.15);
        assert_eq!(tuning.timeout, Duration::from_secs(300));
    }

    #[test]
    fn unknown_model_gets_defaults() {
        let tuning = ModelTuning::for_model("gpt-oss:20b");
        assert_eq!(tuning, ModelTuning::default());
        assert_eq!(tuning.max_tokens, 4096);
        assert_eq!(tuning.timeout, Duration::from_secs(120));
    }
}
