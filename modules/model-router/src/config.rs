use std::collections::HashSet;
use std::env;

use domain::{ModelConfig, ModelTier};

fn caps(names: &[&str]) -> HashSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// The built-in model pool, loaded at startup. Mirrors a typical
/// multi-provider LLM deployment: a couple of cheap, fast, free-tier
/// models that carry most of the validator's traffic, and paid/premium
/// fallbacks reserved for unicorn escalation.
pub fn default_table() -> Vec<ModelConfig> {
    vec![
        ModelConfig {
            id: "fast-free-a".into(),
            name: "Fast Free A".into(),
            provider: "provider-a".into(),
            base_weight: 60,
            context_window: 32_000,
            tier: ModelTier::Base,
            capabilities: caps(&["json", "classification"]),
            supports_tools: false,
            is_free: true,
            timeout_ms: 8_000,
            enabled: true,
        },
        ModelConfig {
            id: "fast-free-b".into(),
            name: "Fast Free B".into(),
            provider: "provider-b".into(),
            base_weight: 40,
            context_window: 16_000,
            tier: ModelTier::Base,
            capabilities: caps(&["json"]),
            supports_tools: false,
            is_free: true,
            timeout_ms: 8_000,
            enabled: true,
        },
        ModelConfig {
            id: "balanced-free-tools".into(),
            name: "Balanced Free (Tools)".into(),
            provider: "provider-a".into(),
            base_weight: 30,
            context_window: 64_000,
            tier: ModelTier::Mid,
            capabilities: caps(&["json", "tools", "classification"]),
            supports_tools: true,
            is_free: true,
            timeout_ms: 12_000,
            enabled: true,
        },
        ModelConfig {
            id: "sota-premium".into(),
            name: "SOTA Premium".into(),
            provider: "provider-c".into(),
            base_weight: 80,
            context_window: 200_000,
            tier: ModelTier::High,
            capabilities: caps(&["json", "tools", "reasoning"]),
            supports_tools: true,
            is_free: false,
            timeout_ms: 20_000,
            enabled: true,
        },
        ModelConfig {
            id: "sota-fallback".into(),
            name: "SOTA Fallback".into(),
            provider: "provider-d".into(),
            base_weight: 50,
            context_window: 128_000,
            tier: ModelTier::High,
            capabilities: caps(&["json", "reasoning"]),
            supports_tools: false,
            is_free: false,
            timeout_ms: 20_000,
            enabled: true,
        },
    ]
}

/// Apply per-model `enabled` overrides from the environment, e.g.
/// `MODEL_SOTA_PREMIUM_ENABLED=false`, following §9's "shared global
/// environment reads load into an immutable record at startup" discipline
/// — this is the one place that reads these variables.
pub fn apply_env_toggles(models: &mut [ModelConfig]) {
    for model in models.iter_mut() {
        let var = format!(
            "MODEL_{}_ENABLED",
            model.id.to_uppercase().replace('-', "_")
        );
        if let Ok(value) = env::var(&var) {
            model.enabled = value == "true" || value == "1";
        }
    }
}

/// Build the startup pool: the static table with environment toggles
/// applied.
pub fn load_pool() -> Vec<ModelConfig> {
    let mut models = default_table();
    apply_env_toggles(&mut models);
    models
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_is_non_empty_and_has_both_free_and_paid_models() {
        let table = default_table();
        assert!(table.iter().any(|m| m.is_free));
        assert!(table.iter().any(|m| !m.is_free));
    }

    #[test]
    fn env_toggle_disables_matching_model() {
        let key = "MODEL_FAST_FREE_A_ENABLED";
        env::set_var(key, "false");
        let mut models = default_table();
        apply_env_toggles(&mut models);
        env::remove_var(key);

        let model = models.iter().find(|m| m.id == "fast-free-a").unwrap();
        assert!(!model.enabled);
    }
}
