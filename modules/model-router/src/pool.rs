use domain::ModelConfig;

/// All enabled models with `is_free=true` (§4.2 "Standard pool").
pub fn standard_pool(models: &[ModelConfig]) -> Vec<&ModelConfig> {
    models.iter().filter(|m| m.enabled && m.is_free).collect()
}

/// Enabled models not in the standard pool — paid fallbacks and premium
/// tiers (§4.2 "SOTA pool").
pub fn sota_pool(models: &[ModelConfig]) -> Vec<&ModelConfig> {
    models.iter().filter(|m| m.enabled && !m.is_free).collect()
}

/// Restrict a pool to tool-capable models (§4.2 "Tool-capable subset").
pub fn tool_capable<'a>(pool: &[&'a ModelConfig]) -> Vec<&'a ModelConfig> {
    pool.iter().copied().filter(|m| m.supports_tools).collect()
}
