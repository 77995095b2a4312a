/// §7 "Config" error kind: a missing credential fails only the affected
/// channel, never the whole dispatch — callers construct a provider at
/// startup and simply skip channels whose credentials are absent.
#[derive(Debug, thiserror::Error)]
pub enum ProviderConfigError {
    #[error("missing required environment variable {0}")]
    MissingEnvVar(String),
}
