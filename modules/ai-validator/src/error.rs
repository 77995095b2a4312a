/// Failure modes specific to calling and interpreting a model endpoint.
/// Converted to [`stream_consumer::ProcessingError`] at the `Handler`
/// boundary (§7's error-kind table) so the consumer framework can decide
/// retry/DLQ disposition without knowing about model semantics.
#[derive(Debug, thiserror::Error)]
pub enum ValidatorError {
    #[error("http error calling model endpoint: {0}")]
    Http(String),

    #[error("model endpoint returned status {0}")]
    Status(u16),

    #[error("model call timed out after {0}ms")]
    Timeout(u64),

    #[error("model response had no parseable content")]
    EmptyResponse,

    #[error("model output could not be parsed as the expected JSON object: {0}")]
    ParseFailure(String),

    #[error("no model was available for selection")]
    NoModelAvailable,
}
