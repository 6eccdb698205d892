/// Errors raised while turning a [`TallyConfig`](crate::TallyConfig) into a
/// running [`Tally`](crate::Tally).
///
/// Runtime tier failures are never surfaced: the facade falls back and
/// logs instead.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The YAML document could not be parsed.
    #[error("invalid configuration: {0}")]
    Yaml(String),
    /// The accelerator URL is malformed.
    #[error("invalid accelerator url")]
    Accelerator(#[from] tally_redis::Error),
}
