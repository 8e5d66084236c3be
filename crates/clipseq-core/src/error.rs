use thiserror::Error;

/// A configuration value or stored column that names no known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown duplicate policy `{0}` (expected `count` or `separate`)")]
    DuplicatePolicy(String),
    #[error("unknown join mode `{0}` (expected `cjk`, `english` or `custom`)")]
    JoinMode(String),
    #[error("unknown paste-all mode `{0}` (expected `merge` or `step`)")]
    PasteAllMode(String),
    #[error("unknown item kind `{0}`")]
    ItemKind(String),
    #[error("unknown item status `{0}`")]
    ItemStatus(String),
}
