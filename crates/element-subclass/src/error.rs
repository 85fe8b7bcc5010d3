use thiserror::Error;

/// Failures reported by [`extend`](crate::extend). None of these can surface
/// from inside a callback.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("type name `{0}` contains an interior nul byte")]
    InvalidName(String),
    #[error("ABI mismatch while extending `{name}`: {detail}")]
    AbiMismatch { name: String, detail: String },
    #[error("type name `{name}` is already registered for `{existing}`")]
    NameConflict { name: String, existing: &'static str },
    #[error("type name `{0}` is owned by a native type")]
    NameTaken(String),
    #[error("class initialization of `{name}` panicked: {message}")]
    ClassInit { name: String, message: String },
    #[error("the runtime rejected the registration of `{0}`")]
    Rejected(String),
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ResolveError {
    #[error("handle refers to a released slot")]
    Stale,
    #[error("handle does not address a registry slot")]
    Invalid,
    #[error("instance carries no registry handle")]
    Unregistered,
    #[error("handle resolves to a value of another type")]
    TypeMismatch,
}

/// Every slot of the registry is in use.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("registry shard {shard} is full")]
pub struct RegistryFull {
    pub shard: usize,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("configuration was already installed with different values")]
    AlreadyConfigured,
    #[error("registry_shards must be within 1..=256, got {0}")]
    InvalidShardCount(usize),
    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MarshalError {
    #[error("expected a value of type {expected:?}, found {found:?}")]
    TypeMismatch {
        expected: crate::ValueType,
        found: crate::ValueType,
    },
    #[error("unknown value type tag {0}")]
    UnknownType(u32),
    #[error("string contains an interior nul byte")]
    InteriorNul,
    #[error("property `{0}` does not exist or rejected the value")]
    PropertyRejected(String),
    #[error("custom flow {kind} code {code} is outside its range")]
    FlowCode { kind: &'static str, code: i32 },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UriError {
    #[error("object does not implement the URI handler interface")]
    NotAHandler,
    #[error("URI contains an interior nul byte")]
    InteriorNul,
    #[error("URI rejected: {0}")]
    Rejected(String),
}
