use strum::Display;
use thiserror::Error;

/// Error type returned by host collaborators.
pub type HostError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// What kind of input could not be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum InputKind {
    #[strum(serialize = "source type")]
    SourceType,
    Project,
    Folder,
    #[strum(serialize = "artifact profile")]
    Profile,
    #[strum(serialize = "target artifact")]
    Artifact,
}

/// A required source type, project, folder or profile could not be resolved.
#[derive(Error, Debug)]
#[error("Missing {kind} '{name}': {cause}")]
pub struct MissingInputError {
    pub kind: InputKind,
    pub name: String,
    pub cause: String,
}

impl MissingInputError {
    pub fn new(kind: InputKind, name: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            cause: cause.into(),
        }
    }
}

/// A located artifact could not be loaded back into a structured model.
#[derive(Error, Debug)]
#[error("Artifact '{artifact}' in document '{document}' could not be loaded: {source}")]
pub struct StructuralLoadError {
    pub artifact: String,
    pub document: String,
    #[source]
    pub source: HostError,
}

#[derive(Error, Debug)]
pub enum CodesyncError {
    #[error(transparent)]
    MissingInput(#[from] MissingInputError),

    #[error(transparent)]
    StructuralLoad(#[from] StructuralLoadError),

    #[error("Host operation '{operation}' failed for artifact '{artifact}'{}: {source}", member_suffix(.member))]
    Host {
        operation: &'static str,
        artifact: String,
        member: Option<String>,
        #[source]
        source: HostError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidConfigValue { key: String, value: String },

    #[error("Environment variable not set: {0}")]
    EnvVarNotSet(String),

    #[error("Could not parse type '{input}': {message}")]
    TypeParse { input: String, message: String },

    #[error("Building member '{member}' of artifact '{artifact}' failed: {source}")]
    Builder {
        artifact: String,
        member: String,
        #[source]
        source: Box<CodesyncError>,
    },
}

fn member_suffix(member: &Option<String>) -> String {
    match member {
        Some(name) => format!(" (member '{name}')"),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, CodesyncError>;

impl CodesyncError {
    pub fn missing(kind: InputKind, name: impl Into<String>, cause: impl Into<String>) -> Self {
        CodesyncError::MissingInput(MissingInputError::new(kind, name, cause))
    }

    pub fn structural_load(
        artifact: impl Into<String>,
        document: impl Into<String>,
        source: HostError,
    ) -> Self {
        CodesyncError::StructuralLoad(StructuralLoadError {
            artifact: artifact.into(),
            document: document.into(),
            source,
        })
    }

    pub fn host(operation: &'static str, artifact: impl Into<String>, source: HostError) -> Self {
        CodesyncError::Host {
            operation,
            artifact: artifact.into(),
            member: None,
            source,
        }
    }

    pub fn host_member(
        operation: &'static str,
        artifact: impl Into<String>,
        member: impl Into<String>,
        source: HostError,
    ) -> Self {
        CodesyncError::Host {
            operation,
            artifact: artifact.into(),
            member: Some(member.into()),
            source,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        CodesyncError::Config(message.into())
    }

    pub fn type_parse(input: impl Into<String>, message: impl Into<String>) -> Self {
        CodesyncError::TypeParse {
            input: input.into(),
            message: message.into(),
        }
    }

    /// Wraps a failure raised while a builder emitted a member.
    pub fn builder(artifact: impl Into<String>, member: impl Into<String>, source: CodesyncError) -> Self {
        CodesyncError::Builder {
            artifact: artifact.into(),
            member: member.into(),
            source: Box::new(source),
        }
    }

    /// True for the missing-input family, which callers must never retry.
    pub fn is_missing_input(&self) -> bool {
        matches!(self, CodesyncError::MissingInput(_))
    }
}
