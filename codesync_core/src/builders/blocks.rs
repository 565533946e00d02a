//! Cross-cutting code blocks composed into generated method bodies.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::debug;

use crate::error::{CodesyncError, Result};
use crate::host::CapabilityProbe;
use crate::types::Parameter;

pub const INDENT: &str = "    ";

pub fn indent(level: usize) -> String {
    INDENT.repeat(level)
}

/// Enter, exit and error statements around a method body.
pub trait LoggingStrategy {
    fn enter(&self, method: &str) -> Option<String>;
    fn exit(&self, method: &str) -> Option<String>;
    fn error(&self, method: &str, exception: &str) -> Option<String>;
    fn imports(&self) -> Vec<String>;
}

/// Parameter validation emitted before a method body.
pub trait BoundsCheckStrategy {
    fn checks(&self, parameters: &[Parameter]) -> Vec<String>;
    fn imports(&self) -> Vec<String>;
}

/// Error-handling envelope around body statements.
pub trait ErrorHandlingStrategy {
    /// Wraps `body` (statements, unindented) and returns indented lines.
    fn wrap(&self, body: Vec<String>, method: &str, logger: &dyn LoggingStrategy, level: usize) -> Vec<String>;
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoggerBlock {
    #[default]
    None,
    /// `ILogger` from Microsoft.Extensions.Logging held in an instance field.
    Extensions { field: String },
    /// `System.Diagnostics.Trace`.
    Diagnostics,
}

impl LoggingStrategy for LoggerBlock {
    fn enter(&self, method: &str) -> Option<String> {
        match self {
            LoggerBlock::None => None,
            LoggerBlock::Extensions { field } => Some(format!(
                "{field}.LogDebug(\"Entering {{Method}}\", nameof({method}));"
            )),
            LoggerBlock::Diagnostics => Some(format!("Trace.WriteLine(\"Entering {method}\");")),
        }
    }

    fn exit(&self, method: &str) -> Option<String> {
        match self {
            LoggerBlock::None => None,
            LoggerBlock::Extensions { field } => Some(format!(
                "{field}.LogDebug(\"Exiting {{Method}}\", nameof({method}));"
            )),
            LoggerBlock::Diagnostics => Some(format!("Trace.WriteLine(\"Exiting {method}\");")),
        }
    }

    fn error(&self, method: &str, exception: &str) -> Option<String> {
        match self {
            LoggerBlock::None => None,
            LoggerBlock::Extensions { field } => Some(format!(
                "{field}.LogError({exception}, \"Error in {{Method}}\", nameof({method}));"
            )),
            LoggerBlock::Diagnostics => Some(format!(
                "Trace.TraceError($\"Error in {method}: {{{exception}}}\");"
            )),
        }
    }

    fn imports(&self) -> Vec<String> {
        match self {
            LoggerBlock::None => Vec::new(),
            LoggerBlock::Extensions { .. } => vec!["Microsoft.Extensions.Logging".to_string()],
            LoggerBlock::Diagnostics => vec!["System.Diagnostics".to_string()],
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BoundsCheckBlock {
    #[default]
    None,
    /// `ArgumentNullException` / `ArgumentException`.
    Standard,
    /// Argument exception from the managed error library.
    Managed {
        namespace: Option<String>,
        #[serde(default = "default_managed_argument_exception")]
        exception: String,
    },
}

impl BoundsCheckStrategy for BoundsCheckBlock {
    fn checks(&self, parameters: &[Parameter]) -> Vec<String> {
        let managed = match self {
            BoundsCheckBlock::None => return Vec::new(),
            BoundsCheckBlock::Standard => None,
            BoundsCheckBlock::Managed { exception, .. } => Some(exception),
        };
        parameters
            .iter()
            .filter(|parameter| {
                parameter.default_value.is_none()
                    && !parameter.type_ref.nullable
                    && !parameter.type_ref.is_value_type()
            })
            .map(|parameter| {
                let name = &parameter.name;
                match (managed, parameter.type_ref.is_string()) {
                    (None, true) => format!(
                        "if (string.IsNullOrEmpty({name})) throw new ArgumentException(\"Value cannot be null or empty.\", nameof({name}));"
                    ),
                    (None, false) => {
                        format!("if ({name} == null) throw new ArgumentNullException(nameof({name}));")
                    }
                    (Some(exception), true) => format!(
                        "if (string.IsNullOrEmpty({name})) throw new {exception}(nameof({name}), \"Value cannot be null or empty.\");"
                    ),
                    (Some(exception), false) => format!(
                        "if ({name} == null) throw new {exception}(nameof({name}), \"Value cannot be null.\");"
                    ),
                }
            })
            .collect()
    }

    fn imports(&self) -> Vec<String> {
        match self {
            BoundsCheckBlock::None => Vec::new(),
            BoundsCheckBlock::Standard => vec!["System".to_string()],
            BoundsCheckBlock::Managed { namespace, .. } => namespace.iter().cloned().collect(),
        }
    }
}

/// One `catch` clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatchBlock {
    pub exception: String,
    #[serde(default = "default_variable")]
    pub variable: String,
    /// Statements before the rethrow.
    #[serde(default)]
    pub statements: Vec<String>,
    /// Log through the logger's error statement.
    #[serde(default)]
    pub log: bool,
}

fn default_variable() -> String {
    "ex".to_string()
}

impl CatchBlock {
    pub fn new(exception: impl Into<String>) -> Self {
        Self {
            exception: exception.into(),
            variable: default_variable(),
            statements: Vec::new(),
            log: false,
        }
    }

    /// The catch-all that logs and rethrows.
    pub fn unhandled() -> Self {
        Self {
            exception: "Exception".to_string(),
            variable: default_variable(),
            statements: Vec::new(),
            log: true,
        }
    }

    pub fn is_catch_all(&self) -> bool {
        matches!(self.exception.as_str(), "Exception" | "System.Exception")
    }

    fn simple_exception(&self) -> &str {
        self.exception.rsplit('.').next().unwrap_or(&self.exception)
    }
}

/// Ordered catch chain; the unhandled catch-all is always last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TryBlock {
    catches: Vec<CatchBlock>,
}

impl Default for TryBlock {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl TryBlock {
    /// Keeps declaration order, drops repeated exception types and moves any
    /// user catch-all to the end as the unhandled catch. The unhandled catch
    /// always logs.
    pub fn new(catches: Vec<CatchBlock>) -> Self {
        let mut ordered: Vec<CatchBlock> = Vec::with_capacity(catches.len() + 1);
        let mut catch_all = None;
        for catch in catches {
            if catch.is_catch_all() {
                if catch_all.is_none() {
                    catch_all = Some(CatchBlock { log: true, ..catch });
                }
                continue;
            }
            if ordered
                .iter()
                .any(|existing| existing.simple_exception() == catch.simple_exception())
            {
                continue;
            }
            ordered.push(catch);
        }
        ordered.push(catch_all.unwrap_or_else(CatchBlock::unhandled));
        Self { catches: ordered }
    }

    pub fn catches(&self) -> &[CatchBlock] {
        &self.catches
    }

    /// First catch matching `exception` or one of its ancestors, in declaration
    /// order. The catch-all matches anything.
    pub fn handles(&self, exception: &str, ancestors: &[&str]) -> Option<&CatchBlock> {
        let simple = exception.rsplit('.').next().unwrap_or(exception);
        self.catches.iter().find(|catch| {
            catch.is_catch_all()
                || catch.simple_exception() == simple
                || ancestors.iter().any(|ancestor| {
                    ancestor.rsplit('.').next().unwrap_or(ancestor) == catch.simple_exception()
                })
        })
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub enum ErrorHandlingBlock {
    #[default]
    None,
    Try(TryBlock),
}

impl ErrorHandlingStrategy for ErrorHandlingBlock {
    fn wrap(&self, body: Vec<String>, method: &str, logger: &dyn LoggingStrategy, level: usize) -> Vec<String> {
        let outer = indent(level);
        let inner = indent(level + 1);
        let ErrorHandlingBlock::Try(block) = self else {
            return body.into_iter().map(|line| format!("{outer}{line}")).collect();
        };

        let mut lines = vec![format!("{outer}try"), format!("{outer}{{")];
        lines.extend(body.into_iter().map(|line| format!("{inner}{line}")));
        lines.push(format!("{outer}}}"));
        for catch in block.catches() {
            let logged = catch
                .log
                .then(|| logger.error(method, &catch.variable))
                .flatten();
            // The variable is only declared when something reads it.
            if logged.is_some() || !catch.statements.is_empty() {
                lines.push(format!("{outer}catch ({} {})", catch.exception, catch.variable));
            } else {
                lines.push(format!("{outer}catch ({})", catch.exception));
            }
            lines.push(format!("{outer}{{"));
            if let Some(statement) = logged {
                lines.push(format!("{inner}{statement}"));
            }
            lines.extend(catch.statements.iter().map(|line| format!("{inner}{line}")));
            lines.push(format!("{inner}throw;"));
            lines.push(format!("{outer}}}"));
        }
        lines
    }
}

/// The code blocks chosen for one target project.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CodeBlocks {
    pub logger: LoggerBlock,
    pub bounds_check: BoundsCheckBlock,
    pub error_handling: ErrorHandlingBlock,
}

impl CodeBlocks {
    pub fn imports(&self) -> Vec<String> {
        let mut imports = self.logger.imports();
        imports.extend(BoundsCheckStrategy::imports(&self.bounds_check));
        if matches!(self.error_handling, ErrorHandlingBlock::Try(_)) {
            imports.push("System".to_string());
        }
        imports.sort();
        imports.dedup();
        imports
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LoggingChoice {
    #[default]
    Auto,
    None,
    Extensions,
    Diagnostics,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BoundsCheckChoice {
    #[default]
    Auto,
    None,
    Standard,
    Managed,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ErrorHandlingChoice {
    #[default]
    Auto,
    None,
    Try,
}

/// Libraries the capability probe asks about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySettings {
    #[serde(default = "default_logging_library")]
    pub logging_library: String,
    #[serde(default = "default_logger_field")]
    pub logger_field: String,
    #[serde(default = "default_managed_library")]
    pub managed_error_library: String,
    #[serde(default = "default_managed_namespace")]
    pub managed_error_namespace: String,
    #[serde(default = "default_managed_exception")]
    pub managed_exception: String,
    /// Thrown by managed bounds checks.
    #[serde(default = "default_managed_argument_exception")]
    pub managed_argument_exception: String,
}

fn default_logging_library() -> String {
    "Microsoft.Extensions.Logging".to_string()
}

fn default_logger_field() -> String {
    "_logger".to_string()
}

fn default_managed_library() -> String {
    "Managed.Exceptions".to_string()
}

fn default_managed_namespace() -> String {
    "Managed.Exceptions".to_string()
}

fn default_managed_exception() -> String {
    "ManagedException".to_string()
}

fn default_managed_argument_exception() -> String {
    "ArgumentManagedException".to_string()
}

impl Default for CapabilitySettings {
    fn default() -> Self {
        Self {
            logging_library: default_logging_library(),
            logger_field: default_logger_field(),
            managed_error_library: default_managed_library(),
            managed_error_namespace: default_managed_namespace(),
            managed_exception: default_managed_exception(),
            managed_argument_exception: default_managed_argument_exception(),
        }
    }
}

/// Requested code blocks; `auto` entries are resolved through the probe.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSettings {
    #[serde(default)]
    pub logging: LoggingChoice,
    #[serde(default)]
    pub bounds_check: BoundsCheckChoice,
    #[serde(default)]
    pub error_handling: ErrorHandlingChoice,
    /// Catch clauses placed ahead of the unhandled catch.
    #[serde(default)]
    pub catches: Vec<CatchBlock>,
}

impl BlockSettings {
    fn needs_probe(&self) -> bool {
        self.logging == LoggingChoice::Auto
            || self.bounds_check == BoundsCheckChoice::Auto
            || self.error_handling == ErrorHandlingChoice::Auto
    }
}

/// Resolves the code blocks for `project`. The probe is consulted at most once
/// per library and only for `auto` choices.
pub async fn select_code_blocks(
    probe: &dyn CapabilityProbe,
    project: &str,
    settings: &BlockSettings,
    capabilities: &CapabilitySettings,
) -> Result<CodeBlocks> {
    let (has_logging, has_managed) = if settings.needs_probe() {
        let logging = probe
            .project_supports(project, &capabilities.logging_library)
            .await
            .map_err(|e| CodesyncError::host("project_supports", project, e))?;
        let managed = probe
            .project_supports(project, &capabilities.managed_error_library)
            .await
            .map_err(|e| CodesyncError::host("project_supports", project, e))?;
        (logging, managed)
    } else {
        (false, false)
    };

    let logger = match settings.logging {
        LoggingChoice::Auto if has_logging => LoggerBlock::Extensions {
            field: capabilities.logger_field.clone(),
        },
        LoggingChoice::Auto | LoggingChoice::None => LoggerBlock::None,
        LoggingChoice::Extensions => LoggerBlock::Extensions {
            field: capabilities.logger_field.clone(),
        },
        LoggingChoice::Diagnostics => LoggerBlock::Diagnostics,
    };

    let managed = BoundsCheckBlock::Managed {
        namespace: Some(capabilities.managed_error_namespace.clone()),
        exception: capabilities.managed_argument_exception.clone(),
    };
    let bounds_check = match settings.bounds_check {
        BoundsCheckChoice::Auto if has_managed => managed,
        BoundsCheckChoice::Auto | BoundsCheckChoice::Standard => BoundsCheckBlock::Standard,
        BoundsCheckChoice::None => BoundsCheckBlock::None,
        BoundsCheckChoice::Managed => managed,
    };

    let error_handling = match settings.error_handling {
        ErrorHandlingChoice::None => ErrorHandlingBlock::None,
        ErrorHandlingChoice::Try => ErrorHandlingBlock::Try(TryBlock::new(settings.catches.clone())),
        ErrorHandlingChoice::Auto => {
            let mut catches = Vec::new();
            if has_managed {
                catches.push(CatchBlock::new(capabilities.managed_exception.clone()));
            }
            catches.extend(settings.catches.iter().cloned());
            ErrorHandlingBlock::Try(TryBlock::new(catches))
        }
    };

    debug!(
        project,
        has_logging, has_managed, "Selected code blocks: logger={:?}, bounds={:?}", logger, bounds_check
    );
    Ok(CodeBlocks {
        logger,
        bounds_check,
        error_handling,
    })
}
