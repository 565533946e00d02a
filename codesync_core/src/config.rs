use crate::builders::{BlockSettings, BodyStyle, CapabilitySettings, MarkerAttribute};
use crate::diff::DEFAULT_IGNORED_INTERFACES;
use crate::error::{CodesyncError, Result};
use crate::host::Location;
use crate::namespace::MappedNamespace;
use crate::naming::AsyncSuffix;
use crate::signature::ComparisonPolicy;
use crate::sync::{ArtifactKind, ClosureMode, NullablePolicy, SyncSettings};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{env, fs};
use tracing::{debug, error, info, trace, warn};

pub const CONFIG_FILE_NAME: &str = "codesync.toml";

fn default_true() -> bool {
    true
}

/// Where sources are read from and where artifacts are written.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct GeneralConfig {
    pub source_project: String,
    /// Narrows source lookups to one folder of the source project.
    #[serde(default)]
    pub source_folder: Option<String>,
    pub target_project: String,
    /// Defaults to the target project name.
    #[serde(default)]
    pub root_namespace: Option<String>,
    #[serde(default)]
    pub closure_mode: ClosureMode,
    /// Stamp generated members with the marker attribute. Turning this off also
    /// turns off orphan pruning.
    #[serde(default = "default_true")]
    pub mark_generated: bool,
    #[serde(default)]
    pub marker: Option<MarkerAttribute>,
    /// Comment out a stale conversion function and append the new one. When
    /// off, the function is replaced in place.
    #[serde(default = "default_true")]
    pub preserve_replaced: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InterfacesConfig {
    /// Marker interfaces skipped while flattening interface members.
    #[serde(default = "default_ignored_interfaces")]
    pub ignored: Vec<String>,
}

fn default_ignored_interfaces() -> Vec<String> {
    DEFAULT_IGNORED_INTERFACES.iter().map(|s| s.to_string()).collect()
}

impl Default for InterfacesConfig {
    fn default() -> Self {
        Self {
            ignored: default_ignored_interfaces(),
        }
    }
}

/// Per-kind overrides applied on top of the conventional profile.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ArtifactConfig {
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub folder: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub remove_prefixes: Option<Vec<String>>,
    #[serde(default)]
    pub remove_suffixes: Option<Vec<String>>,
    #[serde(default)]
    pub add_prefix: Option<String>,
    #[serde(default)]
    pub add_suffix: Option<String>,
    #[serde(default)]
    pub anchor_prefix: Option<String>,
    #[serde(default)]
    pub async_suffix: Option<AsyncSuffix>,
    #[serde(default)]
    pub policy: Option<ComparisonPolicy>,
    #[serde(default)]
    pub nullable: Option<NullablePolicy>,
    /// Field generated method bodies forward to.
    #[serde(default)]
    pub delegate_to: Option<String>,
    #[serde(default)]
    pub imports: Option<Vec<String>>,
    #[serde(default)]
    pub prune_orphans: Option<bool>,
    #[serde(default)]
    pub closure_mode: Option<ClosureMode>,
}

/// Root of `codesync.toml`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CodesyncConfig {
    pub general: GeneralConfig,
    #[serde(default)]
    pub capabilities: CapabilitySettings,
    #[serde(default)]
    pub blocks: BlockSettings,
    #[serde(default)]
    pub interfaces: InterfacesConfig,
    #[serde(default)]
    pub namespaces: Vec<MappedNamespace>,
    /// Keyed by artifact kind: `model`, `repository`, `contract`, `service`, `client`.
    #[serde(default)]
    pub artifacts: BTreeMap<String, ArtifactConfig>,
}

impl CodesyncConfig {
    /// Load configuration by searching for codesync.toml in the current
    /// directory and its ancestors.
    pub fn new() -> Result<CodesyncConfig> {
        info!("Loading codesync configuration");
        dotenv::dotenv().ok();
        debug!("Environment variables loaded from .env if present");

        let current_dir = env::current_dir()?;
        let config_path = Self::find_config_file(&current_dir)?;
        info!("Found configuration file at: {:?}", config_path);
        Self::from_path(&config_path)
    }

    pub fn from_path(path: &Path) -> Result<CodesyncConfig> {
        let contents = fs::read_to_string(path).map_err(|e| {
            error!("Failed to read configuration file: {}", e);
            CodesyncError::from(e)
        })?;
        debug!("Configuration file size: {} bytes", contents.len());
        Self::from_toml_str(&contents)
    }

    /// Parses configuration text and resolves `${VAR}` references.
    pub fn from_toml_str(contents: &str) -> Result<CodesyncConfig> {
        let mut config: CodesyncConfig = toml::from_str(contents)
            .inspect_err(|e| error!("Failed to parse TOML configuration: {}", e))?;
        debug!("Successfully parsed TOML configuration");

        config.substitute_all()?;
        info!(
            source = %config.general.source_project,
            target = %config.general.target_project,
            artifacts = config.artifacts.len(),
            "Configuration loaded successfully"
        );
        Ok(config)
    }

    /// Searches for `codesync.toml` starting at `start` and walking up to the
    /// filesystem root.
    pub fn find_config_file(start: &Path) -> Result<PathBuf> {
        debug!("Starting config file search from: {:?}", start);
        for path in start.ancestors() {
            let config_path = path.join(CONFIG_FILE_NAME);
            trace!("Checking for config at: {:?}", config_path);
            if config_path.exists() {
                return Ok(config_path);
            }
        }

        error!("Configuration file '{}' not found in any parent directory.", CONFIG_FILE_NAME);
        Err(CodesyncError::config(format!(
            "{CONFIG_FILE_NAME} not found in current or any parent directory."
        )))
    }

    fn substitute_all(&mut self) -> Result<()> {
        let general = &mut self.general;
        general.source_project = substitute_env_vars(&general.source_project)?;
        general.target_project = substitute_env_vars(&general.target_project)?;
        substitute_optional(&mut general.source_folder)?;
        substitute_optional(&mut general.root_namespace)?;

        for mapping in &mut self.namespaces {
            mapping.source = substitute_env_vars(&mapping.source)?;
            mapping.destination = substitute_env_vars(&mapping.destination)?;
        }
        for artifact in self.artifacts.values_mut() {
            substitute_optional(&mut artifact.project)?;
            substitute_optional(&mut artifact.folder)?;
            substitute_optional(&mut artifact.namespace)?;
        }
        Ok(())
    }
}

fn substitute_optional(value: &mut Option<String>) -> Result<()> {
    if let Some(inner) = value {
        *inner = substitute_env_vars(inner)?;
    }
    Ok(())
}

/// Substitute environment variables in config strings.
/// Supports `${VAR_NAME}` and `${VAR_NAME:-default}`.
pub fn substitute_env_vars(value: &str) -> Result<String> {
    trace!("Substituting environment variables in: {}", value);
    let re = Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}")
        .map_err(|e| CodesyncError::config(e.to_string()))?;

    let mut result = value.to_string();
    for cap in re.captures_iter(value) {
        let var_name = &cap[1];
        let default_value = cap.get(2).map(|m| m.as_str());

        let replacement = match env::var(var_name) {
            Ok(val) => {
                debug!("Resolved environment variable: {}", var_name);
                val
            }
            Err(_) => match default_value {
                Some(default) => {
                    warn!(
                        "Environment variable {} not set, using default: {}",
                        var_name, default
                    );
                    default.to_string()
                }
                None => {
                    error!(
                        "Environment variable {} not set and no default provided",
                        var_name
                    );
                    return Err(CodesyncError::EnvVarNotSet(var_name.to_string()));
                }
            },
        };
        result = result.replace(&cap[0], &replacement);
    }
    Ok(result)
}

impl SyncSettings {
    /// Runtime settings: conventional profiles with the configured overrides
    /// applied.
    pub fn from_config(config: &CodesyncConfig) -> Result<SyncSettings> {
        let general = &config.general;
        if general.source_project.trim().is_empty() {
            return Err(CodesyncError::InvalidConfigValue {
                key: "general.source_project".to_string(),
                value: general.source_project.clone(),
            });
        }
        if general.target_project.trim().is_empty() {
            return Err(CodesyncError::InvalidConfigValue {
                key: "general.target_project".to_string(),
                value: general.target_project.clone(),
            });
        }

        let source = match &general.source_folder {
            Some(folder) => Location::folder(&general.source_project, folder),
            None => Location::project(&general.source_project),
        };
        let root_namespace = general
            .root_namespace
            .clone()
            .unwrap_or_else(|| general.target_project.clone());

        let mut settings = SyncSettings::new(source, &general.target_project, &root_namespace);
        settings.set_closure_mode(general.closure_mode);
        settings.marker = general
            .mark_generated
            .then(|| general.marker.clone().unwrap_or_default());
        settings.ignored_interfaces = config.interfaces.ignored.clone();
        settings.namespaces = config.namespaces.clone();
        settings.blocks = config.blocks.clone();
        settings.capabilities = config.capabilities.clone();
        settings.preserve_replaced = general.preserve_replaced;

        for (key, overrides) in &config.artifacts {
            let kind = ArtifactKind::from_str(key).map_err(|_| CodesyncError::InvalidConfigValue {
                key: "artifacts".to_string(),
                value: key.clone(),
            })?;
            let Some(profile) = settings.profile_mut(kind) else {
                continue;
            };
            debug!(kind = %kind, "Applying artifact overrides");

            if let Some(project) = &overrides.project {
                profile.location.project = project.clone();
            }
            if let Some(folder) = &overrides.folder {
                profile.location.folder = (!folder.is_empty()).then(|| folder.clone());
            }
            if let Some(namespace) = &overrides.namespace {
                profile.namespace = namespace.clone();
            }
            if let Some(prefixes) = &overrides.remove_prefixes {
                profile.name_rule.remove_prefixes = prefixes.clone();
            }
            if let Some(suffixes) = &overrides.remove_suffixes {
                profile.name_rule.remove_suffixes = suffixes.clone();
            }
            if let Some(prefix) = &overrides.add_prefix {
                profile.name_rule.add_prefix = Some(prefix.clone());
            }
            if let Some(suffix) = &overrides.add_suffix {
                profile.name_rule.add_suffix = Some(suffix.clone());
            }
            if let Some(anchor) = &overrides.anchor_prefix {
                profile.anchor_prefix = (!anchor.is_empty()).then(|| anchor.clone());
            }
            if let Some(async_suffix) = overrides.async_suffix {
                profile.method_rule.async_suffix = async_suffix;
            }
            if let Some(policy) = overrides.policy {
                profile.policy = policy;
            }
            if let Some(nullable) = overrides.nullable {
                profile.nullable = nullable;
            }
            if let Some(target) = &overrides.delegate_to {
                profile.body_style = BodyStyle::Delegate {
                    target: target.clone(),
                };
            }
            if let Some(imports) = &overrides.imports {
                profile.default_imports = imports.clone();
            }
            if let Some(prune) = overrides.prune_orphans {
                profile.prune_orphans = prune;
            }
            if let Some(mode) = overrides.closure_mode {
                profile.closure = mode;
            }
        }
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::{BoundsCheckChoice, LoggingChoice};
    use tempfile::TempDir;

    const MINIMAL: &str = r#"
        [general]
        source_project = "Acme.Data"
        target_project = "Acme.App"
    "#;

    // ==================== Substitution Tests ====================

    #[test]
    fn test_substitute_env_vars_basic() {
        temp_env::with_var("CODESYNC_TEST_BASIC", Some("hello"), || {
            let result = substitute_env_vars("${CODESYNC_TEST_BASIC}").unwrap();
            assert_eq!(result, "hello");
        });
    }

    #[test]
    fn test_substitute_env_vars_with_surrounding_text() {
        temp_env::with_var("CODESYNC_TEST_COMPANY", Some("Acme"), || {
            let result = substitute_env_vars("${CODESYNC_TEST_COMPANY}.App.Models").unwrap();
            assert_eq!(result, "Acme.App.Models");
        });
    }

    #[test]
    fn test_substitute_env_vars_uses_default() {
        temp_env::with_var_unset("CODESYNC_TEST_UNSET", || {
            let result = substitute_env_vars("${CODESYNC_TEST_UNSET:-Acme.Data}").unwrap();
            assert_eq!(result, "Acme.Data");
        });
    }

    #[test]
    fn test_substitute_env_vars_missing_returns_error() {
        temp_env::with_var_unset("CODESYNC_TEST_MISSING", || {
            let err = substitute_env_vars("${CODESYNC_TEST_MISSING}").unwrap_err();
            assert!(matches!(err, CodesyncError::EnvVarNotSet(ref name) if name == "CODESYNC_TEST_MISSING"));
        });
    }

    #[test]
    fn test_substitute_env_vars_no_match() {
        assert_eq!(substitute_env_vars("Acme.{App}").unwrap(), "Acme.{App}");
        assert_eq!(substitute_env_vars("").unwrap(), "");
    }

    // ==================== File Search Tests ====================

    #[test]
    fn test_find_config_file_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let result = CodesyncConfig::find_config_file(temp_dir.path());
        // A codesync.toml somewhere above the temp dir would be found instead.
        if let Err(err) = result {
            assert!(err.to_string().contains("codesync.toml not found"));
        }
    }

    #[test]
    fn test_find_config_file_in_grandparent_dir() {
        let temp_dir = TempDir::new().unwrap();
        let grandchild = temp_dir.path().join("src").join("Models");
        fs::create_dir_all(&grandchild).unwrap();
        let config_path = temp_dir.path().join(CONFIG_FILE_NAME);
        fs::write(&config_path, MINIMAL).unwrap();

        let found = CodesyncConfig::find_config_file(&grandchild).unwrap();
        assert_eq!(found.canonicalize().unwrap(), config_path.canonicalize().unwrap());
    }

    #[test]
    fn test_from_path_reads_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join(CONFIG_FILE_NAME);
        fs::write(&config_path, MINIMAL).unwrap();

        let config = CodesyncConfig::from_path(&config_path).unwrap();
        assert_eq!(config.general.source_project, "Acme.Data");
        assert!(config.general.mark_generated);
    }

    #[test]
    fn test_from_path_missing_file_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = CodesyncConfig::from_path(&temp_dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, CodesyncError::Io(_)));
    }

    // ==================== Settings Tests ====================

    #[test]
    fn test_minimal_config_uses_conventions() {
        let config = CodesyncConfig::from_toml_str(MINIMAL).unwrap();
        let settings = SyncSettings::from_config(&config).unwrap();

        assert_eq!(settings.source, Location::project("Acme.Data"));
        let model = settings.profile(ArtifactKind::Model).unwrap();
        assert_eq!(model.namespace, "Acme.App.Models");
        assert_eq!(model.target_name("DbOrderEntity"), "OrderModel");
        assert_eq!(settings.marker, Some(MarkerAttribute::default()));
        assert!(settings.preserve_replaced);
        assert_eq!(settings.ignored_interfaces, default_ignored_interfaces());
        assert_eq!(settings.blocks.logging, LoggingChoice::Auto);
    }

    #[test]
    fn test_full_config() {
        let toml = r#"
            [general]
            source_project = "${CODESYNC_TEST_SOURCE:-Acme.Data}"
            source_folder = "Entities"
            target_project = "Acme.App"
            root_namespace = "Acme"
            closure_mode = "full"
            mark_generated = false
            preserve_replaced = false

            [blocks]
            logging = "none"
            bounds_check = "standard"

            [interfaces]
            ignored = ["IDisposable"]

            [[namespaces]]
            source = "Acme.Data"
            destination = "Acme.Shared"

            [artifacts.model]
            folder = "Dto"
            remove_suffixes = ["Entity"]
            add_suffix = "AppModel"

            [artifacts.service]
            delegate_to = "_orders"
            async_suffix = "keep"
        "#;
        temp_env::with_var_unset("CODESYNC_TEST_SOURCE", || {
            let config = CodesyncConfig::from_toml_str(toml).unwrap();
            let settings = SyncSettings::from_config(&config).unwrap();

            assert_eq!(settings.source, Location::folder("Acme.Data", "Entities"));
            assert_eq!(settings.marker, None);
            assert!(!settings.preserve_replaced);
            assert_eq!(settings.ignored_interfaces, vec!["IDisposable"]);
            assert_eq!(settings.namespaces, vec![MappedNamespace::new("Acme.Data", "Acme.Shared")]);
            assert_eq!(settings.blocks.bounds_check, BoundsCheckChoice::Standard);

            let model = settings.profile(ArtifactKind::Model).unwrap();
            assert_eq!(model.location, Location::folder("Acme.App", "Dto"));
            assert_eq!(model.namespace, "Acme.Models");
            assert_eq!(model.target_name("DbCustomerEntity"), "CustomerAppModel");
            assert_eq!(model.closure, ClosureMode::Full);

            let service = settings.profile(ArtifactKind::Service).unwrap();
            assert_eq!(
                service.body_style,
                BodyStyle::Delegate {
                    target: "_orders".to_string()
                }
            );
            assert_eq!(service.method_rule.async_suffix, AsyncSuffix::Keep);
        });
    }

    #[test]
    fn test_unknown_artifact_kind_is_rejected() {
        let toml = format!("{MINIMAL}\n[artifacts.controller]\nfolder = \"Api\"\n");
        let config = CodesyncConfig::from_toml_str(&toml).unwrap();
        let err = SyncSettings::from_config(&config).unwrap_err();
        assert!(matches!(err, CodesyncError::InvalidConfigValue { ref value, .. } if value == "controller"));
    }

    #[test]
    fn test_empty_target_project_is_rejected() {
        let toml = "[general]\nsource_project = \"Acme.Data\"\ntarget_project = \"\"\n";
        let config = CodesyncConfig::from_toml_str(toml).unwrap();
        assert!(SyncSettings::from_config(&config).is_err());
    }

    #[test]
    fn test_missing_general_section_is_toml_error() {
        let err = CodesyncConfig::from_toml_str("[blocks]\nlogging = \"none\"\n").unwrap_err();
        assert!(matches!(err, CodesyncError::Toml(_)));
        assert!(err.to_string().starts_with("TOML error: "));
    }
}
