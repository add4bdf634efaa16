//! Deployment targets loaded from a TOML targets file.
//!
//! Each target names a workspace host and the bundle variable overrides
//! (catalog, schema, table, warehouse) passed to every bundle command. The file
//! is read once per invocation and never written back.
//!
//! ```toml
//! [targets.dev]
//! host = "https://adb-1111111111111111.11.azuredatabricks.net"
//!
//! [targets.dev.variables]
//! catalog_name = "dev_catalog"
//! warehouse_id = "abc123"
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::Deserialize;

/// Default location of the targets file, relative to the working directory.
pub const DEFAULT_TARGETS_FILE: &str = "deploy/targets.toml";

/// Environment targets the bundle can be deployed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum)]
pub enum TargetName {
    /// Development workspace.
    Dev,
    /// Pre-production workspace.
    Staging,
    /// Production workspace.
    Prod,
}

impl TargetName {
    /// Name as passed to `bundle ... -t`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Staging => "staging",
            Self::Prod => "prod",
        }
    }
}

impl fmt::Display for TargetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while loading or selecting a target.
#[derive(Debug, thiserror::Error)]
pub enum TargetsError {
    /// The targets file could not be read.
    #[error("failed to read targets file {}: {source}", path.display())]
    Read {
        /// File that was requested.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The targets file is not valid TOML for the expected layout.
    #[error("failed to parse targets file {}: {source}", path.display())]
    Parse {
        /// File that was parsed.
        path: PathBuf,
        /// Underlying TOML failure.
        #[source]
        source: toml::de::Error,
    },
    /// The file declares a target outside the known set.
    #[error("unknown target `{name}`; expected dev, staging or prod")]
    UnknownTarget {
        /// Declared name.
        name: String,
    },
    /// The requested target is absent from the file.
    #[error("target `{target}` is not defined in the targets file")]
    Missing {
        /// Requested target.
        target: TargetName,
    },
    /// A target's host is blank.
    #[error("target `{target}` has an empty host")]
    EmptyHost {
        /// Offending target.
        target: TargetName,
    },
    /// Two targets point at the same workspace.
    #[error("targets `{first}` and `{second}` share host {host}")]
    DuplicateHost {
        /// Target declared first.
        first: TargetName,
        /// Target reusing the host.
        second: TargetName,
        /// Shared host.
        host: String,
    },
    /// A variable name cannot be passed as a bundle variable.
    #[error("target `{target}` has invalid variable name `{name}`")]
    InvalidVariable {
        /// Offending target.
        target: TargetName,
        /// Rejected variable name.
        name: String,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TargetsFileDto {
    #[serde(default)]
    targets: BTreeMap<String, TargetDto>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TargetDto {
    host: String,
    #[serde(default)]
    variables: BTreeMap<String, String>,
}

/// One resolved deployment target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentTarget {
    name: TargetName,
    host: String,
    variables: BTreeMap<String, String>,
}

impl DeploymentTarget {
    /// Build a target directly, without a file.
    pub fn new(
        name: TargetName,
        host: impl Into<String>,
        variables: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        Self {
            name,
            host: host.into(),
            variables: variables.into_iter().collect(),
        }
    }

    /// Target name.
    pub fn name(&self) -> TargetName {
        self.name
    }

    /// Workspace host exported as `DATABRICKS_HOST`.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Bundle variable overrides, ordered by name.
    pub fn variables(&self) -> &BTreeMap<String, String> {
        &self.variables
    }

    /// Overrides rendered as `--var=<key>=<value>` arguments.
    pub fn var_args(&self) -> Vec<String> {
        self.variables
            .iter()
            .map(|(key, value)| format!("--var={key}={value}"))
            .collect()
    }
}

/// All targets declared in a targets file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Targets {
    targets: BTreeMap<TargetName, DeploymentTarget>,
}

impl Targets {
    /// Read and validate the targets file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`TargetsError`] when the file is unreadable, malformed or
    /// declares an invalid target.
    pub fn load(path: &Path) -> Result<Self, TargetsError> {
        let raw = fs::read_to_string(path).map_err(|source| TargetsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw).map_err(|error| match error {
            ParseFailure::Toml(source) => TargetsError::Parse {
                path: path.to_path_buf(),
                source,
            },
            ParseFailure::Invalid(error) => error,
        })
    }

    /// Parse targets from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`TargetsError`] when the text is malformed or declares an
    /// invalid target.
    pub fn from_toml(raw: &str) -> Result<Self, TargetsError> {
        Self::parse(raw).map_err(|error| match error {
            ParseFailure::Toml(source) => TargetsError::Parse {
                path: PathBuf::from("<inline>"),
                source,
            },
            ParseFailure::Invalid(error) => error,
        })
    }

    fn parse(raw: &str) -> Result<Self, ParseFailure> {
        let dto: TargetsFileDto = toml::from_str(raw).map_err(ParseFailure::Toml)?;
        let mut targets = BTreeMap::new();
        let mut hosts: BTreeMap<String, TargetName> = BTreeMap::new();

        for (key, target) in dto.targets {
            let name = TargetName::from_str(&key, false)
                .map_err(|_| ParseFailure::Invalid(TargetsError::UnknownTarget { name: key }))?;
            let host = target.host.trim().trim_end_matches('/').to_owned();
            if host.is_empty() {
                return Err(ParseFailure::Invalid(TargetsError::EmptyHost { target: name }));
            }
            if let Some(first) = hosts.insert(host.clone(), name) {
                return Err(ParseFailure::Invalid(TargetsError::DuplicateHost {
                    first,
                    second: name,
                    host,
                }));
            }
            if let Some(bad) = target.variables.keys().find(|key| !is_variable_name(key)) {
                return Err(ParseFailure::Invalid(TargetsError::InvalidVariable {
                    target: name,
                    name: bad.clone(),
                }));
            }
            targets.insert(name, DeploymentTarget::new(name, host, target.variables));
        }

        Ok(Self { targets })
    }

    /// Select one target.
    ///
    /// # Errors
    ///
    /// Returns [`TargetsError::Missing`] when the file does not define it.
    pub fn select(&self, name: TargetName) -> Result<DeploymentTarget, TargetsError> {
        self.targets
            .get(&name)
            .cloned()
            .ok_or(TargetsError::Missing { target: name })
    }

    /// Names of the declared targets.
    pub fn names(&self) -> impl Iterator<Item = TargetName> + '_ {
        self.targets.keys().copied()
    }
}

enum ParseFailure {
    Toml(toml::de::Error),
    Invalid(TargetsError),
}

fn is_variable_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
