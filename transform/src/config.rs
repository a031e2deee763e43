use std::collections::HashMap;

use url::Url;
use xt_xsd::{CompileOptions, DEFAULT_PACKAGE};

use crate::error::ConfigError;

pub const SCHEMA_PATH_CONFIG: &str = "schema.path";
pub const PACKAGE_CONFIG: &str = "package";
pub const STRICT_CHECK_CONFIG: &str = "schema.strict.check.enabled";
pub const NAME_CONFLICT_RESOLUTION_CONFIG: &str =
    "schema.automatic.name.conflict.resolution.enabled";
pub const VERBOSE_CONFIG: &str = "schema.compiler.verbose.enabled";
pub const ALLOW_DTD_CONFIG: &str = "xml.allow.dtd";
pub const REROUTE_TOPIC_CONFIG: &str = "reroute.on.fail.topic";
pub const REROUTE_SCHEMA_NAME_CONFIG: &str = "reroute.on.fail.schema.name";

pub const DEFAULT_REROUTE_SCHEMA_NAME: &str = "xmltransform.dlq.schema";

/// Recognized settings with their documentation.
pub const SETTINGS: &[(&str, &str)] = &[
    (SCHEMA_PATH_CONFIG, "Comma separated URLs of the XSD documents to compile together."),
    (PACKAGE_CONFIG, "Package the compiled shape names are qualified with."),
    (STRICT_CHECK_CONFIG, "Fail on schema constructs that have no field representation."),
    (NAME_CONFLICT_RESOLUTION_CONFIG, "Suffix colliding shape and field names instead of failing."),
    (VERBOSE_CONFIG, "Log every compiled shape."),
    (ALLOW_DTD_CONFIG, "Allow a document type definition in schemas and payloads."),
    (REROUTE_TOPIC_CONFIG, "Topic that receives records which fail to convert. Empty fails the record instead."),
    (REROUTE_SCHEMA_NAME_CONFIG, "Fully-qualified name of the shape wrapping a rerouted payload."),
];

/// Typed view of the string settings a transform is configured with.
#[derive(Clone, Debug, PartialEq)]
pub struct FromXmlConfig {
    pub schema_urls: Vec<Url>,
    pub package: String,
    pub strict_check: bool,
    pub resolve_name_conflicts: bool,
    pub verbose: bool,
    pub allow_dtd: bool,
    pub reroute_topic: String,
    pub reroute_schema_name: String,
}

impl FromXmlConfig {
    /// Unknown keys are ignored.
    pub fn from_settings(settings: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let schema_path = settings
            .get(SCHEMA_PATH_CONFIG)
            .ok_or(ConfigError::Missing(SCHEMA_PATH_CONFIG))?;
        let schema_urls = schema_path
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                Url::parse(entry).map_err(|source| ConfigError::InvalidUrl {
                    key: SCHEMA_PATH_CONFIG,
                    value: entry.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        if schema_urls.is_empty() {
            return Err(ConfigError::Empty {
                key: SCHEMA_PATH_CONFIG,
            });
        }

        let package = string(settings, PACKAGE_CONFIG, DEFAULT_PACKAGE);
        if package.is_empty() {
            return Err(ConfigError::Empty { key: PACKAGE_CONFIG });
        }
        let reroute_schema_name =
            string(settings, REROUTE_SCHEMA_NAME_CONFIG, DEFAULT_REROUTE_SCHEMA_NAME);
        if reroute_schema_name.is_empty() {
            return Err(ConfigError::Empty {
                key: REROUTE_SCHEMA_NAME_CONFIG,
            });
        }

        Ok(Self {
            schema_urls,
            package,
            strict_check: boolean(settings, STRICT_CHECK_CONFIG)?,
            resolve_name_conflicts: boolean(settings, NAME_CONFLICT_RESOLUTION_CONFIG)?,
            verbose: boolean(settings, VERBOSE_CONFIG)?,
            allow_dtd: boolean(settings, ALLOW_DTD_CONFIG)?,
            reroute_topic: string(settings, REROUTE_TOPIC_CONFIG, ""),
            reroute_schema_name,
        })
    }

    /// `None` when failing records are not rerouted.
    pub fn reroute_topic(&self) -> Option<&str> {
        Some(self.reroute_topic.as_str()).filter(|topic| !topic.is_empty())
    }

    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            target_package: self.package.clone(),
            strict_check: self.strict_check,
            resolve_name_conflicts: self.resolve_name_conflicts,
            allow_dtd: self.allow_dtd,
            verbose: self.verbose,
        }
    }
}

fn string(settings: &HashMap<String, String>, key: &str, default: &str) -> String {
    settings
        .get(key)
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| default.to_string())
}

fn boolean(settings: &HashMap<String, String>, key: &'static str) -> Result<bool, ConfigError> {
    match settings.get(key).map(|value| value.trim()) {
        None => Ok(false),
        Some(value) => match value.to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" | "" => Ok(false),
            _ => Err(ConfigError::InvalidBool {
                key,
                value: value.to_string(),
            }),
        },
    }
}
