//! Certificate request input: CLI arguments or a JSON input file, mapped
//! to the ACM `RequestCertificate` body.

use std::path::Path;

use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::error::RequestError;

const DOMAIN_NAME: &str = "DomainName";
const SUBJECT_ALTERNATIVE_NAMES: &str = "SubjectAlternativeNames";
const VALIDATION_DOMAIN: &str = "ValidationDomain";

/// ACM validation method; confirmation happens over email.
pub const VALIDATION_METHOD: &str = "EMAIL";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Certificate {
    pub domain_name: String,
    pub subject_alternative_names: Vec<String>,
    /// Domain ACM sends the approval emails for.
    pub validation_domain: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DomainValidationOption {
    pub domain_name: String,
    pub validation_domain: String,
}

/// JSON body of `CertificateManager.RequestCertificate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RequestCertificateBody {
    pub domain_name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subject_alternative_names: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub domain_validation_options: Vec<DomainValidationOption>,
    pub validation_method: &'static str,
}

impl Certificate {
    /// Build from CLI arguments. Blank values count as absent.
    pub fn new(
        domain_name: Option<String>,
        subject_alternative_names: Vec<String>,
        validation_domain: Option<String>,
    ) -> Result<Self, RequestError> {
        let domain_name = domain_name
            .filter(|d| !d.trim().is_empty())
            .ok_or(RequestError::MissingArgument("--domain-name"))?;

        Ok(Self {
            domain_name,
            subject_alternative_names,
            validation_domain: validation_domain.filter(|v| !v.trim().is_empty()),
        })
    }

    /// Build from a parsed `--cli-input-json` document.
    ///
    /// All three template keys must be present; any other key is rejected.
    pub fn from_json_input(input: &Value) -> Result<Self, RequestError> {
        let object = input.as_object().ok_or(RequestError::InvalidProperty {
            property: "root",
            expected: "an object",
        })?;

        if let Some(unknown) = object.keys().find(|k| cli_flag(k).is_none()) {
            return Err(RequestError::UnknownProperty(unknown.clone()));
        }

        let domain_name = required(object, DOMAIN_NAME)?
            .as_str()
            .ok_or(RequestError::InvalidProperty {
                property: DOMAIN_NAME,
                expected: "a string",
            })?
            .to_string();

        let subject_alternative_names = required(object, SUBJECT_ALTERNATIVE_NAMES)?
            .as_array()
            .and_then(|names| {
                names
                    .iter()
                    .map(|n| n.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()
            })
            .ok_or(RequestError::InvalidProperty {
                property: SUBJECT_ALTERNATIVE_NAMES,
                expected: "an array of strings",
            })?;

        let validation_domain = match required(object, VALIDATION_DOMAIN)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            _ => {
                return Err(RequestError::InvalidProperty {
                    property: VALIDATION_DOMAIN,
                    expected: "a string",
                })
            }
        };

        Self::new(Some(domain_name), subject_alternative_names, validation_domain)
    }

    /// Sample `--cli-input-json` document: sorted keys, 4-space indent.
    pub fn template() -> String {
        let template = json!({
            DOMAIN_NAME: "",
            SUBJECT_ALTERNATIVE_NAMES: [],
            VALIDATION_DOMAIN: ""
        });

        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        // Serializing a Value into a Vec cannot fail.
        let _ = template.serialize(&mut serializer);
        String::from_utf8(out).unwrap_or_default()
    }

    /// One entry per alternative name, then one for the domain name.
    /// Empty without a validation domain.
    pub fn domain_validation_options(&self) -> Vec<DomainValidationOption> {
        let Some(validation_domain) = &self.validation_domain else {
            return Vec::new();
        };

        self.subject_alternative_names
            .iter()
            .chain(std::iter::once(&self.domain_name))
            .map(|name| DomainValidationOption {
                domain_name: name.clone(),
                validation_domain: validation_domain.clone(),
            })
            .collect()
    }

    pub fn to_request_body(&self) -> RequestCertificateBody {
        RequestCertificateBody {
            domain_name: self.domain_name.clone(),
            subject_alternative_names: self.subject_alternative_names.clone(),
            domain_validation_options: self.domain_validation_options(),
            validation_method: VALIDATION_METHOD,
        }
    }
}

fn cli_flag(property: &str) -> Option<&'static str> {
    match property {
        DOMAIN_NAME => Some("--domain-name"),
        SUBJECT_ALTERNATIVE_NAMES => Some("--alternative-names"),
        VALIDATION_DOMAIN => Some("--validation-domain"),
        _ => None,
    }
}

fn required<'a>(object: &'a Map<String, Value>, key: &str) -> Result<&'a Value, RequestError> {
    object
        .get(key)
        .ok_or(RequestError::MissingArgument(cli_flag(key).unwrap_or("--cli-input-json")))
}

/// Read a `file://` JSON input document.
pub fn read_json_input(location: &str) -> Result<Value, RequestError> {
    let path = location
        .strip_prefix("file://")
        .ok_or_else(|| RequestError::MissingFileScheme(location.to_string()))?;

    debug!(path = %path, "Opening input json file");
    let content = std::fs::read_to_string(Path::new(path))
        .map_err(|_| RequestError::UnreadableFile(location.to_string()))?;

    serde_json::from_str(&content).map_err(|_| RequestError::InvalidJson(location.to_string()))
}
