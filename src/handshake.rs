//! Provider Handshake - Static Self-Description and SDK Negotiation

use serde::{Deserialize, Serialize};

use crate::capabilities::{self, CapabilityDescriptor};
use crate::diagnostics::Diagnostic;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderHandshake {
    pub provider_id: String,
    pub version: String,
    pub sdk_version: String,
    pub capabilities: Vec<CapabilityDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox: Option<SandboxDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<RuntimeDescriptor>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SandboxMode {
    #[default]
    InProcess,
    Isolated,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SandboxDescriptor {
    pub mode: SandboxMode,
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuntimeDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl ProviderHandshake {
    /// Builds a handshake declaring the crate's own SDK version.
    pub fn new<'a>(
        provider_id: impl Into<String>,
        version: impl Into<String>,
        capability_ids: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            version: version.into(),
            sdk_version: crate::SDK_VERSION.to_string(),
            capabilities: capabilities::describe_all(capability_ids),
            sandbox: Some(SandboxDescriptor {
                mode: SandboxMode::InProcess,
                permissions: vec!["fs.write".to_string()],
            }),
            runtime: Some(RuntimeDescriptor {
                name: "native".to_string(),
                version: None,
            }),
        }
    }

    pub fn with_sdk_version(mut self, sdk_version: impl Into<String>) -> Self {
        self.sdk_version = sdk_version.into();
        self
    }

    pub fn supports(&self, capability_id: &str) -> bool {
        self.capabilities.iter().any(|c| c.id == capability_id)
    }
}

/// Extracts the major component of a version string.
///
/// Accepts a leading `v` and partial versions (`1`, `1.4`).
pub fn parse_major(version: &str) -> Option<u64> {
    let trimmed = version.trim();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(parsed) = semver::Version::parse(trimmed) {
        return Some(parsed.major);
    }

    let padded = match trimmed.matches('.').count() {
        0 => format!("{}.0.0", trimmed),
        1 => format!("{}.0", trimmed),
        _ => return None,
    };
    semver::Version::parse(&padded).ok().map(|v| v.major)
}

/// Compares the orchestrator's expected SDK version with a provider's.
///
/// Returns no diagnostics when the majors match.
pub fn check_compatibility(expected: &str, handshake: &ProviderHandshake) -> Vec<Diagnostic> {
    let declared = handshake.sdk_version.as_str();

    let expected_major = match parse_major(expected) {
        Some(major) => major,
        None => {
            return vec![Diagnostic::error(
                "sdk.invalid-version",
                format!("Invalid expected SDK version '{}'", expected),
            )
            .with_actual(expected)]
        }
    };

    let declared_major = match parse_major(declared) {
        Some(major) => major,
        None => {
            return vec![Diagnostic::error(
                "sdk.invalid-version",
                format!(
                    "Provider '{}' declares invalid SDK version '{}'",
                    handshake.provider_id, declared
                ),
            )
            .with_actual(declared)]
        }
    };

    if expected_major != declared_major {
        return vec![Diagnostic::error(
            "sdk.incompatible",
            format!(
                "Provider '{}' targets SDK {} but the compiler expects SDK {}",
                handshake.provider_id, declared, expected
            ),
        )
        .with_expected(expected)
        .with_actual(declared)
        .with_remediation(format!(
            "Upgrade '{}' to a release built against SDK {}.x",
            handshake.provider_id, expected_major
        ))];
    }

    vec![]
}
