use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VersionError {
    #[error("kubectl reports client version {} but the server runs {}!", .client, .server)]
    ClientServerMismatch { client: String, server: String },
    #[error("Server runs {} but {} was requested!", .server, .requested)]
    UnexpectedServerVersion { server: String, requested: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub git_version: String,
}

/// The parts of `kubectl version -o json` we care about.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionReport {
    pub client_version: VersionInfo,
    pub server_version: Option<VersionInfo>,
}

impl VersionReport {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

fn normalize(version: &str) -> &str {
    version.trim().trim_start_matches('v')
}

/// Client and server must agree, and the server must run exactly what was
/// installed.
pub fn check_versions(client: &str, server: &str, requested: &str) -> Result<(), VersionError> {
    if normalize(client) != normalize(server) {
        return Err(VersionError::ClientServerMismatch {
            client: client.to_owned(),
            server: server.to_owned(),
        });
    }

    if normalize(server) != normalize(requested) {
        return Err(VersionError::UnexpectedServerVersion {
            server: server.to_owned(),
            requested: requested.to_owned(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{check_versions, VersionError, VersionReport};

    #[test]
    fn matching_versions_pass() {
        assert_eq!(check_versions("v1.31.1", "v1.31.1", "v1.31.1"), Ok(()));
        assert_eq!(check_versions("v1.31.1", "v1.31.1", "1.31.1"), Ok(()));
    }

    #[test]
    fn client_server_mismatch_reports_both_versions() {
        let error = check_versions("v1.31.0", "v1.30.5", "v1.31.0").unwrap_err();
        let message = error.to_string();

        assert!(matches!(error, VersionError::ClientServerMismatch { .. }));
        assert!(message.contains("v1.31.0"));
        assert!(message.contains("v1.30.5"));
    }

    #[test]
    fn server_must_match_the_requested_version() {
        let error = check_versions("v1.31.0", "v1.31.0", "v1.31.1").unwrap_err();

        assert_eq!(
            error,
            VersionError::UnexpectedServerVersion {
                server: "v1.31.0".to_owned(),
                requested: "v1.31.1".to_owned(),
            }
        );
    }

    #[test]
    fn parses_kubectl_version_json() {
        let report = VersionReport::from_json(
            r#"{
              "clientVersion": {"major": "1", "minor": "31", "gitVersion": "v1.31.1", "platform": "linux/amd64"},
              "kustomizeVersion": "v5.4.2",
              "serverVersion": {"major": "1", "minor": "31", "gitVersion": "v1.31.1", "platform": "linux/amd64"}
            }"#,
        )
        .unwrap();

        assert_eq!(report.client_version.git_version, "v1.31.1");
        assert_eq!(report.server_version.unwrap().git_version, "v1.31.1");
    }

    #[test]
    fn missing_server_version_parses_as_none() {
        let report =
            VersionReport::from_json(r#"{"clientVersion": {"gitVersion": "v1.31.1"}}"#).unwrap();

        assert_eq!(report.server_version, None);
    }
}
