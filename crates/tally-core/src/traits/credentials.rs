// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential lookup. Secrets are resolved once at startup and handed to the
//! clients that need them; business logic never reads the environment.

use std::collections::HashMap;

use secrecy::SecretString;

use crate::error::TallyError;

/// Opaque `name -> secret` lookup.
pub trait CredentialProvider: Send + Sync {
    fn get_credential(&self, name: &str) -> Result<SecretString, TallyError>;
}

/// Reads credentials from process environment variables of the same name.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvCredentials;

impl CredentialProvider for EnvCredentials {
    fn get_credential(&self, name: &str) -> Result<SecretString, TallyError> {
        match std::env::var(name) {
            Ok(value) if !value.trim().is_empty() => Ok(SecretString::from(value)),
            Ok(_) => Err(TallyError::Credential {
                name: name.to_string(),
                reason: "environment variable is empty".into(),
            }),
            Err(e) => Err(TallyError::Credential {
                name: name.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

/// Fixed in-memory credentials, for tests and embedding.
#[derive(Default, Clone)]
pub struct StaticCredentials {
    values: HashMap<String, String>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, secret: impl Into<String>) -> Self {
        self.values.insert(name.into(), secret.into());
        self
    }
}

impl CredentialProvider for StaticCredentials {
    fn get_credential(&self, name: &str) -> Result<SecretString, TallyError> {
        self.values
            .get(name)
            .map(|v| SecretString::from(v.clone()))
            .ok_or_else(|| TallyError::Credential {
                name: name.to_string(),
                reason: "not configured".into(),
            })
    }
}

impl std::fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.values.keys().collect();
        names.sort();
        f.debug_struct("StaticCredentials")
            .field("names", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn static_credentials_resolve_known_names() {
        let creds = StaticCredentials::new().with("ADMIN", "sk-admin-1");
        assert_eq!(creds.get_credential("ADMIN").unwrap().expose_secret(), "sk-admin-1");
        assert!(matches!(
            creds.get_credential("OTHER"),
            Err(TallyError::Credential { .. })
        ));
    }

    #[test]
    fn debug_output_hides_secret_values() {
        let creds = StaticCredentials::new().with("ADMIN", "sk-admin-1");
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("ADMIN"));
        assert!(!rendered.contains("sk-admin-1"));
    }

    #[test]
    fn env_credentials_report_missing_variable() {
        let err = EnvCredentials
            .get_credential("TALLY_TEST_SURELY_UNSET_VARIABLE")
            .unwrap_err();
        assert!(err.to_string().contains("TALLY_TEST_SURELY_UNSET_VARIABLE"));
    }
}
