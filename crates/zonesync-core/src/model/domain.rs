// # Domains and Credentials
//
// A domain is the local handle for a remote zone. It owns the relationship
// with the provider through a credential reference; several domains may
// point at the same credential.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a [`Domain`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainId(pub u64);

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a [`Credential`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialId(pub u64);

impl fmt::Display for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A DNS zone under management
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    /// Local identifier
    pub id: DomainId,
    /// Zone apex, e.g. "example.com"
    pub name: String,
    /// Provider-side zone identifier
    pub zone_id: String,
    /// Credential used to reach the provider
    #[serde(default)]
    pub credential_id: Option<CredentialId>,
    /// Whether the zone is considered valid for bulk resync
    #[serde(default = "default_valid")]
    pub valid: bool,
}

impl Domain {
    /// Create a valid domain without a credential
    pub fn new(id: DomainId, name: impl Into<String>, zone_id: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            zone_id: zone_id.into(),
            credential_id: None,
            valid: true,
        }
    }

    /// Attach a credential reference
    pub fn with_credential(mut self, credential_id: CredentialId) -> Self {
        self.credential_id = Some(credential_id);
        self
    }

    /// Set the validity flag
    pub fn with_valid(mut self, valid: bool) -> Self {
        self.valid = valid;
        self
    }
}

fn default_valid() -> bool {
    true
}

/// Access/secret key pair for one provider account
///
/// # Security
///
/// The `Debug` implementation never prints the secret key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Local identifier
    pub id: CredentialId,
    /// Access key (for Cloudflare: the account e-mail)
    #[serde(default)]
    pub access_key: Option<String>,
    /// Secret key
    /// ⚠️ NEVER log this value
    #[serde(default)]
    pub secret_key: Option<String>,
    /// Provider account identifier
    #[serde(default)]
    pub account_id: Option<String>,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<REDACTED>"))
            .field("account_id", &self.account_id)
            .finish()
    }
}

impl Credential {
    /// Create a credential from a key pair
    pub fn new(
        id: CredentialId,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            id,
            access_key: Some(access_key.into()),
            secret_key: Some(secret_key.into()),
            account_id: None,
        }
    }

    /// Set the provider account id
    pub fn with_account_id(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    /// The access key, if present and not blank
    pub fn access(&self) -> Option<&str> {
        non_blank(self.access_key.as_deref())
    }

    /// The secret key, if present and not blank
    pub fn secret(&self) -> Option<&str> {
        non_blank(self.secret_key.as_deref())
    }

    /// Name of the first absent key, if any
    pub fn missing_part(&self) -> Option<&'static str> {
        if self.access().is_none() {
            Some("access key")
        } else if self.secret().is_none() {
            Some("secret key")
        } else {
            None
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_keys_count_as_missing() {
        let mut credential = Credential::new(CredentialId(1), "ops@example.com", "   ");
        assert_eq!(credential.missing_part(), Some("secret key"));

        credential.access_key = None;
        assert_eq!(credential.missing_part(), Some("access key"));

        let complete = Credential::new(CredentialId(2), "ops@example.com", "k3y");
        assert_eq!(complete.missing_part(), None);
    }

    #[test]
    fn secret_not_exposed_in_debug() {
        let credential = Credential::new(CredentialId(1), "ops@example.com", "super-secret-key");
        let debug_str = format!("{:?}", credential);
        assert!(!debug_str.contains("super-secret-key"));
        assert!(debug_str.contains("ops@example.com"));
    }

    #[test]
    fn domain_defaults_to_valid_when_deserialized() {
        let domain: Domain =
            serde_json::from_str(r#"{"id":3,"name":"example.com","zone_id":"z1"}"#).unwrap();
        assert!(domain.valid);
        assert_eq!(domain.credential_id, None);
    }
}
