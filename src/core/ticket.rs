//! External build tickets
//!
//! A ticket is what an external builder receives: the name to build under,
//! the config to build and a one-time secret. Tickets are never stored, and
//! issuing one does not reserve its name.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::codenames::CodenameGenerator;
use crate::core::implant::{ImplantConfig, OutputFormat};
use crate::core::names::validate_build_name;
use crate::core::secret::SecretDeriver;
use crate::error::BuildError;

/// Everything an external builder needs for one build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalBuildTicket {
    pub name: String,
    pub config: ImplantConfig,
    pub secret: String,
}

/// Issues tickets for external-format configs
#[derive(Clone)]
pub struct TicketIssuer {
    codenames: Arc<dyn CodenameGenerator>,
    secrets: Arc<dyn SecretDeriver>,
}

impl TicketIssuer {
    pub fn new(codenames: Arc<dyn CodenameGenerator>, secrets: Arc<dyn SecretDeriver>) -> Self {
        Self { codenames, secrets }
    }

    /// Issue a ticket named after the config, or a codename if it has none
    pub fn issue(&self, config: &ImplantConfig) -> Result<ExternalBuildTicket, BuildError> {
        ensure_external(config)?;
        let name = match &config.name {
            Some(name) => name.clone(),
            None => self.codenames.next()?,
        };
        self.issue_as(name, config)
    }

    /// Issue a ticket under a fresh codename, ignoring any requested name
    pub fn issue_with_codename(
        &self,
        config: &ImplantConfig,
    ) -> Result<ExternalBuildTicket, BuildError> {
        ensure_external(config)?;
        let name = self.codenames.next()?;
        self.issue_as(name, config)
    }

    fn issue_as(
        &self,
        name: String,
        config: &ImplantConfig,
    ) -> Result<ExternalBuildTicket, BuildError> {
        validate_build_name(&name)?;
        let secret = self.secrets.derive()?;
        tracing::debug!("Issued ticket {name} for config {}", config.id);
        Ok(ExternalBuildTicket {
            name,
            config: config.clone(),
            secret,
        })
    }
}

impl std::fmt::Debug for TicketIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TicketIssuer").finish_non_exhaustive()
    }
}

/// Reject configs that are not meant for an external builder
pub fn ensure_external(config: &ImplantConfig) -> Result<(), BuildError> {
    if config.format == OutputFormat::External {
        Ok(())
    } else {
        Err(BuildError::FormatMismatch {
            expected: OutputFormat::External.to_string(),
            actual: config.format.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codenames::WordListCodenames;
    use crate::core::implant::TargetPlatform;
    use crate::core::secret::{HmacSecretDeriver, ServerKey};
    use crate::error::ErrorKind;

    fn issuer() -> TicketIssuer {
        TicketIssuer::new(
            Arc::new(WordListCodenames::new()),
            Arc::new(HmacSecretDeriver::new(ServerKey::generate())),
        )
    }

    fn config(format: OutputFormat) -> ImplantConfig {
        ImplantConfig::new(TargetPlatform::new("linux", "amd64"), format)
    }

    #[test]
    fn test_issue_uses_requested_name() {
        let ticket = issuer()
            .issue(&config(OutputFormat::External).with_name("raven-falcon"))
            .unwrap();
        assert_eq!(ticket.name, "raven-falcon");
        assert_eq!(ticket.secret.len(), 64);
    }

    #[test]
    fn test_issue_assigns_codename() {
        let ticket = issuer().issue(&config(OutputFormat::External)).unwrap();
        assert!(ticket.name.contains('_'));
    }

    #[test]
    fn test_issue_with_codename_ignores_requested_name() {
        let ticket = issuer()
            .issue_with_codename(&config(OutputFormat::External).with_name("raven-falcon"))
            .unwrap();
        assert_ne!(ticket.name, "raven-falcon");
    }

    #[test]
    fn test_unsafe_codename_rejected() {
        let issuer = TicketIssuer::new(
            Arc::new(WordListCodenames::with_words(
                vec!["..".to_string()],
                vec!["/evil".to_string()],
            )),
            Arc::new(HmacSecretDeriver::new(ServerKey::generate())),
        );
        let config = config(OutputFormat::External);
        assert_eq!(issuer.issue(&config).unwrap_err().kind(), ErrorKind::InvalidName);
        assert_eq!(
            issuer.issue_with_codename(&config).unwrap_err().kind(),
            ErrorKind::InvalidName
        );
    }

    #[test]
    fn test_each_ticket_gets_its_own_secret() {
        let issuer = issuer();
        let config = config(OutputFormat::External);
        let a = issuer.issue(&config).unwrap();
        let b = issuer.issue(&config).unwrap();
        assert_ne!(a.secret, b.secret);
    }

    #[test]
    fn test_non_external_rejected() {
        for format in [
            OutputFormat::Executable,
            OutputFormat::SharedLib,
            OutputFormat::Shellcode,
            OutputFormat::Service,
        ] {
            let err = issuer().issue(&config(format)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::FormatMismatch);
        }
    }

    #[test]
    fn test_ticket_json_roundtrip() {
        let ticket = issuer().issue(&config(OutputFormat::External)).unwrap();
        let json = serde_json::to_string(&ticket).unwrap();
        let parsed: ExternalBuildTicket = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ticket);
    }
}
