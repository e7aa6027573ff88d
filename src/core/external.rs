//! External builder protocol
//!
//! An untrusted worker obtains a ticket (`request_ticket` or `fetch_config`),
//! compiles on its own, and pushes the binary back with `submit_build`.
//! Submissions are checked in a fixed order and stop at the first failure:
//! config, format, name, duplicate pre-check, then the staged save.
//!
//! The ticket secret is not compared against anything at submission time.

use std::sync::Arc;

use crate::core::archive::BuildArchive;
use crate::core::events::{BuildEvent, EventKind, EventSink};
use crate::core::implant::{ConfigId, ImplantBuild, ImplantConfig};
use crate::core::names::validate_build_name;
use crate::core::ticket::{ensure_external, ExternalBuildTicket, TicketIssuer};
use crate::error::BuildError;

/// Ticket / submission handshake with external builders
#[derive(Clone)]
pub struct ExternalBuilderProtocol {
    archive: Arc<BuildArchive>,
    issuer: TicketIssuer,
    events: Arc<dyn EventSink>,
}

impl ExternalBuilderProtocol {
    pub fn new(archive: Arc<BuildArchive>, issuer: TicketIssuer, events: Arc<dyn EventSink>) -> Self {
        Self {
            archive,
            issuer,
            events,
        }
    }

    /// Hand out a ticket for an external-format config
    ///
    /// The config is registered so that a later submission can refer to it
    /// by id.
    pub fn request_ticket(
        &self,
        config: Option<ImplantConfig>,
    ) -> Result<ExternalBuildTicket, BuildError> {
        let config = config.ok_or_else(|| BuildError::InvalidConfig {
            reason: "no config supplied".to_string(),
        })?;
        config.validate()?;
        ensure_external(&config)?;

        let ticket = self.issuer.issue(&config)?;
        self.archive.registry().register_config(&config)?;

        tracing::info!("External build {} requested for config {}", ticket.name, config.id);
        self.events.publish(BuildEvent::new(
            EventKind::ExternalBuildRequested,
            config.id.as_str(),
        ));
        Ok(ticket)
    }

    /// Accept a binary built by an external worker
    pub fn submit_build(
        &self,
        name: &str,
        config_id: &ConfigId,
        data: &[u8],
    ) -> Result<ImplantBuild, BuildError> {
        let config = self.archive.registry().lookup_by_config_id(config_id)?;
        ensure_external(&config)?;
        if let Err(err) = validate_build_name(name) {
            tracing::error!("Rejected external build name: {err}");
            return Err(err);
        }
        if self.archive.registry().contains(name)? {
            return Err(BuildError::DuplicateBuildName {
                name: name.to_string(),
            });
        }

        let build = self.archive.save(name, &config, data)?;
        tracing::info!("External build {name} saved ({} bytes)", data.len());
        self.events
            .publish(BuildEvent::new(EventKind::BuildCompleted, name));
        Ok(build)
    }

    /// Ticket for an already registered external config, under a fresh codename
    pub fn fetch_config(&self, config_id: &ConfigId) -> Result<ExternalBuildTicket, BuildError> {
        let config = self.archive.registry().lookup_by_config_id(config_id)?;
        self.issuer.issue_with_codename(&config)
    }
}

impl std::fmt::Debug for ExternalBuilderProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalBuilderProtocol")
            .field("archive", &self.archive)
            .finish_non_exhaustive()
    }
}
