//! Turns queued workflow jobs into ephemeral runners.
//!
//! The dispatcher is bound to one organization and one target application.
//! For a `queued` event it takes a token from the shared [`TokenCache`], builds
//! a fresh [`ProvisionRequest`], and asks the [`Provisioner`] for exactly one
//! compute unit. Nothing is retried here; a failure becomes a `500` and GitHub
//! redelivers.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::{
    AppName, ComputeUnit, DispatchError, OrgLogin, ProvisionRequest, Provisioner, TokenCache,
    WorkflowAction, WorkflowJobEvent,
};

/// What the dispatcher did with one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// The action was not `queued`; nothing to do.
    Ignored {
        /// The action that was ignored.
        action: WorkflowAction,
    },
    /// The event came from an organization this process does not serve.
    ForeignOrganization {
        /// The organization named in the payload.
        org: OrgLogin,
    },
    /// One compute unit was created for the job.
    Provisioned(ComputeUnit),
}

/// Provisions one runner per queued workflow job.
pub struct Dispatcher {
    org: OrgLogin,
    app: AppName,
    tokens: Arc<TokenCache>,
    provisioner: Arc<dyn Provisioner>,
}

impl Dispatcher {
    /// Creates a dispatcher serving `org` that starts runners in `app`.
    pub fn new(
        org: OrgLogin,
        app: AppName,
        tokens: Arc<TokenCache>,
        provisioner: Arc<dyn Provisioner>,
    ) -> Self {
        Self {
            org,
            app,
            tokens,
            provisioner,
        }
    }

    /// The organization runners are registered with.
    pub fn org(&self) -> &OrgLogin {
        &self.org
    }

    /// Handles one decoded event.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::TokenAcquisitionFailed`] if no token could be
    ///   obtained; the provisioner is not called.
    /// - [`DispatchError::ProvisioningFailed`] if the unit could not be created.
    #[instrument(skip(self, event), fields(
        action = %event.action,
        job_id = %event.workflow_job.id,
    ))]
    pub async fn dispatch(&self, event: &WorkflowJobEvent) -> Result<Dispatch, DispatchError> {
        if event.action != WorkflowAction::Queued {
            info!("Action is not queued; not creating a runner");
            return Ok(Dispatch::Ignored {
                action: event.action.clone(),
            });
        }

        if let Some(org) = event.org_login() {
            if org != &self.org {
                warn!(
                    event_org = %org,
                    configured_org = %self.org,
                    "Ignoring job queued in an organization this bridge does not serve"
                );
                return Ok(Dispatch::ForeignOrganization { org: org.clone() });
            }
        }

        let token = self.tokens.get(&self.org).await?;
        let request = ProvisionRequest::for_runner(self.app.clone(), &self.org, &token);

        let unit = self
            .provisioner
            .create_compute_unit(&request)
            .await
            .map_err(|e| {
                warn!(error = %e, app = %self.app, "Failed to create compute unit");
                DispatchError::ProvisioningFailed(e)
            })?;

        let labels: Vec<&str> = event
            .workflow_job
            .labels
            .iter()
            .map(|l| l.as_str())
            .collect();
        info!(
            unit_id = %unit.id,
            unit_name = unit.name.as_deref().unwrap_or_default(),
            labels = ?labels,
            repository = event.repository.as_ref().map(|r| r.full_name.as_str()).unwrap_or_default(),
            "Created compute unit for queued job"
        );

        Ok(Dispatch::Provisioned(unit))
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("org", &self.org)
            .field("app", &self.app)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
