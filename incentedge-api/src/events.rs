//! Domain Events
//!
//! Workflow side effects publish events onto a broadcast bus; the webhook
//! delivery task is the consumer. Publishing is fire-and-forget: a send with
//! no subscribers is not an error.

use incentedge_core::{Application, ApplicationId, ApplicationStatus, OrgId};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Events emitted by the workflow layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    ApplicationCreated {
        application: Application,
    },
    StatusChanged {
        application_id: ApplicationId,
        org_id: OrgId,
        from: Option<ApplicationStatus>,
        to: ApplicationStatus,
        forced: bool,
    },
    ApplicationSubmitted {
        application: Application,
    },
    ApplicationApproved {
        application: Application,
    },
    ApplicationRejected {
        application: Application,
    },
    AllTasksCompleted {
        application_id: ApplicationId,
        org_id: OrgId,
    },
}

impl DomainEvent {
    /// Stable wire name for webhook headers and filtering.
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::ApplicationCreated { .. } => "application_created",
            DomainEvent::StatusChanged { .. } => "status_changed",
            DomainEvent::ApplicationSubmitted { .. } => "application_submitted",
            DomainEvent::ApplicationApproved { .. } => "application_approved",
            DomainEvent::ApplicationRejected { .. } => "application_rejected",
            DomainEvent::AllTasksCompleted { .. } => "all_tasks_completed",
        }
    }

    /// The organization the event belongs to. Webhook delivery never crosses
    /// this boundary.
    pub fn org_id(&self) -> OrgId {
        match self {
            DomainEvent::ApplicationCreated { application }
            | DomainEvent::ApplicationSubmitted { application }
            | DomainEvent::ApplicationApproved { application }
            | DomainEvent::ApplicationRejected { application } => application.org_id,
            DomainEvent::StatusChanged { org_id, .. }
            | DomainEvent::AllTasksCompleted { org_id, .. } => *org_id,
        }
    }
}

/// Broadcast bus connecting the workflow service to the webhook delivery task.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event. No subscribers is fine; lagged subscribers drop
    /// events rather than blocking the publisher.
    pub fn publish(&self, event: DomainEvent) {
        let event_type = event.event_type();
        match self.tx.send(event) {
            Ok(receivers) => {
                tracing::debug!(event_type, receivers, "Domain event published");
            }
            Err(_) => {
                tracing::debug!(event_type, "Domain event published with no subscribers");
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
