//! CAP change notifications
//!
//! The producer who signed a document is told when the CAP of the facility
//! that finally receives the waste changes afterwards. The CAP compared is
//! the logical one: the destination's when the route is direct, the next
//! destination's otherwise. Moving the same facility from one slot to the
//! other is therefore not a change.
use super::document::{CompanyRef, Document, Status};
use super::error::DispatchError;
use tracing::{error, info, warn};

/// User preference flag a recipient must have enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationPreference {
    FinalDestinationUpdate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationIntent {
    pub document_id: String,
    /// Users of this company subscribed to `preference` are notified.
    pub emitter_siret: String,
    pub preference: NotificationPreference,
    pub previous_cap: Option<String>,
    pub new_cap: Option<String>,
    pub worker: CompanyRef,
    pub final_destination: CompanyRef,
}

fn describe(company: &CompanyRef) -> String {
    format!(
        "{} {}",
        company.name.as_deref().unwrap_or_default(),
        company.siret.as_deref().unwrap_or_default()
    )
}

impl NotificationIntent {
    pub fn subject(&self) -> String {
        format!(
            "CAP of asbestos document {} updated to {}",
            self.document_id,
            self.new_cap.as_deref().unwrap_or("(none)")
        )
    }

    pub fn body(&self) -> String {
        format!(
            "A change was made to asbestos document {id}, which you signed.\n\
             The CAP previously set to {old} has been replaced by {new}.\n\
             If you disagree or have any question, please contact the asbestos \
             removal company {worker} named on the document, or the final \
             destination facility {destination}.\n",
            id = self.document_id,
            old = self.previous_cap.as_deref().unwrap_or("(none)"),
            new = self.new_cap.as_deref().unwrap_or("(none)"),
            worker = describe(&self.worker),
            destination = describe(&self.final_destination),
        )
    }
}

/// Decide whether an update changed the logical CAP of a signed document.
pub fn detect(old: &Document, updated: &Document) -> Option<NotificationIntent> {
    if updated.status == Status::Initial {
        return None;
    }
    let emitter_siret = updated.emitter.company.identifier()?;
    let worker = updated.worker.as_ref().filter(|_| updated.has_worker())?;

    let previous_cap = old.route().final_cap();
    let new_cap = updated.route().final_cap();
    if previous_cap == new_cap {
        return None;
    }

    Some(NotificationIntent {
        document_id: updated.id.clone(),
        emitter_siret: emitter_siret.to_string(),
        preference: NotificationPreference::FinalDestinationUpdate,
        previous_cap: previous_cap.map(str::to_string),
        new_cap: new_cap.map(str::to_string),
        worker: worker.company.clone(),
        final_destination: updated.route().final_facility().clone(),
    })
}

/// Outbound delivery collaborator.
pub trait NotificationDispatcher {
    /// Queue the notification for asynchronous delivery.
    fn enqueue(&self, intent: &NotificationIntent) -> Result<(), DispatchError>;
    /// Deliver right away, used when queueing fails.
    fn deliver(&self, intent: &NotificationIntent) -> Result<(), DispatchError>;
}

/// Hand the intent over, falling back to direct delivery. Failures are
/// logged and never returned; the update they follow is already committed.
pub fn dispatch(dispatcher: &impl NotificationDispatcher, intent: &NotificationIntent) -> bool {
    let Err(queue_err) = dispatcher.enqueue(intent) else {
        info!(document = %intent.document_id, "CAP change notification queued");
        return true;
    };
    warn!(
        document = %intent.document_id,
        error = %queue_err,
        "failed to queue CAP change notification, delivering directly"
    );

    match dispatcher.deliver(intent) {
        Ok(()) => true,
        Err(e) => {
            error!(
                document = %intent.document_id,
                error = %e,
                "CAP change notification could not be delivered"
            );
            false
        }
    }
}
