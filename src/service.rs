//! Service layer API for document updates
use super::config::EngineConfig;
use super::document::{CompanyRef, Document};
use super::error::{ChainError, EngineError};
use super::notifier::{self, NotificationDispatcher, NotificationIntent};
use super::patch::DocumentPatch;
use super::registry::{CompanyRegistry, check_eligibility};
use super::sealing::{FieldViolation, SealingTable, check_route_toggle};
use super::store::DocumentStore;
use super::transporters::{self, ChainRequest, TransporterLookup};
use tracing::{info, warn};

/// Who is asking for the update. Authorization happens upstream; the id
/// is only carried into the logs.
#[derive(Debug, Clone, Default)]
pub struct CallerContext {
    pub user_id: String,
}

impl CallerContext {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpdatedDocument {
    pub document: Document,
    /// Digest of the persisted document record.
    pub revision: String,
    /// Set when the update changed the CAP of a signed document.
    pub notification: Option<NotificationIntent>,
}

pub struct BordereauService<S, R, N> {
    store: S,
    registry: R,
    dispatcher: N,
    config: EngineConfig,
}

impl<S, R, N> BordereauService<S, R, N>
where
    S: DocumentStore + TransporterLookup,
    R: CompanyRegistry,
    N: NotificationDispatcher,
{
    pub fn new(store: S, registry: R, dispatcher: N) -> Self {
        Self {
            store,
            registry,
            dispatcher,
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn dispatcher(&self) -> &N {
        &self.dispatcher
    }

    /// Apply a partial update to a stored document.
    ///
    /// Every check runs against the snapshot loaded at the start of the call
    /// and nothing is written unless all of them pass. The CAP change
    /// notification, if any, is dispatched after the write and cannot fail
    /// the update.
    pub fn update_document(
        &self,
        id: &str,
        patch: &DocumentPatch,
        caller: &CallerContext,
    ) -> Result<UpdatedDocument, EngineError> {
        let result = self.apply_update(id, patch);
        let (old, updated, revision) = match result {
            Ok(applied) => applied,
            Err(e) => {
                warn!(document = %id, user = %caller.user_id, error = %e, "update rejected");
                return Err(e);
            }
        };
        info!(
            document = %id,
            user = %caller.user_id,
            revision = %revision,
            status = %updated.status,
            "document updated"
        );

        let notification = notifier::detect(&old, &updated);
        if let Some(intent) = &notification {
            notifier::dispatch(&self.dispatcher, intent);
        }

        Ok(UpdatedDocument {
            document: updated,
            revision,
            notification,
        })
    }

    fn apply_update(
        &self,
        id: &str,
        patch: &DocumentPatch,
    ) -> Result<(Document, Document, String), EngineError> {
        let old = self.store.load_document(id)?;
        if old.status.is_terminal() {
            return Err(EngineError::LockedDocument {
                id: old.id,
                status: old.status,
            });
        }

        let mut candidate = patch.apply(&old, &self.config)?;
        check_route_toggle(&old, &candidate)?;
        let mut violations = Vec::new();
        let mut detached = Vec::new();

        let request = ChainRequest::from_inputs(
            patch.transporter_ids.as_deref(),
            patch.transporter.as_ref().map(Option::as_ref),
        )?;
        if let Some(request) = request {
            match transporters::reconcile(
                &old.id,
                &old.transporters,
                request,
                &self.store,
                &self.config,
            ) {
                Ok(reconciled) => {
                    candidate.transporters = reconciled.chain;
                    detached = reconciled.detached;
                }
                Err(ChainError::SealedTransporterModification(found)) => violations.extend(found),
                Err(e) => return Err(e.into()),
            }
        }

        self.check_companies(&old, &candidate)?;

        let table = SealingTable::bsda();
        let mut sealed = table.evaluate_candidate(&old, &candidate).violations;
        sealed.append(&mut violations);
        if !sealed.is_empty() {
            return Err(EngineError::SealedFieldConflict(sealed));
        }

        let revision = self.store.save_document(&candidate, &detached)?;
        Ok((old, candidate, revision))
    }

    /// Registry checks for every company referenced by `candidate`, except
    /// those sitting in a sealed field.
    fn check_companies(&self, old: &Document, candidate: &Document) -> Result<(), EngineError> {
        let table = SealingTable::bsda();
        let mut referenced: Vec<(&str, &CompanyRef)> = vec![
            ("emitter.company.siret", &candidate.emitter.company),
            ("destination.company.siret", &candidate.destination.company),
        ];
        if let Some(worker) = &candidate.worker {
            referenced.push(("worker.company.siret", &worker.company));
        }
        if let Some(next) = &candidate.destination.operation.next_destination {
            referenced.push(("destination.operation.nextDestination.company.siret", &next.company));
        }
        for intermediary in &candidate.intermediaries {
            referenced.push(("intermediaries", intermediary));
        }

        for (path, company) in referenced {
            let Some(siret) = company.identifier() else {
                continue;
            };
            if table.is_sealed(old, candidate, path) {
                continue;
            }
            check_eligibility(&self.registry, siret)?;
        }

        // a signed transporter is sealed on its own signature
        for transporter in candidate.transporters.iter().filter(|t| !t.is_signed()) {
            if let Some(siret) = transporter.company.identifier() {
                check_eligibility(&self.registry, siret)?;
            }
        }
        Ok(())
    }

    /// Locked-field labels an update to `id` would run into. Lets a form
    /// grey out inputs before anything is submitted.
    pub fn sealed_fields(&self, id: &str) -> Result<Vec<FieldViolation>, EngineError> {
        let document = self.store.load_document(id)?;
        let table = SealingTable::bsda();
        Ok(table
            .rules()
            .iter()
            .filter(|rule| rule.seal.resolve(&document, &document).is_reached(&document))
            .map(|rule| FieldViolation::new(rule.pattern, rule.label))
            .collect())
    }
}
