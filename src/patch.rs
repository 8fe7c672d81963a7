//! Partial updates
//!
//! Every patch field is optional: `None` keeps the stored value. Nullable
//! fields use a nested option, `Some(None)` clearing the stored value.
//! Signatures have no patch counterpart, so an update can never clear or
//! back-date one.
use super::config::EngineConfig;
use super::document::{
    AcceptationStatus, CompanyRef, Document, NextDestination, TimeStamp, TransportMode,
    Transporter, Worker,
};
use super::error::ValidationError;
use super::quantity::{ReceptionInput, check_acceptation, derive_reception};
use chrono::Utc;

fn assign<T: Clone>(slot: &mut T, value: &Option<T>) {
    if let Some(value) = value {
        *slot = value.clone();
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompanyPatch {
    pub siret: Option<Option<String>>,
    pub name: Option<Option<String>>,
    pub address: Option<Option<String>>,
    pub contact: Option<Option<String>>,
    pub phone: Option<Option<String>>,
    pub mail: Option<Option<String>>,
}

impl CompanyPatch {
    pub fn new() -> Self {
        Self::default()
    }
    /// A patch resubmitting every field of `company`.
    pub fn resubmit(company: &CompanyRef) -> Self {
        Self {
            siret: Some(company.siret.clone()),
            name: Some(company.name.clone()),
            address: Some(company.address.clone()),
            contact: Some(company.contact.clone()),
            phone: Some(company.phone.clone()),
            mail: Some(company.mail.clone()),
        }
    }
    pub fn set_siret(mut self, siret: &str) -> Self {
        self.siret = Some(Some(siret.to_string()));
        self
    }
    pub fn set_name(mut self, name: &str) -> Self {
        self.name = Some(Some(name.to_string()));
        self
    }
    pub fn set_mail(mut self, mail: &str) -> Self {
        self.mail = Some(Some(mail.to_string()));
        self
    }
    pub fn apply(&self, company: &mut CompanyRef) {
        assign(&mut company.siret, &self.siret);
        assign(&mut company.name, &self.name);
        assign(&mut company.address, &self.address);
        assign(&mut company.contact, &self.contact);
        assign(&mut company.phone, &self.phone);
        assign(&mut company.mail, &self.mail);
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmitterPatch {
    pub is_private_individual: Option<bool>,
    pub company: Option<CompanyPatch>,
    pub pickup_site_name: Option<Option<String>>,
    pub pickup_site_address: Option<Option<String>>,
    pub custom_info: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkerPatch {
    pub company: Option<CompanyPatch>,
    pub certification_number: Option<Option<String>>,
    pub certification_organisation: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WastePatch {
    pub code: Option<Option<String>>,
    pub material_name: Option<Option<String>>,
    pub consistence: Option<Option<String>>,
    pub seal_numbers: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransporterPatch {
    pub company: Option<CompanyPatch>,
    pub recepisse: Option<Option<String>>,
    pub mode: Option<Option<TransportMode>>,
    pub plates: Option<Vec<String>>,
    pub taken_over_at: Option<Option<TimeStamp<Utc>>>,
}

impl TransporterPatch {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_company(mut self, company: CompanyPatch) -> Self {
        self.company = Some(company);
        self
    }
    pub fn set_plates(mut self, plates: &[&str]) -> Self {
        self.plates = Some(plates.iter().map(|p| p.to_string()).collect());
        self
    }
    pub fn set_mode(mut self, mode: TransportMode) -> Self {
        self.mode = Some(Some(mode));
        self
    }
    pub fn apply(&self, transporter: &mut Transporter) {
        if let Some(company) = &self.company {
            company.apply(&mut transporter.company);
        }
        assign(&mut transporter.recepisse, &self.recepisse);
        assign(&mut transporter.transport.mode, &self.mode);
        assign(&mut transporter.transport.plates, &self.plates);
        assign(&mut transporter.transport.taken_over_at, &self.taken_over_at);
    }
}

/// Reception weights are entered in the human unit and converted on merge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReceptionPatch {
    pub date: Option<Option<TimeStamp<Utc>>>,
    pub weight: Option<Option<f64>>,
    pub refused_weight: Option<Option<f64>>,
    pub acceptation_status: Option<Option<AcceptationStatus>>,
    pub refusal_reason: Option<Option<String>>,
}

impl ReceptionPatch {
    fn touches_quantities(&self) -> bool {
        self.weight.is_some() || self.refused_weight.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NextDestinationPatch {
    pub company: Option<CompanyPatch>,
    pub cap: Option<Option<String>>,
    pub planned_operation_code: Option<Option<String>>,
}

impl NextDestinationPatch {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_company(mut self, company: CompanyPatch) -> Self {
        self.company = Some(company);
        self
    }
    pub fn set_cap(mut self, cap: &str) -> Self {
        self.cap = Some(Some(cap.to_string()));
        self
    }
    fn apply(&self, next: &mut NextDestination) {
        if let Some(company) = &self.company {
            company.apply(&mut next.company);
        }
        assign(&mut next.cap, &self.cap);
        assign(&mut next.planned_operation_code, &self.planned_operation_code);
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationPatch {
    pub code: Option<Option<String>>,
    pub mode: Option<Option<String>>,
    pub date: Option<Option<TimeStamp<Utc>>>,
    pub next_destination: Option<Option<NextDestinationPatch>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DestinationPatch {
    pub company: Option<CompanyPatch>,
    pub cap: Option<Option<String>>,
    pub planned_operation_code: Option<Option<String>>,
    pub custom_info: Option<Option<String>>,
    pub reception: Option<ReceptionPatch>,
    pub operation: Option<OperationPatch>,
}

impl DestinationPatch {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_company(mut self, company: CompanyPatch) -> Self {
        self.company = Some(company);
        self
    }
    pub fn set_cap(mut self, cap: &str) -> Self {
        self.cap = Some(Some(cap.to_string()));
        self
    }
    pub fn set_next_destination(mut self, next: NextDestinationPatch) -> Self {
        let operation = self.operation.get_or_insert_with(OperationPatch::default);
        operation.next_destination = Some(Some(next));
        self
    }
    pub fn remove_next_destination(mut self) -> Self {
        let operation = self.operation.get_or_insert_with(OperationPatch::default);
        operation.next_destination = Some(None);
        self
    }
    pub fn set_reception(mut self, reception: ReceptionPatch) -> Self {
        self.reception = Some(reception);
        self
    }
}

/// A proposed partial update of a document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentPatch {
    pub emitter: Option<EmitterPatch>,
    /// `Some(None)` detaches the worker.
    pub worker: Option<Option<WorkerPatch>>,
    pub waste: Option<WastePatch>,
    pub destination: Option<DestinationPatch>,
    pub grouping: Option<Vec<String>>,
    pub forwarding: Option<Option<String>>,
    pub intermediaries: Option<Vec<CompanyRef>>,
    /// Replace the whole chain by an ordered list of transporter ids.
    pub transporter_ids: Option<Vec<String>>,
    /// Legacy input editing only the first chain entry; `Some(None)` removes it.
    pub transporter: Option<Option<TransporterPatch>>,
}

impl DocumentPatch {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_emitter(mut self, emitter: EmitterPatch) -> Self {
        self.emitter = Some(emitter);
        self
    }
    pub fn set_worker(mut self, worker: WorkerPatch) -> Self {
        self.worker = Some(Some(worker));
        self
    }
    pub fn detach_worker(mut self) -> Self {
        self.worker = Some(None);
        self
    }
    pub fn set_waste(mut self, waste: WastePatch) -> Self {
        self.waste = Some(waste);
        self
    }
    pub fn set_destination(mut self, destination: DestinationPatch) -> Self {
        self.destination = Some(destination);
        self
    }
    pub fn set_grouping(mut self, ids: &[&str]) -> Self {
        self.grouping = Some(ids.iter().map(|id| id.to_string()).collect());
        self
    }
    pub fn set_intermediaries(mut self, intermediaries: Vec<CompanyRef>) -> Self {
        self.intermediaries = Some(intermediaries);
        self
    }
    pub fn set_transporter_ids(mut self, ids: &[&str]) -> Self {
        self.transporter_ids = Some(ids.iter().map(|id| id.to_string()).collect());
        self
    }
    pub fn set_first_transporter(mut self, transporter: TransporterPatch) -> Self {
        self.transporter = Some(Some(transporter));
        self
    }
    pub fn remove_first_transporter(mut self) -> Self {
        self.transporter = Some(None);
        self
    }

    pub fn touches_chain(&self) -> bool {
        self.transporter_ids.is_some() || self.transporter.is_some()
    }

    /// A patch resubmitting every document-level value of `document` as it is
    /// stored. Reception weights are converted back to the human unit.
    pub fn resubmit(document: &Document, config: &EngineConfig) -> Self {
        let emitter = &document.emitter;
        let waste = &document.waste;
        let destination = &document.destination;
        let reception = &destination.reception;
        let operation = &destination.operation;
        let to_human = |w: Option<f64>| w.map(|w| w / config.weight_scale);

        Self {
            emitter: Some(EmitterPatch {
                is_private_individual: Some(emitter.is_private_individual),
                company: Some(CompanyPatch::resubmit(&emitter.company)),
                pickup_site_name: Some(emitter.pickup_site_name.clone()),
                pickup_site_address: Some(emitter.pickup_site_address.clone()),
                custom_info: Some(emitter.custom_info.clone()),
            }),
            worker: Some(document.worker.as_ref().map(|w| WorkerPatch {
                company: Some(CompanyPatch::resubmit(&w.company)),
                certification_number: Some(w.certification_number.clone()),
                certification_organisation: Some(w.certification_organisation.clone()),
            })),
            waste: Some(WastePatch {
                code: Some(waste.code.clone()),
                material_name: Some(waste.material_name.clone()),
                consistence: Some(waste.consistence.clone()),
                seal_numbers: Some(waste.seal_numbers.clone()),
            }),
            destination: Some(DestinationPatch {
                company: Some(CompanyPatch::resubmit(&destination.company)),
                cap: Some(destination.cap.clone()),
                planned_operation_code: Some(destination.planned_operation_code.clone()),
                custom_info: Some(destination.custom_info.clone()),
                reception: Some(ReceptionPatch {
                    date: Some(reception.date.clone()),
                    weight: Some(to_human(reception.weight)),
                    refused_weight: Some(to_human(reception.refused_weight)),
                    acceptation_status: Some(reception.acceptation_status),
                    refusal_reason: Some(reception.refusal_reason.clone()),
                }),
                operation: Some(OperationPatch {
                    code: Some(operation.code.clone()),
                    mode: Some(operation.mode.clone()),
                    date: Some(operation.date.clone()),
                    next_destination: Some(operation.next_destination.as_ref().map(|next| {
                        NextDestinationPatch {
                            company: Some(CompanyPatch::resubmit(&next.company)),
                            cap: Some(next.cap.clone()),
                            planned_operation_code: Some(next.planned_operation_code.clone()),
                        }
                    })),
                }),
            }),
            grouping: Some(document.grouping.clone()),
            forwarding: Some(document.forwarding.clone()),
            intermediaries: Some(document.intermediaries.clone()),
            transporter_ids: None,
            transporter: None,
        }
    }

    /// Merge the document-level fields of this patch into a copy of `old`,
    /// deriving reception quantities when weights are submitted. The chain is
    /// left untouched.
    pub fn apply(&self, old: &Document, config: &EngineConfig) -> Result<Document, ValidationError> {
        let mut document = old.clone();

        if let Some(patch) = &self.emitter {
            let emitter = &mut document.emitter;
            assign(&mut emitter.is_private_individual, &patch.is_private_individual);
            if let Some(company) = &patch.company {
                company.apply(&mut emitter.company);
            }
            assign(&mut emitter.pickup_site_name, &patch.pickup_site_name);
            assign(&mut emitter.pickup_site_address, &patch.pickup_site_address);
            assign(&mut emitter.custom_info, &patch.custom_info);
        }

        match &self.worker {
            Some(Some(patch)) => {
                let worker = document.worker.get_or_insert_with(Worker::default);
                if let Some(company) = &patch.company {
                    company.apply(&mut worker.company);
                }
                assign(&mut worker.certification_number, &patch.certification_number);
                assign(
                    &mut worker.certification_organisation,
                    &patch.certification_organisation,
                );
            }
            Some(None) => document.worker = None,
            None => {}
        }

        if let Some(patch) = &self.waste {
            let waste = &mut document.waste;
            assign(&mut waste.code, &patch.code);
            assign(&mut waste.material_name, &patch.material_name);
            assign(&mut waste.consistence, &patch.consistence);
            assign(&mut waste.seal_numbers, &patch.seal_numbers);
        }

        if let Some(patch) = &self.destination {
            let destination = &mut document.destination;
            if let Some(company) = &patch.company {
                company.apply(&mut destination.company);
            }
            assign(&mut destination.cap, &patch.cap);
            assign(&mut destination.planned_operation_code, &patch.planned_operation_code);
            assign(&mut destination.custom_info, &patch.custom_info);

            if let Some(reception_patch) = &patch.reception {
                let reception = &mut destination.reception;
                assign(&mut reception.date, &reception_patch.date);
                assign(&mut reception.acceptation_status, &reception_patch.acceptation_status);
                assign(&mut reception.refusal_reason, &reception_patch.refusal_reason);

                if reception_patch.touches_quantities() {
                    // an explicit null clears the stored weight instead of keeping it
                    let prior = match reception_patch.weight {
                        Some(None) => None,
                        _ => reception.weight,
                    };
                    let input = ReceptionInput {
                        weight: reception_patch.weight.flatten(),
                        acceptation_status: reception.acceptation_status,
                        refused_weight: reception_patch.refused_weight.flatten(),
                    };
                    let derived = derive_reception(&input, prior, config.weight_scale)?;
                    reception.weight = derived.received_weight;
                    reception.refused_weight = derived.refused_weight;
                    reception.accepted_weight = derived.accepted_weight;
                } else if reception_patch.acceptation_status.is_some() {
                    check_acceptation(
                        reception.acceptation_status,
                        reception.weight,
                        reception.refused_weight,
                    )?;
                }
            }

            if let Some(operation_patch) = &patch.operation {
                let operation = &mut destination.operation;
                assign(&mut operation.code, &operation_patch.code);
                assign(&mut operation.mode, &operation_patch.mode);
                assign(&mut operation.date, &operation_patch.date);
                match &operation_patch.next_destination {
                    Some(Some(next_patch)) => {
                        let next = operation
                            .next_destination
                            .get_or_insert_with(NextDestination::default);
                        next_patch.apply(next);
                    }
                    Some(None) => operation.next_destination = None,
                    None => {}
                }
            }
        }

        assign(&mut document.grouping, &self.grouping);
        assign(&mut document.forwarding, &self.forwarding);
        assign(&mut document.intermediaries, &self.intermediaries);

        Ok(document)
    }
}
