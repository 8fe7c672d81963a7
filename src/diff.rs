//! Field-path diff between two document snapshots
//!
//! A document is flattened into its leaf fields, each addressed by a dotted
//! path such as `destination.company.siret` and rendered as text. Two
//! snapshots differ on a path iff the rendered values differ, so resubmitting
//! an unchanged value never shows up as a change.
use super::document::{CompanyRef, Document, NextDestination, Transporter, Worker};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap(BTreeMap<String, Option<String>>);

impl FieldMap {
    pub fn get(&self, path: &str) -> Option<&Option<String>> {
        self.0.get(path)
    }
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
    fn put<T: ToString>(&mut self, path: String, value: Option<T>) {
        self.0.insert(path, value.map(|v| v.to_string()));
    }
    fn list(&mut self, path: String, values: &[String]) {
        self.0.insert(path, Some(values.join("|")));
    }
    fn company(&mut self, prefix: &str, company: &CompanyRef) {
        self.put(format!("{prefix}.siret"), company.siret.as_deref());
        self.put(format!("{prefix}.name"), company.name.as_deref());
        self.put(format!("{prefix}.address"), company.address.as_deref());
        self.put(format!("{prefix}.contact"), company.contact.as_deref());
        self.put(format!("{prefix}.phone"), company.phone.as_deref());
        self.put(format!("{prefix}.mail"), company.mail.as_deref());
    }
}

/// Flatten every document-level leaf. The transporter chain is reconciled
/// separately and is not part of this map.
pub fn flatten(document: &Document) -> FieldMap {
    let mut map = FieldMap::default();

    let emitter = &document.emitter;
    map.put(
        "emitter.isPrivateIndividual".into(),
        Some(emitter.is_private_individual),
    );
    map.company("emitter.company", &emitter.company);
    map.put("emitter.pickupSite.name".into(), emitter.pickup_site_name.as_deref());
    map.put(
        "emitter.pickupSite.address".into(),
        emitter.pickup_site_address.as_deref(),
    );
    map.put("emitter.customInfo".into(), emitter.custom_info.as_deref());

    let detached = Worker::default();
    let worker = document.worker.as_ref().unwrap_or(&detached);
    map.company("worker.company", &worker.company);
    map.put(
        "worker.certification.number".into(),
        worker.certification_number.as_deref(),
    );
    map.put(
        "worker.certification.organisation".into(),
        worker.certification_organisation.as_deref(),
    );

    let waste = &document.waste;
    map.put("waste.code".into(), waste.code.as_deref());
    map.put("waste.materialName".into(), waste.material_name.as_deref());
    map.put("waste.consistence".into(), waste.consistence.as_deref());
    map.list("waste.sealNumbers".into(), &waste.seal_numbers);

    let destination = &document.destination;
    map.company("destination.company", &destination.company);
    map.put("destination.cap".into(), destination.cap.as_deref());
    map.put(
        "destination.plannedOperationCode".into(),
        destination.planned_operation_code.as_deref(),
    );
    map.put("destination.customInfo".into(), destination.custom_info.as_deref());

    let reception = &destination.reception;
    map.put("destination.reception.date".into(), reception.date.as_ref());
    map.put("destination.reception.weight".into(), reception.weight);
    map.put("destination.reception.refusedWeight".into(), reception.refused_weight);
    map.put(
        "destination.reception.acceptationStatus".into(),
        reception.acceptation_status,
    );
    map.put(
        "destination.reception.refusalReason".into(),
        reception.refusal_reason.as_deref(),
    );

    let operation = &destination.operation;
    map.put("destination.operation.code".into(), operation.code.as_deref());
    map.put("destination.operation.mode".into(), operation.mode.as_deref());
    map.put("destination.operation.date".into(), operation.date.as_ref());

    let absent = NextDestination::default();
    let next = operation.next_destination.as_ref().unwrap_or(&absent);
    map.company("destination.operation.nextDestination.company", &next.company);
    map.put(
        "destination.operation.nextDestination.cap".into(),
        next.cap.as_deref(),
    );
    map.put(
        "destination.operation.nextDestination.plannedOperationCode".into(),
        next.planned_operation_code.as_deref(),
    );

    map.list("grouping".into(), &document.grouping);
    map.put("forwarding".into(), document.forwarding.as_deref());
    let intermediaries: Vec<String> = document
        .intermediaries
        .iter()
        .map(|c| c.siret.clone().unwrap_or_default())
        .collect();
    map.list("intermediaries".into(), &intermediaries);

    map
}

/// Flatten the editable leaves of one transporter entry. Identity, position
/// and signature are not editable and are left out.
pub fn flatten_transporter(transporter: &Transporter) -> FieldMap {
    let mut map = FieldMap::default();
    map.company("company", &transporter.company);
    map.put("recepisse".into(), transporter.recepisse.as_deref());
    map.put("transport.mode".into(), transporter.transport.mode);
    map.list("transport.plates".into(), &transporter.transport.plates);
    map.put(
        "transport.takenOverAt".into(),
        transporter.transport.taken_over_at.as_ref(),
    );
    map
}

/// Paths whose value differs between the two maps.
pub fn diff_maps(old: &FieldMap, new: &FieldMap) -> BTreeSet<String> {
    old.0
        .keys()
        .chain(new.0.keys())
        .filter(|path| old.0.get(*path) != new.0.get(*path))
        .cloned()
        .collect()
}

pub fn changed_paths(old: &Document, new: &Document) -> BTreeSet<String> {
    diff_maps(&flatten(old), &flatten(new))
}

pub fn changed_transporter_paths(old: &Transporter, new: &Transporter) -> BTreeSet<String> {
    diff_maps(&flatten_transporter(old), &flatten_transporter(new))
}
