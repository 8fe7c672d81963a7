//! Transporter chain reconciliation
//!
//! Entries are addressed by their stable id; the chain itself is only the
//! ordered list of ids. A reconciliation diffs the requested ordering against
//! the persisted one: every position held by a signed entry must keep that
//! entry, everything else may be inserted, dropped or reordered freely.
//! Numbers are then reassigned from the final order.
use super::config::EngineConfig;
use super::diff;
use super::document::Transporter;
use super::error::{ChainError, StoreError};
use super::patch::TransporterPatch;
use super::sealing::FieldViolation;
use super::utils::new_record_id;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// How the caller asked for the chain to change.
#[derive(Debug, Clone, Copy)]
pub enum ChainRequest<'a> {
    /// Replace the whole chain by the given ordered ids.
    Replace(&'a [String]),
    /// Legacy: edit the first entry only.
    UpdateFirst(&'a TransporterPatch),
    /// Legacy: drop the first entry, shifting the others up.
    RemoveFirst,
}

impl<'a> ChainRequest<'a> {
    /// Pick the request mode from the two patch inputs. Supplying both is
    /// ambiguous and refused.
    pub fn from_inputs(
        ids: Option<&'a [String]>,
        first: Option<Option<&'a TransporterPatch>>,
    ) -> Result<Option<Self>, ChainError> {
        match (ids, first) {
            (Some(_), Some(_)) => Err(ChainError::ConflictingInputs),
            (Some(ids), None) => Ok(Some(ChainRequest::Replace(ids))),
            (None, Some(Some(patch))) => Ok(Some(ChainRequest::UpdateFirst(patch))),
            (None, Some(None)) => Ok(Some(ChainRequest::RemoveFirst)),
            (None, None) => Ok(None),
        }
    }
}

/// Outcome of a reconciliation: the new chain and the entries it let go of.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciled {
    pub chain: Vec<Transporter>,
    pub detached: Vec<Transporter>,
}

/// Lookup of persisted transporter entries by id.
pub trait TransporterLookup {
    /// `Ok(None)` when no entry has this id.
    fn find(&self, id: &str) -> Result<Option<Transporter>, StoreError>;
}

impl TransporterLookup for BTreeMap<String, Transporter> {
    fn find(&self, id: &str) -> Result<Option<Transporter>, StoreError> {
        Ok(self.get(id).cloned())
    }
}

// chain length is bounded by `max_transporters`, itself capped to fit a u8
fn renumber(chain: &mut [Transporter], document_id: &str) {
    for (idx, entry) in chain.iter_mut().enumerate() {
        entry.number = u8::try_from(idx + 1).unwrap_or(u8::MAX);
        entry.document_id = Some(document_id.to_string());
    }
}

fn detach(mut entry: Transporter) -> Transporter {
    entry.document_id = None;
    entry
}

pub fn reconcile(
    document_id: &str,
    existing: &[Transporter],
    request: ChainRequest<'_>,
    known: &impl TransporterLookup,
    config: &EngineConfig,
) -> Result<Reconciled, ChainError> {
    let reconciled = match request {
        ChainRequest::Replace(ids) => replace(document_id, existing, ids, known, config)?,
        ChainRequest::UpdateFirst(patch) => update_first(document_id, existing, patch, config)?,
        ChainRequest::RemoveFirst => remove_first(document_id, existing)?,
    };
    debug!(
        document = %document_id,
        chain = reconciled.chain.len(),
        detached = reconciled.detached.len(),
        "transporter chain reconciled"
    );
    Ok(reconciled)
}

fn replace(
    document_id: &str,
    existing: &[Transporter],
    ids: &[String],
    known: &impl TransporterLookup,
    config: &EngineConfig,
) -> Result<Reconciled, ChainError> {
    let max = config.max_transporters.min(u8::MAX as usize);
    if ids.len() > max {
        return Err(ChainError::TooManyTransporters {
            submitted: ids.len(),
            max,
        });
    }

    let mut seen = BTreeSet::new();
    let duplicates: BTreeSet<String> = ids
        .iter()
        .filter(|id| !seen.insert(id.as_str()))
        .cloned()
        .collect();
    if !duplicates.is_empty() {
        return Err(ChainError::DuplicateTransporterIds(duplicates.into_iter().collect()));
    }

    let by_id: BTreeMap<&str, &Transporter> =
        existing.iter().map(|t| (t.id.as_str(), t)).collect();
    let mut chain = Vec::with_capacity(ids.len());
    let mut unknown = Vec::new();
    for id in ids {
        let resolved = match by_id.get(id.as_str()) {
            Some(entry) => Some((*entry).clone()),
            // entries attached to another document do not resolve here
            None => known.find(id)?.filter(|entry| {
                entry
                    .document_id
                    .as_deref()
                    .is_none_or(|owner| owner == document_id)
            }),
        };
        match resolved {
            Some(entry) => chain.push(entry),
            None => unknown.push(id.clone()),
        }
    }
    if !unknown.is_empty() {
        return Err(ChainError::UnknownTransporterIds(unknown));
    }

    let violations: Vec<FieldViolation> = existing
        .iter()
        .enumerate()
        .filter(|(idx, entry)| {
            entry.is_signed() && ids.get(*idx).map(String::as_str) != Some(entry.id.as_str())
        })
        .map(|(idx, _)| {
            FieldViolation::new(
                &format!("transporters[{idx}]"),
                &format!(
                    "transporter n°{} has already signed and cannot be removed or moved",
                    idx + 1
                ),
            )
        })
        .collect();
    if !violations.is_empty() {
        return Err(ChainError::SealedTransporterModification(violations));
    }

    renumber(&mut chain, document_id);
    let kept: BTreeSet<&str> = ids.iter().map(String::as_str).collect();
    let detached = existing
        .iter()
        .filter(|entry| !kept.contains(entry.id.as_str()))
        .cloned()
        .map(detach)
        .collect();

    Ok(Reconciled { chain, detached })
}

fn update_first(
    document_id: &str,
    existing: &[Transporter],
    patch: &TransporterPatch,
    config: &EngineConfig,
) -> Result<Reconciled, ChainError> {
    let mut chain = existing.to_vec();

    if chain.is_empty() {
        let mut created = Transporter::new(
            &new_record_id(&config.transporter_hrp)?,
            Default::default(),
        );
        patch.apply(&mut created);
        chain.push(created);
    } else {
        let first = &mut chain[0];
        let mut updated = first.clone();
        patch.apply(&mut updated);

        if first.is_signed() {
            let violations: Vec<FieldViolation> = diff::changed_transporter_paths(first, &updated)
                .iter()
                .map(|path| {
                    FieldViolation::new(
                        &format!("transporters[0].{path}"),
                        &format!("transporter n°1 {}", path.replace('.', " ")),
                    )
                })
                .collect();
            if !violations.is_empty() {
                return Err(ChainError::SealedTransporterModification(violations));
            }
        }
        *first = updated;
    }

    renumber(&mut chain, document_id);
    Ok(Reconciled {
        chain,
        detached: Vec::new(),
    })
}

fn remove_first(document_id: &str, existing: &[Transporter]) -> Result<Reconciled, ChainError> {
    let Some((first, rest)) = existing.split_first() else {
        return Ok(Reconciled::default());
    };
    if first.is_signed() {
        return Err(ChainError::SealedTransporterModification(vec![
            FieldViolation::new(
                "transporters[0]",
                "transporter n°1 has already signed and cannot be removed or moved",
            ),
        ]));
    }

    let mut chain = rest.to_vec();
    renumber(&mut chain, document_id);
    Ok(Reconciled {
        chain,
        detached: vec![detach(first.clone())],
    })
}
