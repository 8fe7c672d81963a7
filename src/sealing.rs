//! Sealing rules: which fields a signature locks, and the evaluator that
//! checks a proposed update against them.
use super::config::EngineConfig;
use super::diff;
use super::document::Document;
use super::error::ValidationError;
use super::patch::DocumentPatch;
use std::fmt;
use std::sync::OnceLock;
use tracing::debug;

/// Signature milestones, in workflow order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Milestone {
    Emission,
    Work,
    Transport,
    Reception,
    Operation,
}

impl Milestone {
    pub const ALL: [Milestone; 5] = [
        Milestone::Emission,
        Milestone::Work,
        Milestone::Transport,
        Milestone::Reception,
        Milestone::Operation,
    ];

    fn signed_on(self, document: &Document) -> bool {
        match self {
            Milestone::Emission => document.emitter.emission.is_present(),
            Milestone::Work => document
                .worker
                .as_ref()
                .is_some_and(|w| w.work.is_present()),
            Milestone::Transport => document.transport_started(),
            Milestone::Reception => document.destination.reception.signature.is_present(),
            Milestone::Operation => document.destination.operation.signature.is_present(),
        }
    }

    /// Signatures may be skipped, so a milestone is also reached once any
    /// later milestone has been signed.
    pub fn is_reached(self, document: &Document) -> bool {
        Milestone::ALL
            .iter()
            .filter(|m| **m >= self)
            .any(|m| m.signed_on(document))
    }
}

/// What locks a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seal {
    At(Milestone),
    /// Company of the destination slot. Locked by the upstream actor's
    /// signature, except while the route is toggled between direct and
    /// through-intermediate, which stays open until transport.
    Destination,
    /// Fields of the declared next destination, locked by the operation
    /// signature.
    NextDestination,
}

impl Seal {
    pub fn resolve(self, old: &Document, candidate: &Document) -> Milestone {
        let toggled = old.route().is_direct() != candidate.route().is_direct();
        match self {
            Seal::At(milestone) => milestone,
            Seal::Destination if toggled => Milestone::Transport,
            Seal::Destination if old.has_worker() => Milestone::Work,
            Seal::Destination => Milestone::Transport,
            Seal::NextDestination => Milestone::Operation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealingRule {
    /// Exact path, or a `prefix.*` wildcard.
    pub pattern: &'static str,
    pub seal: Seal,
    pub label: &'static str,
}

impl SealingRule {
    const fn new(pattern: &'static str, seal: Seal, label: &'static str) -> Self {
        Self {
            pattern,
            seal,
            label,
        }
    }

    /// The part of `path` covered by the wildcard, or `Some("")` for an
    /// exact match.
    fn matches<'p>(&self, path: &'p str) -> Option<&'p str> {
        match self.pattern.strip_suffix(".*") {
            Some(prefix) => path
                .strip_prefix(prefix)
                .and_then(|rest| rest.strip_prefix('.')),
            None => (self.pattern == path).then_some(""),
        }
    }

    fn describe(&self, rest: &str) -> String {
        if rest.is_empty() {
            return self.label.to_string();
        }
        let words: Vec<&str> = rest.split('.').map(leaf_label).collect();
        format!("{} {}", self.label, words.join(" "))
    }
}

fn leaf_label(leaf: &str) -> &str {
    match leaf {
        "siret" => "SIRET",
        "mail" => "email",
        "cap" => "CAP",
        "plannedOperationCode" => "planned operation code",
        "materialName" => "material name",
        "sealNumbers" => "seal numbers",
        "refusedWeight" => "refused weight",
        "acceptationStatus" => "acceptation status",
        "refusalReason" => "refusal reason",
        "takenOverAt" => "pickup date",
        "nextDestination" => "next destination",
        other => other,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub path: String,
    pub label: String,
}

impl FieldViolation {
    pub fn new(path: &str, label: &str) -> Self {
        Self {
            path: path.to_string(),
            label: label.to_string(),
        }
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SealingReport {
    pub violations: Vec<FieldViolation>,
}

impl SealingReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Declarative path → seal mapping. The first matching rule wins, so more
/// specific patterns are declared before wildcards covering them.
#[derive(Debug)]
pub struct SealingTable {
    rules: Vec<SealingRule>,
}

impl SealingTable {
    pub fn bsda() -> &'static SealingTable {
        static TABLE: OnceLock<SealingTable> = OnceLock::new();
        TABLE.get_or_init(|| {
            use Milestone::*;
            SealingTable {
                rules: vec![
                    SealingRule::new("emitter.isPrivateIndividual", Seal::At(Emission), "emitter private individual flag"),
                    SealingRule::new("emitter.company.*", Seal::At(Emission), "emitter company"),
                    SealingRule::new("emitter.pickupSite.*", Seal::At(Emission), "emitter pickup site"),
                    SealingRule::new("emitter.customInfo", Seal::At(Emission), "emitter custom info"),
                    SealingRule::new("worker.company.*", Seal::At(Emission), "worker company"),
                    SealingRule::new("worker.certification.*", Seal::At(Work), "worker certification"),
                    SealingRule::new("waste.code", Seal::At(Emission), "waste code"),
                    SealingRule::new("waste.*", Seal::At(Work), "waste"),
                    SealingRule::new("grouping", Seal::At(Emission), "grouped documents"),
                    SealingRule::new("forwarding", Seal::At(Emission), "forwarded document"),
                    SealingRule::new("destination.company.*", Seal::Destination, "destination company"),
                    SealingRule::new("destination.cap", Seal::At(Transport), "destination CAP"),
                    SealingRule::new("destination.plannedOperationCode", Seal::At(Transport), "destination planned operation code"),
                    SealingRule::new("destination.customInfo", Seal::At(Operation), "destination custom info"),
                    SealingRule::new("destination.reception.*", Seal::At(Reception), "reception"),
                    SealingRule::new("destination.operation.nextDestination.*", Seal::NextDestination, "next destination"),
                    SealingRule::new("destination.operation.*", Seal::At(Operation), "operation"),
                    SealingRule::new("intermediaries", Seal::At(Transport), "intermediaries"),
                ],
            }
        })
    }

    pub fn rules(&self) -> &[SealingRule] {
        &self.rules
    }

    fn lookup<'p>(&self, path: &'p str) -> Option<(usize, &SealingRule, &'p str)> {
        self.rules
            .iter()
            .enumerate()
            .find_map(|(idx, rule)| rule.matches(path).map(|rest| (idx, rule, rest)))
    }

    /// Whether `path` is locked on `old`, independently of whether the
    /// update touches it.
    pub fn is_sealed(&self, old: &Document, candidate: &Document, path: &str) -> bool {
        self.lookup(path)
            .is_some_and(|(_, rule, _)| rule.seal.resolve(old, candidate).is_reached(old))
    }

    /// Collect every changed path whose milestone has been reached on `old`,
    /// ordered by rule declaration.
    pub fn evaluate_candidate(&self, old: &Document, candidate: &Document) -> SealingReport {
        let mut found: Vec<(usize, FieldViolation)> = diff::changed_paths(old, candidate)
            .iter()
            .filter_map(|path| {
                let (idx, rule, rest) = self.lookup(path)?;
                let milestone = rule.seal.resolve(old, candidate);
                milestone
                    .is_reached(old)
                    .then(|| (idx, FieldViolation::new(path, &rule.describe(rest))))
            })
            .collect();
        found.sort_by_key(|(idx, _)| *idx);

        let report = SealingReport {
            violations: found.into_iter().map(|(_, v)| v).collect(),
        };
        debug!(
            document = %old.id,
            violations = report.violations.len(),
            "sealing rules evaluated"
        );
        report
    }
}

/// Once emission is signed, switching between a direct route and one
/// through a transit station must keep the planned final facility: it only
/// moves between the destination and next destination slots.
pub fn check_route_toggle(old: &Document, candidate: &Document) -> Result<(), ValidationError> {
    if !Milestone::Emission.is_reached(old) || Milestone::Operation.is_reached(old) {
        return Ok(());
    }
    let next_siret = |document: &Document| {
        document
            .destination
            .operation
            .next_destination
            .as_ref()
            .and_then(|next| next.company.identifier())
            .map(str::to_string)
    };
    let old_destination = old.destination.company.identifier();
    let new_destination = candidate.destination.company.identifier();
    let old_next = next_siret(old);
    let new_next = next_siret(candidate);

    if old_destination != new_destination
        && new_next.is_some()
        && new_next.as_deref() != old_destination
    {
        return Err(ValidationError::FinalDestinationDropped);
    }
    if old_next.is_some() && new_next.is_none() && new_destination != old_next.as_deref() {
        return Err(ValidationError::FinalDestinationNotRestored);
    }
    Ok(())
}

/// Evaluate a partial update against the document it applies to.
pub fn evaluate(
    old: &Document,
    patch: &DocumentPatch,
    config: &EngineConfig,
) -> Result<SealingReport, ValidationError> {
    let candidate = patch.apply(old, config)?;
    Ok(SealingTable::bsda().evaluate_candidate(old, &candidate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{CompanyRef, NextDestination, Signature, TimeStamp, Transporter, Worker};

    fn signed() -> Signature {
        Signature::new("signer", TimeStamp::new_with(2024, 3, 1, 9, 0, 0))
    }

    fn base() -> Document {
        let mut document = Document::new("bsda_1");
        document.emitter.company = CompanyRef::new("11111111111111", "Emitter");
        document.worker = Some(Worker {
            company: CompanyRef::new("22222222222222", "Worker"),
            ..Default::default()
        });
        document.destination.company = CompanyRef::new("33333333333333", "Destination");
        document.destination.cap = Some("CAP".into());
        document.waste.code = Some("06 07 01*".into());
        document
    }

    #[test]
    fn nothing_is_sealed_before_any_signature() {
        let old = base();
        let mut candidate = old.clone();
        candidate.emitter.company.name = Some("Renamed".into());
        candidate.destination.cap = Some("OTHER".into());

        let report = SealingTable::bsda().evaluate_candidate(&old, &candidate);
        assert!(report.is_clean());
    }

    #[test]
    fn emission_signature_locks_emitter_fields() {
        let mut old = base();
        old.emitter.emission = signed();
        let mut candidate = old.clone();
        candidate.emitter.company.siret = Some("99999999999999".into());
        candidate.emitter.company.name = Some("Other".into());

        let report = SealingTable::bsda().evaluate_candidate(&old, &candidate);
        let labels: Vec<&str> = report.violations.iter().map(|v| v.label.as_str()).collect();
        assert_eq!(labels.len(), 2);
        assert!(labels.contains(&"emitter company SIRET"));
        assert!(labels.contains(&"emitter company name"));
    }

    #[test]
    fn resubmitting_sealed_values_is_accepted() {
        let mut old = base();
        old.emitter.emission = signed();
        old.transporters.push(Transporter {
            transport: crate::document::Transport {
                signature: signed(),
                ..Default::default()
            },
            ..Transporter::new("trs_1", CompanyRef::default())
        });

        let report = SealingTable::bsda().evaluate_candidate(&old, &old.clone());
        assert!(report.is_clean());
    }

    #[test]
    fn later_signature_reaches_skipped_milestones() {
        let mut old = base();
        old.destination.operation.signature = signed();

        for milestone in Milestone::ALL {
            assert!(milestone.is_reached(&old), "{milestone:?} should be reached");
        }
    }

    #[test]
    fn violations_follow_table_order() {
        let mut old = base();
        old.destination.operation.signature = signed();
        let mut candidate = old.clone();
        candidate.intermediaries = vec![CompanyRef::new("44444444444444", "Broker")];
        candidate.waste.code = Some("17 06 05*".into());
        candidate.emitter.custom_info = Some("note".into());

        let report = SealingTable::bsda().evaluate_candidate(&old, &candidate);
        let paths: Vec<&str> = report.violations.iter().map(|v| v.path.as_str()).collect();
        assert_eq!(paths, vec!["emitter.customInfo", "waste.code", "intermediaries"]);
    }

    #[test]
    fn destination_company_locks_at_work_signature_when_worker_attached() {
        let mut old = base();
        old.emitter.emission = signed();
        let mut candidate = old.clone();
        candidate.destination.company.siret = Some("55555555555555".into());
        assert!(SealingTable::bsda().evaluate_candidate(&old, &candidate).is_clean());

        if let Some(worker) = old.worker.as_mut() {
            worker.work = signed();
        }
        let report = SealingTable::bsda().evaluate_candidate(&old, &candidate);
        assert_eq!(report.violations[0].label, "destination company SIRET");
    }

    #[test]
    fn toggling_next_destination_stays_open_until_transport() {
        let mut old = base();
        old.emitter.emission = signed();
        if let Some(worker) = old.worker.as_mut() {
            worker.work = signed();
        }

        // the former destination becomes the next destination, a TTR takes the slot
        let mut candidate = old.clone();
        candidate.destination.company = CompanyRef::new("66666666666666", "TTR");
        candidate.destination.operation.next_destination = Some(NextDestination {
            company: old.destination.company.clone(),
            cap: Some("CAP".into()),
            planned_operation_code: None,
        });
        assert!(SealingTable::bsda().evaluate_candidate(&old, &candidate).is_clean());

        old.transporters.push(Transporter {
            transport: crate::document::Transport {
                signature: signed(),
                ..Default::default()
            },
            ..Transporter::new("trs_1", CompanyRef::default())
        });
        let report = SealingTable::bsda().evaluate_candidate(&old, &candidate);
        let paths: Vec<&str> = report.violations.iter().map(|v| v.path.as_str()).collect();
        assert_eq!(paths, vec!["destination.company.name", "destination.company.siret"]);
    }

    #[test]
    fn next_destination_stays_open_until_operation() {
        let mut old = base();
        old.emitter.emission = signed();
        old.transporters.push(Transporter {
            transport: crate::document::Transport {
                signature: signed(),
                ..Default::default()
            },
            ..Transporter::new("trs_1", CompanyRef::default())
        });

        // the destination declares where the waste goes after it
        let mut candidate = old.clone();
        candidate.destination.operation.next_destination = Some(NextDestination {
            company: CompanyRef::new("55555555555555", "Final"),
            cap: Some("FINAL".into()),
            planned_operation_code: None,
        });
        assert!(SealingTable::bsda().evaluate_candidate(&old, &candidate).is_clean());

        old.destination.operation.signature = signed();
        assert!(!SealingTable::bsda().evaluate_candidate(&old, &candidate).is_clean());
    }

    #[test]
    fn empty_next_destination_does_not_open_destination() {
        let mut old = base();
        old.emitter.emission = signed();
        if let Some(worker) = old.worker.as_mut() {
            worker.work = signed();
        }

        let mut candidate = old.clone();
        candidate.destination.company.siret = Some("55555555555555".into());
        candidate.destination.operation.next_destination = Some(NextDestination::default());

        let report = SealingTable::bsda().evaluate_candidate(&old, &candidate);
        assert_eq!(report.violations[0].label, "destination company SIRET");
    }

    #[test]
    fn route_toggle_keeps_final_facility() {
        let mut old = base();
        old.emitter.emission = signed();
        let final_facility = old.destination.company.clone();

        let mut through_ttr = old.clone();
        through_ttr.destination.company = CompanyRef::new("66666666666666", "TTR");
        through_ttr.destination.operation.next_destination = Some(NextDestination {
            company: final_facility.clone(),
            ..Default::default()
        });
        assert_eq!(check_route_toggle(&old, &through_ttr), Ok(()));

        let mut elsewhere = through_ttr.clone();
        if let Some(next) = elsewhere.destination.operation.next_destination.as_mut() {
            next.company = CompanyRef::new("77777777777777", "Elsewhere");
        }
        assert_eq!(
            check_route_toggle(&old, &elsewhere),
            Err(ValidationError::FinalDestinationDropped)
        );

        // back to direct: the final facility must return to the destination slot
        let mut direct_again = through_ttr.clone();
        direct_again.destination.operation.next_destination = None;
        assert_eq!(
            check_route_toggle(&through_ttr, &direct_again),
            Err(ValidationError::FinalDestinationNotRestored)
        );
        direct_again.destination.company = final_facility;
        assert_eq!(check_route_toggle(&through_ttr, &direct_again), Ok(()));

        // before emission anything goes
        let unsigned = base();
        let mut free = unsigned.clone();
        free.destination.company = CompanyRef::new("66666666666666", "TTR");
        free.destination.operation.next_destination = Some(NextDestination {
            company: CompanyRef::new("77777777777777", "Elsewhere"),
            ..Default::default()
        });
        assert_eq!(check_route_toggle(&unsigned, &free), Ok(()));
    }

    #[test]
    fn next_destination_labels_are_readable() {
        let rule = SealingTable::bsda()
            .lookup("destination.operation.nextDestination.company.siret")
            .map(|(_, rule, rest)| rule.describe(rest));
        assert_eq!(rule.as_deref(), Some("next destination company SIRET"));
    }
}
