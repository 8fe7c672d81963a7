//! Property-based tests for the sealing evaluator
//!
//! Documents are generated at every point of the signing workflow, with and
//! without a worker, a next destination or reception data. The properties
//! below must hold whatever the combination:
//!
//! 1. Resubmitting a document unchanged never trips a sealing rule
//! 2. Changing a field is refused exactly when its milestone is reached
//! 3. A route toggle that keeps the final CAP never produces a notification
//!
//! Chain reconciliation has its own suite; the sled layer is covered by the
//! scenarios.

use bordereau_sealing::{
    config::EngineConfig,
    document::{
        AcceptationStatus, CompanyRef, Document, NextDestination, Signature, Status, TimeStamp,
        Transporter, Worker,
    },
    notifier,
    patch::{DocumentPatch, WastePatch},
    sealing::{self, Milestone, SealingTable},
};
use proptest::prelude::*;

fn signature() -> Signature {
    Signature::new("signer", TimeStamp::new_with(2024, 2, 1, 12, 0, 0))
}

/// Which signatures are present, in milestone order.
fn signatures_strategy() -> impl Strategy<Value = [bool; 5]> {
    any::<[bool; 5]>()
}

fn cap_strategy() -> impl Strategy<Value = Option<String>> {
    prop_oneof![Just(None), "[A-Z]{2}[0-9]{3}".prop_map(Some)]
}

/// Received and refused weights in kilograms, refused never above received.
fn weights_strategy() -> impl Strategy<Value = Option<(u32, u32)>> {
    prop_oneof![
        Just(None),
        (0u32..200_000).prop_flat_map(|received| (Just(received), 0..=received)).prop_map(Some),
    ]
}

fn document_strategy() -> impl Strategy<Value = Document> {
    (
        signatures_strategy(),
        any::<bool>(),
        cap_strategy(),
        proptest::option::of(cap_strategy()),
        weights_strategy(),
        proptest::option::of("[a-z ]{1,12}"),
    )
        .prop_map(|(signed, with_worker, cap, next_cap, weights, material)| {
            let mut document = Document::new("bsda_prop");
            document.status = Status::SignedByProducer;
            document.emitter.company = CompanyRef::new("11111111111111", "Emitter");
            if signed[0] {
                document.emitter.emission = signature();
            }
            if with_worker || signed[1] {
                document.worker = Some(Worker {
                    company: CompanyRef::new("22222222222222", "Worker"),
                    work: if signed[1] { signature() } else { Signature::default() },
                    ..Default::default()
                });
            }
            if signed[2] {
                let mut transporter = Transporter::new("t1", CompanyRef::new("66666666666666", "Carrier"));
                transporter.number = 1;
                transporter.document_id = Some(document.id.clone());
                transporter.transport.signature = signature();
                document.transporters.push(transporter);
            }
            if signed[3] {
                document.destination.reception.signature = signature();
            }
            if signed[4] {
                document.destination.operation.signature = signature();
            }

            document.waste.code = Some("06 07 01*".into());
            document.waste.material_name = material;
            document.destination.company = CompanyRef::new("33333333333333", "Destination");
            document.destination.cap = cap;
            document.destination.operation.next_destination = next_cap.map(|cap| NextDestination {
                company: CompanyRef::new("44444444444444", "Final"),
                cap,
                planned_operation_code: Some("R 5".into()),
            });

            if let Some((received, refused)) = weights {
                let reception = &mut document.destination.reception;
                reception.weight = Some(received as f64);
                reception.refused_weight = Some(refused as f64);
                reception.accepted_weight = Some((received - refused) as f64);
                reception.acceptation_status = Some(match refused {
                    0 => AcceptationStatus::Accepted,
                    r if r == received => AcceptationStatus::Refused,
                    _ => AcceptationStatus::PartiallyRefused,
                });
            }
            document
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: resubmitting stored values is a no-op, whatever is signed
    #[test]
    fn resubmission_is_idempotent(document in document_strategy()) {
        let config = EngineConfig::default();
        let patch = DocumentPatch::resubmit(&document, &config);

        let candidate = patch.apply(&document, &config).unwrap();
        prop_assert_eq!(&candidate, &document);

        let report = sealing::evaluate(&document, &patch, &config).unwrap();
        prop_assert!(report.is_clean(), "unexpected violations: {:?}", report.violations);
    }

    /// Property: waste code is locked exactly once emission is reached
    #[test]
    fn waste_code_follows_emission(document in document_strategy()) {
        let config = EngineConfig::default();
        let patch = DocumentPatch::new().set_waste(WastePatch {
            code: Some(Some("17 06 05*".into())),
            ..Default::default()
        });

        let report = sealing::evaluate(&document, &patch, &config).unwrap();
        prop_assert_eq!(!report.is_clean(), Milestone::Emission.is_reached(&document));
    }

    /// Property: reached milestones are monotonic in workflow order
    #[test]
    fn reached_milestones_form_a_prefix(document in document_strategy()) {
        let reached: Vec<bool> = Milestone::ALL.iter().map(|m| m.is_reached(&document)).collect();
        for pair in reached.windows(2) {
            prop_assert!(pair[0] || !pair[1]);
        }
    }

    /// Property: swapping between direct and transit routes with the same
    /// final CAP stays silent in both directions
    #[test]
    fn toggle_keeping_cap_is_silent(document in document_strategy(), cap in "[A-Z]{2}[0-9]{3}") {
        let mut direct = document.clone();
        direct.status = Status::SignedByWorker;
        direct.destination.operation.next_destination = None;
        direct.destination.cap = Some(cap.clone());

        let mut transit = direct.clone();
        transit.destination.company = CompanyRef::new("55555555555555", "Transit");
        transit.destination.cap = Some("TTR000".into());
        transit.destination.operation.next_destination = Some(NextDestination {
            company: CompanyRef::new("33333333333333", "Destination"),
            cap: Some(cap),
            planned_operation_code: None,
        });

        prop_assert!(notifier::detect(&direct, &transit).is_none());
        prop_assert!(notifier::detect(&transit, &direct).is_none());
    }

    /// Property: violations always come out in table order
    #[test]
    fn violations_follow_table_order(document in document_strategy()) {
        let mut changed = document.clone();
        changed.waste.code = Some("17 06 05*".into());
        changed.destination.cap = Some("ZZ999".into());
        changed.destination.custom_info = Some("changed".into());

        let table = SealingTable::bsda();
        let report = table.evaluate_candidate(&document, &changed);
        let positions: Vec<usize> = report
            .violations
            .iter()
            .map(|v| {
                table
                    .rules()
                    .iter()
                    .position(|rule| {
                        rule.pattern == v.path
                            || rule.pattern.strip_suffix(".*").is_some_and(|p| v.path.starts_with(p))
                    })
                    .unwrap()
            })
            .collect();
        let mut sorted = positions.clone();
        sorted.sort();
        prop_assert_eq!(positions, sorted);
    }
}
