// crates/conduct-gate-signals/tests/inferencer_unit.rs
// ============================================================================
// Module: Virtue Inferencer Tests
// Description: Validate the seven virtue combinations and their confidences.
// Purpose: Ensure virtue readings follow the published signal contracts.
// ============================================================================

//! Virtue inferencer behavior tests.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    clippy::float_cmp,
    reason = "Test-only assertions and helpers are permitted."
)]

use conduct_gate_core::ActionEvent;
use conduct_gate_core::ActionRef;
use conduct_gate_core::AgentId;
use conduct_gate_core::BehaviorSignal;
use conduct_gate_core::Timestamp;
use conduct_gate_signals::BehaviorLog;
use conduct_gate_signals::InferencerConfig;
use conduct_gate_signals::VirtueInferencer;

fn now() -> Timestamp {
    Timestamp::from_unix_millis(100_000)
}

fn empty_log() -> BehaviorLog {
    BehaviorLog::new(86_400_000)
}

fn append_claims(log: &mut BehaviorLog, verified: usize, unverified: usize) {
    let mut millis = 1_000;
    for _ in 0 .. verified {
        log.append(Timestamp::from_unix_millis(millis), BehaviorSignal::Claim {
            claim_ref: ActionRef::new(format!("claim-{millis}")),
            verified: true,
        });
        millis += 1;
    }
    for _ in 0 .. unverified {
        log.append(Timestamp::from_unix_millis(millis), BehaviorSignal::Claim {
            claim_ref: ActionRef::new(format!("claim-{millis}")),
            verified: false,
        });
        millis += 1;
    }
}

#[test]
fn empty_log_yields_midpoints_with_zero_confidence() {
    let inferencer = VirtueInferencer::new(InferencerConfig::default());
    let reading = inferencer.infer(&empty_log(), now());
    assert_eq!(reading.values.truthfulness, 0.5);
    assert_eq!(reading.values.justice, 0.5);
    assert_eq!(reading.values.trustworthiness, 0.5);
    assert_eq!(reading.values.unity, 0.5);
    assert_eq!(reading.values.service, 0.5);
    assert_eq!(reading.values.detachment, 0.5);
    assert_eq!(reading.values.understanding, 0.5);
    assert!(reading.confidence.iter().all(|confidence| *confidence == 0.0));
}

#[test]
fn truthfulness_is_the_verified_ratio_below_the_knee() {
    let inferencer = VirtueInferencer::new(InferencerConfig::default());
    let mut log = empty_log();
    append_claims(&mut log, 8, 2);
    let reading = inferencer.infer(&log, now());
    // Unverified share of 20% sits below the 30% knee: no penalty.
    assert!((reading.values.truthfulness - 0.8).abs() < 1e-12);
}

#[test]
fn truthfulness_penalizes_unverified_claims_quadratically() {
    let inferencer = VirtueInferencer::new(InferencerConfig::default());
    let mut log = empty_log();
    append_claims(&mut log, 5, 5);
    let reading = inferencer.infer(&log, now());
    // Above the knee the value drops below the raw verified ratio.
    assert!(reading.values.truthfulness < 0.5);
    assert!(reading.values.truthfulness > 0.0);

    let mut worse = empty_log();
    append_claims(&mut worse, 2, 8);
    let worse_reading = inferencer.infer(&worse, now());
    assert!(worse_reading.values.truthfulness < reading.values.truthfulness);
}

#[test]
fn trustworthiness_rewards_fulfilled_commitments() {
    let inferencer = VirtueInferencer::new(InferencerConfig::default());
    let mut log = empty_log();
    for millis in 0 .. 10i64 {
        log.append(Timestamp::from_unix_millis(millis), BehaviorSignal::Commitment {
            commitment_ref: ActionRef::new(format!("commitment-{millis}")),
            fulfilled: true,
        });
    }
    let reading = inferencer.infer(&log, now());
    assert_eq!(reading.values.trustworthiness, 1.0);
    assert_eq!(reading.confidence[2], 1.0);
}

#[test]
fn recent_breaches_decay_trustworthiness() {
    let inferencer = VirtueInferencer::new(InferencerConfig::default());
    let mut fulfilled_then_missed = empty_log();
    for millis in 0 .. 10i64 {
        fulfilled_then_missed.append(
            Timestamp::from_unix_millis(millis),
            BehaviorSignal::Commitment {
                commitment_ref: ActionRef::new(format!("commitment-{millis}")),
                fulfilled: millis < 9,
            },
        );
    }
    let reading = inferencer.infer(&fulfilled_then_missed, now());
    // 9/10 fulfilled, but the recent miss drags the value further down.
    assert!(reading.values.trustworthiness < 0.9);
    assert!(reading.values.trustworthiness > 0.0);
}

#[test]
fn unity_follows_inverse_conflict_weighted_by_frequency() {
    let inferencer = VirtueInferencer::new(InferencerConfig::default());
    let peer = AgentId::new("peer-1");

    let mut harmonious = empty_log();
    for millis in 0 .. 10i64 {
        harmonious.append(
            Timestamp::from_unix_millis(millis),
            BehaviorSignal::collaboration(vec![peer.clone()], 0.0),
        );
    }
    assert_eq!(inferencer.infer(&harmonious, now()).values.unity, 1.0);

    // A single conflict-free collaboration is only weak evidence.
    let mut sparse = empty_log();
    sparse.append(
        Timestamp::from_unix_millis(0),
        BehaviorSignal::collaboration(vec![peer.clone()], 0.0),
    );
    let sparse_unity = inferencer.infer(&sparse, now()).values.unity;
    assert!(sparse_unity > 0.5);
    assert!(sparse_unity < 0.6);

    let mut contentious = empty_log();
    for millis in 0 .. 10i64 {
        contentious.append(
            Timestamp::from_unix_millis(millis),
            BehaviorSignal::collaboration(vec![peer.clone()], 1.0),
        );
    }
    assert_eq!(inferencer.infer(&contentious, now()).values.unity, 0.0);
}

#[test]
fn service_is_the_benefit_to_others_share() {
    let inferencer = VirtueInferencer::new(InferencerConfig::default());
    let mut selfless = empty_log();
    for millis in 0 .. 10i64 {
        selfless.append(
            Timestamp::from_unix_millis(millis),
            BehaviorSignal::Action(ActionEvent::new("help", 0.0, 0.8)),
        );
    }
    assert_eq!(inferencer.infer(&selfless, now()).values.service, 1.0);

    let mut balanced = empty_log();
    for millis in 0 .. 10i64 {
        balanced.append(
            Timestamp::from_unix_millis(millis),
            BehaviorSignal::Action(ActionEvent::new("work", 0.4, 0.4)),
        );
    }
    assert_eq!(inferencer.infer(&balanced, now()).values.service, 0.5);
}

#[test]
fn credit_seeking_erodes_detachment() {
    let inferencer = VirtueInferencer::new(InferencerConfig::default());
    let mut modest = empty_log();
    for millis in 0 .. 10i64 {
        modest.append(
            Timestamp::from_unix_millis(millis),
            BehaviorSignal::Action(ActionEvent::new("work", 0.5, 0.5)),
        );
    }
    assert_eq!(inferencer.infer(&modest, now()).values.detachment, 1.0);

    let mut boastful = empty_log();
    for millis in 0 .. 10i64 {
        boastful.append(
            Timestamp::from_unix_millis(millis),
            BehaviorSignal::Action(ActionEvent::new("work", 0.5, 0.5)),
        );
        boastful.append(Timestamp::from_unix_millis(millis + 100), BehaviorSignal::CreditSeek);
    }
    assert_eq!(inferencer.infer(&boastful, now()).values.detachment, 0.5);
}

#[test]
fn understanding_weights_awareness_rate_by_depth() {
    let inferencer = VirtueInferencer::new(InferencerConfig::default());
    let mut attentive = empty_log();
    for millis in 0 .. 10i64 {
        attentive.append(
            Timestamp::from_unix_millis(millis),
            BehaviorSignal::comprehension(true, 0.8),
        );
    }
    assert!((inferencer.infer(&attentive, now()).values.understanding - 0.8).abs() < 1e-12);

    let mut oblivious = empty_log();
    for millis in 0 .. 10i64 {
        oblivious.append(
            Timestamp::from_unix_millis(millis),
            BehaviorSignal::comprehension(false, 0.8),
        );
    }
    assert_eq!(inferencer.infer(&oblivious, now()).values.understanding, 0.0);
}

#[test]
fn awareness_markers_blend_into_justice() {
    let inferencer = VirtueInferencer::new(InferencerConfig::default());
    let mut fair_only = empty_log();
    for millis in 0 .. 10i64 {
        fair_only.append(
            Timestamp::from_unix_millis(millis),
            BehaviorSignal::Action(ActionEvent::new("split", 0.5, 0.5)),
        );
    }
    assert_eq!(inferencer.infer(&fair_only, now()).values.justice, 1.0);

    let mut fair_and_aware = empty_log();
    for millis in 0 .. 10i64 {
        fair_and_aware.append(
            Timestamp::from_unix_millis(millis),
            BehaviorSignal::Action(ActionEvent::new("split", 0.5, 0.5)),
        );
        fair_and_aware.append(
            Timestamp::from_unix_millis(millis + 100),
            BehaviorSignal::comprehension(true, 0.4),
        );
    }
    let blended = inferencer.infer(&fair_and_aware, now()).values.justice;
    // Awareness markers with shallow depth pull the blend below pure fairness.
    assert!(blended < 1.0);
    assert!(blended > 0.8);
}
