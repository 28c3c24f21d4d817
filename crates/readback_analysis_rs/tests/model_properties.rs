use proptest::prelude::*;
use readback_analysis_rs::{
    AdaptiveModelState, ErrorKind, FlightPhase, InstructionType, LearningConfigPatch, ModelHandle,
    ReinforcementSession,
    detection::{is_magnitude_error, is_transposition},
    model::weights::*,
    test_utils,
};
use strum::IntoEnumIterator;

fn error_kind() -> impl Strategy<Value = ErrorKind> {
    prop::sample::select(ErrorKind::FIXED.to_vec())
}

fn phase() -> impl Strategy<Value = FlightPhase> {
    prop::sample::select(FlightPhase::iter().collect::<Vec<_>>())
}

fn instruction() -> impl Strategy<Value = Option<InstructionType>> {
    prop::option::of(prop::sample::select(InstructionType::iter().collect::<Vec<_>>()))
}

#[derive(Debug, Clone)]
enum Op {
    Correct {
        predicted_correct: bool,
        actually_correct: bool,
        predicted: Vec<ErrorKind>,
        actual: Vec<ErrorKind>,
        phases: (FlightPhase, FlightPhase),
        instruction: Option<InstructionType>,
    },
    Reinforce(ReinforcementSession),
}

fn op() -> impl Strategy<Value = Op> {
    let correct = (
        any::<bool>(),
        any::<bool>(),
        prop::collection::vec(error_kind(), 0..4),
        prop::collection::vec(error_kind(), 0..4),
        (phase(), phase()),
        instruction(),
    )
        .prop_map(
            |(predicted_correct, actually_correct, predicted, actual, phases, instruction)| {
                Op::Correct {
                    predicted_correct,
                    actually_correct,
                    predicted,
                    actual,
                    phases,
                    instruction,
                }
            },
        );
    let reinforce = (
        0u64..20,
        0u64..20,
        prop::collection::vec(error_kind(), 0..3),
        prop::collection::vec(phase(), 0..3),
    )
        .prop_map(|(total, correct, common_errors, phases)| {
            Op::Reinforce(ReinforcementSession {
                total_readbacks: total,
                correct_readbacks: correct.min(total),
                common_errors,
                phases,
            })
        });
    prop_oneof![3 => correct, 1 => reinforce]
}

fn run(handle: &ModelHandle, ops: &[Op]) {
    for op in ops {
        match op {
            Op::Correct {
                predicted_correct,
                actually_correct,
                predicted,
                actual,
                phases,
                instruction,
            } => {
                let correction = test_utils::correction(
                    test_utils::prediction(*predicted_correct, predicted.clone(), phases.0),
                    *actually_correct,
                    actual.clone(),
                    phases.1,
                );
                handle.apply_correction(correction, *instruction).unwrap();
            }
            Op::Reinforce(session) => {
                handle.reinforce(session).unwrap();
            }
        }
    }
}

proptest! {
    #[test]
    fn weights_stay_in_bounds(
        ops in prop::collection::vec(op(), 1..60),
        learning_rate in 0.01f64..=0.5,
        momentum in 0.0f64..=0.9,
    ) {
        let handle = ModelHandle::default();
        handle.update_config(&LearningConfigPatch {
            learning_rate: Some(learning_rate),
            momentum: Some(momentum),
            ..Default::default()
        }).unwrap();
        run(&handle, &ops);

        let weights = handle.weights().unwrap();
        for w in weights.error_weights.values() {
            prop_assert!((ERROR_WEIGHT_MIN..=ERROR_WEIGHT_MAX).contains(w), "error weight {}", w);
        }
        for w in weights.phase_weights.values() {
            prop_assert!((PHASE_WEIGHT_MIN..=PHASE_WEIGHT_MAX).contains(w), "phase weight {}", w);
        }
        for w in weights.pattern_weights.values() {
            prop_assert!(
                (PATTERN_WEIGHT_MIN..=PATTERN_WEIGHT_MAX).contains(w),
                "pattern weight {}",
                w
            );
        }
        let threshold = weights.thresholds.error_detection;
        prop_assert!((ERROR_DETECTION_MIN..=ERROR_DETECTION_MAX).contains(&threshold));
        prop_assert!(handle.snapshot().unwrap().validate().is_ok());
    }

    #[test]
    fn counters_add_up(ops in prop::collection::vec(op(), 0..40)) {
        let handle = ModelHandle::default();
        run(&handle, &ops);
        let stats = handle.stats().unwrap();
        let corrections = ops.iter().filter(|op| matches!(op, Op::Correct { .. })).count() as u64;
        prop_assert_eq!(stats.total_interactions, corrections);
        prop_assert_eq!(
            stats.correct_predictions + stats.incorrect_predictions,
            stats.total_interactions
        );
        prop_assert!((0.0..=1.0).contains(&stats.accuracy));
    }

    #[test]
    fn serialization_roundtrips(ops in prop::collection::vec(op(), 0..20)) {
        let handle = ModelHandle::default();
        run(&handle, &ops);
        let state = handle.snapshot().unwrap();
        let back = AdaptiveModelState::from_json(&state.to_json().unwrap()).unwrap();
        prop_assert_eq!(back, state);
    }

    #[test]
    fn transposition_and_magnitude_are_exclusive(a in "[0-9]{2,6}", b in "[0-9]{2,6}") {
        prop_assert!(!(is_transposition(&a, &b) && is_magnitude_error(&a, &b)));
    }

    #[test]
    fn adjacent_swaps_are_transpositions(digits in "[0-9]{2,6}", at in 0usize..5) {
        let mut swapped: Vec<char> = digits.chars().collect();
        let i = at % (swapped.len() - 1);
        prop_assume!(swapped[i] != swapped[i + 1]);
        swapped.swap(i, i + 1);
        let swapped: String = swapped.into_iter().collect();
        prop_assert!(is_transposition(&digits, &swapped));
        prop_assert!(!is_magnitude_error(&digits, &swapped));
    }
}
