use std::thread;

use readback_analysis_rs::{
    ErrorKind, FlightPhase, InstructionType, LearningConfigPatch, ModelHandle,
    ReinforcementSession, test_utils,
};

const THREADS: usize = 8;
const CORRECTIONS_PER_THREAD: usize = 25;

#[test]
fn test_shared_handle_serializes_updates() {
    let handle = ModelHandle::default();

    let workers: Vec<_> = (0..THREADS)
        .map(|worker| {
            let handle = handle.clone();
            thread::spawn(move || {
                for i in 0..CORRECTIONS_PER_THREAD {
                    let right = (worker + i) % 3 != 0;
                    let correction = test_utils::correction(
                        test_utils::prediction(true, vec![], FlightPhase::Enroute),
                        right,
                        if right { vec![] } else { vec![ErrorKind::WrongValue] },
                        FlightPhase::Enroute,
                    );
                    handle
                        .apply_correction(correction, Some(InstructionType::Altitude))
                        .unwrap();
                    if i % 10 == 0 {
                        handle
                            .reinforce(&ReinforcementSession {
                                total_readbacks: 4,
                                correct_readbacks: 3,
                                common_errors: vec![ErrorKind::WrongValue],
                                phases: vec![FlightPhase::Enroute],
                            })
                            .unwrap();
                    }
                    if i == CORRECTIONS_PER_THREAD / 2 {
                        let patch = LearningConfigPatch {
                            learning_rate: Some(0.05 + worker as f64 * 0.01),
                            ..Default::default()
                        };
                        handle.update_config(&patch).unwrap();
                    }
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let state = handle.snapshot().unwrap();
    let expected = (THREADS * CORRECTIONS_PER_THREAD) as u64;
    assert_eq!(state.history.total_interactions, expected);
    assert_eq!(
        state.history.correct_predictions + state.history.incorrect_predictions,
        expected
    );
    assert_eq!(state.history.user_corrections.len(), THREADS * CORRECTIONS_PER_THREAD);
    state.validate().unwrap();
}
