//! 距离估算的属性测试

use proptest::prelude::*;
use rover_client::{Clock, ManualClock, MotionTracker};
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Step {
    Begin,
    End,
    Advance(u64),
    ClockJumpBack(u64),
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        Just(Step::Begin),
        Just(Step::End),
        (0u64..5_000).prop_map(Step::Advance),
        (0u64..5_000).prop_map(Step::ClockJumpBack),
    ]
}

proptest! {
    #[test]
    fn test_total_distance_never_decreases(
        speed in 0.0f64..100.0,
        steps in prop::collection::vec(step(), 0..64),
    ) {
        let clock = Arc::new(ManualClock::new(100_000));
        let tracker = MotionTracker::new(speed, clock.clone());
        let mut last = 0.0;

        for step in steps {
            match step {
                Step::Begin => {
                    tracker.begin_movement();
                },
                Step::End => {
                    let total = tracker.end_movement();
                    prop_assert!(total >= last);
                    last = total;
                },
                Step::Advance(ms) => clock.advance_ms(ms),
                Step::ClockJumpBack(ms) => clock.set_ms(clock.now_ms().saturating_sub(ms)),
            }
            prop_assert!(tracker.total_distance_cm() >= last);
        }
    }

    #[test]
    fn test_single_segment_matches_speed_times_time(
        speed in 0.0f64..100.0,
        elapsed_ms in 0u64..60_000,
    ) {
        let clock = Arc::new(ManualClock::new(0));
        let tracker = MotionTracker::new(speed, clock.clone());
        tracker.begin_movement();
        clock.advance_ms(elapsed_ms);
        let total = tracker.end_movement();
        let expected = speed * (elapsed_ms as f64 / 1000.0);
        prop_assert!((total - expected).abs() < 1e-9);
    }
}
