//! Property-based tests for the notification lifecycle
//!
//! Random event sequences are applied to a notification and every change it
//! accepts is checked against the transition table.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use courier_common::{
    Channel, DeliveryResult, ErrorCode, LifecycleEvent, Notification, NotificationStatus,
};
use proptest::prelude::*;

use NotificationStatus::{Delivered, Failed, Pending, Processing, Queued};

const EDGES: &[(NotificationStatus, LifecycleEvent, NotificationStatus)] = &[
    (Pending, LifecycleEvent::Enqueue, Queued),
    (Queued, LifecycleEvent::BeginProcessing, Processing),
    (Processing, LifecycleEvent::Succeed, Delivered),
    (Processing, LifecycleEvent::Retry, Queued),
    (Processing, LifecycleEvent::Fail, Failed),
    (Pending, LifecycleEvent::DeadLetter, Failed),
    (Queued, LifecycleEvent::DeadLetter, Failed),
    (Processing, LifecycleEvent::DeadLetter, Failed),
];

#[derive(Debug, Clone)]
enum Step {
    Event(LifecycleEvent),
    Attempt(bool),
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        Just(Step::Event(LifecycleEvent::Enqueue)),
        Just(Step::Event(LifecycleEvent::BeginProcessing)),
        Just(Step::Event(LifecycleEvent::Succeed)),
        Just(Step::Event(LifecycleEvent::Retry)),
        Just(Step::Event(LifecycleEvent::Fail)),
        Just(Step::Event(LifecycleEvent::DeadLetter)),
        any::<bool>().prop_map(Step::Attempt),
    ]
}

fn apply(notification: &mut Notification, event: LifecycleEvent) -> bool {
    match event {
        LifecycleEvent::Enqueue => notification.mark_queued(),
        LifecycleEvent::BeginProcessing => notification.mark_processing(),
        LifecycleEvent::Succeed => notification.mark_delivered(),
        LifecycleEvent::Retry => notification.requeue_for_retry(),
        LifecycleEvent::Fail => notification.mark_failed("failed"),
        LifecycleEvent::DeadLetter => notification.dead_letter("dead"),
    }
    .is_ok()
}

proptest! {
    #[test]
    fn accepted_transitions_stay_on_the_graph(steps in prop::collection::vec(step_strategy(), 0..64)) {
        let mut notification = Notification::new(Channel::Email, "a@b.com", "body");

        for step in steps {
            let before = notification.status();
            let attempts_before = notification.attempt_count();

            match step {
                Step::Event(event) => {
                    let accepted = apply(&mut notification, event);
                    let after = notification.status();
                    let on_graph = EDGES.iter().any(|&(from, e, to)| from == before && e == event && to == after);

                    if accepted {
                        prop_assert!(on_graph, "{before} --{event}--> {after} is not an edge");
                    } else {
                        prop_assert_eq!(after, before);
                        prop_assert!(!EDGES.iter().any(|&(from, e, _)| from == before && e == event));
                    }
                }
                Step::Attempt(success) => {
                    let result = if success {
                        DeliveryResult::ok()
                    } else {
                        DeliveryResult::failure_with_code("down", ErrorCode::Timeout)
                    };
                    let accepted = notification.record_attempt(&result).is_ok();
                    prop_assert_eq!(accepted, before == Processing);
                }
            }

            if before.is_terminal() {
                prop_assert_eq!(notification.status(), before);
                prop_assert_eq!(notification.attempt_count(), attempts_before);
            }

            let sequences: Vec<u32> = notification.attempts().iter().map(|a| a.sequence).collect();
            let expected: Vec<u32> = (1..=notification.attempt_count()).collect();
            prop_assert_eq!(sequences, expected);
        }
    }

    #[test]
    fn delivered_at_only_set_on_delivery(steps in prop::collection::vec(step_strategy(), 0..64)) {
        let mut notification = Notification::new(Channel::Sms, "+15551234567", "body");

        for step in steps {
            match step {
                Step::Event(event) => { apply(&mut notification, event); }
                Step::Attempt(success) => {
                    let result = if success { DeliveryResult::ok() } else { DeliveryResult::failure("x") };
                    let _ = notification.record_attempt(&result);
                }
            }

            prop_assert_eq!(
                notification.delivered_at().is_some(),
                notification.status() == Delivered
            );
            prop_assert_eq!(
                notification.failure_reason().is_some(),
                notification.status() == Failed
            );
        }
    }
}
