//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across arbitrary event sequences.

use super::transition::*;
use super::*;
use crate::knowledge::Monument;
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

const EMAIL: &str = "alice@example.com";

fn is_valid_session(session: &Session, policy: &Policy) -> bool {
    match session.stage {
        Stage::Idle => session.verified_email.is_none() && session.otp_attempts == 0,
        Stage::AwaitingEmail => session.otp_attempts == 0,
        Stage::AwaitingOtp => {
            session.verified_email.is_some() && session.otp_attempts < policy.max_attempts
        }
    }
}

fn awaiting_otp(attempts: u32) -> Session {
    let mut session = Session::new("prop");
    session.stage = Stage::AwaitingOtp;
    session.verified_email = Some(EMAIL.to_string());
    session.pending_query = Some("Colosseum".to_string());
    session.otp_attempts = attempts;
    session
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_user_text() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("Tell me about the Colosseum".to_string()),
        Just(EMAIL.to_string()),
        Just(format!("my address is {EMAIL}")),
        Just("123456".to_string()),
        Just("code 1234567".to_string()),
        Just("   ".to_string()),
        "[a-zA-Z0-9 @.]{0,30}",
    ]
}

fn arb_outcome() -> impl Strategy<Value = LookupOutcome> {
    prop_oneof![
        "[a-zA-Z ]{1,30}".prop_map(|answer| LookupOutcome::Answered {
            answer,
            matches: vec![Monument::new("Colosseum", "Rome, Italy", "Amphitheatre.")],
        }),
        Just(LookupOutcome::NoMatch),
        "[a-z ]{1,20}".prop_map(|message| LookupOutcome::Failed { message }),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        arb_user_text().prop_map(|text| Event::UserInput { text }),
        Just(Event::Cancel),
        ("[a-zA-Z ]{1,20}", arb_outcome())
            .prop_map(|(query, outcome)| Event::LookupCompleted { query, outcome }),
        any::<bool>().prop_map(|delivered| Event::CodeIssued {
            email: EMAIL.to_string(),
            delivered,
        }),
        (
            "[0-9]{6}",
            proptest::option::of(prop_oneof![Just("123456".to_string()), "[0-9]{6}"])
        )
            .prop_map(|(submitted, stored)| Event::CodeChecked { submitted, stored }),
        any::<bool>().prop_map(|delivered| Event::GuideDelivered {
            email: EMAIL.to_string(),
            delivered,
        }),
    ]
}

fn arb_stage() -> impl Strategy<Value = Stage> {
    prop_oneof![
        Just(Stage::Idle),
        Just(Stage::AwaitingEmail),
        Just(Stage::AwaitingOtp),
    ]
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Every reachable session satisfies the stage invariants
    #[test]
    fn prop_transitions_preserve_validity(events in proptest::collection::vec(arb_event(), 0..30)) {
        let policy = Policy::default();
        let mut session = Session::new("prop");

        for event in events {
            if let Ok(result) = transition(&session, &policy, event) {
                session = result.new_session;
                prop_assert!(is_valid_session(&session, &policy), "Invalid session: {:?}", session);
            }
        }
    }

    /// History is append-only
    #[test]
    fn prop_history_is_append_only(events in proptest::collection::vec(arb_event(), 0..30)) {
        let policy = Policy::default();
        let mut session = Session::new("prop");

        for event in events {
            let before = session.history.clone();
            if let Ok(result) = transition(&session, &policy, event) {
                let after = &result.new_session.history;
                prop_assert!(after.len() >= before.len());
                prop_assert_eq!(&after[..before.len()], &before[..]);
                session = result.new_session;
            }
        }
    }

    /// At most one guide delivery is requested per transition, and only on verification
    #[test]
    fn prop_guide_delivery_only_after_verification(events in proptest::collection::vec(arb_event(), 0..30)) {
        let policy = Policy::default();
        let mut session = Session::new("prop");

        for event in events {
            let verifying = matches!(
                (&session.stage, &event),
                (Stage::AwaitingOtp, Event::CodeChecked { submitted, stored })
                    if stored.as_deref() == Some(submitted.as_str())
            );
            if let Ok(result) = transition(&session, &policy, event) {
                let guides = result
                    .effects
                    .iter()
                    .filter(|e| matches!(e, Effect::DeliverGuide { .. }))
                    .count();
                prop_assert!(guides <= 1);
                if guides == 1 {
                    prop_assert!(verifying);
                }
                session = result.new_session;
            }
        }
    }

    /// Input without an e-mail in AwaitingEmail is handled as a fresh query
    #[test]
    fn prop_awaiting_email_falls_through(text in "[a-zA-Z ?]{1,40}") {
        prop_assume!(!text.trim().is_empty());
        let mut session = Session::new("prop");
        session.stage = Stage::AwaitingEmail;
        session.pending_query = Some("Colosseum".to_string());

        let result = transition(&session, &Policy::default(), Event::UserInput { text: text.clone() }).unwrap();
        prop_assert_eq!(result.new_session.stage, Stage::Idle);
        prop_assert_eq!(result.effects, vec![Effect::lookup(text)]);
    }

    /// Wrong codes always end the flow after `max_attempts` tries
    #[test]
    fn prop_attempts_exhaust(max_attempts in 1u32..6, wrong in "[0-9]{6}") {
        prop_assume!(wrong != "123456");
        let policy = Policy { max_attempts, ..Policy::default() };
        let mut session = awaiting_otp(0);

        for attempt in 1..=max_attempts {
            let result = transition(
                &session,
                &policy,
                Event::CodeChecked { submitted: wrong.clone(), stored: Some("123456".to_string()) },
            )
            .unwrap();
            session = result.new_session;
            if attempt < max_attempts {
                prop_assert_eq!(session.stage, Stage::AwaitingOtp);
                prop_assert_eq!(session.otp_attempts, attempt);
            }
        }

        prop_assert_eq!(session.stage, Stage::Idle);
        prop_assert_eq!(session.otp_attempts, 0);
        prop_assert!(session.verified_email.is_none());
    }

    /// Cancel always succeeds and lands in a clean idle session
    #[test]
    fn prop_cancel_always_resets(stage in arb_stage(), attempts in 0u32..3) {
        let mut session = awaiting_otp(attempts);
        session.stage = stage;

        let result = transition(&session, &Policy::default(), Event::Cancel).unwrap();
        prop_assert_eq!(result.new_session.stage, Stage::Idle);
        prop_assert!(result.new_session.verified_email.is_none());
        prop_assert!(result.new_session.pending_query.is_none());
        prop_assert_eq!(result.reply.as_deref(), Some(CANCELLED));
    }

    /// Whitespace-only input is rejected in every stage
    #[test]
    fn prop_blank_input_rejected(stage in arb_stage(), text in "[ \t\n]{0,10}") {
        let mut session = awaiting_otp(0);
        session.stage = stage;

        let result = transition(&session, &Policy::default(), Event::UserInput { text });
        prop_assert_eq!(result.unwrap_err(), TransitionError::EmptyInput);
    }
}
