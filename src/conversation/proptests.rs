//! Property-based tests for the conversation model
//!
//! These drive random event sequences through `transition` while a tiny
//! simulated backend answers the effects, and check the invariants after
//! every step.

use super::state::*;
use super::transition::*;
use super::*;
use chrono::{TimeZone, Utc};
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

#[derive(Debug, Clone)]
enum Step {
    StartNew,
    Type(String),
    Send(String),
    Select(String),
    /// Resolve the oldest outstanding request (send or fetch)
    Resolve { succeed: bool },
}

#[derive(Debug, Clone)]
enum Outstanding {
    Send { epoch: Epoch, created_chat: bool },
    Fetch(SelectTicket),
}

fn at() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        1 => Just(Step::StartNew),
        1 => "[a-z]{0,5}".prop_map(Step::Type),
        4 => prop_oneof!["[a-z ]{1,8}", Just("   ".to_string()), Just(String::new())].prop_map(Step::Send),
        2 => "chat-[0-3]".prop_map(Step::Select),
        4 => any::<bool>().prop_map(|succeed| Step::Resolve { succeed }),
    ]
}

fn check_invariants(state: &ConversationState) -> Result<(), TestCaseError> {
    // Ids are unique and increase in append order
    for pair in state.messages().windows(2) {
        prop_assert!(pair[0].id < pair[1].id);
    }
    // While a send is pending the last message is the user's own
    if state.is_pending() {
        prop_assert_eq!(state.messages().last().map(|m| m.role), Some(Role::User));
    }
    // Stored indices are distinct, ascending and within the stored list
    let indices: Vec<usize> = state.messages().iter().filter_map(|m| m.server_index).collect();
    for pair in indices.windows(2) {
        prop_assert!(pair[0] < pair[1]);
    }
    prop_assert!(indices.iter().all(|&index| index < state.stored_count()));
    // Messages exist only for an active conversation
    if state.persistence() == &Persistence::Inactive {
        prop_assert!(state.messages().is_empty());
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Invariants hold after every step of any event sequence
    #[test]
    fn prop_invariants_hold(steps in proptest::collection::vec(arb_step(), 0..40)) {
        let mut state = ConversationState::new();
        let mut outstanding: Vec<Outstanding> = Vec::new();
        let mut next_chat = 100;

        for step in steps {
            let event = match step {
                Step::StartNew => Event::StartNew,
                Step::Type(text) => Event::InputChanged { text },
                Step::Send(text) => Event::SendRequested { text, at: at() },
                Step::Select(chat_id) => Event::SelectRequested { chat_id },
                Step::Resolve { succeed } => {
                    if outstanding.is_empty() {
                        continue;
                    }
                    match outstanding.remove(0) {
                        Outstanding::Send { epoch, created_chat } if succeed => {
                            next_chat += 1;
                            Event::SendSucceeded {
                                epoch,
                                reply: "ok".to_string(),
                                chat_id: format!("chat-{next_chat}"),
                                created_chat,
                                at: at(),
                            }
                        }
                        Outstanding::Send { epoch, .. } => Event::SendFailed {
                            epoch,
                            error: "down".to_string(),
                            at: at(),
                        },
                        Outstanding::Fetch(ticket) if succeed => Event::SelectLoaded {
                            ticket,
                            messages: vec![],
                            stored_count: 0,
                        },
                        Outstanding::Fetch(ticket) => Event::SelectFailed {
                            ticket,
                            error: "down".to_string(),
                        },
                    }
                }
            };

            match transition(&state, event) {
                Ok(result) => {
                    for effect in &result.effects {
                        match effect {
                            Effect::RequestSend { epoch, chat_id, .. } => {
                                outstanding.push(Outstanding::Send {
                                    epoch: *epoch,
                                    created_chat: chat_id.is_none(),
                                });
                            }
                            Effect::FetchChat { ticket } => {
                                outstanding.push(Outstanding::Fetch(ticket.clone()));
                            }
                            Effect::RefreshHistory | Effect::Notify(_) => {}
                        }
                    }
                    state = result.new_state;
                }
                Err(err) => {
                    // Only guards and superseded selections are ever refused here
                    let expected = matches!(
                        err,
                        TransitionError::EmptyMessage
                            | TransitionError::SendPending
                            | TransitionError::StaleSelection { .. }
                    );
                    prop_assert!(expected, "unexpected rejection: {err}");
                }
            }
            check_invariants(&state)?;
        }
    }

    /// A send when idle appends exactly one user message and then exactly
    /// one assistant message, whatever the outcome
    #[test]
    fn prop_send_yields_one_reply(
        history in proptest::collection::vec("[a-z]{1,6}", 0..4),
        text in "[a-z][a-z ]{0,10}",
        succeed in any::<bool>(),
    ) {
        let mut state = ConversationState::new();
        for previous in history {
            let sent = transition(&state, Event::SendRequested { text: previous, at: at() }).unwrap();
            let epoch = sent.new_state.epoch();
            state = transition(&sent.new_state, Event::SendSucceeded {
                epoch,
                reply: "r".to_string(),
                chat_id: "chat-1".to_string(),
                created_chat: false,
                at: at(),
            }).unwrap().new_state;
        }
        let count = state.messages().len();

        let sent = transition(&state, Event::SendRequested { text: text.clone(), at: at() }).unwrap();
        prop_assert_eq!(sent.new_state.messages().len(), count + 1);
        prop_assert_eq!(&sent.new_state.messages()[count].content, &text);

        let epoch = sent.new_state.epoch();
        let event = if succeed {
            Event::SendSucceeded {
                epoch,
                reply: "answer".to_string(),
                chat_id: "chat-1".to_string(),
                created_chat: false,
                at: at(),
            }
        } else {
            Event::SendFailed { epoch, error: "x".to_string(), at: at() }
        };
        let done = transition(&sent.new_state, event).unwrap().new_state;
        prop_assert_eq!(done.messages().len(), count + 2);
        prop_assert_eq!(done.messages()[count].role, Role::User);
        prop_assert_eq!(done.messages()[count + 1].role, Role::Assistant);
        prop_assert!(!done.is_pending());
    }

    /// Blank input never changes state or issues a request
    #[test]
    fn prop_blank_send_is_noop(text in "[ \\t\\n]{0,6}") {
        let state = ConversationState::new();
        let result = transition(&state, Event::SendRequested { text, at: at() });
        prop_assert_eq!(result.unwrap_err(), TransitionError::EmptyMessage);
    }

    /// Only the most recent selection can land, in any arrival order
    #[test]
    fn prop_only_latest_selection_applies(ids in proptest::collection::vec("chat-[a-z]", 1..6)) {
        let mut state = ConversationState::new();
        let mut tickets = Vec::new();
        for chat_id in &ids {
            let result = transition(&state, Event::SelectRequested { chat_id: chat_id.clone() }).unwrap();
            state = result.new_state;
            tickets.push(state.selecting().cloned().unwrap());
        }
        let latest = tickets.pop().unwrap();
        for stale in tickets {
            let result = transition(&state, Event::SelectLoaded { ticket: stale, messages: vec![], stored_count: 0 });
            let is_stale = matches!(result, Err(TransitionError::StaleSelection { .. }));
            prop_assert!(is_stale);
        }
        let applied = transition(&state, Event::SelectLoaded { ticket: latest.clone(), messages: vec![], stored_count: 0 }).unwrap();
        prop_assert_eq!(applied.new_state.chat_id(), Some(latest.chat_id.as_str()));
    }
}
