//! Active conversation model
//!
//! Elm-style: `transition` is a pure function from state and event to a new
//! state plus effects. The runtime owns the I/O and feeds results back in as
//! events.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::{Effect, Notice};
pub use event::{Event, LoadedMessage};
pub use state::{ConversationState, Epoch, Message, MessageId, Persistence, Role, SelectTicket};
pub use transition::{
    feedback_target, transition, TransitionError, TransitionResult, SEND_FAILED_APOLOGY,
};
