//! Front-end side of the conversation: turn protocol, transport and read-aloud.

pub mod speech;
pub mod state_machine;
pub mod transport;

pub use state_machine::{ConversationStateMachine, Phase, SubmitRejection};
pub use transport::{CloudSpeech, HttpTurnTransport, TurnTransport};
