//! Task intake: the guided multi-step dialog and the one-shot free-text
//! pipeline.

pub mod guided;
pub mod parser;
pub mod session;

pub use guided::{GuidedIntake, IntakeOutcome};
pub use parser::{ParsedTask, TextIntake};
pub use session::{
    ConversationKey, IntakeDraft, IntakeSession, IntakeStep, SessionFate, SessionStore,
};
