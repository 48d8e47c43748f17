//! Registration dialogue: states, session data, menus and the summary.

pub mod machine;
pub mod menu;
pub mod model;
pub mod prompts;
pub mod state;
pub mod store;
pub mod summary;

pub use machine::{Effect, StateMachine, Transition, TransitionKind};
pub use model::{CompletedProfile, Draft, OptionalAnswer, Role, Session};
pub use state::RegistrationState;
pub use store::SessionStore;
pub use summary::format_summary;
