mod locks;
mod manager;
mod progress;
mod view;

// Public API of the session subsystem.
pub use crate::error::QuizError;
pub use manager::SessionManager;
pub use progress::SessionProgress;
pub use view::{AnswerResult, CurrentQuestion};
