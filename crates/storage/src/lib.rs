#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    InMemoryRepository, QuestionRepository, RatingRepository, SessionPersistence,
    SessionRepository, Storage, StorageError,
};
