pub mod app;
pub mod chat;
pub mod feedback;
pub mod inspect;
pub mod session;
