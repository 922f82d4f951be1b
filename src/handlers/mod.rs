pub mod handle_message;
pub mod incoming;

pub use handle_message::handle_message;
pub use incoming::to_incoming;
