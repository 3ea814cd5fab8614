//! Request capture
//!
//! Everything that happens between reading an inbound request and writing
//! its record file: body classification, multipart decomposition, sequence
//! numbering, and the response sent back to the client.

pub mod classify;
pub mod handler;
pub mod multipart;
pub mod respond;
pub mod sequence;

pub use classify::{BodyClassifier, Classified};
pub use handler::{CaptureHandler, Captured};
pub use multipart::{decompose, MultipartReader};
pub use respond::Responder;
pub use sequence::SequenceAllocator;
