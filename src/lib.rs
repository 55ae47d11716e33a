//! folio: ask questions about a PDF.
//!
//! Upload a PDF, split it into overlapping chunks, embed the chunks via a
//! remote embedding service, and answer questions by retrieving the most
//! similar chunks and stuffing them into a prompt for a remote LLM.

pub mod config;
pub mod pdf;
pub mod providers;
pub mod rag;
pub mod server;

pub use config::AppConfig;
