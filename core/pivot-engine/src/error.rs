//! FILENAME: core/pivot-engine/src/error.rs

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PivotError {
    /// Keys were already read; the tree no longer accepts records.
    #[error("pivot data is sealed: records cannot be pushed after keys were read")]
    Sealed,

    /// A caller-supplied closure (producer, sorter, derivation) panicked.
    #[error("pivot computation failed: {0}")]
    Computation(String),
}

/// Turns a caught panic payload into a readable message.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
