//! Message id generation.

use uuid::Uuid;

/// Generate a fresh message id (UUID v4).
pub fn new_message_id() -> String {
    Uuid::new_v4().to_string()
}
