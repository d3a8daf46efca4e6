use serde::{Deserialize, Serialize};

/// A message in a tutoring conversation, containing a role and text content.
///
/// Messages form the append-only conversation log of a session: the learner's
/// requests, the tutor's lessons and progress notes, and Q&A exchanges.
///
/// # Examples
///
/// ```
/// use tutorloom::message::Message;
///
/// let request = Message::user("I want to learn about Gradient Descent");
/// let reply = Message::assistant("Let's find the prerequisites first.");
///
/// assert!(request.has_role(Message::USER));
/// assert!(!reply.has_role(Message::USER));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message sender (e.g., "user", "assistant", "system").
    pub role: String,
    /// The text content of the message.
    pub content: String,
}

impl Message {
    /// Learner input message role.
    pub const USER: &'static str = "user";
    /// Tutor response message role.
    pub const ASSISTANT: &'static str = "assistant";
    /// System prompt or instruction message role.
    pub const SYSTEM: &'static str = "system";

    /// Creates a new message with the specified role and content.
    #[must_use]
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    /// Creates a user message with the specified content.
    #[must_use]
    pub fn user(content: &str) -> Self {
        Self::new(Self::USER, content)
    }

    /// Creates an assistant message with the specified content.
    #[must_use]
    pub fn assistant(content: &str) -> Self {
        Self::new(Self::ASSISTANT, content)
    }

    /// Creates a system message with the specified content.
    #[must_use]
    pub fn system(content: &str) -> Self {
        Self::new(Self::SYSTEM, content)
    }

    /// Returns true if this message has the specified role.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.role == role
    }
}
