//! Role-tagged chat messages, the output of a messages template.

use crate::error::RuntimeError;
use std::fmt;

/// The speaker of a chat message.
///
/// `tool` is part of the template surface (it parses) but is reserved;
/// rendering a tool entry raises [`RuntimeError::ToolNotSupported`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// The wire name of the role, as written in templates.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Resolve a rendered role name to a `Role`.
    pub fn from_name(name: &str) -> Result<Role, RuntimeError> {
        match name {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "tool" => Err(RuntimeError::ToolNotSupported),
            other => Err(RuntimeError::InvalidRole(other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, out: &mut fmt::Formatter) -> fmt::Result {
        out.write_str(self.as_str())
    }
}

/// One entry of a rendered messages template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Message {
            role,
            content: content.into(),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, out: &mut fmt::Formatter) -> fmt::Result {
        write!(out, "{}: {}", self.role, self.content)
    }
}
