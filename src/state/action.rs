use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of transition recorded on an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    /// Following a link or loading a URL
    #[default]
    Navigate,
    /// Clicking an element
    Click,
    /// Typing into a field
    Input,
    /// Submitting a form
    Submit,
}

impl ActionType {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Navigate => "NAVIGATE",
            Self::Click => "CLICK",
            Self::Input => "INPUT",
            Self::Submit => "SUBMIT",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "NAVIGATE" => Some(Self::Navigate),
            "CLICK" => Some(Self::Click),
            "INPUT" => Some(Self::Input),
            "SUBMIT" => Some(Self::Submit),
            _ => None,
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}
