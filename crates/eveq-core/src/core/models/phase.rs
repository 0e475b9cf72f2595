use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PropertyPhase {
    Solid,
    Liquid,
    Gas,
}

impl PropertyPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyPhase::Solid => "solid",
            PropertyPhase::Liquid => "liquid",
            PropertyPhase::Gas => "gas",
        }
    }
}

impl fmt::Display for PropertyPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
