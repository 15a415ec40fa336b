use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The category a block falls into. Purely descriptive metadata — it does
/// not change how a block is executed (see [`ExecutionKind`] for that).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockCategory {
    Input,
    Process,
    Action,
    Memory,
    Trigger,
}

impl FromStr for BlockCategory {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "input" => Ok(Self::Input),
            "process" => Ok(Self::Process),
            "action" => Ok(Self::Action),
            "memory" => Ok(Self::Memory),
            "trigger" => Ok(Self::Trigger),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for BlockCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Input => "input",
            Self::Process => "process",
            Self::Action => "action",
            Self::Memory => "memory",
            Self::Trigger => "trigger",
        };
        write!(f, "{}", s)
    }
}

/// How a block is executed. `Mcp` and `Browser` parse successfully (the
/// wire format may name them) but are rejected explicitly wherever a kind
/// is dispatched on — never silently skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionKind {
    Llm,
    Code,
    /// Reserved, not implemented.
    Mcp,
    /// Reserved, not implemented.
    Browser,
}

impl FromStr for ExecutionKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "llm" => Ok(Self::Llm),
            "code" => Ok(Self::Code),
            "mcp" => Ok(Self::Mcp),
            "browser" => Ok(Self::Browser),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for ExecutionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Llm => "llm",
            Self::Code => "code",
            Self::Mcp => "mcp",
            Self::Browser => "browser",
        };
        write!(f, "{}", s)
    }
}

impl ExecutionKind {
    /// Returns `true` for kinds the executor actually dispatches.
    pub fn is_implemented(&self) -> bool {
        matches!(self, Self::Llm | Self::Code)
    }
}
