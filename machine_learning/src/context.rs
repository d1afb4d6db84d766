use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// The kind of device a buffer or an executor lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Cpu,
    Gpu,
}

/// A compute device identity, the unit a replica gets bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Context {
    pub kind: DeviceKind,
    pub id: usize,
}

impl Context {
    pub fn cpu(id: usize) -> Self {
        Self {
            kind: DeviceKind::Cpu,
            id,
        }
    }

    pub fn gpu(id: usize) -> Self {
        Self {
            kind: DeviceKind::Gpu,
            id,
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::cpu(0)
    }
}

impl Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            DeviceKind::Cpu => write!(f, "cpu({})", self.id),
            DeviceKind::Gpu => write!(f, "gpu({})", self.id),
        }
    }
}
