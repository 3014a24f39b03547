use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use weave_core::types::ExecutorId;

/// A typed connection between executors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Edge {
    /// 1 → 1.
    Direct { from: ExecutorId, to: ExecutorId },
    /// 1 → N, every target runs concurrently with a copy of the message.
    FanOut { from: ExecutorId, to: Vec<ExecutorId> },
    /// N → 1, the target runs once per complete set of inputs.
    FanIn { from: Vec<ExecutorId>, to: ExecutorId },
    /// 1 → 1 chosen by the label the source routes with.
    Conditional {
        from: ExecutorId,
        routes: BTreeMap<String, ExecutorId>,
        /// Target for labels missing from `routes`.
        default: Option<ExecutorId>,
    },
}

/// Discriminant of an `Edge`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Direct,
    FanOut,
    FanIn,
    Conditional,
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Direct => "direct",
            Self::FanOut => "fan-out",
            Self::FanIn => "fan-in",
            Self::Conditional => "conditional",
        };
        f.write_str(s)
    }
}

impl Edge {
    pub fn direct(from: impl Into<ExecutorId>, to: impl Into<ExecutorId>) -> Self {
        Self::Direct {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn fan_out<I, T>(from: impl Into<ExecutorId>, to: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ExecutorId>,
    {
        Self::FanOut {
            from: from.into(),
            to: to.into_iter().map(Into::into).collect(),
        }
    }

    pub fn fan_in<I, T>(from: I, to: impl Into<ExecutorId>) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ExecutorId>,
    {
        Self::FanIn {
            from: from.into_iter().map(Into::into).collect(),
            to: to.into(),
        }
    }

    pub fn conditional<I, L, T>(from: impl Into<ExecutorId>, routes: I) -> Self
    where
        I: IntoIterator<Item = (L, T)>,
        L: Into<String>,
        T: Into<ExecutorId>,
    {
        Self::Conditional {
            from: from.into(),
            routes: routes
                .into_iter()
                .map(|(label, to)| (label.into(), to.into()))
                .collect(),
            default: None,
        }
    }

    /// Attach a default target to a conditional edge. No-op on other kinds.
    pub fn with_default(mut self, target: impl Into<ExecutorId>) -> Self {
        if let Self::Conditional { default, .. } = &mut self {
            *default = Some(target.into());
        }
        self
    }

    pub fn kind(&self) -> EdgeKind {
        match self {
            Self::Direct { .. } => EdgeKind::Direct,
            Self::FanOut { .. } => EdgeKind::FanOut,
            Self::FanIn { .. } => EdgeKind::FanIn,
            Self::Conditional { .. } => EdgeKind::Conditional,
        }
    }

    /// Executors messages flow out of.
    pub fn sources(&self) -> Vec<&ExecutorId> {
        match self {
            Self::Direct { from, .. }
            | Self::FanOut { from, .. }
            | Self::Conditional { from, .. } => vec![from],
            Self::FanIn { from, .. } => from.iter().collect(),
        }
    }

    /// Executors messages flow into, default route included.
    pub fn targets(&self) -> Vec<&ExecutorId> {
        match self {
            Self::Direct { to, .. } | Self::FanIn { to, .. } => vec![to],
            Self::FanOut { to, .. } => to.iter().collect(),
            Self::Conditional {
                routes, default, ..
            } => routes.values().chain(default.iter()).collect(),
        }
    }

    /// Short description used in validation errors.
    pub fn describe(&self) -> String {
        match self {
            Self::Direct { from, to } => format!("direct edge {} -> {}", from, to),
            Self::FanOut { from, .. } => format!("fan-out edge from {}", from),
            Self::FanIn { to, .. } => format!("fan-in edge into {}", to),
            Self::Conditional { from, .. } => format!("conditional edge from {}", from),
        }
    }
}
