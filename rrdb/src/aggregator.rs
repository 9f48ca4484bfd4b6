//! Commands accepted by the downstream aggregator.

use crate::model::Ident;

/// The operation an aggregator command requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Add the value to the series' running total.
    Add,
}

/// A command queued to the aggregator for one series.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub kind: CommandKind,
    pub ident: Ident,
    pub value: f64,
}

impl Command {
    pub fn new(kind: CommandKind, ident: Ident, value: f64) -> Self {
        Self { kind, ident, value }
    }

    pub fn add(ident: Ident, value: f64) -> Self {
        Self::new(CommandKind::Add, ident, value)
    }
}
