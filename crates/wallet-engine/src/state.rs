use serde::Serialize;

use crate::error::EngineError;

/// Lifecycle of a single send.
///
/// `Validated -> Built -> Signed -> Broadcast -> Confirmed`, with `Failed`
/// reachable from every non-terminal stage. Stages never move backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SendStage {
    Validated,
    Built,
    Signed,
    Broadcast,
    Confirmed,
    Failed,
}

impl SendStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, SendStage::Confirmed | SendStage::Failed)
    }

    fn next(self) -> Option<SendStage> {
        match self {
            SendStage::Validated => Some(SendStage::Built),
            SendStage::Built => Some(SendStage::Signed),
            SendStage::Signed => Some(SendStage::Broadcast),
            SendStage::Broadcast => Some(SendStage::Confirmed),
            SendStage::Confirmed | SendStage::Failed => None,
        }
    }

    pub fn can_advance_to(self, to: SendStage) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == SendStage::Failed || self.next() == Some(to)
    }
}

impl std::fmt::Display for SendStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SendStage::Validated => "validated",
            SendStage::Built => "built",
            SendStage::Signed => "signed",
            SendStage::Broadcast => "broadcast",
            SendStage::Confirmed => "confirmed",
            SendStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Tracks one send through [`SendStage`]s.
///
/// A send that has not yet passed validation has no stage; failing it
/// records `failed_at = None`.
#[derive(Debug, Default)]
pub struct SendProgress {
    stage: Option<SendStage>,
    failed_at: Option<SendStage>,
}

impl SendProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> Option<SendStage> {
        self.stage
    }

    pub fn failed_at(&self) -> Option<SendStage> {
        self.failed_at
    }

    /// Move to `to`. Only the forward edge or `Failed` is accepted.
    pub fn advance(&mut self, to: SendStage) -> Result<(), EngineError> {
        let allowed = match self.stage {
            None => matches!(to, SendStage::Validated | SendStage::Failed),
            Some(from) => from.can_advance_to(to),
        };
        if !allowed {
            return Err(EngineError::Config(format!(
                "illegal send transition {} -> {to}",
                self.stage.map_or_else(|| "start".to_string(), |s| s.to_string())
            )));
        }

        if to == SendStage::Failed {
            self.failed_at = self.stage;
        }
        tracing::trace!(from = ?self.stage, %to, "send stage");
        self.stage = Some(to);
        Ok(())
    }

    /// Mark the send failed. Idempotent once terminal.
    pub fn fail(&mut self) {
        if self.stage.is_some_and(SendStage::is_terminal) {
            return;
        }
        self.failed_at = self.stage;
        self.stage = Some(SendStage::Failed);
    }
}
