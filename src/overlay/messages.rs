use crate::overlay::model::{Color, OpponentId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowOutcome {
    Shown,
    AlreadyShown,
    PermissionDenied,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Added(OpponentId),
    LimitReached { max: usize },
}

/// User intents the panel understands.
#[derive(Debug, Clone, PartialEq)]
pub enum PanelCommand {
    Show,
    Hide,
    Refresh,
    AddOpponent,
    RemoveLastOpponent,
    RemoveOpponent { id: OpponentId },
    ToggleColor { id: OpponentId, color: Color },
    ToggleLock,
    ResetColors,
    Collapse,
    Expand,
    SetMaxOpponents { max: i64 },
    SetAlpha { alpha: f32 },
    SetOpponentAlpha { alpha: f32 },
}

/// Advisory feedback for the user; presenting it is up to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    NotShown,
    LimitReached { max: usize },
    NothingToRemove,
    LockChanged { locked: bool },
    ColorsReset,
}

impl Notice {
    pub fn message(self) -> String {
        match self {
            Notice::NotShown => "Overlay permission is required to show the panel".to_string(),
            Notice::LimitReached { max } => format!("Limit reached: at most {max} opponents"),
            Notice::NothingToRemove => "No opponent to remove".to_string(),
            Notice::LockChanged { locked: true } => {
                "Locked: opponent windows can't be dragged".to_string()
            }
            Notice::LockChanged { locked: false } => {
                "Unlocked: opponent windows can be dragged".to_string()
            }
            Notice::ColorsReset => "All colors reset".to_string(),
        }
    }
}
