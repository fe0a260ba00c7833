//! Dashboard view modes.

use crate::input::Command;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum DashboardMode {
    #[default]
    Overview,
    TaskList,
    Terminal,
}

impl DashboardMode {
    pub const ALL: [DashboardMode; 3] = [Self::Overview, Self::TaskList, Self::Terminal];

    /// Transition table: only the three mode commands move between modes,
    /// every other command leaves the mode as it is.
    pub fn apply(self, command: Command) -> Self {
        match command {
            Command::ShowOverview => Self::Overview,
            Command::ShowTaskList => Self::TaskList,
            Command::ShowTerminal => Self::Terminal,
            _ => self,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Overview => "Overview",
            Self::TaskList => "Tasks",
            Self::Terminal => "Terminal",
        }
    }

    /// Function key shown on the mode tab.
    pub fn key_hint(self) -> &'static str {
        match self {
            Self::Overview => "F1",
            Self::TaskList => "F2",
            Self::Terminal => "F3",
        }
    }

    pub fn shows_terminal(self) -> bool {
        self == Self::Terminal
    }
}
