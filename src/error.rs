use thiserror::Error;

/// Errors surfaced at the page boundary.
///
/// `DataLoad` and `Configuration` mean the input has to be fixed (or a column
/// picked by hand); `EmptySelection` only means a different selection is
/// needed, so the page stays usable.
#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Failed to load data from '{source_name}': {reason}")]
    DataLoad { source_name: String, reason: String },

    #[error(
        "Could not find a column for role '{role}'. Available columns: [{}]",
        available.join(", ")
    )]
    Configuration { role: String, available: Vec<String> },

    #[error("No valid numeric rows for selection {selection}")]
    EmptySelection { selection: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, DashboardError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Nothing can be rendered until the data or configuration is fixed.
    Blocking,
    /// Nothing is rendered for this selection, but another one may work.
    Warning,
}

impl DashboardError {
    pub fn data_load<S: Into<String>, R: Into<String>>(source_name: S, reason: R) -> Self {
        Self::DataLoad {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::EmptySelection { .. } => Severity::Warning,
            _ => Severity::Blocking,
        }
    }

    /// Message shown to the person driving the page.
    pub fn user_message(&self) -> String {
        match self {
            Self::DataLoad { .. } => format!("{}. Check the file path and its contents.", self),
            Self::Configuration { role, .. } => format!(
                "{}. Pick one by hand with --column {}=<column>.",
                self, role
            ),
            Self::EmptySelection { .. } => {
                format!("{}. Try a different selection.", self)
            }
            Self::InvalidConfig(_) => format!("{}. Fix the dashboard configuration.", self),
        }
    }
}
