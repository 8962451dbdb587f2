use serde::{Deserialize, Serialize};

/// Lifecycle action chosen for a listing.
///
/// `None` is never stored in a selection; selecting it removes the listing.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    #[default]
    None,
    Install,
    Uninstall,
    Update,
    Change,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Self::None,
        Self::Install,
        Self::Uninstall,
        Self::Update,
        Self::Change,
    ];

    /// Name used in serialized selection tokens.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Install => "INSTALL",
            Self::Uninstall => "UNINSTALL",
            Self::Update => "UPDATE",
            Self::Change => "CHANGE",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Install => "Install",
            Self::Uninstall => "Uninstall",
            Self::Update => "Update",
            Self::Change => "Change",
        }
    }

    pub fn verb(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Install => "install",
            Self::Uninstall => "uninstall",
            Self::Update => "update",
            Self::Change => "change",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "NONE" => Some(Self::None),
            "INSTALL" => Some(Self::Install),
            "UNINSTALL" => Some(Self::Uninstall),
            "UPDATE" => Some(Self::Update),
            "CHANGE" => Some(Self::Change),
            _ => None,
        }
    }

    /// Case-insensitive parse for command-line input.
    pub fn parse_loose(value: &str) -> Option<Self> {
        Self::parse(&value.trim().to_ascii_uppercase())
    }

    pub fn is_none(self) -> bool {
        self == Self::None
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
