use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumIter, EnumString};

/// One of the four entry points feeding the tunnel.
///
/// `AC` and `BC` join the tunnel from the west (entry points A and B), `DE`
/// and `DF` from the east (entry points E and F).
#[allow(clippy::upper_case_acronyms)]
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum Section {
    AC,
    BC,
    DE,
    DF,
}

impl Section {
    /// Every section in arbitration scan order.
    pub const ALL: [Self; 4] = [Self::AC, Self::BC, Self::DE, Self::DF];

    pub const COUNT: usize = Self::ALL.len();

    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::AC => 0,
            Self::BC => 1,
            Self::DE => 2,
            Self::DF => 3,
        }
    }

    /// Letter of the station the section starts from.
    #[must_use]
    pub const fn entry_point(self) -> char {
        match self {
            Self::AC => 'A',
            Self::BC => 'B',
            Self::DE => 'E',
            Self::DF => 'F',
        }
    }

    /// Sections on the far side of the tunnel, i.e. the possible
    /// destinations for a train entering from `self`.
    #[must_use]
    pub const fn far_side(self) -> [Self; 2] {
        match self {
            Self::AC | Self::BC => [Self::DE, Self::DF],
            Self::DE | Self::DF => [Self::AC, Self::BC],
        }
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}
