use std::str::FromStr;

use derive_more::{AsRef, Display, From, Into};
use getset::{CopyGetters, Getters, Setters};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use typed_builder::TypedBuilder;

/// One row of the published dataset.
///
/// A record is constructed once per (club page, table row) during extraction,
/// adjusted during reconciliation, and immutable once serialized.
#[derive(Clone, PartialEq, Eq, Debug, TypedBuilder, Getters, CopyGetters, Setters)]
pub struct TransferRecord {
    #[getset(get_copy = "pub")]
    season: SeasonYear,
    #[getset(get = "pub")]
    league: LeagueName,
    #[getset(get = "pub")]
    club: ClubName,
    #[getset(get_copy = "pub")]
    window: Window,
    #[getset(get_copy = "pub")]
    movement: Movement,
    #[getset(get = "pub")]
    player_name: PlayerName,
    #[getset(get_copy = "pub")]
    player_id: PlayerId,
    #[getset(get_copy = "pub")]
    age: Age,
    #[getset(get = "pub")]
    nationality: Nationality,
    #[getset(get_copy = "pub")]
    position: Position,
    #[getset(get_copy = "pub", set = "pub")]
    market_value: Option<u64>,
    #[getset(get = "pub")]
    dealing_club: ClubName,
    #[getset(get = "pub")]
    dealing_country: CountryName,
    #[getset(get_copy = "pub", set = "pub")]
    fee: Option<u64>,
    #[getset(get_copy = "pub", set = "pub")]
    is_loan: bool,
}

/// Year in which the league season begins.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Display, From, Into, Serialize,
    Deserialize,
)]
pub struct SeasonYear(u16);

/// Stable identifier assigned to a player by the source site.  The spelling
/// of [`PlayerName`] may vary between pages; this id must not.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Display, From, Into, Serialize,
    Deserialize,
)]
pub struct PlayerId(u32);

/// Age in whole years at the transfer date.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Display, From, Into, Serialize,
    Deserialize,
)]
pub struct Age(u8);

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Display, AsRef, From, Into,
            Serialize, Deserialize,
        )]
        #[as_ref(forward)]
        pub struct $name(String);
        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }
    };
}

string_newtype!(LeagueName);
string_newtype!(ClubName);
string_newtype!(PlayerName);
string_newtype!(Nationality);
string_newtype!(
    /// Country of the dealing club; empty when the counterpart has none
    /// (retired, without club).
    CountryName
);

#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Debug,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(serialize_all = "lowercase")]
pub enum Window {
    Summer,
    Winter,
}
impl Window {
    /// Value of the `s_w` URL query parameter on the source site.
    pub fn query_value(self) -> &'static str {
        match self {
            Window::Summer => "s",
            Window::Winter => "w",
        }
    }
}

/// Directionality of a record relative to the club page it came from.
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Debug,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub enum Movement {
    In,
    Out,
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum Position {
    Goalkeeper,
    Sweeper,
    CentreBack,
    LeftBack,
    RightBack,
    DefensiveMidfield,
    CentralMidfield,
    LeftMidfield,
    RightMidfield,
    AttackingMidfield,
    LeftWinger,
    RightWinger,
    SecondStriker,
    CentreForward,
}

// Fixed bidirectional table; "position" and "pos" in the published schema are
// the two projections of one entry.
const POSITION_TABLE: [(Position, &str, &str); 14] = [
    (Position::Goalkeeper, "Goalkeeper", "GK"),
    (Position::Sweeper, "Sweeper", "SW"),
    (Position::CentreBack, "Centre-Back", "CB"),
    (Position::LeftBack, "Left-Back", "LB"),
    (Position::RightBack, "Right-Back", "RB"),
    (Position::DefensiveMidfield, "Defensive Midfield", "DM"),
    (Position::CentralMidfield, "Central Midfield", "CM"),
    (Position::LeftMidfield, "Left Midfield", "LM"),
    (Position::RightMidfield, "Right Midfield", "RM"),
    (Position::AttackingMidfield, "Attacking Midfield", "AM"),
    (Position::LeftWinger, "Left Winger", "LW"),
    (Position::RightWinger, "Right Winger", "RW"),
    (Position::SecondStriker, "Second Striker", "SS"),
    (Position::CentreForward, "Centre-Forward", "CF"),
];

#[derive(Clone, PartialEq, Eq, Debug, Error)]
#[error("Unknown position: {0:?}")]
pub struct UnknownPosition(pub String);

impl Position {
    pub fn full_name(self) -> &'static str {
        POSITION_TABLE
            .iter()
            .find(|(p, _, _)| *p == self)
            .map(|(_, full, _)| *full)
            .unwrap_or_default()
    }

    pub fn abbreviation(self) -> &'static str {
        POSITION_TABLE
            .iter()
            .find(|(p, _, _)| *p == self)
            .map(|(_, _, abbr)| *abbr)
            .unwrap_or_default()
    }

    pub fn from_full_name(s: &str) -> Result<Self, UnknownPosition> {
        POSITION_TABLE
            .iter()
            .find(|(_, full, _)| full.eq_ignore_ascii_case(s.trim()))
            .map(|(p, _, _)| *p)
            .ok_or_else(|| UnknownPosition(s.to_owned()))
    }

    pub fn from_abbreviation(s: &str) -> Result<Self, UnknownPosition> {
        POSITION_TABLE
            .iter()
            .find(|(_, _, abbr)| abbr.eq_ignore_ascii_case(s.trim()))
            .map(|(p, _, _)| *p)
            .ok_or_else(|| UnknownPosition(s.to_owned()))
    }
}

impl FromStr for Position {
    type Err = UnknownPosition;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_full_name(s)
    }
}
