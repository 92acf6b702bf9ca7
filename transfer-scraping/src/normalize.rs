use log::warn;
use thiserror::Error;
use transfer_scraping_utils::regex;

use crate::{
    parser::transfers::{RawRow, COUNTRY_LABEL, PLAYER_ID_LABEL},
    schema::{
        Age, ClubName, CountryName, LeagueName, Movement, Nationality, PlayerId, PlayerName,
        Position, SeasonYear, TransferRecord, UnknownPosition, Window,
    },
};

/// Context supplied by the caller, never re-derived from the row: the row's
/// own league/club fields may be abbreviated or missing entirely.
#[derive(Clone, Copy, Debug)]
pub struct RowContext<'a> {
    pub league: &'a LeagueName,
    pub season: SeasonYear,
    pub window: Window,
    pub club: &'a ClubName,
}

/// Single-row data-quality failure.  The row is dropped and counted by the
/// caller; normalization errors never abort a page.
#[derive(Clone, PartialEq, Debug, Error)]
pub enum NormalizationError {
    #[error("Column {0:?} is missing from the row")]
    MissingColumn(&'static str),
    #[error("Cannot parse age from {0:?}")]
    BadAge(String),
    #[error("Cannot parse player id from {0:?}")]
    BadPlayerId(String),
    #[error("Cannot parse amount from {0:?}")]
    BadCurrency(String),
    #[error(transparent)]
    UnknownPosition(#[from] UnknownPosition),
}

// Column labels have varied across historical page layouts.
const PLAYER_LABELS: [&str; 2] = ["In", "Out"];
const AGE_LABELS: [&str; 1] = ["Age"];
const NATIONALITY_LABELS: [&str; 3] = ["Nat.", "Nat", "Nationality"];
const POSITION_LABELS: [&str; 1] = ["Position"];
const POS_LABELS: [&str; 2] = ["Pos", "Pos."];
const MARKET_VALUE_LABELS: [&str; 2] = ["Market value", "MV"];
const DEALING_CLUB_LABELS: [&str; 3] = ["Left", "Joined", "Club"];
const COUNTRY_LABELS: [&str; 1] = [COUNTRY_LABEL];
const FEE_LABELS: [&str; 1] = ["Fee"];
const PLAYER_ID_LABELS: [&str; 1] = [PLAYER_ID_LABEL];

/// Converts one raw row into a typed record.
pub fn normalize(row: &RawRow, context: &RowContext) -> Result<TransferRecord, NormalizationError> {
    let player_name = require_cell(row, &PLAYER_LABELS, "player")?;
    let player_id = require_cell(row, &PLAYER_ID_LABELS, "player id")?;
    let player_id = player_id
        .parse::<u32>()
        .map(PlayerId::from)
        .map_err(|_| NormalizationError::BadPlayerId(player_id.to_owned()))?;

    // Empty age is a data-quality failure, not a null: the published schema's
    // age column is non-optional.
    let age = require_cell(row, &AGE_LABELS, "age")?;
    let age = age
        .parse::<u8>()
        .map(Age::from)
        .map_err(|_| NormalizationError::BadAge(age.to_owned()))?;

    let position = Position::from_full_name(require_cell(row, &POSITION_LABELS, "position")?)?;
    if let Some(pos) = find_cell(row, &POS_LABELS).filter(|s| !s.is_empty()) {
        if !pos.eq_ignore_ascii_case(position.abbreviation()) {
            warn!(
                "Page abbreviation {pos:?} disagrees with {:?}; keeping the derived {:?}",
                position.full_name(),
                position.abbreviation(),
            );
        }
    }

    let market_value = parse_currency(find_cell(row, &MARKET_VALUE_LABELS).unwrap_or(""))?;
    let (fee, is_loan) = parse_fee(find_cell(row, &FEE_LABELS).unwrap_or(""))?;

    let dealing_club = require_cell(row, &DEALING_CLUB_LABELS, "dealing club")?;
    let dealing_country = find_cell(row, &COUNTRY_LABELS).unwrap_or("");
    let nationality = find_cell(row, &NATIONALITY_LABELS).unwrap_or("");

    Ok(TransferRecord::builder()
        .season(context.season)
        .league(context.league.clone())
        .club(context.club.clone())
        .window(context.window)
        .movement(row.movement)
        .player_name(PlayerName::from(player_name))
        .player_id(player_id)
        .age(age)
        .nationality(Nationality::from(nationality))
        .position(position)
        .market_value(market_value)
        .dealing_club(ClubName::from(dealing_club))
        .dealing_country(CountryName::from(dealing_country))
        .fee(fee)
        .is_loan(is_loan)
        .build())
}

/// Converts a currency string into integer euros, `None` for missing values.
///
/// Thousand/decimal separators are handled explicitly; there is no locale
/// dependence.  `"€70.00m"` is 70_000_000, `"€500k"` is 500_000, `"€1000"`
/// is 1000, and `"-"`, `"?"` or the empty string are missing.
pub fn parse_currency(s: &str) -> Result<Option<u64>, NormalizationError> {
    let s = s.trim();
    if s.is_empty() || s == "-" || s == "?" {
        return Ok(None);
    }
    let captures = regex!(r"^€([0-9]+)(?:\.([0-9]+))?\s*(bn|m|k)?$")
        .captures(s)
        .ok_or_else(|| NormalizationError::BadCurrency(s.to_owned()))?;
    let bad = || NormalizationError::BadCurrency(s.to_owned());
    let whole = captures[1].parse::<u64>().map_err(|_| bad())?;
    let multiplier: u64 = match captures.get(3).map(|m| m.as_str()) {
        Some("bn") => 1_000_000_000,
        Some("m") => 1_000_000,
        Some("k") => 1_000,
        _ => 1,
    };
    // Amounts beyond u64 range are garbage data, not panics.
    let mut value = whole.checked_mul(multiplier).ok_or_else(bad)?;
    if let Some(fraction) = captures.get(2) {
        let digits = fraction.as_str();
        let scale = 10u64
            .checked_pow(u32::try_from(digits.len()).map_err(|_| bad())?)
            .ok_or_else(bad)?;
        let fraction = digits.parse::<u64>().map_err(|_| bad())?;
        // Sub-euro precision truncates.
        let fractional_part = fraction.checked_mul(multiplier).ok_or_else(bad)? / scale;
        value = value.checked_add(fractional_part).ok_or_else(bad)?;
    }
    Ok(Some(value))
}

/// Parses the fee cell into (fee, loan flag).
///
/// A null fee means a free transfer, a loan with no fee, or an unreported
/// amount; it is distinct from a fee of zero.  The loan flag comes from the
/// page's explicit markers, never inferred from the amount: a paid loan is
/// still a loan.
pub fn parse_fee(s: &str) -> Result<(Option<u64>, bool), NormalizationError> {
    let s = s.trim();
    if s.is_empty() || s == "-" || s == "?" {
        return Ok((None, false));
    }
    if s.eq_ignore_ascii_case("free transfer") {
        return Ok((None, false));
    }
    if s.eq_ignore_ascii_case("loan transfer") || s.starts_with("End of loan") {
        return Ok((None, true));
    }
    if let Some(amount) = s.strip_prefix("Loan fee:") {
        return Ok((parse_currency(amount)?, true));
    }
    Ok((parse_currency(s)?, false))
}

fn find_cell<'r>(row: &'r RawRow, labels: &[&str]) -> Option<&'r str> {
    row.cells
        .iter()
        .find(|(key, _)| labels.iter().any(|label| key.eq_ignore_ascii_case(label)))
        .map(|(_, value)| value.as_str())
}

fn require_cell<'r>(
    row: &'r RawRow,
    labels: &[&str],
    name: &'static str,
) -> Result<&'r str, NormalizationError> {
    find_cell(row, labels)
        .filter(|value| !value.trim().is_empty())
        .ok_or(NormalizationError::MissingColumn(name))
}
