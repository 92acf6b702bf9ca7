use std::path::{Path, PathBuf};

use transfer_scraping_utils::fs_util::write_atomic;

use crate::schema::{LeagueName, SeasonYear, TransferRecord};

/// Published column order.  Never reorder: downstream consumers and
/// diff-based change review both depend on it.
pub const COLUMNS: [&str; 16] = [
    "season",
    "league",
    "club",
    "window",
    "movement",
    "player_name",
    "player_id",
    "age",
    "nationality",
    "position",
    "pos",
    "market_value",
    "dealing_club",
    "dealing_country",
    "fee",
    "is_loan",
];

/// Serializes one season's records, fully sorted, then atomically replaces
/// `{out_dir}/{league}/{season}.csv`.  Re-running on unchanged source data
/// produces a byte-identical file.
pub fn write_dataset(
    out_dir: &Path,
    league: &LeagueName,
    season: SeasonYear,
    mut records: Vec<TransferRecord>,
) -> anyhow::Result<PathBuf> {
    sort_records(&mut records);
    let bytes = to_csv_bytes(&records)?;
    let path = out_dir
        .join(league.as_str())
        .join(format!("{season}.csv"));
    write_atomic(&path, &bytes)?;
    Ok(path)
}

/// Deterministic total order over records; ties beyond the documented
/// (club, movement, player) order are broken by every remaining field.
pub fn sort_records(records: &mut [TransferRecord]) {
    records.sort_by(|a, b| {
        a.club()
            .cmp(b.club())
            .then_with(|| a.movement().cmp(&b.movement()))
            .then_with(|| a.player_name().cmp(b.player_name()))
            .then_with(|| a.player_id().cmp(&b.player_id()))
            .then_with(|| a.window().cmp(&b.window()))
            .then_with(|| a.dealing_club().cmp(b.dealing_club()))
            .then_with(|| a.fee().cmp(&b.fee()))
            .then_with(|| a.is_loan().cmp(&b.is_loan()))
            .then_with(|| a.market_value().cmp(&b.market_value()))
    });
}

pub fn to_csv_bytes(records: &[TransferRecord]) -> anyhow::Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(COLUMNS)?;
    for r in records {
        writer.write_record([
            r.season().to_string(),
            r.league().to_string(),
            r.club().to_string(),
            r.window().to_string(),
            r.movement().to_string(),
            r.player_name().to_string(),
            r.player_id().to_string(),
            r.age().to_string(),
            r.nationality().to_string(),
            r.position().full_name().to_owned(),
            r.position().abbreviation().to_owned(),
            optional_euros(r.market_value()),
            r.dealing_club().to_string(),
            r.dealing_country().to_string(),
            optional_euros(r.fee()),
            if r.is_loan() { "1" } else { "0" }.to_owned(),
        ])?;
    }
    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV buffer: {e}"))
}

// Nulls are empty strings, never a literal "null" or "NaN".
fn optional_euros(value: Option<u64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Age, Movement, PlayerId, Position, Window};

    fn record(club: &str, movement: Movement, player: &str, id: u32) -> TransferRecord {
        TransferRecord::builder()
            .season(SeasonYear::from(2024))
            .league("premier-league".into())
            .club(club.into())
            .window(Window::Summer)
            .movement(movement)
            .player_name(player.into())
            .player_id(PlayerId::from(id))
            .age(Age::from(24))
            .nationality("England".into())
            .position(Position::Goalkeeper)
            .market_value(None)
            .dealing_club("Other FC".into())
            .dealing_country("Spain".into())
            .fee(None)
            .is_loan(false)
            .build()
    }

    #[test]
    fn header_row_has_the_sixteen_published_columns() {
        let bytes = to_csv_bytes(&[]).unwrap();
        let header = String::from_utf8(bytes).unwrap();
        assert_eq!(
            header.trim_end(),
            "season,league,club,window,movement,player_name,player_id,age,nationality,\
             position,pos,market_value,dealing_club,dealing_country,fee,is_loan"
        );
    }

    #[test]
    fn nulls_are_empty_strings_and_booleans_are_bits() {
        let mut r = record("Arsenal FC", Movement::In, "A", 1);
        r.set_fee(None);
        r.set_market_value(None);
        r.set_is_loan(true);
        let text = String::from_utf8(to_csv_bytes(&[r]).unwrap()).unwrap();
        let row = text.lines().nth(1).unwrap();
        assert!(row.ends_with(",,Other FC,Spain,,1"));
        assert!(!text.contains("null"));
        assert!(!text.contains("NaN"));
    }

    #[test]
    fn rows_are_ordered_by_club_then_movement_then_player() {
        let mut records = vec![
            record("Chelsea FC", Movement::In, "Zed", 3),
            record("Arsenal FC", Movement::Out, "Ann", 1),
            record("Arsenal FC", Movement::In, "Bob", 2),
            record("Arsenal FC", Movement::In, "Ann", 4),
        ];
        sort_records(&mut records);
        let order: Vec<_> = records
            .iter()
            .map(|r| (r.club().as_str(), r.movement(), r.player_name().as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("Arsenal FC", Movement::In, "Ann"),
                ("Arsenal FC", Movement::In, "Bob"),
                ("Arsenal FC", Movement::Out, "Ann"),
                ("Chelsea FC", Movement::In, "Zed"),
            ]
        );
    }

    #[test]
    fn rerunning_the_writer_is_byte_identical() {
        let records = vec![
            record("Chelsea FC", Movement::In, "Zed", 3),
            record("Arsenal FC", Movement::Out, "Ann", 1),
        ];
        let mut first = records.clone();
        let mut second = records;
        // Input arrival order must not matter.
        second.reverse();
        sort_records(&mut first);
        sort_records(&mut second);
        assert_eq!(to_csv_bytes(&first).unwrap(), to_csv_bytes(&second).unwrap());
    }

    #[test]
    fn write_dataset_lands_at_the_league_season_path() {
        let dir = std::env::temp_dir().join(format!(
            "transfer-scraping-writer-test-{}",
            std::process::id()
        ));
        let path = write_dataset(
            &dir,
            &LeagueName::from("premier-league"),
            SeasonYear::from(2024),
            vec![record("Arsenal FC", Movement::In, "Ann", 1)],
        )
        .unwrap();
        assert_eq!(path, dir.join("premier-league").join("2024.csv"));
        assert!(path.exists());
        fs_err::remove_dir_all(&dir).unwrap();
    }
}
