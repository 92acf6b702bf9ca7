use std::collections::BTreeMap;

use log::warn;

use crate::{
    report::RunReport,
    schema::{ClubName, Movement, PlayerId, TransferRecord, Window},
};

/// Order-independent identity of one transfer as seen from either club.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
struct TransferKey {
    player_id: PlayerId,
    window: Window,
    clubs: (ClubName, ClubName),
}

fn transfer_key(record: &TransferRecord) -> TransferKey {
    let (a, b) = if record.club() <= record.dealing_club() {
        (record.club().clone(), record.dealing_club().clone())
    } else {
        (record.dealing_club().clone(), record.club().clone())
    };
    TransferKey {
        player_id: record.player_id(),
        window: record.window(),
        clubs: (a, b),
    }
}

/// Merges the "in" and "out" views of each transfer for one (league, season).
///
/// Both clubs report the same transfer independently and may disagree on the
/// fee or market value; conflicts are resolved by preferring the non-null
/// value, then the buying club's page, and every resolution is logged and
/// counted.  Records whose counterpart page was never scraped pass through
/// unmerged.  No new records are ever produced.
pub fn reconcile(records: Vec<TransferRecord>, report: &mut RunReport) -> Vec<TransferRecord> {
    let mut groups: BTreeMap<TransferKey, Vec<TransferRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(transfer_key(&record)).or_default().push(record);
    }
    groups
        .into_values()
        .flat_map(|group| reconcile_group(group, report))
        .collect()
}

fn reconcile_group(group: Vec<TransferRecord>, report: &mut RunReport) -> Vec<TransferRecord> {
    let (mut ins, mut outs): (Vec<_>, Vec<_>) = group
        .into_iter()
        .partition(|r| r.movement() == Movement::In);

    // The common case: the two clubs' pages each contributed one view.
    if let ([buyer], [seller]) = (&mut ins[..], &mut outs[..]) {
        resolve_pair(buyer, seller, report);
        return ins.into_iter().chain(outs).collect();
    }

    // Several same-key transfers (or a lone record).  Without a
    // source-assigned transfer id, rows are paired only when their fee and
    // loan flag already agree; anything else is treated as a distinct
    // transfer and preserved, never collapsed.
    let mut result = Vec::new();
    for mut buyer in ins {
        match outs
            .iter()
            .position(|o| o.fee() == buyer.fee() && o.is_loan() == buyer.is_loan())
        {
            Some(i) => {
                let mut seller = outs.remove(i);
                resolve_pair(&mut buyer, &mut seller, report);
                result.push(buyer);
                result.push(seller);
            }
            None => result.push(buyer),
        }
    }
    result.extend(outs);
    result
}

/// Harmonizes a matched in/out pair in place.  The buying club's page wins
/// whenever both sides report a non-null value.
fn resolve_pair(buyer: &mut TransferRecord, seller: &mut TransferRecord, report: &mut RunReport) {
    if buyer.fee() != seller.fee() {
        let resolved = match (buyer.fee(), seller.fee()) {
            (Some(b), Some(_)) => Some(b),
            (b, s) => b.or(s),
        };
        warn!(
            "Conflicting fee for {} ({} / {}): {:?} vs {:?}, keeping {resolved:?}",
            buyer.player_name(),
            buyer.club(),
            seller.club(),
            buyer.fee(),
            seller.fee(),
        );
        report.conflicts_resolved += 1;
        buyer.set_fee(resolved);
        seller.set_fee(resolved);
    }
    if buyer.market_value() != seller.market_value() {
        let resolved = match (buyer.market_value(), seller.market_value()) {
            (Some(b), Some(_)) => Some(b),
            (b, s) => b.or(s),
        };
        warn!(
            "Conflicting market value for {} ({} / {}): {:?} vs {:?}, keeping {resolved:?}",
            buyer.player_name(),
            buyer.club(),
            seller.club(),
            buyer.market_value(),
            seller.market_value(),
        );
        report.conflicts_resolved += 1;
        buyer.set_market_value(resolved);
        seller.set_market_value(resolved);
    }
    if buyer.is_loan() != seller.is_loan() {
        let resolved = buyer.is_loan();
        warn!(
            "Conflicting loan flag for {}: keeping the buying club's {resolved}",
            buyer.player_name(),
        );
        report.conflicts_resolved += 1;
        seller.set_is_loan(resolved);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Age, Position, SeasonYear};

    #[allow(clippy::too_many_arguments)]
    fn record(
        club: &str,
        movement: Movement,
        player_id: u32,
        dealing_club: &str,
        fee: Option<u64>,
        market_value: Option<u64>,
        is_loan: bool,
    ) -> TransferRecord {
        TransferRecord::builder()
            .season(SeasonYear::from(2024))
            .league("premier-league".into())
            .club(club.into())
            .window(Window::Summer)
            .movement(movement)
            .player_name("Player X".into())
            .player_id(PlayerId::from(player_id))
            .age(Age::from(25))
            .nationality("Norway".into())
            .position(Position::CentreForward)
            .market_value(market_value)
            .dealing_club(dealing_club.into())
            .dealing_country("England".into())
            .fee(fee)
            .is_loan(is_loan)
            .build()
    }

    #[test]
    fn matched_pair_keeps_swapped_clubs_and_identical_fee() {
        let mut report = RunReport::default();
        let records = vec![
            record("Club B", Movement::In, 1, "Club A", Some(10), Some(20), false),
            record("Club A", Movement::Out, 1, "Club B", Some(10), Some(20), false),
        ];
        let out = reconcile(records, &mut report);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|r| r.fee() == Some(10) && !r.is_loan()));
        assert_eq!(report.conflicts_resolved, 0);
    }

    #[test]
    fn conflicting_fee_prefers_non_null_then_buying_club() {
        let mut report = RunReport::default();
        let records = vec![
            record("Club B", Movement::In, 1, "Club A", None, None, false),
            record("Club A", Movement::Out, 1, "Club B", Some(7), None, false),
        ];
        let out = reconcile(records, &mut report);
        assert!(out.iter().all(|r| r.fee() == Some(7)));
        assert_eq!(report.conflicts_resolved, 1);

        let mut report = RunReport::default();
        let records = vec![
            record("Club B", Movement::In, 1, "Club A", Some(9), None, false),
            record("Club A", Movement::Out, 1, "Club B", Some(7), None, false),
        ];
        let out = reconcile(records, &mut report);
        assert!(out.iter().all(|r| r.fee() == Some(9)));
        assert_eq!(report.conflicts_resolved, 1);
    }

    #[test]
    fn conflicting_market_value_is_resolved_and_counted() {
        let mut report = RunReport::default();
        let records = vec![
            record("Club B", Movement::In, 1, "Club A", Some(5), Some(30), false),
            record("Club A", Movement::Out, 1, "Club B", Some(5), Some(40), false),
        ];
        let out = reconcile(records, &mut report);
        assert!(out.iter().all(|r| r.market_value() == Some(30)));
        assert_eq!(report.conflicts_resolved, 1);
    }

    #[test]
    fn singleton_passes_through_unmerged() {
        let mut report = RunReport::default();
        let records = vec![record(
            "Club B",
            Movement::In,
            1,
            "Lower Division FC",
            Some(5),
            None,
            false,
        )];
        let out = reconcile(records, &mut report);
        assert_eq!(out.len(), 1);
        assert_eq!(report.conflicts_resolved, 0);
    }

    #[test]
    fn two_distinct_transfers_in_one_window_are_not_collapsed() {
        // Player X: loan from A to B, then a permanent move from B to C,
        // both in the summer window.  Four records, four rows out.
        let mut report = RunReport::default();
        let records = vec![
            record("Club B", Movement::In, 1, "Club A", None, None, true),
            record("Club A", Movement::Out, 1, "Club B", None, None, true),
            record("Club C", Movement::In, 1, "Club B", Some(15), None, false),
            record("Club B", Movement::Out, 1, "Club C", Some(15), None, false),
        ];
        let out = reconcile(records, &mut report);
        assert_eq!(out.len(), 4);
        assert_eq!(out.iter().filter(|r| r.is_loan()).count(), 2);
        assert_eq!(out.iter().filter(|r| r.fee() == Some(15)).count(), 2);
    }

    #[test]
    fn same_key_rows_with_different_fees_stay_distinct() {
        // No transfer id exists to tell these apart, so both are preserved.
        let mut report = RunReport::default();
        let records = vec![
            record("Club B", Movement::In, 1, "Club A", None, None, true),
            record("Club B", Movement::In, 1, "Club A", Some(12), None, false),
            record("Club A", Movement::Out, 1, "Club B", Some(12), None, false),
        ];
        let out = reconcile(records, &mut report);
        assert_eq!(out.len(), 3);
        assert_eq!(
            out.iter().filter(|r| r.fee() == Some(12)).count(),
            2,
            "the agreeing pair merges, the loan row passes through"
        );
    }
}
