use log::{info, warn};

/// Aggregated outcome of one run, reported at the end so discrepancies
/// against the source site stay auditable.  Row- and page-level failures are
/// collected here instead of aborting the run.
#[derive(Clone, Debug, Default)]
pub struct RunReport {
    pub pages_fetched: usize,
    pub pages_quarantined: usize,
    pub rows_dropped: usize,
    pub conflicts_resolved: usize,
    pub clubs_skipped: Vec<String>,
    pub seasons_written: usize,
    pub seasons_skipped: usize,
    pub records_written: usize,
}

impl RunReport {
    pub fn absorb(&mut self, other: RunReport) {
        self.pages_fetched += other.pages_fetched;
        self.pages_quarantined += other.pages_quarantined;
        self.rows_dropped += other.rows_dropped;
        self.conflicts_resolved += other.conflicts_resolved;
        self.clubs_skipped.extend(other.clubs_skipped);
        self.seasons_written += other.seasons_written;
        self.seasons_skipped += other.seasons_skipped;
        self.records_written += other.records_written;
    }

    pub fn log_summary(&self) {
        info!(
            "Run finished: {} pages fetched, {} records across {} dataset files",
            self.pages_fetched, self.records_written, self.seasons_written,
        );
        if self.conflicts_resolved > 0 {
            info!(
                "Resolved {} conflicting fee/market-value reports",
                self.conflicts_resolved
            );
        }
        if self.rows_dropped > 0 {
            warn!("Dropped {} rows with data-quality failures", self.rows_dropped);
        }
        if self.pages_quarantined > 0 {
            warn!(
                "Quarantined {} pages with unrecognized layout for manual review",
                self.pages_quarantined
            );
        }
        for club in &self.clubs_skipped {
            warn!("Skipped: {club}");
        }
        if self.seasons_skipped > 0 {
            warn!(
                "{} incomplete seasons were not written (pass --force-partial to override)",
                self.seasons_skipped
            );
        }
    }
}
