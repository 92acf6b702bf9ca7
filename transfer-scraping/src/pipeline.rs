use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use anyhow::Context;
use log::{error, info, warn};
use strum::IntoEnumIterator;

use crate::{
    api::{club_transfers_url, RawPage, TransferClient},
    config::{ClubConfig, Config, LeagueConfig},
    normalize::{normalize, RowContext},
    parser::transfers::extract,
    reconcile::reconcile,
    report::RunReport,
    schema::{LeagueName, SeasonYear, TransferRecord, Window},
    writer::write_dataset,
};

#[derive(Clone, Debug)]
pub struct PipelineOptions {
    pub out_dir: PathBuf,
    /// Write a season's file even when some club pages permanently failed.
    pub force_partial: bool,
}

/// Cooperative run-level cancellation.  Raising the flag stops new fetches
/// from being issued; in-flight fetches finish or time out on their own.
pub type CancelFlag = Arc<AtomicBool>;

/// Runs the whole batch: leagues × seasons, each season fanning out over
/// windows × clubs through the shared fetch pool.
pub async fn run(
    config: &Config,
    options: &PipelineOptions,
    cancelled: &CancelFlag,
) -> anyhow::Result<RunReport> {
    let client = Arc::new(TransferClient::new(config.fetch.clone())?);
    let mut report = RunReport::default();
    'seasons: for league in &config.leagues {
        for &season in &league.seasons {
            if cancelled.load(Ordering::Relaxed) {
                info!("Cancelled; not starting further seasons");
                break 'seasons;
            }
            let season_report =
                run_season(&client, league, season, options, cancelled).await?;
            report.absorb(season_report);
        }
    }
    Ok(report)
}

struct ClubJob {
    league: LeagueName,
    season: SeasonYear,
    window: Window,
    club: ClubConfig,
    quarantine_dir: PathBuf,
}

enum ClubOutcome {
    Fetched {
        records: Vec<TransferRecord>,
        rows_dropped: usize,
    },
    Skipped {
        description: String,
    },
    Quarantined {
        description: String,
    },
    Cancelled,
}

/// Scrapes one (league, season): every club page for both windows, then a
/// join barrier, then reconciliation and the dataset write.  Reconciliation
/// must not start before every club job has either succeeded or been
/// recorded as permanently failed, since it pairs `in` and `out` views.
async fn run_season(
    client: &Arc<TransferClient>,
    league: &LeagueConfig,
    season: SeasonYear,
    options: &PipelineOptions,
    cancelled: &CancelFlag,
) -> anyhow::Result<RunReport> {
    info!("Scraping {} {season}", league.name);
    let mut handles = Vec::new();
    for window in Window::iter() {
        for club in &league.clubs {
            let client = Arc::clone(client);
            let cancelled = Arc::clone(cancelled);
            let job = ClubJob {
                league: league.name.clone(),
                season,
                window,
                club: club.clone(),
                quarantine_dir: options.out_dir.join("quarantine"),
            };
            handles.push(tokio::spawn(run_club_job(client, job, cancelled)));
        }
    }

    let mut report = RunReport::default();
    let mut records = Vec::new();
    let mut complete = true;
    for handle in handles {
        match handle.await.context("Club job panicked")? {
            ClubOutcome::Fetched {
                records: club_records,
                rows_dropped,
            } => {
                report.pages_fetched += 1;
                report.rows_dropped += rows_dropped;
                records.extend(club_records);
            }
            ClubOutcome::Skipped { description } => {
                report.clubs_skipped.push(description);
                complete = false;
            }
            ClubOutcome::Quarantined { description } => {
                report.pages_quarantined += 1;
                report.clubs_skipped.push(description);
                complete = false;
            }
            ClubOutcome::Cancelled => complete = false,
        }
    }

    if !complete && !options.force_partial {
        warn!(
            "{} {season} is incomplete; no dataset file written",
            league.name
        );
        report.seasons_skipped += 1;
        return Ok(report);
    }

    let records = reconcile(records, &mut report);
    report.records_written += records.len();
    // A write failure is fatal for this season's output only.
    match write_dataset(&options.out_dir, &league.name, season, records) {
        Ok(path) => {
            info!("Wrote {path:?}");
            report.seasons_written += 1;
        }
        Err(e) => {
            error!("Failed to write {} {season}: {e:#}", league.name);
            report.seasons_skipped += 1;
        }
    }
    Ok(report)
}

async fn run_club_job(
    client: Arc<TransferClient>,
    job: ClubJob,
    cancelled: CancelFlag,
) -> ClubOutcome {
    let describe = || format!("{} {} {} {}", job.league, job.season, job.window, job.club.name);
    if cancelled.load(Ordering::Relaxed) {
        return ClubOutcome::Cancelled;
    }
    let url = match club_transfers_url(&job.club.slug, job.club.id, job.season, job.window) {
        Ok(url) => url,
        Err(e) => {
            return ClubOutcome::Skipped {
                description: format!("{}: {e}", describe()),
            }
        }
    };
    let page = match client.fetch(url).await {
        Ok(page) => page,
        Err(e) => {
            warn!("Skipping {}: {e}", describe());
            return ClubOutcome::Skipped {
                description: format!("{}: {e}", describe()),
            };
        }
    };
    let rows = match extract(&page) {
        Ok(rows) => rows,
        Err(e) => {
            warn!("Quarantining {}: {e}", describe());
            if let Err(e) = quarantine_page(&job, &page) {
                error!("Failed to quarantine page for {}: {e:#}", describe());
            }
            return ClubOutcome::Quarantined {
                description: format!("{}: {e}", describe()),
            };
        }
    };

    let context = RowContext {
        league: &job.league,
        season: job.season,
        window: job.window,
        club: &job.club.name,
    };
    let mut records = Vec::new();
    let mut rows_dropped = 0;
    for row in &rows {
        match normalize(row, &context) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!("Dropping row on {}: {e}", describe());
                rows_dropped += 1;
            }
        }
    }
    ClubOutcome::Fetched {
        records,
        rows_dropped,
    }
}

/// Sets a structurally unrecognized page aside for manual review.
fn quarantine_page(job: &ClubJob, page: &RawPage) -> anyhow::Result<()> {
    let file_name = format!(
        "{}-{}-{}-{}.html",
        job.league, job.season, job.window, job.club.slug
    );
    write_quarantined(&job.quarantine_dir, &file_name, page.body.as_bytes())
}

fn write_quarantined(dir: &Path, file_name: &str, body: &[u8]) -> anyhow::Result<()> {
    fs_err::create_dir_all(dir)?;
    fs_err::write(dir.join(file_name), body)?;
    Ok(())
}
