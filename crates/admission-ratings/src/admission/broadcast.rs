//! Periodic fan-out of status notifications across every tracked enrollment.
//!
//! Enrollments are read page by page. Each page is processed concurrently, one task
//! per enrollment, and fully awaited before the next page is fetched, so the number of
//! in-flight tasks never exceeds the page size. A failing enrollment is logged and
//! counted without interrupting the rest of the page.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::domain::ApplicantSnapshot;
use super::notification::{NotificationError, NotificationFactory};
use super::repository::{
    ApplicantRepository, NotificationPublisher, PublishError, RatingRepository, RepositoryError,
};
use super::status::StatusError;

pub const DEFAULT_PAGE_SIZE: usize = 100;

/// What to do with an enrollment whose direction has no known budget capacity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingCapacityPolicy {
    /// Skip the enrollment and keep going.
    #[default]
    SkipApplicant,
    /// Finish the current page, then stop the cycle with an error.
    AbortCycle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastSettings {
    pub page_size: usize,
    pub missing_capacity: MissingCapacityPolicy,
}

impl Default for BroadcastSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            missing_capacity: MissingCapacityPolicy::default(),
        }
    }
}

/// Counters describing one broadcast cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastSummary {
    pub pages: usize,
    pub applicants: usize,
    pub published: usize,
    /// Neutral status or no registered profile.
    pub skipped: usize,
    pub missing_capacity: usize,
    pub failed: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum BroadcastError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("budget seats unknown for direction '{direction}'; cycle aborted")]
    MissingCapacity {
        direction: String,
        summary: BroadcastSummary,
    },
}

/// Number of pages needed to cover `total` items; the last page may be partial.
pub fn page_count(total: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    total.div_ceil(page_size)
}

enum Delivery {
    Published,
    Skipped,
}

#[derive(Debug, thiserror::Error)]
enum DeliveryError {
    #[error(transparent)]
    Notification(#[from] NotificationError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl DeliveryError {
    fn missing_capacity(&self) -> Option<&str> {
        match self {
            DeliveryError::Notification(NotificationError::Status(
                StatusError::MissingCapacity { direction },
            )) => Some(direction),
            _ => None,
        }
    }
}

pub struct BroadcastOrchestrator {
    applicants: Arc<dyn ApplicantRepository>,
    ratings: Arc<dyn RatingRepository>,
    factory: Arc<NotificationFactory>,
    publisher: Arc<dyn NotificationPublisher>,
    settings: BroadcastSettings,
}

impl BroadcastOrchestrator {
    pub fn new(
        applicants: Arc<dyn ApplicantRepository>,
        ratings: Arc<dyn RatingRepository>,
        factory: Arc<NotificationFactory>,
        publisher: Arc<dyn NotificationPublisher>,
        settings: BroadcastSettings,
    ) -> Self {
        Self {
            applicants,
            ratings,
            factory,
            publisher,
            settings,
        }
    }

    /// Run one full cycle over every enrollment.
    pub async fn broadcast(&self) -> Result<BroadcastSummary, BroadcastError> {
        let total = self.applicants.count()?;
        let pages = page_count(total, self.settings.page_size);
        let mut summary = BroadcastSummary {
            pages,
            ..BroadcastSummary::default()
        };

        for page in 1..=pages {
            let snapshots = self.applicants.paginate(page, self.settings.page_size)?;
            debug!(page, enrollments = snapshots.len(), "broadcasting page");

            let mut tasks = JoinSet::new();
            for snapshot in snapshots {
                let ratings = Arc::clone(&self.ratings);
                let factory = Arc::clone(&self.factory);
                let publisher = Arc::clone(&self.publisher);
                tasks.spawn_blocking(move || {
                    deliver(ratings.as_ref(), &factory, publisher.as_ref(), &snapshot).map_err(
                        |err| {
                            warn!(
                                applicant_id = %snapshot.applicant_id,
                                direction = %snapshot.direction,
                                error = %err,
                                "notification skipped"
                            );
                            err
                        },
                    )
                });
            }

            let mut capacity_gap: Option<String> = None;
            while let Some(joined) = tasks.join_next().await {
                summary.applicants += 1;
                match joined {
                    Ok(Ok(Delivery::Published)) => summary.published += 1,
                    Ok(Ok(Delivery::Skipped)) => summary.skipped += 1,
                    Ok(Err(err)) => match err.missing_capacity() {
                        Some(direction) => {
                            summary.missing_capacity += 1;
                            capacity_gap.get_or_insert_with(|| direction.to_string());
                        }
                        None => summary.failed += 1,
                    },
                    Err(join_error) => {
                        summary.failed += 1;
                        error!(page, error = %join_error, "notification task aborted");
                    }
                }
            }

            if let (MissingCapacityPolicy::AbortCycle, Some(direction)) =
                (self.settings.missing_capacity, capacity_gap)
            {
                warn!(page, %direction, "aborting broadcast on missing budget capacity");
                return Err(BroadcastError::MissingCapacity { direction, summary });
            }
        }

        info!(
            pages = summary.pages,
            applicants = summary.applicants,
            published = summary.published,
            skipped = summary.skipped,
            missing_capacity = summary.missing_capacity,
            failed = summary.failed,
            "broadcast cycle finished"
        );
        Ok(summary)
    }
}

fn deliver(
    ratings: &dyn RatingRepository,
    factory: &NotificationFactory,
    publisher: &dyn NotificationPublisher,
    snapshot: &ApplicantSnapshot,
) -> Result<Delivery, DeliveryError> {
    let history = ratings.read(snapshot.applicant_id, &snapshot.direction)?;

    match factory.notification_for(snapshot, &history)? {
        Some(notification) => {
            publisher.publish(notification)?;
            Ok(Delivery::Published)
        }
        None => Ok(Delivery::Skipped),
    }
}
