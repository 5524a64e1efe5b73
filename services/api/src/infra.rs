use admission_ratings::admission::{
    ApplicantId, ApplicantRepository, ApplicantSnapshot, BudgetCapacity, Exam, Gender, Notification,
    NotificationPublisher, Profile, ProfileRepository, PublishError, RatingHistory,
    RatingObservation, RatingPosition, RatingRepository, RepositoryError, UserId,
};
use admission_ratings::config::AppConfig;
use admission_ratings::error::AppError;
use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;
use uuid::Uuid;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryProfileRepository {
    profiles: Arc<Mutex<HashMap<UserId, Profile>>>,
}

impl InMemoryProfileRepository {
    pub(crate) fn insert(&self, profile: Profile) {
        let mut guard = self.profiles.lock().expect("profile mutex poisoned");
        guard.insert(profile.user_id, profile);
    }
}

impl ProfileRepository for InMemoryProfileRepository {
    fn fetch(&self, user_id: &UserId) -> Result<Option<Profile>, RepositoryError> {
        let guard = self.profiles.lock().expect("profile mutex poisoned");
        Ok(guard.get(user_id).cloned())
    }

    fn get_by_applicant_id(
        &self,
        applicant_id: ApplicantId,
    ) -> Result<Option<Profile>, RepositoryError> {
        let guard = self.profiles.lock().expect("profile mutex poisoned");
        Ok(guard
            .values()
            .find(|profile| profile.applicant_id == applicant_id)
            .cloned())
    }

    fn create(&self, profile: Profile) -> Result<(), RepositoryError> {
        let mut guard = self.profiles.lock().expect("profile mutex poisoned");
        if guard.contains_key(&profile.user_id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(profile.user_id, profile);
        Ok(())
    }

    fn update(&self, profile: Profile) -> Result<(), RepositoryError> {
        let mut guard = self.profiles.lock().expect("profile mutex poisoned");
        let stored = guard
            .get_mut(&profile.user_id)
            .ok_or(RepositoryError::NotFound)?;
        *stored = profile;
        Ok(())
    }

    fn delete(&self, user_id: &UserId) -> Result<(), RepositoryError> {
        let mut guard = self.profiles.lock().expect("profile mutex poisoned");
        guard
            .remove(user_id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryApplicantRepository {
    snapshots: Arc<Mutex<BTreeMap<(ApplicantId, String), ApplicantSnapshot>>>,
}

impl ApplicantRepository for InMemoryApplicantRepository {
    fn upsert_batch(&self, snapshots: Vec<ApplicantSnapshot>) -> Result<(), RepositoryError> {
        let mut guard = self.snapshots.lock().expect("repository mutex poisoned");
        for snapshot in snapshots {
            guard.insert(
                (snapshot.applicant_id, snapshot.direction.clone()),
                snapshot,
            );
        }
        Ok(())
    }

    fn fetch(
        &self,
        applicant_id: ApplicantId,
        direction: &str,
    ) -> Result<Option<ApplicantSnapshot>, RepositoryError> {
        let guard = self.snapshots.lock().expect("repository mutex poisoned");
        Ok(guard.get(&(applicant_id, direction.to_string())).cloned())
    }

    fn list_for_applicant(
        &self,
        applicant_id: ApplicantId,
    ) -> Result<Vec<ApplicantSnapshot>, RepositoryError> {
        let guard = self.snapshots.lock().expect("repository mutex poisoned");
        let mut snapshots: Vec<ApplicantSnapshot> = guard
            .range((applicant_id, String::new())..)
            .take_while(|((id, _), _)| *id == applicant_id)
            .map(|(_, snapshot)| snapshot.clone())
            .collect();
        snapshots.sort_by_key(|snapshot| snapshot.priority);
        Ok(snapshots)
    }

    fn list_by_direction(
        &self,
        direction: &str,
    ) -> Result<Vec<ApplicantSnapshot>, RepositoryError> {
        let guard = self.snapshots.lock().expect("repository mutex poisoned");
        let mut snapshots: Vec<ApplicantSnapshot> = guard
            .values()
            .filter(|snapshot| snapshot.direction == direction)
            .cloned()
            .collect();
        snapshots.sort_by_key(|snapshot| snapshot.rank);
        Ok(snapshots)
    }

    fn count(&self) -> Result<usize, RepositoryError> {
        Ok(self.snapshots.lock().expect("repository mutex poisoned").len())
    }

    fn paginate(
        &self,
        page: usize,
        limit: usize,
    ) -> Result<Vec<ApplicantSnapshot>, RepositoryError> {
        let guard = self.snapshots.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .skip(page.saturating_sub(1).saturating_mul(limit))
            .take(limit)
            .cloned()
            .collect())
    }
}

type DailyRanks = BTreeMap<NaiveDate, RatingPosition>;

#[derive(Default, Clone)]
pub(crate) struct InMemoryRatingRepository {
    histories: Arc<Mutex<HashMap<(ApplicantId, String), DailyRanks>>>,
}

impl RatingRepository for InMemoryRatingRepository {
    fn upsert_batch(&self, observations: Vec<RatingObservation>) -> Result<(), RepositoryError> {
        let mut guard = self.histories.lock().expect("repository mutex poisoned");
        for RatingObservation {
            direction,
            position,
        } in observations
        {
            guard
                .entry((position.applicant_id, direction))
                .or_default()
                .insert(position.date, position);
        }
        Ok(())
    }

    fn read(
        &self,
        applicant_id: ApplicantId,
        direction: &str,
    ) -> Result<RatingHistory, RepositoryError> {
        let guard = self.histories.lock().expect("repository mutex poisoned");
        let positions = guard
            .get(&(applicant_id, direction.to_string()))
            .map(|daily| daily.values().cloned().collect())
            .unwrap_or_default();
        Ok(RatingHistory::new(positions))
    }
}

/// Delivery channel that writes notifications to the service log.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct TracingNotificationPublisher;

impl NotificationPublisher for TracingNotificationPublisher {
    fn publish(&self, notification: Notification) -> Result<(), PublishError> {
        info!(
            user_id = %notification.user_id,
            level = ?notification.level,
            text = %notification.text,
            "notification published"
        );
        Ok(())
    }
}

/// Logs like [`TracingNotificationPublisher`] and keeps every notification of a one-shot run.
#[derive(Default, Clone)]
pub(crate) struct RecordingNotificationPublisher {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl NotificationPublisher for RecordingNotificationPublisher {
    fn publish(&self, notification: Notification) -> Result<(), PublishError> {
        TracingNotificationPublisher.publish(notification.clone())?;
        let mut guard = self.sent.lock().expect("publisher mutex poisoned");
        guard.push(notification);
        Ok(())
    }
}

impl RecordingNotificationPublisher {
    pub(crate) fn sent(&self) -> Vec<Notification> {
        self.sent.lock().expect("publisher mutex poisoned").clone()
    }
}

/// Shared in-memory stores backing the server and the one-shot commands.
#[derive(Default, Clone)]
pub(crate) struct InMemoryStores {
    pub(crate) profiles: InMemoryProfileRepository,
    pub(crate) applicants: InMemoryApplicantRepository,
    pub(crate) ratings: InMemoryRatingRepository,
}

pub(crate) fn load_capacity(config: &AppConfig) -> Result<BudgetCapacity, AppError> {
    match &config.capacity_csv {
        Some(path) => {
            let capacity = BudgetCapacity::from_path(path)?;
            info!(directions = capacity.len(), path = %path.display(), "budget capacity loaded");
            Ok(capacity)
        }
        None => Ok(BudgetCapacity::new()),
    }
}

#[derive(Debug, Deserialize)]
struct ProfileRow {
    user_id: Uuid,
    applicant_id: i64,
    gender: Gender,
    gpa: f32,
    #[serde(default, deserialize_with = "deserialize_exams")]
    exams: Vec<Exam>,
}

#[derive(Debug, Deserialize)]
struct RatingRow {
    applicant_id: i64,
    direction: String,
    rank: u32,
    #[serde(deserialize_with = "deserialize_date")]
    date: NaiveDate,
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader)
}

/// `user_id,applicant_id,gender,gpa[,exams]` rows, exams written as `math:82;physics:74`.
pub(crate) fn read_profiles<R: Read>(reader: R) -> Result<Vec<Profile>, csv::Error> {
    csv_reader(reader)
        .deserialize::<ProfileRow>()
        .map(|row| {
            row.map(|row| Profile {
                user_id: UserId(row.user_id),
                applicant_id: ApplicantId(row.applicant_id),
                gender: row.gender,
                gpa: row.gpa,
                exams: row.exams,
            })
        })
        .collect()
}

/// Competition snapshots with one column per `ApplicantSnapshot` field.
pub(crate) fn read_snapshots<R: Read>(reader: R) -> Result<Vec<ApplicantSnapshot>, csv::Error> {
    csv_reader(reader).deserialize().collect()
}

/// `applicant_id,direction,rank,date` rows.
pub(crate) fn read_ratings<R: Read>(reader: R) -> Result<Vec<RatingObservation>, csv::Error> {
    csv_reader(reader)
        .deserialize::<RatingRow>()
        .map(|row| {
            row.map(|row| RatingObservation {
                direction: row.direction,
                position: RatingPosition {
                    applicant_id: ApplicantId(row.applicant_id),
                    rank: row.rank,
                    date: row.date,
                },
            })
        })
        .collect()
}

/// `rank,date` rows for a single enrollment, as used by the `analyze` command.
pub(crate) fn read_history<R: Read>(reader: R) -> Result<RatingHistory, csv::Error> {
    #[derive(Debug, Deserialize)]
    struct HistoryRow {
        #[serde(default)]
        applicant_id: i64,
        rank: u32,
        #[serde(deserialize_with = "deserialize_date")]
        date: NaiveDate,
    }

    let positions = csv_reader(reader)
        .deserialize::<HistoryRow>()
        .map(|row| {
            row.map(|row| RatingPosition {
                applicant_id: ApplicantId(row.applicant_id),
                rank: row.rank,
                date: row.date,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(RatingHistory::new(positions))
}

fn open(path: &Path) -> Result<std::fs::File, AppError> {
    Ok(std::fs::File::open(path)?)
}

/// Seed files accepted by `serve` and `broadcast`.
#[derive(Debug, Default, Clone)]
pub(crate) struct SeedFiles<'a> {
    pub(crate) profiles: Option<&'a Path>,
    pub(crate) applicants: Option<&'a Path>,
    pub(crate) ratings: Option<&'a Path>,
}

impl InMemoryStores {
    pub(crate) fn seed(&self, files: SeedFiles<'_>) -> Result<(), AppError> {
        if let Some(path) = files.profiles {
            let profiles = read_profiles(open(path)?)?;
            info!(profiles = profiles.len(), path = %path.display(), "profiles loaded");
            for profile in profiles {
                self.profiles.insert(profile);
            }
        }
        if let Some(path) = files.applicants {
            let snapshots = read_snapshots(open(path)?)?;
            info!(applicants = snapshots.len(), path = %path.display(), "applicants loaded");
            self.applicants.upsert_batch(snapshots)?;
        }
        if let Some(path) = files.ratings {
            let observations = read_ratings(open(path)?)?;
            info!(observations = observations.len(), path = %path.display(), "ratings loaded");
            self.ratings.upsert_batch(observations)?;
        }
        Ok(())
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn parse_exams(raw: &str) -> Result<Vec<Exam>, String> {
    raw.split(';')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            let (subject, points) = item
                .split_once(':')
                .ok_or_else(|| format!("exam '{item}' is not written as subject:points"))?;
            let points = points
                .trim()
                .parse::<u8>()
                .map_err(|err| format!("exam '{item}' has invalid points ({err})"))?;
            Ok(Exam {
                subject: subject.trim().to_string(),
                points,
            })
        })
        .collect()
}

fn deserialize_exams<'de, D>(deserializer: D) -> Result<Vec<Exam>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_exams(&raw).map_err(serde::de::Error::custom)
}

pub(crate) fn deserialize_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_date(&raw).map_err(serde::de::Error::custom)
}
