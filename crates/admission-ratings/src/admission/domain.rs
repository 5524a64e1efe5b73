use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MIN_POINTS: u16 = 0;
pub const MAX_POINTS: u16 = 310;
pub const MIN_BONUS_POINTS: u8 = 0;
pub const MAX_BONUS_POINTS: u8 = 10;
pub const MIN_PRIORITY: u8 = 1;
pub const MAX_PRIORITY: u8 = 5;
pub const MIN_GPA: f32 = 3.0;
pub const MAX_GPA: f32 = 5.0;
pub const MAX_EXAM_POINTS: u8 = 100;

/// Stable identity of an applicant across competition lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicantId(pub i64);

impl std::fmt::Display for ApplicantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a registered platform user (the notification recipient).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One observation of an applicant's place within a direction's competition list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingPosition {
    pub applicant_id: ApplicantId,
    pub rank: u32,
    pub date: NaiveDate,
}

/// Rating position keyed by direction, as written by the ingestion cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingObservation {
    pub direction: String,
    pub position: RatingPosition,
}

/// Date-ordered rank observations for one applicant within one direction.
///
/// Construction sorts by date and keeps a single observation per calendar date
/// (the last one supplied wins), mirroring the upsert performed at ingestion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<RatingPosition>", into = "Vec<RatingPosition>")]
pub struct RatingHistory {
    positions: Vec<RatingPosition>,
}

impl RatingHistory {
    pub fn new(positions: Vec<RatingPosition>) -> Self {
        let mut positions = positions;
        // sort_by_key is stable, so later duplicates stay behind earlier ones.
        positions.sort_by_key(|position| position.date);

        let mut deduplicated: Vec<RatingPosition> = Vec::with_capacity(positions.len());
        for position in positions {
            match deduplicated.last_mut() {
                Some(last) if last.date == position.date => *last = position,
                _ => deduplicated.push(position),
            }
        }

        Self {
            positions: deduplicated,
        }
    }

    pub fn positions(&self) -> &[RatingPosition] {
        &self.positions
    }

    pub fn ranks(&self) -> impl Iterator<Item = u32> + '_ {
        self.positions.iter().map(|position| position.rank)
    }

    pub fn latest(&self) -> Option<&RatingPosition> {
        self.positions.last()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

impl From<Vec<RatingPosition>> for RatingHistory {
    fn from(positions: Vec<RatingPosition>) -> Self {
        Self::new(positions)
    }
}

impl From<RatingHistory> for Vec<RatingPosition> {
    fn from(history: RatingHistory) -> Self {
        history.positions
    }
}

/// Current standing of an applicant within one direction for the latest cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicantSnapshot {
    pub applicant_id: ApplicantId,
    pub institute: String,
    pub direction: String,
    pub points: u16,
    pub bonus_points: u8,
    pub priority: u8,
    pub probability: f64,
    pub rank: u32,
    pub original: bool,
}

/// A single row of an incoming competition list, before the classifier has scored it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitionEntry {
    pub applicant_id: ApplicantId,
    pub rank: u32,
    pub institute: String,
    pub direction: String,
    pub priority: u8,
    pub points: u16,
    pub bonus_points: u8,
    pub original: bool,
}

impl CompetitionEntry {
    /// Reject rows whose values fall outside the admission campaign bounds.
    pub fn validate(&self) -> Result<(), IngestViolation> {
        if self.direction.trim().is_empty() {
            return Err(IngestViolation::MissingDirection {
                applicant_id: self.applicant_id,
            });
        }
        if self.rank == 0 {
            return Err(IngestViolation::InvalidRank {
                applicant_id: self.applicant_id,
            });
        }
        if !(MIN_POINTS..=MAX_POINTS).contains(&self.points) {
            return Err(IngestViolation::PointsOutOfRange {
                applicant_id: self.applicant_id,
                points: self.points,
            });
        }
        if !(MIN_BONUS_POINTS..=MAX_BONUS_POINTS).contains(&self.bonus_points) {
            return Err(IngestViolation::BonusPointsOutOfRange {
                applicant_id: self.applicant_id,
                bonus_points: self.bonus_points,
            });
        }
        if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&self.priority) {
            return Err(IngestViolation::PriorityOutOfRange {
                applicant_id: self.applicant_id,
                priority: self.priority,
            });
        }
        Ok(())
    }

    pub fn into_snapshot(self, probability: f64) -> ApplicantSnapshot {
        ApplicantSnapshot {
            applicant_id: self.applicant_id,
            institute: self.institute,
            direction: self.direction,
            points: self.points,
            bonus_points: self.bonus_points,
            priority: self.priority,
            probability,
            rank: self.rank,
            original: self.original,
        }
    }
}

/// Validation failure for an incoming competition list row.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IngestViolation {
    #[error("applicant {applicant_id} has no direction")]
    MissingDirection { applicant_id: ApplicantId },
    #[error("applicant {applicant_id} has rank 0; ranks start at 1")]
    InvalidRank { applicant_id: ApplicantId },
    #[error("applicant {applicant_id} has {points} points, expected 0..=310")]
    PointsOutOfRange { applicant_id: ApplicantId, points: u16 },
    #[error("applicant {applicant_id} has {bonus_points} bonus points, expected 0..=10")]
    BonusPointsOutOfRange {
        applicant_id: ApplicantId,
        bonus_points: u8,
    },
    #[error("applicant {applicant_id} has priority {priority}, expected 1..=5")]
    PriorityOutOfRange { applicant_id: ApplicantId, priority: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exam {
    #[serde(alias = "name")]
    pub subject: String,
    pub points: u8,
}

/// Registered applicant profile; present only once onboarding is complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: UserId,
    pub applicant_id: ApplicantId,
    pub gender: Gender,
    pub gpa: f32,
    #[serde(default)]
    pub exams: Vec<Exam>,
}

/// Editable part of a profile; the owning user comes from the request path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileDraft {
    pub applicant_id: ApplicantId,
    pub gender: Gender,
    pub gpa: f32,
    #[serde(default)]
    pub exams: Vec<Exam>,
}

impl ProfileDraft {
    pub fn into_profile(self, user_id: UserId) -> Profile {
        Profile {
            user_id,
            applicant_id: self.applicant_id,
            gender: self.gender,
            gpa: self.gpa,
            exams: self.exams,
        }
    }
}

/// Validation failure for a submitted profile.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProfileViolation {
    #[error("gpa {gpa} is outside 3.0..=5.0")]
    GpaOutOfRange { gpa: f32 },
    #[error("exam subject must not be empty")]
    MissingExamSubject,
    #[error("exam '{subject}' has {points} points, expected 0..=100")]
    ExamPointsOutOfRange { subject: String, points: u8 },
}

impl Profile {
    pub fn validate(&self) -> Result<(), ProfileViolation> {
        if !(MIN_GPA..=MAX_GPA).contains(&self.gpa) {
            return Err(ProfileViolation::GpaOutOfRange { gpa: self.gpa });
        }
        for exam in &self.exams {
            if exam.subject.trim().is_empty() {
                return Err(ProfileViolation::MissingExamSubject);
            }
            if exam.points > MAX_EXAM_POINTS {
                return Err(ProfileViolation::ExamPointsOutOfRange {
                    subject: exam.subject.clone(),
                    points: exam.points,
                });
            }
        }
        Ok(())
    }

    /// Sum of exam points, the score the classifier is queried with.
    pub fn total_points(&self) -> u16 {
        let total: u16 = self.exams.iter().map(|exam| u16::from(exam.points)).sum();
        total.min(MAX_POINTS)
    }
}
