use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

/// Budget-funded seat counts per direction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BudgetCapacity {
    seats: BTreeMap<String, u32>,
}

#[derive(Debug, thiserror::Error)]
pub enum CapacityError {
    #[error("failed to read budget capacity table: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid budget capacity CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("direction '{0}' is listed more than once")]
    DuplicateDirection(String),
}

#[derive(Debug, Deserialize)]
struct CapacityRow {
    direction: String,
    budget_seats: u32,
}

impl BudgetCapacity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_direction(mut self, direction: impl Into<String>, seats: u32) -> Self {
        self.seats.insert(direction.into(), seats);
        self
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, CapacityError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Load a `direction,budget_seats` table.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CapacityError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut seats = BTreeMap::new();

        for record in csv_reader.deserialize::<CapacityRow>() {
            let row = record?;
            if seats.insert(row.direction.clone(), row.budget_seats).is_some() {
                return Err(CapacityError::DuplicateDirection(row.direction));
            }
        }

        Ok(Self { seats })
    }

    pub fn budget_seats(&self, direction: &str) -> Option<u32> {
        self.seats.get(direction).copied()
    }

    pub fn len(&self) -> usize {
        self.seats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seats.is_empty()
    }
}

impl FromIterator<(String, u32)> for BudgetCapacity {
    fn from_iter<T: IntoIterator<Item = (String, u32)>>(iter: T) -> Self {
        Self {
            seats: iter.into_iter().collect(),
        }
    }
}
