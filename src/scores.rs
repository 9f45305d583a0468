use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Best completed game for one puzzle size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreRecord {
    pub moves: u32,
    pub player_name: String,
    pub date: NaiveDate,
}

/// Lowest-move record per puzzle size. Records are only ever replaced by
/// strictly better ones, never removed.
#[derive(Debug, Default)]
pub struct ScoreLedger {
    records: BTreeMap<usize, ScoreRecord>,
}

impl ScoreLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the result if it is the first for `size` or beats the stored
    /// moves. Returns whether the ledger changed.
    pub fn commit(&mut self, size: usize, moves: u32, player_name: &str, date: NaiveDate) -> bool {
        let improves = self
            .records
            .get(&size)
            .map_or(true, |best| moves < best.moves);

        if improves {
            self.records.insert(
                size,
                ScoreRecord {
                    moves,
                    player_name: player_name.to_string(),
                    date,
                },
            );
        }
        improves
    }

    pub fn get(&self, size: usize) -> Option<&ScoreRecord> {
        self.records.get(&size)
    }

    /// Records in ascending puzzle size.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &ScoreRecord)> {
        self.records.iter().map(|(size, record)| (*size, record))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
