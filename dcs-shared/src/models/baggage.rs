use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BaggagePiece {
    pub tag: String,
    /// Kilograms
    pub weight: f64,
}

/// Checked baggage of one passenger.
///
/// `count` and `total_weight` duplicate what `pieces` already says; they are
/// kept on the document for readers that only want the totals.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BaggageRecord {
    #[serde(default)]
    pub pieces: Vec<BaggagePiece>,
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub total_weight: f64,
}

impl BaggageRecord {
    pub fn from_pieces(pieces: Vec<BaggagePiece>) -> Self {
        let mut record = Self {
            pieces,
            count: 0,
            total_weight: 0.0,
        };
        record.recompute();
        record
    }

    pub fn push(&mut self, piece: BaggagePiece) {
        self.pieces.push(piece);
        self.recompute();
    }

    pub fn clear(&mut self) {
        self.pieces.clear();
        self.recompute();
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    fn recompute(&mut self) {
        self.count = self.pieces.len() as u32;
        self.total_weight = self.pieces.iter().map(|p| p.weight).sum();
    }
}
