use serde::{Deserialize, Serialize};

/// One timed chunk of caption text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CaptionUnit {
    pub index: usize,
    pub text: String,
    pub weight: usize,
    pub start: f64,
    pub end: f64,
}

impl CaptionUnit {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Ordered, non-overlapping caption units covering `duration` seconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub units: Vec<CaptionUnit>,
    pub duration: f64,
}

impl Timeline {
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }
}
