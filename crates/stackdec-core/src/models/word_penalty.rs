use super::WordPenaltyModel;

/// Geometric length model: `p(len) = p * (1 - p)^len`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometricWordPenalty {
    p: f64,
}

impl GeometricWordPenalty {
    pub fn new(p: f64) -> Self {
        Self { p }
    }

    pub fn p(&self) -> f64 {
        self.p
    }
}

impl WordPenaltyModel for GeometricWordPenalty {
    fn score_for_length(&self, len: usize) -> f64 {
        self.p.ln() + len as f64 * (1.0 - self.p).ln()
    }
}
