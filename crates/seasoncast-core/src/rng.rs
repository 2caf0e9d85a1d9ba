// Seeded draw streams for deterministic, replayable match simulation.
//
// Every fixture gets its own linear-congruential stream seeded with the match
// id, so the toss derived during preparation and the replay performed during
// resolution see exactly the same sequence of draws.

use crate::model::MatchId;

pub const LCG_MULTIPLIER: u64 = 9301;
pub const LCG_INCREMENT: u64 = 49297;
pub const LCG_MODULUS: u64 = 233280;

/// A source of uniform draws in [0, 1).
///
/// Resolution code is generic over this trait so tests can script the exact
/// sequence of draws.
pub trait DrawSource {
    fn draw(&mut self) -> f64;

    /// `true` with probability `p`.
    fn chance(&mut self, p: f64) -> bool {
        self.draw() < p
    }

    /// Integer in `[lo, hi)`. Returns `lo` when the range is empty.
    fn int_range(&mut self, lo: u32, hi: u32) -> u32 {
        if hi <= lo {
            return lo;
        }
        let span = f64::from(hi - lo);
        let offset = (self.draw() * span).floor() as u32;
        lo + offset.min(hi - lo - 1)
    }

    /// Float in `[lo, hi)`.
    fn float_range(&mut self, lo: f64, hi: f64) -> f64 {
        lo + self.draw() * (hi - lo)
    }
}

/// `seed' = (seed * 9301 + 49297) mod 233280`, draw = `seed' / 233280`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lcg {
    state: u64,
}

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Lcg { state: seed }
    }

    /// The stream used for every draw concerning `id`.
    pub fn for_match(id: MatchId) -> Self {
        Lcg::new(u64::from(id.0))
    }
}

impl DrawSource for Lcg {
    fn draw(&mut self) -> f64 {
        self.state = (self.state % LCG_MODULUS * LCG_MULTIPLIER + LCG_INCREMENT) % LCG_MODULUS;
        self.state as f64 / LCG_MODULUS as f64
    }
}

impl Iterator for Lcg {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        Some(self.draw())
    }
}

/// A fixed sequence of draws, cycled when exhausted.
#[derive(Debug, Clone)]
pub struct ScriptedDraws {
    draws: Vec<f64>,
    pos: usize,
}

impl ScriptedDraws {
    pub fn new(draws: Vec<f64>) -> Self {
        ScriptedDraws { draws, pos: 0 }
    }
}

impl DrawSource for ScriptedDraws {
    fn draw(&mut self) -> f64 {
        if self.draws.is_empty() {
            return 0.0;
        }
        let value = self.draws[self.pos % self.draws.len()];
        self.pos += 1;
        value
    }
}
