// Match resolution engine.
//
// Converts a prepared fixture into a completed result. The computation is a
// pure function of (match id, home win probability, toss, scoring context):
// replaying it with the same inputs reproduces the same result exactly, so a
// resolution attempted twice under a race commits the same outcome.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::model::{
    Innings, Match, MatchId, MatchResult, Overs, TeamId, TossDecision, TossOutcome,
    BALLS_PER_OVER, MAX_WICKETS,
};
use crate::rng::{DrawSource, Lcg};

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Probability the toss winner is the home side.
pub const TOSS_HOME_THRESHOLD: f64 = 0.5;
/// Probability the toss winner elects to bat.
pub const TOSS_BAT_THRESHOLD: f64 = 0.6;

/// Tunable constants for scoreline synthesis. Loaded from the `[scoring]`
/// table of season.toml; every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringParams {
    pub no_result_probability: f64,
    pub default_venue_avg_score: f64,
    pub strength_min: f64,
    pub strength_max: f64,
    pub variance_min: f64,
    pub variance_max: f64,
    pub first_innings_min: u32,
    pub first_innings_max: u32,
    /// Half-open `[min, max)` wicket range for the first innings.
    pub first_innings_wickets: (u32, u32),
    /// Inclusive run range a successful chase overtakes the target by.
    pub chase_margin_runs: (u32, u32),
    pub chase_wickets: (u32, u32),
    /// Inclusive run range a failed chase falls short by.
    pub defend_margin_runs: (u32, u32),
    pub defend_wickets: (u32, u32),
    /// Half-open `[min, max)` over range for a side bowled out first.
    pub all_out_overs: (u32, u32),
    /// Half-open `[min, max)` per-side range for the fallback generator.
    pub fallback_score: (u32, u32),
}

impl Default for ScoringParams {
    fn default() -> Self {
        ScoringParams {
            no_result_probability: 0.02,
            default_venue_avg_score: 165.0,
            strength_min: 0.9,
            strength_max: 1.2,
            variance_min: 0.85,
            variance_max: 1.15,
            first_innings_min: 100,
            first_innings_max: 250,
            first_innings_wickets: (4, 9),
            chase_margin_runs: (1, 15),
            chase_wickets: (4, 9),
            defend_margin_runs: (5, 35),
            defend_wickets: (6, 10),
            all_out_overs: (15, 19),
            fallback_score: (150, 200),
        }
    }
}

/// Venue/team data needed for a realistic scoreline. Absent when the
/// lookups failed; resolution then uses the fallback generator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringContext {
    pub venue_avg_score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolveInput {
    pub match_id: MatchId,
    pub home: TeamId,
    pub away: TeamId,
    /// Home win probability as a percentage in [0, 100].
    pub home_win_probability: f64,
    /// Toss committed during preparation, if any.
    pub toss: Option<TossOutcome>,
    pub context: Option<ScoringContext>,
    /// Knockout fixtures must produce a winner.
    pub knockout: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Washed out: no winner, one point each.
    NoResult,
    Decided(MatchResult),
}

// ---------------------------------------------------------------------------
// Toss
// ---------------------------------------------------------------------------

/// Derive the toss from the next two draws: home wins the toss below 0.5,
/// the winner bats below 0.6.
pub fn derive_toss<R: DrawSource>(rng: &mut R, home: TeamId, away: TeamId) -> TossOutcome {
    let winner = if rng.chance(TOSS_HOME_THRESHOLD) {
        home
    } else {
        away
    };
    let decision = if rng.chance(TOSS_BAT_THRESHOLD) {
        TossDecision::Bat
    } else {
        TossDecision::Bowl
    };
    TossOutcome { winner, decision }
}

/// The toss for a fixture, derived from its own id-seeded stream.
pub fn toss_for(match_id: MatchId, home: TeamId, away: TeamId) -> TossOutcome {
    derive_toss(&mut Lcg::for_match(match_id), home, away)
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Resolve a fixture using a fresh stream seeded with its id.
pub fn resolve_match(input: &ResolveInput, params: &ScoringParams) -> Resolution {
    resolve_with(&mut Lcg::for_match(input.match_id), input, params)
}

/// Resolve a fixture from an arbitrary draw source.
///
/// Draw order: toss (2), no-result (1), winner (1), then scoreline draws.
pub fn resolve_with<R: DrawSource>(
    rng: &mut R,
    input: &ResolveInput,
    params: &ScoringParams,
) -> Resolution {
    let derived = derive_toss(rng, input.home, input.away);
    let toss = match input.toss {
        Some(stored) if stored != derived => {
            warn!(
                match_id = %input.match_id,
                "stored toss differs from seeded toss, keeping stored toss"
            );
            stored
        }
        Some(stored) => stored,
        None => derived,
    };

    let washed_out = rng.chance(params.no_result_probability);
    if washed_out && !input.knockout {
        debug!(match_id = %input.match_id, "no result");
        return Resolution::NoResult;
    }

    let home_probability = input.home_win_probability.clamp(0.0, 100.0);
    let home_wins = rng.draw() * 100.0 < home_probability;
    let winner = if home_wins { input.home } else { input.away };

    let (first, second) = toss.batting_order(input.home, input.away);
    let chasing_wins = winner == second;
    let first_probability = if first == input.home {
        home_probability / 100.0
    } else {
        (100.0 - home_probability) / 100.0
    };

    let (first_innings, second_innings) = match input.context {
        Some(context) => realistic_scoreline(
            rng,
            &context,
            first_probability,
            (first, second),
            chasing_wins,
            params,
        ),
        None => fallback_scoreline(rng, (first, second), chasing_wins, params),
    };

    let margin = if chasing_wins {
        plural(u32::from(MAX_WICKETS - second_innings.wickets), "wicket")
    } else {
        plural(first_innings.runs - second_innings.runs, "run")
    };

    Resolution::Decided(MatchResult {
        winner,
        margin,
        first_innings,
        second_innings,
        toss,
    })
}

fn realistic_scoreline<R: DrawSource>(
    rng: &mut R,
    context: &ScoringContext,
    first_probability: f64,
    (first, second): (TeamId, TeamId),
    chasing_wins: bool,
    params: &ScoringParams,
) -> (Innings, Innings) {
    let strength =
        params.strength_min + (params.strength_max - params.strength_min) * first_probability;
    let variance = rng.float_range(params.variance_min, params.variance_max);
    let raw = (context.venue_avg_score * strength * variance).round();
    let runs = (raw.max(0.0) as u32).clamp(params.first_innings_min, params.first_innings_max);

    let wickets = wickets_in(rng, params.first_innings_wickets);
    let overs = if wickets >= MAX_WICKETS {
        overs_in(rng, params.all_out_overs)
    } else {
        Overs::FULL
    };
    let first_innings = Innings {
        batting_team: first,
        runs,
        wickets,
        overs,
    };

    let second_innings = if chasing_wins {
        let (lo, hi) = params.chase_margin_runs;
        let margin = rng.int_range(lo, hi + 1);
        let wickets = wickets_in(rng, params.chase_wickets).min(MAX_WICKETS - 1);
        // Narrow chases go deep; comfortable ones finish early.
        let spare = margin * 2 + rng.int_range(0, u32::from(BALLS_PER_OVER));
        let balls = u32::from(Overs::FULL.balls()).saturating_sub(spare).max(1);
        Innings {
            batting_team: second,
            runs: runs + margin,
            wickets,
            overs: Overs::from_balls(balls as u16),
        }
    } else {
        let (lo, hi) = params.defend_margin_runs;
        let shortfall = rng.int_range(lo, hi + 1).min(runs.saturating_sub(1)).max(1);
        Innings {
            batting_team: second,
            runs: runs - shortfall,
            wickets: wickets_in(rng, params.defend_wickets),
            overs: Overs::FULL,
        }
    };

    (first_innings, second_innings)
}

/// Uniform per-side scores adjusted so the predetermined winner wins.
fn fallback_scoreline<R: DrawSource>(
    rng: &mut R,
    (first, second): (TeamId, TeamId),
    chasing_wins: bool,
    params: &ScoringParams,
) -> (Innings, Innings) {
    let (lo, hi) = params.fallback_score;
    let a = rng.int_range(lo, hi);
    let b = rng.int_range(lo, hi);
    let (mut high, low) = (a.max(b), a.min(b));
    if high == low {
        high += 1;
    }

    let first_wickets = wickets_in(rng, (4, 10));
    let first_innings = Innings {
        batting_team: first,
        runs: if chasing_wins { low } else { high },
        wickets: first_wickets,
        overs: Overs::FULL,
    };

    let second_innings = if chasing_wins {
        let wickets = wickets_in(rng, (2, 9));
        let balls = rng.int_range(90, u32::from(Overs::FULL.balls()) + 1);
        Innings {
            batting_team: second,
            runs: high,
            wickets,
            overs: Overs::from_balls(balls as u16),
        }
    } else {
        let wickets = wickets_in(rng, (5, 11));
        let overs = if wickets >= MAX_WICKETS {
            overs_in(rng, (15, 20))
        } else {
            Overs::FULL
        };
        Innings {
            batting_team: second,
            runs: low,
            wickets,
            overs,
        }
    };

    (first_innings, second_innings)
}

fn wickets_in<R: DrawSource>(rng: &mut R, (lo, hi): (u32, u32)) -> u8 {
    rng.int_range(lo, hi).min(u32::from(MAX_WICKETS)) as u8
}

fn overs_in<R: DrawSource>(rng: &mut R, (lo, hi): (u32, u32)) -> Overs {
    let per_over = u32::from(BALLS_PER_OVER);
    let balls = rng.int_range(lo * per_over, hi * per_over);
    Overs::from_balls(balls as u16)
}

fn plural(n: u32, unit: &str) -> String {
    if n == 1 {
        format!("{n} {unit}")
    } else {
        format!("{n} {unit}s")
    }
}

// ---------------------------------------------------------------------------
// Applying a resolution
// ---------------------------------------------------------------------------

/// Build the completed version of `fixture` from a resolution, filling the
/// legacy scalar fields alongside the structured result.
pub fn complete_match(fixture: &Match, resolution: Resolution) -> Match {
    let mut done = fixture.clone();
    done.completed = true;
    match resolution {
        Resolution::NoResult => {
            done.no_result = true;
            done.winner_id = None;
            done.result = None;
            done.margin = Some("No result".to_string());
        }
        Resolution::Decided(result) => {
            done.no_result = false;
            done.winner_id = Some(result.winner);
            done.toss = Some(result.toss);
            done.home_score = result.innings_of(fixture.home_team_id).map(|i| i.runs);
            done.away_score = result.innings_of(fixture.away_team_id).map(|i| i.runs);
            done.margin = Some(result.margin.clone());
            done.result = Some(result);
        }
    }
    done
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
