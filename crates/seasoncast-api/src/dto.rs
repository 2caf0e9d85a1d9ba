// Wire types for the prediction backend.
//
// `Raw*` structs mirror the backend JSON exactly and are only ever consumed
// through the `TryFrom` conversions below, which validate on read and hand
// the rest of the system strongly typed domain values. Missing optional
// sub-fields (lineups, top scorers) degrade to empty collections; only the
// fields the simulator cannot do without are hard errors.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use seasoncast_core::model::{
    Match, MatchId, MatchPrediction, MatchType, PerSide, PlayerId, PlayerLine, PredictedScores,
    RunScorer, SeasonOutlook, TeamId, TeamRef, VenueId, WicketTaker,
};

use crate::error::ApiError;

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchPredictionRequest {
    pub home_team_id: TeamId,
    pub away_team_id: TeamId,
    pub venue_id: VenueId,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonSimulationRequest {
    pub num_simulations: u32,
}

// ---------------------------------------------------------------------------
// Match prediction
// ---------------------------------------------------------------------------

/// A `{home: [...], away: [...]}` map where either side may be absent or null.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSides<T> {
    pub home: Option<Vec<T>>,
    pub away: Option<Vec<T>>,
}

impl<T> Default for RawSides<T> {
    fn default() -> Self {
        RawSides {
            home: None,
            away: None,
        }
    }
}

impl<T> RawSides<T> {
    fn convert<U>(self, f: impl Fn(T) -> Option<U>) -> PerSide<Vec<U>> {
        let side = |v: Option<Vec<T>>| -> Vec<U> {
            v.unwrap_or_default().into_iter().filter_map(&f).collect()
        };
        PerSide {
            home: side(self.home),
            away: side(self.away),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawStartingPlayer {
    pub player_id: u32,
    pub player_name: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub predicted_runs: Option<f64>,
    #[serde(default)]
    pub predicted_wickets: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawRunScorer {
    pub player_id: u32,
    pub player_name: String,
    #[serde(default)]
    pub predicted_runs: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawWicketTaker {
    pub player_id: u32,
    pub player_name: String,
    #[serde(default)]
    pub predicted_wickets: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPredictedScores {
    pub home_score: u32,
    pub home_wickets: u8,
    pub away_score: u32,
    pub away_wickets: u8,
}

/// Response of `POST /predictions/match`. Fields the simulator does not use
/// (key factors, man of the match, the backend's toss and result guesses) are
/// not modelled; the toss always comes from the match-seeded LCG.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMatchPrediction {
    pub home_win_probability: f64,
    #[serde(default)]
    pub away_win_probability: Option<f64>,
    #[serde(default)]
    pub predicted_scores: Option<RawPredictedScores>,
    #[serde(default)]
    pub predicted_starting_xi: RawSides<RawStartingPlayer>,
    #[serde(default)]
    pub top_3_run_scorers: RawSides<RawRunScorer>,
    #[serde(default)]
    pub top_3_wicket_takers: RawSides<RawWicketTaker>,
}

/// Non-negative finite stat, or `None` so the entry is dropped.
fn stat(field: &str, value: Option<f64>) -> Option<f64> {
    match value {
        None => Some(0.0),
        Some(v) if v.is_finite() && v >= 0.0 => Some(v),
        Some(v) => {
            warn!(field, value = v, "dropping player entry with invalid stat");
            None
        }
    }
}

/// Normalize a home/away probability pair to percentages. The backend has
/// served both fractions and percentages. A pair is read as fractions when
/// both sides are within [0, 1] and sum to 1. A lone home value is a fraction
/// only when strictly below 1, so `1.0` on its own means 1%.
pub fn normalize_win_probability(home: f64, away: Option<f64>) -> Result<(f64, f64), ApiError> {
    if !home.is_finite() {
        return Err(ApiError::invalid("home_win_probability", "not a finite number"));
    }
    if let Some(away) = away {
        if !away.is_finite() {
            return Err(ApiError::invalid("away_win_probability", "not a finite number"));
        }
    }
    let is_fraction = match away {
        Some(a) => home <= 1.0 && a <= 1.0 && (home + a - 1.0).abs() < 1e-6,
        None => home < 1.0,
    };
    let (home, away) = if is_fraction {
        (home * 100.0, away.map(|a| a * 100.0))
    } else {
        (home, away)
    };
    if !(0.0..=100.0).contains(&home) {
        return Err(ApiError::invalid(
            "home_win_probability",
            format!("{home} is outside [0, 100]"),
        ));
    }
    let away = away.unwrap_or(100.0 - home);
    if !(0.0..=100.0).contains(&away) {
        return Err(ApiError::invalid(
            "away_win_probability",
            format!("{away} is outside [0, 100]"),
        ));
    }
    Ok((home, away))
}

impl TryFrom<RawMatchPrediction> for MatchPrediction {
    type Error = ApiError;

    fn try_from(raw: RawMatchPrediction) -> Result<Self, Self::Error> {
        let (home_win_probability, away_win_probability) =
            normalize_win_probability(raw.home_win_probability, raw.away_win_probability)?;

        let starting_xi = raw.predicted_starting_xi.convert(|p| {
            Some(PlayerLine {
                player_id: PlayerId(p.player_id),
                player_name: p.player_name,
                role: p.role,
                predicted_runs: stat("predicted_runs", p.predicted_runs)?,
                predicted_wickets: stat("predicted_wickets", p.predicted_wickets)?,
                image_url: None,
            })
        });
        let top_run_scorers = raw.top_3_run_scorers.convert(|p| {
            Some(RunScorer {
                player_id: PlayerId(p.player_id),
                player_name: p.player_name,
                predicted_runs: stat("predicted_runs", p.predicted_runs)?,
            })
        });
        let top_wicket_takers = raw.top_3_wicket_takers.convert(|p| {
            Some(WicketTaker {
                player_id: PlayerId(p.player_id),
                player_name: p.player_name,
                predicted_wickets: stat("predicted_wickets", p.predicted_wickets)?,
            })
        });
        let predicted_scores = raw.predicted_scores.map(|s| PredictedScores {
            home_score: s.home_score,
            home_wickets: s.home_wickets,
            away_score: s.away_score,
            away_wickets: s.away_wickets,
        });

        Ok(MatchPrediction {
            home_win_probability,
            away_win_probability,
            starting_xi,
            top_run_scorers,
            top_wicket_takers,
            predicted_scores,
        })
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct RawMatch {
    pub id: u32,
    pub home_team_id: u32,
    pub away_team_id: u32,
    pub venue_id: u32,
    #[serde(default)]
    pub match_date: Option<String>,
    #[serde(default)]
    pub season: Option<u32>,
    #[serde(default)]
    pub match_number: Option<u32>,
    #[serde(default)]
    pub home_team_name: Option<String>,
    #[serde(default)]
    pub away_team_name: Option<String>,
    #[serde(default)]
    pub venue_name: Option<String>,
    #[serde(default)]
    pub match_type: Option<MatchType>,
}

/// Backend fixtures arrive as an unplayed schedule; any historical result
/// fields are ignored because the simulator replays the season itself.
impl TryFrom<RawMatch> for Match {
    type Error = ApiError;

    fn try_from(raw: RawMatch) -> Result<Self, Self::Error> {
        if raw.home_team_id == raw.away_team_id {
            return Err(ApiError::invalid(
                "away_team_id",
                format!("match {} has the same team on both sides", raw.id),
            ));
        }
        let name = |n: Option<String>, id: u32| {
            n.filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| format!("Team {id}"))
        };
        let home = TeamRef::new(TeamId(raw.home_team_id), name(raw.home_team_name, raw.home_team_id));
        let away = TeamRef::new(TeamId(raw.away_team_id), name(raw.away_team_name, raw.away_team_id));
        let mut m = Match::fixture(MatchId(raw.id), home, away, VenueId(raw.venue_id));
        m.venue_name = raw.venue_name.unwrap_or_default();
        m.match_number = raw.match_number;
        m.match_date = raw.match_date;
        m.match_type = raw.match_type.unwrap_or(MatchType::League);
        Ok(m)
    }
}

// ---------------------------------------------------------------------------
// Teams and players
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct RawTeam {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub home_venue: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamProfile {
    pub id: TeamId,
    pub name: String,
    pub short_name: Option<String>,
    pub home_venue: Option<String>,
}

impl TeamProfile {
    pub fn team_ref(&self) -> TeamRef {
        TeamRef::new(self.id, self.name.clone())
    }
}

impl TryFrom<RawTeam> for TeamProfile {
    type Error = ApiError;

    fn try_from(raw: RawTeam) -> Result<Self, Self::Error> {
        if raw.name.trim().is_empty() {
            return Err(ApiError::invalid("name", format!("team {} has no name", raw.id)));
        }
        Ok(TeamProfile {
            id: TeamId(raw.id),
            name: raw.name,
            short_name: raw.short_name,
            home_venue: raw.home_venue.or(raw.city),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPlayer {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub team_id: Option<u32>,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub id: PlayerId,
    pub name: String,
    pub role: Option<String>,
    pub team_id: Option<TeamId>,
    pub image_url: Option<String>,
}

impl From<RawPlayer> for PlayerProfile {
    fn from(raw: RawPlayer) -> Self {
        PlayerProfile {
            id: PlayerId(raw.id),
            name: raw.name,
            role: raw.role,
            team_id: raw.team_id.map(TeamId),
            image_url: raw.image_url.filter(|u| !u.trim().is_empty()),
        }
    }
}

// ---------------------------------------------------------------------------
// Season prediction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct RawSeasonStanding {
    pub team_id: u32,
    #[serde(default)]
    pub playoff_probability: Option<f64>,
    #[serde(default)]
    pub championship_probability: Option<f64>,
}

/// Response of `POST /predictions/season`. Only the per-team probabilities
/// are consumed.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSeasonPrediction {
    #[serde(default)]
    pub predicted_standings: Vec<RawSeasonStanding>,
    /// JSON object keys are team ids rendered as strings.
    #[serde(default)]
    pub playoff_probabilities: HashMap<String, f64>,
    #[serde(default)]
    pub championship_probabilities: HashMap<String, f64>,
    #[serde(default)]
    pub num_simulations: Option<u32>,
}

fn collect_probabilities(
    field: &str,
    rows: impl Iterator<Item = (u32, Option<f64>)>,
    fallback: HashMap<String, f64>,
) -> Result<HashMap<TeamId, f64>, ApiError> {
    let mut out: HashMap<TeamId, f64> = rows
        .filter_map(|(id, p)| p.map(|p| (TeamId(id), p)))
        .collect();
    for (key, p) in fallback {
        match key.parse::<u32>() {
            Ok(id) => {
                out.entry(TeamId(id)).or_insert(p);
            }
            Err(_) => warn!(field, key = %key, "ignoring non-numeric team key"),
        }
    }
    if let Some((team, p)) = out.iter().find(|(_, p)| !p.is_finite() || **p < 0.0) {
        return Err(ApiError::invalid(field, format!("team {team}: {p}")));
    }
    // Fractions are scaled to percentages, matching match predictions.
    if out.values().all(|p| *p <= 1.0) {
        out.values_mut().for_each(|p| *p *= 100.0);
    }
    if let Some((team, p)) = out.iter().find(|(_, p)| **p > 100.0) {
        return Err(ApiError::invalid(field, format!("team {team}: {p} exceeds 100")));
    }
    Ok(out)
}

impl TryFrom<RawSeasonPrediction> for SeasonOutlook {
    type Error = ApiError;

    fn try_from(raw: RawSeasonPrediction) -> Result<Self, Self::Error> {
        let playoff_probability = collect_probabilities(
            "playoff_probability",
            raw.predicted_standings
                .iter()
                .map(|s| (s.team_id, s.playoff_probability)),
            raw.playoff_probabilities,
        )?;
        let championship_probability = collect_probabilities(
            "championship_probability",
            raw.predicted_standings
                .iter()
                .map(|s| (s.team_id, s.championship_probability)),
            raw.championship_probabilities,
        )?;
        Ok(SeasonOutlook {
            playoff_probability,
            championship_probability,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
