// Season data model: fixtures, results, standings, leaderboards, phases.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Backend team identifier.
    TeamId
);
id_type!(
    /// Backend venue identifier.
    VenueId
);
id_type!(
    /// Backend match identifier. Also the seed for all per-match draws.
    MatchId
);
id_type!(
    /// Backend player identifier.
    PlayerId
);

/// A team identity together with its display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRef {
    pub id: TeamId,
    pub name: String,
}

impl TeamRef {
    pub fn new(id: TeamId, name: impl Into<String>) -> Self {
        TeamRef {
            id,
            name: name.into(),
        }
    }
}

/// A pair of values keyed by home/away side.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PerSide<T> {
    pub home: T,
    pub away: T,
}

impl<T> PerSide<T> {
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        [&self.home, &self.away].into_iter()
    }
}

// ---------------------------------------------------------------------------
// Overs and innings
// ---------------------------------------------------------------------------

pub const BALLS_PER_OVER: u16 = 6;
pub const OVERS_PER_INNINGS: u16 = 20;
pub const BALLS_PER_INNINGS: u16 = BALLS_PER_OVER * OVERS_PER_INNINGS;
pub const MAX_WICKETS: u8 = 10;

/// Overs bowled in an innings, stored as a ball count so partial overs are
/// exact. Displays in cricket notation ("18.3" is 18 overs and 3 balls).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Overs(u16);

impl Overs {
    pub const FULL: Overs = Overs(BALLS_PER_INNINGS);

    /// Build from a ball count, capped at a full innings.
    pub fn from_balls(balls: u16) -> Self {
        Overs(balls.min(BALLS_PER_INNINGS))
    }

    pub fn balls(self) -> u16 {
        self.0
    }

    /// Overs as a decimal fraction (18.3 overs -> 18.5), used for run rates.
    pub fn as_decimal(self) -> f64 {
        f64::from(self.0) / f64::from(BALLS_PER_OVER)
    }
}

impl fmt::Display for Overs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let overs = self.0 / BALLS_PER_OVER;
        let balls = self.0 % BALLS_PER_OVER;
        if balls == 0 {
            write!(f, "{overs}")
        } else {
            write!(f, "{overs}.{balls}")
        }
    }
}

/// One side's batting innings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Innings {
    pub batting_team: TeamId,
    pub runs: u32,
    pub wickets: u8,
    pub overs: Overs,
}

impl Innings {
    pub fn is_all_out(&self) -> bool {
        self.wickets >= MAX_WICKETS
    }

    /// "165/7 (20)" style scoreline.
    pub fn scoreline(&self) -> String {
        if self.is_all_out() {
            format!("{} ({})", self.runs, self.overs)
        } else {
            format!("{}/{} ({})", self.runs, self.wickets, self.overs)
        }
    }
}

// ---------------------------------------------------------------------------
// Toss
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TossDecision {
    Bat,
    Bowl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TossOutcome {
    pub winner: TeamId,
    pub decision: TossDecision,
}

impl TossOutcome {
    /// Returns `(batting_first, batting_second)` for a fixture between
    /// `home` and `away`.
    pub fn batting_order(&self, home: TeamId, away: TeamId) -> (TeamId, TeamId) {
        let other = if self.winner == home { away } else { home };
        match self.decision {
            TossDecision::Bat => (self.winner, other),
            TossDecision::Bowl => (other, self.winner),
        }
    }
}

// ---------------------------------------------------------------------------
// Match results
// ---------------------------------------------------------------------------

/// Resolved outcome of a fixture. Created once when the match resolves and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub winner: TeamId,
    /// Human-readable margin, e.g. "23 runs" or "5 wickets".
    pub margin: String,
    pub first_innings: Innings,
    pub second_innings: Innings,
    pub toss: TossOutcome,
}

impl MatchResult {
    pub fn loser(&self) -> TeamId {
        if self.winner == self.first_innings.batting_team {
            self.second_innings.batting_team
        } else {
            self.first_innings.batting_team
        }
    }

    pub fn innings_of(&self, team: TeamId) -> Option<&Innings> {
        [&self.first_innings, &self.second_innings]
            .into_iter()
            .find(|i| i.batting_team == team)
    }

    /// True when the side batting second won.
    pub fn won_chasing(&self) -> bool {
        self.winner == self.second_innings.batting_team
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchType {
    #[serde(rename = "league")]
    League,
    #[serde(rename = "semifinal_1")]
    Semifinal1,
    #[serde(rename = "semifinal_2")]
    Semifinal2,
    #[serde(rename = "eliminator")]
    Eliminator,
    #[serde(rename = "final")]
    Final,
}

impl MatchType {
    pub fn is_league(self) -> bool {
        self == MatchType::League
    }

    pub fn label(self) -> &'static str {
        match self {
            MatchType::League => "League",
            MatchType::Semifinal1 => "Semi-final 1",
            MatchType::Semifinal2 => "Semi-final 2",
            MatchType::Eliminator => "Eliminator",
            MatchType::Final => "Final",
        }
    }
}

// ---------------------------------------------------------------------------
// Prediction payload
// ---------------------------------------------------------------------------

/// Predicted starting XI entry, optionally augmented with a portrait URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerLine {
    pub player_id: PlayerId,
    pub player_name: String,
    pub role: Option<String>,
    pub predicted_runs: f64,
    pub predicted_wickets: f64,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunScorer {
    pub player_id: PlayerId,
    pub player_name: String,
    pub predicted_runs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WicketTaker {
    pub player_id: PlayerId,
    pub player_name: String,
    pub predicted_wickets: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictedScores {
    pub home_score: u32,
    pub home_wickets: u8,
    pub away_score: u32,
    pub away_wickets: u8,
}

/// The validated slice of a backend match prediction the simulator uses.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MatchPrediction {
    /// Home win probability as a percentage in [0, 100].
    pub home_win_probability: f64,
    pub away_win_probability: f64,
    pub starting_xi: PerSide<Vec<PlayerLine>>,
    pub top_run_scorers: PerSide<Vec<RunScorer>>,
    pub top_wicket_takers: PerSide<Vec<WicketTaker>>,
    pub predicted_scores: Option<PredictedScores>,
}

impl MatchPrediction {
    pub fn has_lineups(&self) -> bool {
        !self.starting_xi.home.is_empty() || !self.starting_xi.away.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Match
// ---------------------------------------------------------------------------

/// One fixture. Mutated exactly twice: once when prepared (prediction and
/// toss attached) and once when resolved (result attached, `completed`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub home_team_id: TeamId,
    pub away_team_id: TeamId,
    pub venue_id: VenueId,
    pub home_team_name: String,
    pub away_team_name: String,
    pub venue_name: String,
    pub match_number: Option<u32>,
    pub match_date: Option<String>,
    pub match_type: MatchType,
    pub completed: bool,
    pub no_result: bool,
    pub winner_id: Option<TeamId>,
    pub result: Option<MatchResult>,
    pub prediction: Option<MatchPrediction>,
    pub toss: Option<TossOutcome>,
    pub home_win_probability: Option<f64>,
    // Legacy scalar fields, kept in sync with `result` for older consumers.
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
    pub margin: Option<String>,
}

impl Match {
    /// An unplayed league fixture.
    pub fn fixture(id: MatchId, home: TeamRef, away: TeamRef, venue_id: VenueId) -> Self {
        Match {
            id,
            home_team_id: home.id,
            away_team_id: away.id,
            venue_id,
            home_team_name: home.name,
            away_team_name: away.name,
            venue_name: String::new(),
            match_number: None,
            match_date: None,
            match_type: MatchType::League,
            completed: false,
            no_result: false,
            winner_id: None,
            result: None,
            prediction: None,
            toss: None,
            home_win_probability: None,
            home_score: None,
            away_score: None,
            margin: None,
        }
    }

    pub fn home(&self) -> TeamRef {
        TeamRef::new(self.home_team_id, self.home_team_name.clone())
    }

    pub fn away(&self) -> TeamRef {
        TeamRef::new(self.away_team_id, self.away_team_name.clone())
    }

    pub fn is_prepared(&self) -> bool {
        self.prediction.is_some()
    }

    pub fn involves(&self, team: TeamId) -> bool {
        self.home_team_id == team || self.away_team_id == team
    }

    pub fn team_name(&self, team: TeamId) -> Option<&str> {
        if team == self.home_team_id {
            Some(&self.home_team_name)
        } else if team == self.away_team_id {
            Some(&self.away_team_name)
        } else {
            None
        }
    }

    /// "Team A v Team B" label.
    pub fn title(&self) -> String {
        format!("{} v {}", self.home_team_name, self.away_team_name)
    }
}

// ---------------------------------------------------------------------------
// League table and leaderboards
// ---------------------------------------------------------------------------

/// One team's row in the league table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standing {
    pub team_id: TeamId,
    pub team_name: String,
    /// 1-based table position.
    pub position: usize,
    pub played: u32,
    pub wins: u32,
    pub losses: u32,
    pub no_result: u32,
    pub points: u32,
    pub net_run_rate: f64,
    pub runs_for: u32,
    pub balls_for: u32,
    pub runs_against: u32,
    pub balls_against: u32,
    pub playoff_probability: f64,
    pub championship_probability: f64,
}

impl Standing {
    pub fn team(&self) -> TeamRef {
        TeamRef::new(self.team_id, self.team_name.clone())
    }
}

/// Pre-season model outlook per team, merged into the table for display.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SeasonOutlook {
    pub playoff_probability: HashMap<TeamId, f64>,
    pub championship_probability: HashMap<TeamId, f64>,
}

/// A season leaderboard entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leader {
    pub player_id: PlayerId,
    pub player_name: String,
    pub runs: f64,
    pub wickets: f64,
    /// The value this leader was selected on (runs, wickets, or MVP score).
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TopPerformers {
    pub orange_cap: Option<Leader>,
    pub purple_cap: Option<Leader>,
    pub mvp: Option<Leader>,
}

// ---------------------------------------------------------------------------
// Phases and stages
// ---------------------------------------------------------------------------

/// Top-level state of the season show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SimulationPhase {
    Intro,
    FixtureReveal,
    League,
    Qualification,
    Playoffs,
    Final,
    Champion,
    Trophy,
    Rewind,
    Analytics,
}

impl SimulationPhase {
    pub const ORDER: [SimulationPhase; 10] = [
        SimulationPhase::Intro,
        SimulationPhase::FixtureReveal,
        SimulationPhase::League,
        SimulationPhase::Qualification,
        SimulationPhase::Playoffs,
        SimulationPhase::Final,
        SimulationPhase::Champion,
        SimulationPhase::Trophy,
        SimulationPhase::Rewind,
        SimulationPhase::Analytics,
    ];

    fn index(self) -> usize {
        Self::ORDER
            .iter()
            .position(|p| *p == self)
            .unwrap_or_default()
    }

    /// The phase that follows this one, or `None` for the terminal phase.
    pub fn next(self) -> Option<SimulationPhase> {
        Self::ORDER.get(self.index() + 1).copied()
    }

    /// Transitions are one step forward only. Returning to `Intro` is a
    /// reset and goes through a separate action.
    pub fn can_advance_to(self, target: SimulationPhase) -> bool {
        self.next() == Some(target)
    }

    pub fn is_terminal(self) -> bool {
        self == SimulationPhase::Analytics
    }
}

/// Scripted pre-match reveal, layered on top of the League/Playoffs phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PreMatchStage {
    Toss,
    LineupTeam1,
    LineupTeam2,
    Complete,
}

impl PreMatchStage {
    pub fn next(self) -> Option<PreMatchStage> {
        match self {
            PreMatchStage::Toss => Some(PreMatchStage::LineupTeam1),
            PreMatchStage::LineupTeam1 => Some(PreMatchStage::LineupTeam2),
            PreMatchStage::LineupTeam2 => Some(PreMatchStage::Complete),
            PreMatchStage::Complete => None,
        }
    }
}

/// Knockout fixtures after league play, in the order they are played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayoffStage {
    #[serde(rename = "semifinal_1")]
    Semifinal1,
    #[serde(rename = "semifinal_2")]
    Semifinal2,
    Eliminator,
    Final,
}

impl PlayoffStage {
    pub const ORDER: [PlayoffStage; 4] = [
        PlayoffStage::Semifinal1,
        PlayoffStage::Semifinal2,
        PlayoffStage::Eliminator,
        PlayoffStage::Final,
    ];

    pub fn match_type(self) -> MatchType {
        match self {
            PlayoffStage::Semifinal1 => MatchType::Semifinal1,
            PlayoffStage::Semifinal2 => MatchType::Semifinal2,
            PlayoffStage::Eliminator => MatchType::Eliminator,
            PlayoffStage::Final => MatchType::Final,
        }
    }

    pub fn from_match_type(match_type: MatchType) -> Option<PlayoffStage> {
        match match_type {
            MatchType::League => None,
            MatchType::Semifinal1 => Some(PlayoffStage::Semifinal1),
            MatchType::Semifinal2 => Some(PlayoffStage::Semifinal2),
            MatchType::Eliminator => Some(PlayoffStage::Eliminator),
            MatchType::Final => Some(PlayoffStage::Final),
        }
    }

    pub fn next(self) -> Option<PlayoffStage> {
        match self {
            PlayoffStage::Semifinal1 => Some(PlayoffStage::Semifinal2),
            PlayoffStage::Semifinal2 => Some(PlayoffStage::Eliminator),
            PlayoffStage::Eliminator => Some(PlayoffStage::Final),
            PlayoffStage::Final => None,
        }
    }

    pub fn label(self) -> &'static str {
        self.match_type().label()
    }
}

// ---------------------------------------------------------------------------
// Playback speed
// ---------------------------------------------------------------------------

/// User-selected playback multiplier. Every scripted duration is divided by
/// the factor before it is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Speed {
    #[default]
    X1,
    X2,
    X5,
    X10,
}

impl Speed {
    pub const ALL: [Speed; 4] = [Speed::X1, Speed::X2, Speed::X5, Speed::X10];

    pub fn factor(self) -> u32 {
        match self {
            Speed::X1 => 1,
            Speed::X2 => 2,
            Speed::X5 => 5,
            Speed::X10 => 10,
        }
    }

    pub fn from_factor(factor: u32) -> Option<Speed> {
        Self::ALL.into_iter().find(|s| s.factor() == factor)
    }

    pub fn scale(self, base: Duration) -> Duration {
        base / self.factor()
    }
}

impl TryFrom<u32> for Speed {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Speed::from_factor(value).ok_or_else(|| format!("unsupported speed {value}x (use 1, 2, 5 or 10)"))
    }
}

impl From<Speed> for u32 {
    fn from(speed: Speed) -> u32 {
        speed.factor()
    }
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.factor())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
