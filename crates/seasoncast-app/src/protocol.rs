// Messages between the orchestrator and the front end.

use std::path::PathBuf;

use seasoncast_core::model::{
    Match, MatchId, PlayoffStage, PreMatchStage, SimulationPhase, Speed, Standing, TeamRef,
    TopPerformers,
};

/// Commands from the front end to the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserCommand {
    /// Load the season and start the show.
    Start,
    Play,
    Pause,
    TogglePlay,
    SetSpeed(Speed),
    /// Abandon the run and replay from the intro.
    Reset,
    Quit,
}

/// Updates pushed from the orchestrator to the front end.
#[derive(Debug, Clone, PartialEq)]
pub enum UiUpdate {
    PhaseChanged(SimulationPhase),
    FixturesLoaded {
        fixtures: usize,
        teams: usize,
    },
    /// Preparation for a fixture has started.
    MatchStarting {
        match_id: MatchId,
        title: String,
        stage: Option<PlayoffStage>,
    },
    /// The prediction arrived; `fallback` is set when it did not and the
    /// match is resolved without a cinematic.
    MatchPrepared {
        match_id: MatchId,
        home_win_probability: f64,
        fallback: bool,
    },
    PreMatch {
        match_id: MatchId,
        stage: PreMatchStage,
    },
    /// A fixture was completed.
    MatchResult(Box<Match>),
    StandingsUpdated {
        standings: Vec<Standing>,
        top_performers: TopPerformers,
    },
    Qualified(Vec<TeamRef>),
    Champion {
        champion: TeamRef,
        runner_up: Option<TeamRef>,
    },
    Playback {
        playing: bool,
        speed: Speed,
    },
    ReportWritten(PathBuf),
    Notice(String),
    Error(String),
    SeasonComplete,
}
