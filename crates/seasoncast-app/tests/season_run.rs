// Whole-season runs of the orchestrator against an in-memory backend, on a
// paused clock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use seasoncast_api::{ApiError, PlayerProfile, PredictionService, TeamProfile};
use seasoncast_app::app::{self, AppState};
use seasoncast_app::config::Config;
use seasoncast_app::protocol::{UiUpdate, UserCommand};
use seasoncast_core::model::{
    Match, MatchId, MatchPrediction, MatchType, PerSide, PlayerId, RunScorer, SeasonOutlook,
    SimulationPhase, Speed, TeamId, TeamRef, VenueId, WicketTaker,
};
use seasoncast_core::store::SeasonState;

const TEAMS: u32 = 6;
const LEAGUE_MATCHES: usize = 30;

// ---------------------------------------------------------------------------
// Fake backend
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Backend {
    predictions_down: AtomicBool,
}

fn team(id: u32) -> TeamRef {
    TeamRef::new(TeamId(id), format!("Team {id}"))
}

fn unavailable(url: &str) -> ApiError {
    ApiError::Status {
        url: url.to_string(),
        status: 503,
    }
}

#[async_trait]
impl PredictionService for Backend {
    async fn predict_match(
        &self,
        home: TeamId,
        away: TeamId,
        _venue: VenueId,
    ) -> Result<MatchPrediction, ApiError> {
        if self.predictions_down.load(Ordering::SeqCst) {
            return Err(unavailable("/predictions/match"));
        }
        // Lower ids are stronger.
        let p = 50.0 + 5.0 * (f64::from(away.0) - f64::from(home.0));
        let batter = |t: TeamId| RunScorer {
            player_id: PlayerId(t.0 * 100 + 1),
            player_name: format!("Opener {t}"),
            predicted_runs: 20.0 + f64::from(t.0),
        };
        let bowler = |t: TeamId| WicketTaker {
            player_id: PlayerId(t.0 * 100 + 11),
            player_name: format!("Quick {t}"),
            predicted_wickets: 1.5,
        };
        Ok(MatchPrediction {
            home_win_probability: p,
            away_win_probability: 100.0 - p,
            top_run_scorers: PerSide {
                home: vec![batter(home)],
                away: vec![batter(away)],
            },
            top_wicket_takers: PerSide {
                home: vec![bowler(home)],
                away: vec![bowler(away)],
            },
            ..MatchPrediction::default()
        })
    }

    async fn predict_season(&self, _n: u32) -> Result<SeasonOutlook, ApiError> {
        let mut outlook = SeasonOutlook::default();
        for id in 1..=TEAMS {
            outlook
                .playoff_probability
                .insert(TeamId(id), 100.0 - 10.0 * f64::from(id));
        }
        Ok(outlook)
    }

    async fn season_matches(&self, _season: u32) -> Result<Vec<Match>, ApiError> {
        let mut matches = Vec::new();
        for home in 1..=TEAMS {
            for away in 1..=TEAMS {
                if home != away {
                    let id = MatchId(matches.len() as u32 + 1);
                    let mut m = Match::fixture(id, team(home), team(away), VenueId(home));
                    m.venue_name = format!("Ground {home}");
                    matches.push(m);
                }
            }
        }
        Ok(matches)
    }

    async fn upcoming_matches(&self, _season: u32, _limit: u32) -> Result<Vec<Match>, ApiError> {
        Ok(Vec::new())
    }

    async fn teams(&self) -> Result<Vec<TeamProfile>, ApiError> {
        let mut teams = Vec::new();
        for id in 1..=TEAMS {
            teams.push(self.team(TeamId(id)).await?);
        }
        Ok(teams)
    }

    async fn team(&self, id: TeamId) -> Result<TeamProfile, ApiError> {
        Ok(TeamProfile {
            id,
            name: format!("Team {id}"),
            short_name: None,
            home_venue: Some(format!("Ground {id}")),
        })
    }

    async fn player(&self, id: PlayerId) -> Result<PlayerProfile, ApiError> {
        Ok(PlayerProfile {
            id,
            name: format!("Player {id}"),
            role: None,
            team_id: None,
            image_url: None,
        })
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Running {
    cmd_tx: mpsc::Sender<UserCommand>,
    states: watch::Receiver<Arc<SeasonState>>,
    ui: JoinHandle<Vec<UiUpdate>>,
    app: JoinHandle<anyhow::Result<()>>,
}

fn quiet_config() -> Config {
    let mut config = Config::default();
    config.report.enabled = false;
    config
}

fn launch(backend: Arc<Backend>, config: Config) -> Running {
    let (pipeline_tx, pipeline_rx) = mpsc::channel(64);
    let (timer_tx, timer_rx) = mpsc::channel(64);
    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (ui_tx, mut ui_rx) = mpsc::channel(256);

    let state = AppState::new(config, backend, pipeline_tx, timer_tx, ui_tx);
    let states = state.subscribe();
    let app = tokio::spawn(app::run(pipeline_rx, timer_rx, cmd_rx, state));
    let ui = tokio::spawn(async move {
        let mut seen = Vec::new();
        while let Some(update) = ui_rx.recv().await {
            seen.push(update);
        }
        seen
    });
    Running {
        cmd_tx,
        states,
        ui,
        app,
    }
}

impl Running {
    async fn send(&self, cmd: UserCommand) {
        self.cmd_tx.send(cmd).await.expect("app loop running");
    }

    async fn wait_for(&mut self, what: &str, f: impl FnMut(&Arc<SeasonState>) -> bool) -> Arc<SeasonState> {
        let waited = tokio::time::timeout(Duration::from_secs(4 * 3600), self.states.wait_for(f)).await;
        match waited {
            Ok(Ok(state)) => state.clone(),
            Ok(Err(_)) => panic!("store dropped while waiting for {what}"),
            Err(_) => panic!("timed out waiting for {what}"),
        }
    }

    async fn finish(self) -> Vec<UiUpdate> {
        self.send(UserCommand::Quit).await;
        self.app.await.unwrap().unwrap();
        self.ui.await.unwrap()
    }
}

/// Analytics reached and the closing bookkeeping finished.
fn is_done(s: &Arc<SeasonState>) -> bool {
    s.phase == SimulationPhase::Analytics && !s.is_playing
}

fn results(state: &SeasonState) -> HashMap<MatchId, (Option<TeamId>, Option<String>)> {
    state
        .matches
        .iter()
        .map(|m| (m.id, (m.winner_id, m.margin.clone())))
        .collect()
}

fn knockout(state: &SeasonState, match_type: MatchType) -> &Match {
    state
        .matches
        .iter()
        .find(|m| m.match_type == match_type)
        .unwrap_or_else(|| panic!("no {match_type:?} fixture"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn full_season_runs_to_analytics() {
    let report_dir = std::env::temp_dir().join("seasoncast_season_run_report");
    let _ = std::fs::remove_dir_all(&report_dir);
    let mut config = Config::default();
    config.report.dir = report_dir.to_string_lossy().into_owned();

    let mut run = launch(Arc::new(Backend::default()), config);
    run.send(UserCommand::Start).await;
    let state = run.wait_for("analytics", is_done).await;

    assert_eq!(state.matches.len(), LEAGUE_MATCHES + 4);
    assert!(state.matches.iter().all(|m| m.completed));
    assert_eq!(state.completed_league_matches(), LEAGUE_MATCHES);
    assert_eq!(state.current_match_index, LEAGUE_MATCHES);
    assert!(state.matches.iter().all(|m| m.id.0 as usize <= LEAGUE_MATCHES + 4));

    // Table consistency.
    assert_eq!(state.standings.len(), TEAMS as usize);
    let played: u32 = state.standings.iter().map(|s| s.played).sum();
    assert_eq!(played as usize, LEAGUE_MATCHES * 2);
    for s in &state.standings {
        assert_eq!(s.points, 2 * s.wins + s.no_result);
    }
    assert!((state.standings.iter().find(|s| s.team_id == TeamId(1)).unwrap().playoff_probability - 90.0).abs() < 1e-9);

    // Bracket wiring.
    let seeds: Vec<TeamId> = state.qualified_teams.iter().map(|t| t.id).collect();
    let top4: Vec<TeamId> = state.standings.iter().take(4).map(|s| s.team_id).collect();
    assert_eq!(seeds, top4);
    let sf1 = knockout(&state, MatchType::Semifinal1);
    let sf2 = knockout(&state, MatchType::Semifinal2);
    let elim = knockout(&state, MatchType::Eliminator);
    let fin = knockout(&state, MatchType::Final);
    assert_eq!((sf1.home_team_id, sf1.away_team_id), (seeds[0], seeds[1]));
    assert_eq!((sf2.home_team_id, sf2.away_team_id), (seeds[2], seeds[3]));
    assert_eq!(sf1.venue_id, VenueId(seeds[0].0));
    for m in [sf1, sf2, elim, fin] {
        assert!(!m.no_result && m.winner_id.is_some(), "{} undecided", m.title());
    }
    assert_eq!(
        state.semifinal_1_winner.as_ref().map(|t| t.id),
        sf1.winner_id
    );
    let sf1_loser = state.semifinal_1_loser.as_ref().unwrap().id;
    assert_eq!((elim.home_team_id, elim.away_team_id), (sf1_loser, sf2.winner_id.unwrap()));
    assert_eq!(fin.home_team_id, sf1.winner_id.unwrap());
    assert_eq!(Some(fin.away_team_id), elim.winner_id);
    assert_eq!(state.champion.as_ref().map(|t| t.id), fin.winner_id);
    assert!(state.runner_up.is_some());

    // Leaders come from the predicted top performers.
    let orange = state.top_performers.orange_cap.as_ref().unwrap();
    assert!(orange.runs > 0.0);
    assert!(state.top_performers.purple_cap.is_some());
    assert!(state.top_performers.mvp.is_some());

    // Every match carries the toss committed during preparation.
    assert!(state.matches.iter().all(|m| m.prediction.is_some() && m.toss.is_some()));
    assert!(
        state.matches.iter().filter(|m| !m.no_result).all(|m| m.result.as_ref().map(|r| r.toss) == m.toss)
    );

    assert!(!state.is_playing);
    let updates = run.finish().await;
    assert!(updates.contains(&UiUpdate::SeasonComplete));
    let report = updates
        .iter()
        .find_map(|u| match u {
            UiUpdate::ReportWritten(path) => Some(path.clone()),
            _ => None,
        })
        .expect("report written");
    assert!(report.join("standings.csv").exists());
    assert!(report.join("leaders.csv").exists());
    assert!(report.join("season.json").exists());
    let _ = std::fs::remove_dir_all(&report_dir);
}

#[tokio::test(start_paused = true)]
async fn speed_divides_every_delay() {
    let mut config = quiet_config();
    config.playback.speed = Speed::X10;
    let mut run = launch(Arc::new(Backend::default()), config);

    let start = Instant::now();
    run.send(UserCommand::Start).await;
    let state = run.wait_for("analytics", is_done).await;
    let elapsed = start.elapsed();
    assert_eq!(state.speed, Speed::X10);

    // 1x script: 4s reveal, 16s per match over 34 matches, 5s qualification
    // and 19s of closing scenes.
    let expected = Duration::from_millis((4000 + 34 * 16_000 + 5000 + 19_000) / 10);
    assert!(
        elapsed >= expected && elapsed < expected + Duration::from_secs(1),
        "elapsed {elapsed:?}, expected about {expected:?}"
    );
    run.finish().await;
}

#[tokio::test(start_paused = true)]
async fn pause_holds_the_show_until_resumed() {
    let mut run = launch(Arc::new(Backend::default()), quiet_config());
    run.send(UserCommand::Start).await;
    run.wait_for("first result", |s| s.completed_league_matches() >= 2)
        .await;

    run.send(UserCommand::Pause).await;
    let paused = run.wait_for("pause", |s| !s.is_playing).await;
    let completed = paused.completed_league_matches();

    tokio::time::sleep(Duration::from_secs(3600)).await;
    let still = run.states.borrow().clone();
    assert_eq!(still.completed_league_matches(), completed);
    assert_eq!(still.phase, SimulationPhase::League);

    run.send(UserCommand::TogglePlay).await;
    let state = run.wait_for("analytics", is_done).await;
    assert!(state.champion.is_some());
    run.finish().await;
}

/// Pause while a preparation is in flight and check that nothing moves
/// until the show resumes.
async fn pause_mid_preparation(predictions_down: bool) {
    let backend = Arc::new(Backend::default());
    backend
        .predictions_down
        .store(predictions_down, Ordering::SeqCst);
    let mut run = launch(backend, quiet_config());
    run.send(UserCommand::Start).await;
    run.wait_for("a preparation", |s| s.is_preparing_match).await;

    run.send(UserCommand::Pause).await;
    let paused = run.wait_for("pause", |s| !s.is_playing).await;

    tokio::time::sleep(Duration::from_secs(3600)).await;
    let still = run.states.borrow().clone();
    assert_eq!(still.completed_league_matches(), paused.completed_league_matches());
    assert_eq!(still.current_match_index, paused.current_match_index);
    assert_eq!(still.pre_match_stage, paused.pre_match_stage);
    assert_eq!(still.show_pre_match, paused.show_pre_match);
    assert_eq!(still.phase, SimulationPhase::League);

    run.send(UserCommand::Play).await;
    let state = run.wait_for("analytics", is_done).await;
    assert!(state.champion.is_some());
    run.finish().await;
}

#[tokio::test(start_paused = true)]
async fn pause_during_preparation_holds_the_reveal() {
    pause_mid_preparation(false).await;
}

#[tokio::test(start_paused = true)]
async fn pause_during_fallback_preparation_holds_the_result() {
    pause_mid_preparation(true).await;
}

#[tokio::test(start_paused = true)]
async fn reset_replays_the_same_season() {
    let mut reference = launch(Arc::new(Backend::default()), quiet_config());
    reference.send(UserCommand::Start).await;
    let expected = reference.wait_for("analytics", is_done).await;
    reference.finish().await;

    let mut run = launch(Arc::new(Backend::default()), quiet_config());
    run.send(UserCommand::SetSpeed(Speed::X2)).await;
    run.send(UserCommand::Start).await;
    run.wait_for("some results", |s| s.completed_league_matches() >= 5)
        .await;

    run.send(UserCommand::Reset).await;
    let reset = run
        .wait_for("reset", |s| {
            s.phase == SimulationPhase::Intro && !s.matches.is_empty() && s.matches.iter().all(|m| !m.completed)
        })
        .await;
    assert_eq!(reset.matches.len(), LEAGUE_MATCHES);
    assert_eq!(reset.speed, Speed::X2);
    assert!(reset.standings.iter().all(|s| s.points == 0));
    assert!(reset.champion.is_none());

    run.send(UserCommand::Start).await;
    let replay = run.wait_for("analytics", is_done).await;

    assert_eq!(results(&replay), results(&expected));
    assert_eq!(replay.champion, expected.champion);
    run.finish().await;
}

#[tokio::test(start_paused = true)]
async fn prediction_outage_falls_back_and_still_crowns_a_champion() {
    let backend = Arc::new(Backend::default());
    backend.predictions_down.store(true, Ordering::SeqCst);
    let mut run = launch(backend, quiet_config());
    run.send(UserCommand::Start).await;
    let state = run.wait_for("analytics", is_done).await;

    assert_eq!(state.matches.len(), LEAGUE_MATCHES + 4);
    assert!(state.matches.iter().all(|m| m.completed && m.prediction.is_none()));
    assert!(state.top_performers.orange_cap.is_none());
    assert!(state.champion.is_some());

    let updates = run.finish().await;
    let fallbacks = updates
        .iter()
        .filter(|u| matches!(u, UiUpdate::MatchPrepared { fallback: true, .. }))
        .count();
    assert_eq!(fallbacks, LEAGUE_MATCHES + 4);
}
