// Match preparation and season loading.
//
// Runs on spawned tasks and reports back to the orchestrator through the
// pipeline channel. Nothing here touches season state.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use seasoncast_api::{ApiError, PredictionService, TeamProfile};
use seasoncast_core::model::{
    Match, MatchId, PlayerId, PlayerLine, SeasonOutlook, TeamId, TeamRef,
};
use seasoncast_core::resolve::{toss_for, ScoringContext};

use crate::config::Config;

/// Fixture cap when falling back to the upcoming-matches endpoint.
pub const UPCOMING_LIMIT: u32 = 100;

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// A fixture with prediction, toss and win probability attached.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedMatch {
    pub fixture: Match,
    /// `None` when a team lookup failed; resolution then uses the fallback
    /// scoreline.
    pub context: Option<ScoringContext>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeasonData {
    pub matches: Vec<Match>,
    pub teams: Vec<TeamRef>,
    pub outlook: SeasonOutlook,
}

#[derive(Debug)]
pub enum PipelineEvent {
    SeasonLoaded {
        generation: u64,
        result: Result<SeasonData, ApiError>,
    },
    Prepared {
        match_id: MatchId,
        generation: u64,
        outcome: Result<PreparedMatch, ApiError>,
    },
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct Pipeline {
    service: Arc<dyn PredictionService>,
    image_timeout: Duration,
    /// Venue averages and the scoring default come from here.
    config: Config,
    /// Resolved portraits by player; `None` means the player has no image.
    images: Mutex<HashMap<PlayerId, Option<String>>>,
    teams: Mutex<HashMap<TeamId, TeamProfile>>,
}

impl Pipeline {
    pub fn new(service: Arc<dyn PredictionService>, config: &Config) -> Self {
        Pipeline {
            service,
            image_timeout: config.api.image_timeout(),
            config: config.clone(),
            images: Mutex::new(HashMap::new()),
            teams: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch the season's fixtures, the team list and, when
    /// `outlook_simulations` is set, the pre-season outlook.
    ///
    /// Only the fixture fetch is fatal. The team list falls back to the
    /// teams named in the fixtures and the outlook to empty maps.
    pub async fn load_season(
        &self,
        season: u32,
        outlook_simulations: Option<u32>,
    ) -> Result<SeasonData, ApiError> {
        let mut matches = self.service.season_matches(season).await?;
        if matches.is_empty() {
            info!(season, "no season fixtures listed, trying upcoming matches");
            matches = self.service.upcoming_matches(season, UPCOMING_LIMIT).await?;
        }
        // The backend may report results for past games; the show replays
        // the whole season from scratch.
        let matches: Vec<Match> = matches
            .into_iter()
            .map(|m| {
                let mut fixture = Match::fixture(m.id, m.home(), m.away(), m.venue_id);
                fixture.venue_name = m.venue_name;
                fixture.match_number = m.match_number;
                fixture.match_date = m.match_date;
                fixture.match_type = m.match_type;
                fixture
            })
            .collect();

        let teams = match self.service.teams().await {
            Ok(profiles) => {
                let mut cache = self.teams.lock().await;
                for p in &profiles {
                    cache.insert(p.id, p.clone());
                }
                profiles.iter().map(TeamProfile::team_ref).collect()
            }
            Err(e) => {
                warn!("team list unavailable, deriving teams from fixtures: {e}");
                teams_from_fixtures(&matches)
            }
        };

        let outlook = match outlook_simulations {
            Some(n) => match self.service.predict_season(n).await {
                Ok(outlook) => outlook,
                Err(e) => {
                    warn!("season outlook unavailable: {e}");
                    SeasonOutlook::default()
                }
            },
            None => SeasonOutlook::default(),
        };

        info!(
            season,
            fixtures = matches.len(),
            teams = teams.len(),
            "season loaded"
        );
        Ok(SeasonData {
            matches,
            teams,
            outlook,
        })
    }

    /// Prepare one fixture for its pre-match reveal.
    ///
    /// A prediction failure is returned as an error. Portrait and team
    /// lookups are best effort.
    pub async fn prepare(&self, fixture: &Match) -> Result<PreparedMatch, ApiError> {
        let mut prediction = self
            .service
            .predict_match(fixture.home_team_id, fixture.away_team_id, fixture.venue_id)
            .await?;

        let toss = toss_for(fixture.id, fixture.home_team_id, fixture.away_team_id);

        self.resolve_images(&mut prediction.starting_xi.home).await;
        self.resolve_images(&mut prediction.starting_xi.away).await;

        let context = self.scoring_context(fixture).await;

        let mut prepared = fixture.clone();
        prepared.home_win_probability = Some(prediction.home_win_probability);
        prepared.prediction = Some(prediction);
        prepared.toss = Some(toss);
        debug!(match_id = %fixture.id, has_context = context.is_some(), "match prepared");
        Ok(PreparedMatch {
            fixture: prepared,
            context,
        })
    }

    /// Fill missing portraits from `GET /players/{id}`, concurrently and
    /// each within the image timeout. Failures leave the line untouched.
    async fn resolve_images(&self, lineup: &mut [PlayerLine]) {
        let wanted: Vec<PlayerId> = {
            let cache = self.images.lock().await;
            let mut seen = HashSet::new();
            lineup
                .iter()
                .filter(|line| line.image_url.is_none())
                .map(|line| line.player_id)
                .filter(|id| !cache.contains_key(id) && seen.insert(*id))
                .collect()
        };

        if !wanted.is_empty() {
            let lookups = wanted.iter().map(|id| {
                let service = Arc::clone(&self.service);
                let id = *id;
                let budget = self.image_timeout;
                async move { (id, tokio::time::timeout(budget, service.player(id)).await) }
            });
            let results = join_all(lookups).await;

            let mut cache = self.images.lock().await;
            for (id, result) in results {
                match result {
                    Ok(Ok(profile)) => {
                        cache.insert(id, profile.image_url);
                    }
                    Ok(Err(e)) => debug!(player_id = %id, "portrait lookup failed: {e}"),
                    Err(_) => debug!(player_id = %id, "portrait lookup timed out"),
                }
            }
        }

        let cache = self.images.lock().await;
        for line in lineup.iter_mut().filter(|l| l.image_url.is_none()) {
            if let Some(Some(url)) = cache.get(&line.player_id) {
                line.image_url = Some(url.clone());
            }
        }
    }

    async fn team(&self, id: TeamId) -> Result<TeamProfile, ApiError> {
        if let Some(profile) = self.teams.lock().await.get(&id) {
            return Ok(profile.clone());
        }
        let profile = self.service.team(id).await?;
        self.teams.lock().await.insert(id, profile.clone());
        Ok(profile)
    }

    async fn scoring_context(&self, fixture: &Match) -> Option<ScoringContext> {
        for id in [fixture.home_team_id, fixture.away_team_id] {
            if let Err(e) = self.team(id).await {
                warn!(match_id = %fixture.id, team_id = %id, "team lookup failed, using fallback scoreline: {e}");
                return None;
            }
        }
        Some(ScoringContext {
            venue_avg_score: self.config.venue_avg_score(fixture.venue_id),
        })
    }
}

/// Distinct teams in fixture order of first appearance.
pub fn teams_from_fixtures(matches: &[Match]) -> Vec<TeamRef> {
    let mut seen = HashSet::new();
    let mut teams = Vec::new();
    for m in matches {
        for team in [m.home(), m.away()] {
            if seen.insert(team.id) {
                teams.push(team);
            }
        }
    }
    teams
}

// ---------------------------------------------------------------------------
// Task helpers
// ---------------------------------------------------------------------------

pub fn spawn_load(
    pipeline: Arc<Pipeline>,
    season: u32,
    outlook_simulations: Option<u32>,
    generation: u64,
    tx: mpsc::Sender<PipelineEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let result = pipeline.load_season(season, outlook_simulations).await;
        let _ = tx
            .send(PipelineEvent::SeasonLoaded { generation, result })
            .await;
    })
}

pub fn spawn_prepare(
    pipeline: Arc<Pipeline>,
    fixture: Match,
    generation: u64,
    tx: mpsc::Sender<PipelineEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let outcome = pipeline.prepare(&fixture).await;
        let _ = tx
            .send(PipelineEvent::Prepared {
                match_id: fixture.id,
                generation,
                outcome,
            })
            .await;
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
