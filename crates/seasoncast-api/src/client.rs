// HTTP client for the prediction backend.
//
// Thin JSON-over-HTTP wrapper: every response body is decoded into the raw
// DTO for its endpoint and then validated into domain types before it leaves
// this module.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use seasoncast_core::model::{Match, MatchPrediction, PlayerId, SeasonOutlook, TeamId, VenueId};

use crate::dto::{
    MatchPredictionRequest, PlayerProfile, RawMatch, RawMatchPrediction, RawPlayer,
    RawSeasonPrediction, RawTeam, SeasonSimulationRequest, TeamProfile,
};
use crate::error::ApiError;
use crate::PredictionService;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/v1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// ApiClient
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client for `base_url` (e.g. `http://localhost:8000/api/v1`)
    /// with a per-request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::Client)?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        debug!(%url, "GET");
        let request = self.http.get(&url).query(query);
        self.send(url, request).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        debug!(%url, "POST");
        let request = self.http.post(&url).json(body);
        self.send(url, request).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        url: String,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = match request.send().await {
            Ok(response) => response,
            Err(source) => return Err(ApiError::Transport { url, source }),
        };
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                url,
                status: status.as_u16(),
            });
        }
        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(source) => return Err(ApiError::Transport { url, source }),
        };
        serde_json::from_slice(&bytes).map_err(|source| ApiError::Decode { url, source })
    }
}

#[async_trait]
impl PredictionService for ApiClient {
    async fn predict_match(
        &self,
        home: TeamId,
        away: TeamId,
        venue: VenueId,
    ) -> Result<MatchPrediction, ApiError> {
        let body = MatchPredictionRequest {
            home_team_id: home,
            away_team_id: away,
            venue_id: venue,
        };
        let raw: RawMatchPrediction = self.post_json("/predictions/match", &body).await?;
        MatchPrediction::try_from(raw)
    }

    async fn predict_season(&self, num_simulations: u32) -> Result<SeasonOutlook, ApiError> {
        let body = SeasonSimulationRequest { num_simulations };
        let raw: RawSeasonPrediction = self.post_json("/predictions/season", &body).await?;
        SeasonOutlook::try_from(raw)
    }

    async fn season_matches(&self, season: u32) -> Result<Vec<Match>, ApiError> {
        let raw: Vec<RawMatch> = self
            .get_json("/matches", &[("season", season.to_string())])
            .await?;
        raw.into_iter().map(Match::try_from).collect()
    }

    async fn upcoming_matches(&self, season: u32, limit: u32) -> Result<Vec<Match>, ApiError> {
        let raw: Vec<RawMatch> = self
            .get_json(
                "/matches/upcoming",
                &[("season", season.to_string()), ("limit", limit.to_string())],
            )
            .await?;
        raw.into_iter().map(Match::try_from).collect()
    }

    async fn teams(&self) -> Result<Vec<TeamProfile>, ApiError> {
        let raw: Vec<RawTeam> = self.get_json("/teams", &[]).await?;
        raw.into_iter().map(TeamProfile::try_from).collect()
    }

    async fn team(&self, id: TeamId) -> Result<TeamProfile, ApiError> {
        let raw: RawTeam = self.get_json(&format!("/teams/{id}"), &[]).await?;
        TeamProfile::try_from(raw)
    }

    async fn player(&self, id: PlayerId) -> Result<PlayerProfile, ApiError> {
        let raw: RawPlayer = self.get_json(&format!("/players/{id}"), &[]).await?;
        Ok(PlayerProfile::from(raw))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
