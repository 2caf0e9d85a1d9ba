pub mod client;
pub mod dto;
pub mod error;

use async_trait::async_trait;

use seasoncast_core::model::{Match, MatchPrediction, PlayerId, SeasonOutlook, TeamId, VenueId};

pub use client::ApiClient;
pub use dto::{PlayerProfile, TeamProfile};
pub use error::ApiError;

/// The prediction backend as seen by the simulator.
///
/// Implemented by [`ApiClient`] over HTTP and by in-memory fakes in tests.
#[async_trait]
pub trait PredictionService: Send + Sync {
    /// `POST /predictions/match`
    async fn predict_match(
        &self,
        home: TeamId,
        away: TeamId,
        venue: VenueId,
    ) -> Result<MatchPrediction, ApiError>;

    /// `POST /predictions/season`
    async fn predict_season(&self, num_simulations: u32) -> Result<SeasonOutlook, ApiError>;

    /// `GET /matches?season=`
    async fn season_matches(&self, season: u32) -> Result<Vec<Match>, ApiError>;

    /// `GET /matches/upcoming?season=&limit=`
    async fn upcoming_matches(&self, season: u32, limit: u32) -> Result<Vec<Match>, ApiError>;

    /// `GET /teams`
    async fn teams(&self) -> Result<Vec<TeamProfile>, ApiError>;

    /// `GET /teams/{id}`
    async fn team(&self, id: TeamId) -> Result<TeamProfile, ApiError>;

    /// `GET /players/{id}`
    async fn player(&self, id: PlayerId) -> Result<PlayerProfile, ApiError>;
}
