// Playoff bracket for the four qualified teams.
//
// Fixed single-elimination wiring:
//   SF1        = seed 1 v seed 2
//   SF2        = seed 3 v seed 4
//   Eliminator = SF1 loser v SF2 winner
//   Final      = SF1 winner v Eliminator winner

use thiserror::Error;

use crate::model::{
    Match, MatchId, MatchType, PlayoffStage, Standing, TeamId, TeamRef, VenueId,
};

pub const PLAYOFF_TEAMS: usize = 4;

#[derive(Debug, Error, PartialEq)]
pub enum BracketError {
    #[error("need {PLAYOFF_TEAMS} qualified teams, got {0}")]
    NotEnoughTeams(usize),

    #[error("result for {got:?} recorded out of order (expected {expected:?})")]
    OutOfOrder {
        expected: Option<PlayoffStage>,
        got: PlayoffStage,
    },

    #[error("team {team} is not playing in {stage:?}")]
    NotAParticipant { team: TeamId, stage: PlayoffStage },
}

/// Winner and loser of a decided knockout fixture.
#[derive(Debug, Clone, PartialEq)]
pub struct StageResult {
    pub winner: TeamRef,
    pub loser: TeamRef,
}

/// A knockout fixture: the higher-placed side is listed as home.
#[derive(Debug, Clone, PartialEq)]
pub struct Fixture {
    pub stage: PlayoffStage,
    pub home: TeamRef,
    pub away: TeamRef,
}

impl Fixture {
    /// Materialize the fixture as a schedulable match.
    pub fn to_match(&self, id: MatchId, venue_id: VenueId, venue_name: &str) -> Match {
        let mut m = Match::fixture(id, self.home.clone(), self.away.clone(), venue_id);
        m.match_type = self.stage.match_type();
        m.venue_name = venue_name.to_string();
        m
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayoffBracket {
    seeds: [TeamRef; PLAYOFF_TEAMS],
    semifinal_1: Option<StageResult>,
    semifinal_2: Option<StageResult>,
    eliminator: Option<StageResult>,
    final_: Option<StageResult>,
}

impl PlayoffBracket {
    pub fn new(seeds: [TeamRef; PLAYOFF_TEAMS]) -> Self {
        PlayoffBracket {
            seeds,
            semifinal_1: None,
            semifinal_2: None,
            eliminator: None,
            final_: None,
        }
    }

    /// Seed the bracket from the top four rows of a ranked table.
    pub fn qualify(table: &[Standing]) -> Result<Self, BracketError> {
        let top: Vec<TeamRef> = table.iter().take(PLAYOFF_TEAMS).map(Standing::team).collect();
        let seeds: [TeamRef; PLAYOFF_TEAMS] = top
            .try_into()
            .map_err(|v: Vec<TeamRef>| BracketError::NotEnoughTeams(v.len()))?;
        Ok(PlayoffBracket::new(seeds))
    }

    pub fn seeds(&self) -> &[TeamRef; PLAYOFF_TEAMS] {
        &self.seeds
    }

    fn slot(&self, stage: PlayoffStage) -> &Option<StageResult> {
        match stage {
            PlayoffStage::Semifinal1 => &self.semifinal_1,
            PlayoffStage::Semifinal2 => &self.semifinal_2,
            PlayoffStage::Eliminator => &self.eliminator,
            PlayoffStage::Final => &self.final_,
        }
    }

    pub fn result(&self, stage: PlayoffStage) -> Option<&StageResult> {
        self.slot(stage).as_ref()
    }

    /// The next stage awaiting a result.
    pub fn current_stage(&self) -> Option<PlayoffStage> {
        PlayoffStage::ORDER
            .into_iter()
            .find(|stage| self.slot(*stage).is_none())
    }

    /// Participants of `stage`, if the feeding results are known.
    pub fn fixture(&self, stage: PlayoffStage) -> Option<Fixture> {
        let (home, away) = match stage {
            PlayoffStage::Semifinal1 => (self.seeds[0].clone(), self.seeds[1].clone()),
            PlayoffStage::Semifinal2 => (self.seeds[2].clone(), self.seeds[3].clone()),
            PlayoffStage::Eliminator => (
                self.semifinal_1.as_ref()?.loser.clone(),
                self.semifinal_2.as_ref()?.winner.clone(),
            ),
            PlayoffStage::Final => (
                self.semifinal_1.as_ref()?.winner.clone(),
                self.eliminator.as_ref()?.winner.clone(),
            ),
        };
        Some(Fixture { stage, home, away })
    }

    pub fn next_fixture(&self) -> Option<Fixture> {
        self.current_stage().and_then(|stage| self.fixture(stage))
    }

    /// Record the winner of `stage`. Stages must be recorded in order.
    pub fn record(
        &mut self,
        stage: PlayoffStage,
        winner: TeamId,
    ) -> Result<&StageResult, BracketError> {
        let expected = self.current_stage();
        if expected != Some(stage) {
            return Err(BracketError::OutOfOrder {
                expected,
                got: stage,
            });
        }
        let fixture = self.fixture(stage).ok_or(BracketError::OutOfOrder {
            expected,
            got: stage,
        })?;
        let result = if fixture.home.id == winner {
            StageResult {
                winner: fixture.home,
                loser: fixture.away,
            }
        } else if fixture.away.id == winner {
            StageResult {
                winner: fixture.away,
                loser: fixture.home,
            }
        } else {
            return Err(BracketError::NotAParticipant {
                team: winner,
                stage,
            });
        };

        let slot = match stage {
            PlayoffStage::Semifinal1 => &mut self.semifinal_1,
            PlayoffStage::Semifinal2 => &mut self.semifinal_2,
            PlayoffStage::Eliminator => &mut self.eliminator,
            PlayoffStage::Final => &mut self.final_,
        };
        Ok(slot.insert(result))
    }

    pub fn champion(&self) -> Option<&TeamRef> {
        self.final_.as_ref().map(|r| &r.winner)
    }

    pub fn runner_up(&self) -> Option<&TeamRef> {
        self.final_.as_ref().map(|r| &r.loser)
    }

    pub fn is_complete(&self) -> bool {
        self.final_.is_some()
    }
}

/// Venue for a knockout fixture: the home ground of the higher seed, taken
/// from the first league fixture it hosted.
pub fn home_venue(matches: &[Match], team: TeamId) -> Option<(VenueId, String)> {
    matches
        .iter()
        .find(|m| m.match_type == MatchType::League && m.home_team_id == team)
        .map(|m| (m.venue_id, m.venue_name.clone()))
}

/// Id for the next knockout fixture: one past the largest known id.
pub fn next_match_id(matches: &[Match]) -> MatchId {
    MatchId(matches.iter().map(|m| m.id.0).max().unwrap_or(0) + 1)
}
