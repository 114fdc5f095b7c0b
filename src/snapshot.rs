use crate::clock::ClockState;
use serde::Deserialize;

/// One team's slice of a snapshot, as decomposed by the aggregate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeamData {
    pub score: u32,
    pub team_fouls: u32,
    pub timeout_requested: bool,
    pub foul_warning: bool,
    pub label: Option<String>,
}

/// The whole-state snapshot pushed by the controller on the data stream.
///
/// Values present in the payload are authoritative, zero and false
/// included; the optional booleans default to false for remotes that omit
/// them. Structurally absent members (`stoppage_clock` on a two-clock
/// controller, `period`, `match_title`) leave the prior state in place.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GameData {
    pub home_score: u32,
    pub away_score: u32,
    pub home_tf: u32,
    pub away_tf: u32,
    #[serde(default)]
    pub home_team_timeout: bool,
    #[serde(default)]
    pub away_team_timeout: bool,
    #[serde(default)]
    pub home_team_foul_warning: bool,
    #[serde(default)]
    pub away_team_foul_warning: bool,
    #[serde(default)]
    pub home_label: Option<String>,
    #[serde(default)]
    pub away_label: Option<String>,
    pub game_clock: ClockState,
    pub shot_clock: ClockState,
    #[serde(default)]
    pub stoppage_clock: Option<ClockState>,
    pub siren: bool,
    #[serde(default)]
    pub period: Option<u32>,
    #[serde(default)]
    pub match_title: Option<String>,
}

impl GameData {
    pub fn home(&self) -> TeamData {
        TeamData {
            score: self.home_score,
            team_fouls: self.home_tf,
            timeout_requested: self.home_team_timeout,
            foul_warning: self.home_team_foul_warning,
            label: self.home_label.clone(),
        }
    }

    pub fn away(&self) -> TeamData {
        TeamData {
            score: self.away_score,
            team_fouls: self.away_tf,
            timeout_requested: self.away_team_timeout,
            foul_warning: self.away_team_foul_warning,
            label: self.away_label.clone(),
        }
    }
}
