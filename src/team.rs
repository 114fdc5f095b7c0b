use crate::{config::Authority, fetcher::Fetcher, snapshot::TeamData};
use log::info;
use std::{
    fmt::{Display, Formatter},
    ops::{Index, IndexMut},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Home,
    Away,
}

impl Display for Side {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match *self {
            Self::Home => write!(f, "Home"),
            Self::Away => write!(f, "Away"),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HomeAwayBundle<T> {
    pub home: T,
    pub away: T,
}

impl<T> Index<Side> for HomeAwayBundle<T> {
    type Output = T;

    fn index(&self, side: Side) -> &Self::Output {
        match side {
            Side::Home => &self.home,
            Side::Away => &self.away,
        }
    }
}

impl<T> IndexMut<Side> for HomeAwayBundle<T> {
    fn index_mut(&mut self, side: Side) -> &mut Self::Output {
        match side {
            Side::Home => &mut self.home,
            Side::Away => &mut self.away,
        }
    }
}

/// One team's scoreboard entry. With remote authority every command is
/// fire-and-forget and the fields only change on snapshot application; with
/// local authority commands mutate the fields directly.
#[derive(Debug)]
pub struct TeamScore {
    label: String,
    score: u32,
    team_fouls: u32,
    timeout_requested: bool,
    foul_warning: bool,
    authority: Authority,
    api: Fetcher,
}

impl TeamScore {
    pub fn new(label: &str, authority: Authority, api: Fetcher) -> Self {
        Self {
            label: label.to_string(),
            score: 0,
            team_fouls: 0,
            timeout_requested: false,
            foul_warning: false,
            authority,
            api,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn team_fouls(&self) -> u32 {
        self.team_fouls
    }

    pub fn timeout_requested(&self) -> bool {
        self.timeout_requested
    }

    pub fn foul_warning(&self) -> bool {
        self.foul_warning
    }

    pub fn score_increment(&mut self, add: u32) {
        match self.authority {
            Authority::Remote => self
                .api
                .dispatch("score/increment", &[("add", add.to_string())]),
            Authority::Local => {
                self.score += add;
                info!("{} score set to {}", self.label, self.score);
            }
        }
    }

    pub fn score_decrement(&mut self, subtract: u32) {
        match self.authority {
            Authority::Remote => self
                .api
                .dispatch("score/decrement", &[("subtract", subtract.to_string())]),
            Authority::Local => {
                self.score = self.score.saturating_sub(subtract);
                info!("{} score set to {}", self.label, self.score);
            }
        }
    }

    pub fn fouls_increment(&mut self, add: u32) {
        match self.authority {
            Authority::Remote => self
                .api
                .dispatch("fouls/increment", &[("add", add.to_string())]),
            Authority::Local => self.team_fouls += add,
        }
    }

    pub fn fouls_decrement(&mut self, subtract: u32) {
        match self.authority {
            Authority::Remote => self
                .api
                .dispatch("fouls/decrement", &[("subtract", subtract.to_string())]),
            Authority::Local => self.team_fouls = self.team_fouls.saturating_sub(subtract),
        }
    }

    pub fn toggle_timeout(&mut self) {
        match self.authority {
            Authority::Remote => self.api.dispatch("timeout/toggle", &[]),
            Authority::Local => self.timeout_requested = !self.timeout_requested,
        }
    }

    pub fn toggle_foul_warning(&mut self) {
        match self.authority {
            Authority::Remote => self.api.dispatch("fouls/toggle", &[]),
            Authority::Local => self.foul_warning = !self.foul_warning,
        }
    }

    /// Labels are presentation state with no controller resource; they are
    /// set locally in both authority modes.
    pub fn set_label(&mut self, label: &str) {
        self.label = label.to_string();
    }

    /// Apply one team's slice of a snapshot. All fields are authoritative,
    /// zero and false included; only a missing label keeps its prior value.
    pub fn from_data(&mut self, data: TeamData) {
        self.score = data.score;
        self.team_fouls = data.team_fouls;
        self.timeout_requested = data.timeout_requested;
        self.foul_warning = data.foul_warning;
        if let Some(label) = data.label {
            self.label = label;
        }
    }
}
