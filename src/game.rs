use crate::{
    channel::{
        ChannelConfig, ChannelError, ChannelEvent, ConnectionStatus, ReconnectingChannel,
        data_stream_url,
    },
    clock::GameClock,
    config::{Authority, Config},
    fetcher::{CommandError, Fetcher},
    snapshot::GameData,
    team::{HomeAwayBundle, Side, TeamScore},
};
use log::{debug, warn};
use std::time::Duration;
use tokio::{
    select,
    sync::{mpsc, watch},
    time::{Instant, sleep_until},
};

const EVENT_CHANNEL_LEN: usize = 32;
// How long a locally-raised siren sounds before clearing itself
const SIREN_DURATION: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockId {
    Game,
    Shot,
    Stoppage,
}

/// The one reconciliation point of a scoreboard session. Owns the teams,
/// the clocks, the command transport, and the push channel; decomposes each
/// inbound snapshot into per-entity updates and notifies observers exactly
/// once per applied message.
#[derive(Debug)]
pub struct Game {
    teams: HomeAwayBundle<TeamScore>,
    game_clock: GameClock,
    shot_clock: GameClock,
    stoppage_clock: GameClock,
    siren: bool,
    siren_ends: Option<Instant>,
    period: u32,
    match_title: String,
    connection_status: ConnectionStatus,
    authority: Authority,
    api: Fetcher,
    channel: ReconnectingChannel,
    events: mpsc::Receiver<ChannelEvent>,
    updates: watch::Sender<u64>,
}

impl Game {
    pub fn new(config: &Config) -> Result<Self, CommandError> {
        let authority = config.authority;
        let api = Fetcher::new(
            &config.connection.base_url,
            Some(config.connection.request_timeout()),
        )?;

        let channel_config = ChannelConfig {
            url: data_stream_url(&config.connection.base_url),
            handshake_timeout: config.connection.handshake_timeout(),
            reconnect_delay: config.connection.reconnect_delay(),
            auto_restart: config.connection.auto_restart,
        };
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_LEN);
        let channel = ReconnectingChannel::new(channel_config, event_tx);

        let (updates, _) = watch::channel(0);

        Ok(Self {
            teams: HomeAwayBundle {
                home: TeamScore::new(&config.teams.home_label, authority, api.scoped("home")),
                away: TeamScore::new(&config.teams.away_label, authority, api.scoped("away")),
            },
            game_clock: GameClock::new(authority, api.scoped("game_clock")),
            shot_clock: GameClock::new(authority, api.scoped("shot_clock")),
            stoppage_clock: GameClock::new(authority, api.scoped("stoppage_clock")),
            siren: false,
            siren_ends: None,
            period: 1,
            match_title: String::new(),
            connection_status: ConnectionStatus::Idle,
            authority,
            api,
            channel,
            events: event_rx,
            updates,
        })
    }

    pub fn home(&self) -> &TeamScore {
        &self.teams.home
    }

    pub fn away(&self) -> &TeamScore {
        &self.teams.away
    }

    pub fn team(&self, side: Side) -> &TeamScore {
        &self.teams[side]
    }

    pub fn team_mut(&mut self, side: Side) -> &mut TeamScore {
        &mut self.teams[side]
    }

    pub fn clock(&self, id: ClockId) -> &GameClock {
        match id {
            ClockId::Game => &self.game_clock,
            ClockId::Shot => &self.shot_clock,
            ClockId::Stoppage => &self.stoppage_clock,
        }
    }

    fn clock_mut(&mut self, id: ClockId) -> &mut GameClock {
        match id {
            ClockId::Game => &mut self.game_clock,
            ClockId::Shot => &mut self.shot_clock,
            ClockId::Stoppage => &mut self.stoppage_clock,
        }
    }

    pub fn siren(&self) -> bool {
        self.siren
    }

    pub fn period(&self) -> u32 {
        self.period
    }

    pub fn match_title(&self) -> &str {
        &self.match_title
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.connection_status
    }

    /// Observers see a generation counter bumped once per state change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.updates.subscribe()
    }

    pub fn open(&self) {
        self.channel.open();
    }

    pub fn close(&self) {
        self.channel.close();
    }

    // Operator surface: fan-out to the team and clock models

    pub fn score_increment(&mut self, side: Side, add: u32) {
        self.team_mut(side).score_increment(add);
        self.notify_if_local();
    }

    pub fn score_decrement(&mut self, side: Side, subtract: u32) {
        self.team_mut(side).score_decrement(subtract);
        self.notify_if_local();
    }

    pub fn fouls_increment(&mut self, side: Side, add: u32) {
        self.team_mut(side).fouls_increment(add);
        self.notify_if_local();
    }

    pub fn fouls_decrement(&mut self, side: Side, subtract: u32) {
        self.team_mut(side).fouls_decrement(subtract);
        self.notify_if_local();
    }

    pub fn toggle_timeout(&mut self, side: Side) {
        self.team_mut(side).toggle_timeout();
        self.notify_if_local();
    }

    pub fn toggle_foul_warning(&mut self, side: Side) {
        self.team_mut(side).toggle_foul_warning();
        self.notify_if_local();
    }

    pub fn set_label(&mut self, side: Side, label: &str) {
        self.team_mut(side).set_label(label);
        self.notify();
    }

    pub fn clock_start(&mut self, id: ClockId, value: Option<i64>, now: i64) {
        self.clock_mut(id).start(value, now);
        self.notify_if_local();
    }

    pub fn clock_stop(&mut self, id: ClockId, now: i64) {
        self.clock_mut(id).stop(now);
        self.notify_if_local();
    }

    pub fn clock_set(&mut self, id: ClockId, value: i64) {
        self.clock_mut(id).set(value);
        self.notify_if_local();
    }

    pub fn clock_adjust(&mut self, id: ClockId, delta: i64) {
        self.clock_mut(id).adjust(delta);
        self.notify_if_local();
    }

    pub fn toggle_siren(&mut self) {
        match self.authority {
            Authority::Remote => self.api.dispatch("siren/toggle", &[]),
            Authority::Local => {
                self.siren = !self.siren;
                self.siren_ends = self
                    .siren
                    .then(|| Instant::now() + SIREN_DURATION);
                self.notify();
            }
        }
    }

    pub fn period_increment(&mut self) {
        match self.authority {
            Authority::Remote => self.api.dispatch("period/increment", &[]),
            Authority::Local => {
                self.period += 1;
                self.notify();
            }
        }
    }

    pub fn period_decrement(&mut self) {
        match self.authority {
            Authority::Remote => self.api.dispatch("period/decrement", &[]),
            Authority::Local => {
                self.period = self.period.saturating_sub(1);
                self.notify();
            }
        }
    }

    pub fn set_match_title(&mut self, value: &str) {
        match self.authority {
            Authority::Remote => self
                .api
                .dispatch("match_title/set", &[("value", value.to_string())]),
            Authority::Local => {
                self.match_title = value.to_string();
                self.notify();
            }
        }
    }

    pub fn reset(&mut self) {
        match self.authority {
            Authority::Remote => self.api.dispatch("reset", &[]),
            Authority::Local => {
                self.teams.home.from_data(Default::default());
                self.teams.away.from_data(Default::default());
                self.game_clock.from_data(Default::default());
                self.shot_clock.from_data(Default::default());
                self.stoppage_clock.from_data(Default::default());
                self.siren = false;
                self.siren_ends = None;
                self.period = 1;
                self.match_title.clear();
                self.notify();
            }
        }
    }

    // Inbound side

    /// Apply one raw payload from the push channel. A payload that fails to
    /// parse is dropped whole; nothing changes, including the status.
    pub fn apply_message(&mut self, raw: &str) {
        let data: GameData = match serde_json::from_str(raw) {
            Ok(data) => data,
            Err(e) => {
                warn!("Discarding malformed snapshot: {e}");
                return;
            }
        };

        debug!("Applying snapshot: {data:?}");
        self.teams.home.from_data(data.home());
        self.teams.away.from_data(data.away());
        self.game_clock.from_data(data.game_clock);
        self.shot_clock.from_data(data.shot_clock);
        if let Some(stoppage) = data.stoppage_clock {
            self.stoppage_clock.from_data(stoppage);
        }
        self.siren = data.siren;
        if let Some(period) = data.period {
            self.period = period;
        }
        if let Some(title) = data.match_title {
            self.match_title = title;
        }
        self.connection_status = ConnectionStatus::Good;
        self.notify();
    }

    /// A transport error degrades the link to a warning; recovery is the
    /// channel's job, not ours.
    pub fn apply_error(&mut self, err: &ChannelError) {
        warn!("Push channel error: {err}");
        self.connection_status = ConnectionStatus::Warn;
        self.notify();
    }

    fn apply_status(&mut self, status: ConnectionStatus) {
        if self.connection_status != status {
            self.connection_status = status;
            self.notify();
        }
    }

    fn notify(&self) {
        self.updates.send_modify(|generation| *generation += 1);
    }

    fn notify_if_local(&self) {
        if self.authority == Authority::Local {
            self.notify();
        }
    }

    /// Event loop: applies channel traffic in arrival order. Runs until the
    /// channel task goes away.
    pub async fn run(&mut self) {
        let mut status = self.channel.status();
        loop {
            let siren_ends = self.siren_ends;
            select! {
                event = self.events.recv() => match event {
                    Some(ChannelEvent::Message(raw)) => self.apply_message(&raw),
                    Some(ChannelEvent::Error(e)) => self.apply_error(&e),
                    None => break,
                },
                res = status.changed() => {
                    if res.is_err() {
                        break;
                    }
                    let current = *status.borrow_and_update();
                    self.apply_status(current);
                }
                _ = async { sleep_until(siren_ends.unwrap()).await }, if siren_ends.is_some() => {
                    self.siren = false;
                    self.siren_ends = None;
                    self.notify();
                }
            }
        }
    }
}
