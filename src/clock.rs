use crate::{config::Authority, fetcher::Fetcher};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum RunState {
    Running,
    #[default]
    Stopped,
}

/// The last-known state of one counter, as pushed by the controller.
///
/// While running, `last_time_remaining` is stale on its own; the true value
/// is recovered by timestamp arithmetic in [`Self::time_remaining`]. This is
/// what makes a tick-free clock possible: a snapshot can replace the whole
/// struct atomically and the display stays correct without any timer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ClockState {
    /// Epoch milliseconds of the last start/stop/set
    pub last_state_change: i64,
    /// Signed milliseconds; authoritative only when stopped
    pub last_time_remaining: i64,
    pub state: RunState,
}

impl ClockState {
    pub fn is_running(&self) -> bool {
        self.state == RunState::Running
    }

    pub fn time_remaining(&self, now: i64) -> i64 {
        match self.state {
            RunState::Stopped => self.last_time_remaining,
            RunState::Running => self.last_time_remaining - (now - self.last_state_change),
        }
    }
}

/// One game counter bound to a resource on the controller (`game_clock/`,
/// `shot_clock/`, ...). With remote authority every operation is a
/// fire-and-forget command and local state only changes when a snapshot
/// arrives; with local authority operations mutate the state directly and
/// nothing is sent.
#[derive(Debug)]
pub struct GameClock {
    state: ClockState,
    authority: Authority,
    api: Fetcher,
}

impl GameClock {
    pub fn new(authority: Authority, api: Fetcher) -> Self {
        Self {
            state: ClockState::default(),
            authority,
            api,
        }
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    pub fn time_remaining(&self, now: i64) -> i64 {
        self.state.time_remaining(now)
    }

    pub fn start(&mut self, value: Option<i64>, now: i64) {
        match self.authority {
            Authority::Remote => match value {
                Some(value) => self
                    .api
                    .dispatch("start", &[("value", value.to_string())]),
                None => self.api.dispatch("start", &[]),
            },
            Authority::Local => {
                if self.state.is_running() {
                    return;
                }
                self.state.last_state_change = now;
                if let Some(value) = value {
                    self.state.last_time_remaining = value;
                }
                self.state.state = RunState::Running;
            }
        }
    }

    pub fn stop(&mut self, now: i64) {
        match self.authority {
            Authority::Remote => self.api.dispatch("stop", &[]),
            Authority::Local => {
                if !self.state.is_running() {
                    return;
                }
                self.state.last_time_remaining = self.state.time_remaining(now);
                self.state.last_state_change = now;
                self.state.state = RunState::Stopped;
            }
        }
    }

    pub fn set(&mut self, value: i64) {
        match self.authority {
            Authority::Remote => self.api.dispatch("set", &[("value", value.to_string())]),
            Authority::Local => self.state.last_time_remaining = value,
        }
    }

    pub fn adjust(&mut self, delta: i64) {
        match self.authority {
            Authority::Remote => {
                let (path, params) = adjust_command(&self.state, delta);
                self.api.dispatch(path, &params);
            }
            Authority::Local => self.state.last_time_remaining += delta,
        }
    }

    /// Wholesale overwrite from an authoritative snapshot. Every field is
    /// applied, zero values included.
    pub fn from_data(&mut self, data: ClockState) {
        self.state = data;
    }
}

/// While running, a relative change must go to the server as a magnitude so
/// it applies against the live-ticking value; sending `set(stale + delta)`
/// would silently undo concurrent server-side changes. Stopped clocks have
/// no such race and get an absolute `set`.
fn adjust_command(state: &ClockState, delta: i64) -> (&'static str, Vec<(&'static str, String)>) {
    if state.is_running() {
        if delta >= 0 {
            ("increment", vec![("add", delta.to_string())])
        } else {
            ("decrement", vec![("subtract", (-delta).to_string())])
        }
    } else {
        let value = state.last_time_remaining + delta;
        ("set", vec![("value", value.to_string())])
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn local_clock() -> GameClock {
        GameClock::new(Authority::Local, Fetcher::new("http://localhost:1", None).unwrap())
    }

    #[test]
    fn test_stopped_time_is_wall_clock_independent() {
        let mut clock = local_clock();
        clock.from_data(ClockState {
            last_state_change: 1_000,
            last_time_remaining: 45_000,
            state: RunState::Stopped,
        });

        assert_eq!(clock.time_remaining(1_000), 45_000);
        assert_eq!(clock.time_remaining(500_000), 45_000);
        assert_eq!(clock.time_remaining(0), 45_000);
    }

    #[test]
    fn test_running_time_counts_down_from_snapshot() {
        let mut clock = local_clock();
        let t = 1_700_000_000_000;
        clock.from_data(ClockState {
            last_state_change: t,
            last_time_remaining: 45_000,
            state: RunState::Running,
        });

        assert_eq!(clock.time_remaining(t), 45_000);
        assert_eq!(clock.time_remaining(t + 5_000), 40_000);
        // Running past zero goes negative rather than sticking
        assert_eq!(clock.time_remaining(t + 50_000), -5_000);
    }

    #[test]
    fn test_local_start_stop_freezes_by_delta() {
        let mut clock = local_clock();
        let t = 10_000;

        clock.set(30_000);
        clock.start(None, t);
        assert!(clock.is_running());
        assert_eq!(clock.time_remaining(t + 4_000), 26_000);

        clock.stop(t + 4_000);
        assert!(!clock.is_running());
        assert_eq!(clock.state().last_time_remaining, 26_000);
        assert_eq!(clock.time_remaining(t + 60_000), 26_000);
    }

    #[test]
    fn test_local_start_is_idempotent_while_running() {
        let mut clock = local_clock();
        clock.start(Some(20_000), 1_000);
        clock.start(Some(99_000), 5_000);
        // The second start must not rebase the running clock
        assert_eq!(clock.time_remaining(6_000), 15_000);
    }

    #[test]
    fn test_local_adjust_is_relative() {
        let mut clock = local_clock();
        clock.set(20_000);
        clock.adjust(-3_000);
        assert_eq!(clock.time_remaining(0), 17_000);
        clock.adjust(5_000);
        assert_eq!(clock.time_remaining(0), 22_000);
    }

    #[test]
    fn test_adjust_running_sends_magnitude() {
        let running = ClockState {
            last_state_change: 0,
            last_time_remaining: 45_000,
            state: RunState::Running,
        };

        let (path, params) = adjust_command(&running, 5_000);
        assert_eq!(path, "increment");
        assert_eq!(params, vec![("add", "5000".to_string())]);

        let (path, params) = adjust_command(&running, -2_000);
        assert_eq!(path, "decrement");
        assert_eq!(params, vec![("subtract", "2000".to_string())]);
    }

    #[test]
    fn test_adjust_stopped_sends_absolute_set() {
        let stopped = ClockState {
            last_state_change: 0,
            last_time_remaining: 20_000,
            state: RunState::Stopped,
        };

        let (path, params) = adjust_command(&stopped, -3_000);
        assert_eq!(path, "set");
        assert_eq!(params, vec![("value", "17000".to_string())]);
    }

    #[test]
    fn test_from_data_applies_zero_values() {
        let mut clock = local_clock();
        clock.from_data(ClockState {
            last_state_change: 5_000,
            last_time_remaining: 45_000,
            state: RunState::Running,
        });
        clock.from_data(ClockState::default());
        assert_eq!(clock.time_remaining(10_000), 0);
        assert!(!clock.is_running());
    }
}
