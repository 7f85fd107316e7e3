/// Exam countdown timer
///
/// A single countdown that loses one second per `tick` while running. The
/// wall-clock cadence (one tick per 1000 ms) is supplied by the runtime driver;
/// the timer itself only owns the countdown state and the time-up callback.
use log::{debug, info};

/// Callback fired once when the countdown reaches zero
pub type TimeUpCallback = Box<dyn FnMut() + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    /// Never started
    Idle,
    Running,
    Paused,
    /// Reached zero; only a new `start` restarts it
    Expired,
    /// Stopped by the owner before reaching zero
    Cancelled,
}

/// Result of one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTick {
    /// Tick ignored (not running)
    Idle,
    Running { remaining: u64 },
    /// This tick reached zero and fired the callback
    Expired,
}

pub struct ExamTimer {
    remaining: u64,
    state: TimerState,
    on_time_up: Option<TimeUpCallback>,
}

impl std::fmt::Debug for ExamTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExamTimer")
            .field("remaining", &self.remaining)
            .field("state", &self.state)
            .finish()
    }
}

impl Default for ExamTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl ExamTimer {
    pub fn new() -> Self {
        Self {
            remaining: 0,
            state: TimerState::Idle,
            on_time_up: None,
        }
    }

    /// Start counting down from `initial_seconds`, replacing any previous countdown
    pub fn start<F>(&mut self, initial_seconds: u64, on_time_up: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.remaining = initial_seconds;
        self.state = TimerState::Running;
        self.on_time_up = Some(Box::new(on_time_up));
        info!("Exam timer started at {}", format_clock(initial_seconds));
    }

    /// Advance one second
    pub fn tick(&mut self) -> TimerTick {
        if self.state != TimerState::Running {
            return TimerTick::Idle;
        }

        if self.remaining <= 1 {
            self.remaining = 0;
            self.state = TimerState::Expired;
            info!("Exam timer expired");
            if let Some(mut callback) = self.on_time_up.take() {
                callback();
            }
            return TimerTick::Expired;
        }

        self.remaining -= 1;
        TimerTick::Running {
            remaining: self.remaining,
        }
    }

    /// Stop ticking without resetting. Returns false when not running.
    pub fn pause(&mut self) -> bool {
        if self.state != TimerState::Running {
            return false;
        }
        self.state = TimerState::Paused;
        debug!("Exam timer paused at {}", self.format_remaining());
        true
    }

    /// Continue from the paused remaining time. Returns false when not paused.
    pub fn resume(&mut self) -> bool {
        if self.state != TimerState::Paused {
            return false;
        }
        self.state = TimerState::Running;
        debug!("Exam timer resumed at {}", self.format_remaining());
        true
    }

    /// Cancel the countdown without firing the callback
    pub fn cancel(&mut self) {
        if matches!(self.state, TimerState::Running | TimerState::Paused) {
            self.state = TimerState::Cancelled;
        }
        self.on_time_up = None;
    }

    pub fn remaining_seconds(&self) -> u64 {
        self.remaining
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == TimerState::Running
    }

    pub fn is_expired(&self) -> bool {
        self.state == TimerState::Expired
    }

    pub fn format_remaining(&self) -> String {
        format_clock(self.remaining)
    }
}

/// `HH:MM:SS` when at least an hour remains, else `MM:SS`
pub fn format_clock(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}
