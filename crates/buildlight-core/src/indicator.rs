//! Turns the aggregate status into light commands.
//!
//! Rendering only ever happens on a tick. Status updates just change what
//! the next tick will do, so a flapping pipeline can't hammer the bridge.
//! While building or failing the light blinks between two hues, one per
//! tick; a green light is set once and then left alone.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::mailbox::MailboxReceiver;
use crate::source::Indicator;
use crate::status::Status;

/// Default time between render decisions
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(750);

/// Every color the light can be asked to show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    Green,
    Purple,
    DarkPurple,
    Red,
    Yellow,
}

impl Color {
    pub fn label(&self) -> &'static str {
        match self {
            Color::Green => "green",
            Color::Purple => "purple",
            Color::DarkPurple => "dark purple",
            Color::Red => "red",
            Color::Yellow => "yellow",
        }
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Hue values (0-65535 on the Hue color wheel) for each color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Palette {
    #[serde(default = "default_green")]
    pub green: u16,
    #[serde(default = "default_purple")]
    pub purple: u16,
    #[serde(default = "default_dark_purple")]
    pub dark_purple: u16,
    #[serde(default = "default_red")]
    pub red: u16,
    #[serde(default = "default_yellow")]
    pub yellow: u16,
}

fn default_green() -> u16 {
    28000
}

fn default_purple() -> u16 {
    43000
}

fn default_dark_purple() -> u16 {
    46920
}

fn default_red() -> u16 {
    0
}

fn default_yellow() -> u16 {
    15000
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            green: default_green(),
            purple: default_purple(),
            dark_purple: default_dark_purple(),
            red: default_red(),
            yellow: default_yellow(),
        }
    }
}

impl Palette {
    pub fn hue(&self, color: Color) -> u16 {
        match color {
            Color::Green => self.green,
            Color::Purple => self.purple,
            Color::DarkPurple => self.dark_purple,
            Color::Red => self.red,
            Color::Yellow => self.yellow,
        }
    }
}

/// The driver's private state machine
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IndicatorState {
    current: Status,
    last_rendered: Status,
    highlight: bool,
}

impl IndicatorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&mut self, status: Status) {
        self.current = status;
    }

    pub fn current(&self) -> Status {
        self.current
    }

    pub fn last_rendered(&self) -> Status {
        self.last_rendered
    }

    pub fn highlight(&self) -> bool {
        self.highlight
    }

    /// Decide what this tick shows, `None` means leave the light alone
    ///
    /// Blinking states flip `highlight` as a side effect. Must be followed by
    /// [`IndicatorState::finish_tick`].
    pub fn next_color(&mut self) -> Option<Color> {
        match self.current {
            Status::NotSet => None,
            Status::Success if self.last_rendered == Status::Success => None,
            Status::Success => Some(Color::Green),
            Status::InProgress => Some(self.blink(Color::Purple, Color::DarkPurple)),
            Status::Fail => Some(self.blink(Color::Red, Color::Yellow)),
        }
    }

    fn blink(&mut self, on: Color, off: Color) -> Color {
        let color = if self.highlight { on } else { off };
        self.highlight = !self.highlight;
        color
    }

    /// Close out a tick; `ok` is false only when the light call failed
    ///
    /// A green that never made it to the light isn't recorded as rendered,
    /// otherwise the no-op check would stop us from ever retrying it.
    pub fn finish_tick(&mut self, ok: bool) {
        if !ok && self.current == Status::Success {
            return;
        }
        self.last_rendered = self.current;
    }
}

/// Long-lived task that owns the indicator state and talks to the light
pub struct IndicatorDriver {
    state: IndicatorState,
    palette: Palette,
    indicator: Arc<dyn Indicator>,
    updates: MailboxReceiver,
    tick_interval: Duration,
}

impl IndicatorDriver {
    pub fn new(
        indicator: Arc<dyn Indicator>,
        palette: Palette,
        tick_interval: Duration,
        updates: MailboxReceiver,
    ) -> Self {
        Self {
            state: IndicatorState::new(),
            palette,
            indicator,
            updates,
            tick_interval,
        }
    }

    pub fn state(&self) -> &IndicatorState {
        &self.state
    }

    /// Store a new aggregate; nothing is rendered until the next tick
    pub fn set_status(&mut self, status: Status) {
        if status != self.state.current() {
            debug!(from = %self.state.current(), to = %status, "aggregate status changed");
        }
        self.state.set_status(status);
    }

    /// One render decision
    pub async fn tick(&mut self) {
        let Some(color) = self.state.next_color() else {
            self.state.finish_tick(true);
            return;
        };

        let ok = match self.indicator.set_hue(self.palette.hue(color)).await {
            Ok(()) => {
                debug!("changing to {}", color);
                true
            }
            Err(e) => {
                warn!("failed to change light to {}: {}", color, e);
                false
            }
        };
        self.state.finish_tick(ok);
    }

    /// Tick until `shutdown` fires
    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut updates_open = true;

        info!("Indicator driver started, ticking every {:?}", self.tick_interval);

        loop {
            tokio::select! {
                // Updates go first so a tick always sees the freshest aggregate
                biased;

                _ = shutdown.cancelled() => {
                    info!("Shutdown signal received, stopping indicator driver");
                    break;
                }

                update = self.updates.recv(), if updates_open => {
                    match update {
                        Some(status) => self.set_status(status),
                        None => {
                            debug!("status mailbox closed, holding {}", self.state.current());
                            updates_open = false;
                        }
                    }
                }

                _ = ticker.tick() => {
                    // A hung bridge must not hold up shutdown
                    tokio::select! {
                        _ = shutdown.cancelled() => {
                            info!("Shutdown signal received during light update, stopping indicator driver");
                            break;
                        }
                        _ = self.tick() => {}
                    }
                }
            }
        }
    }
}
