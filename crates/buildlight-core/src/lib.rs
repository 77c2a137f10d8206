// Core of the build light: poll, aggregate, blink
pub mod aggregator;
pub mod config;
pub mod error;
pub mod indicator;
pub mod mailbox;
pub mod monitor;
pub mod poller;
pub mod providers;
pub mod source;
pub mod status;

pub use aggregator::Aggregator;
pub use config::Config;
pub use error::Error;
pub use indicator::{Color, IndicatorDriver, IndicatorState, Palette};
pub use mailbox::{mailbox, MailboxReceiver, MailboxSender};
pub use monitor::{check_once, CheckReport, Monitor};
pub use poller::Poller;
pub use source::{Indicator, StatusSource};
pub use status::{classify, Status};

/// Result type alias because typing Result<T, Error> everywhere is tedious
pub type Result<T> = std::result::Result<T, Error>;
