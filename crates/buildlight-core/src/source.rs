use crate::{status::Status, Result};

/// Where build statuses come from
///
/// One call per poll. A transport or decoding problem is an `Err`, never a
/// `Status::Fail`: a failed build and a failed request are different things.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch(&self, repository: &str) -> Result<Status>;
}

/// The thing that glows
///
/// Fire-and-forget from the driver's point of view. Errors get logged and
/// the next tick tries again.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Indicator: Send + Sync {
    async fn set_hue(&self, hue: u16) -> Result<()>;
}
