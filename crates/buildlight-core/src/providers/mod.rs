// Adapters from the raw API clients to the traits the core runs on
pub mod bitbucket;
pub mod hue;

pub use bitbucket::BitbucketStatusSource;
pub use hue::HueIndicator;
