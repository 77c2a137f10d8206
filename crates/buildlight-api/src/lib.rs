// HTTP clients for the two things we talk to: the CI provider and the light
pub mod bitbucket;
pub mod hue;

#[cfg(test)]
mod test_support;

// Re-export common types
pub use bitbucket::{BitbucketClient, BitbucketError, Pipeline, PipelinesPage};
pub use hue::{HueClient, HueError, LightState};
