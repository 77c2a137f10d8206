// Bitbucket provider - bridges the pipelines client with StatusSource
use async_trait::async_trait;
use buildlight_api::bitbucket::DEFAULT_PAGE_LEN;
use buildlight_api::BitbucketClient;

use crate::{
    config::BitbucketConfig,
    source::StatusSource,
    status::{classify, Status},
    Error, Result,
};

/// Wrapper around BitbucketClient that implements StatusSource
pub struct BitbucketStatusSource {
    client: BitbucketClient,
    page_len: u32,
}

impl BitbucketStatusSource {
    pub fn new(config: &BitbucketConfig) -> Result<Self> {
        let client = BitbucketClient::new(config.username.clone(), config.password.clone())
            .map_err(|e| Error::ConfigError(format!("Failed to build Bitbucket client: {}", e)))?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: BitbucketClient) -> Self {
        Self {
            client,
            page_len: DEFAULT_PAGE_LEN,
        }
    }
}

#[async_trait]
impl StatusSource for BitbucketStatusSource {
    async fn fetch(&self, repository: &str) -> Result<Status> {
        let page = self
            .client
            .get_pipelines(repository, self.page_len)
            .await
            .map_err(|e| Error::fetch(repository, e))?;

        Ok(classify(&page))
    }
}
