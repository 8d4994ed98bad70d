/// Contribution channels.
///
/// A channel is a named, ordered registry of producer callbacks whose
/// outputs are gathered on demand rather than pushed eagerly. A producer
/// yields `None` to opt out of one collection round without being
/// removed.
use std::pin::Pin;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// A producer registered under a contribution channel.
#[async_trait]
pub trait Contributor: Send + Sync {
    async fn contribute(&self) -> Result<Option<Value>>;
}

type ContributionFuture = Pin<Box<dyn Future<Output = Result<Option<Value>>> + Send>>;

/// Adapter wrapping an async closure as a `Contributor`.
pub struct FnContributor {
    callback: Box<dyn Fn() -> ContributionFuture + Send + Sync>,
}

impl FnContributor {
    pub fn new<F, Fut>(callback: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<Value>>> + Send + 'static,
    {
        Self { callback: Box::new(move || Box::pin(callback())) }
    }
}

#[async_trait]
impl Contributor for FnContributor {
    async fn contribute(&self) -> Result<Option<Value>> {
        (self.callback)().await
    }
}
