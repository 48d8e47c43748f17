//! ChannelManager — starts channels, merges their streams, and routes
//! responses back by channel name.

use std::sync::Arc;

use futures::stream;

use crate::channels::{Channel, IncomingMessage, MessageStream, OutgoingResponse};
use crate::error::ChannelError;

#[derive(Default)]
pub struct ChannelManager {
    channels: Vec<Arc<dyn Channel>>,
}

impl ChannelManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, channel: Arc<dyn Channel>) {
        tracing::info!(channel = channel.name(), "Registered channel");
        self.channels.push(channel);
    }

    pub fn names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    fn get(&self, name: &str) -> Result<&Arc<dyn Channel>, ChannelError> {
        self.channels
            .iter()
            .find(|c| c.name() == name)
            .ok_or_else(|| ChannelError::UnknownChannel {
                name: name.to_string(),
            })
    }

    /// Start every channel and merge their streams into one.
    pub async fn start_all(&self) -> Result<MessageStream, ChannelError> {
        if self.channels.is_empty() {
            return Err(ChannelError::StartupFailed {
                name: "manager".into(),
                reason: "no channels registered".into(),
            });
        }
        let mut streams = Vec::with_capacity(self.channels.len());
        for channel in &self.channels {
            streams.push(channel.start().await?);
            tracing::info!(channel = channel.name(), "Channel started");
        }
        Ok(Box::pin(stream::select_all(streams)))
    }

    /// Send `response` on the channel `msg` arrived on.
    pub async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        self.get(&msg.channel)?.respond(msg, response).await
    }

    /// Check every channel, failing on the first unhealthy one.
    pub async fn health_check_all(&self) -> Result<(), ChannelError> {
        for channel in &self.channels {
            channel.health_check().await?;
        }
        Ok(())
    }

    pub async fn shutdown_all(&self) -> Result<(), ChannelError> {
        for channel in &self.channels {
            if let Err(e) = channel.shutdown().await {
                tracing::warn!(channel = channel.name(), "Channel shutdown failed: {}", e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use futures::StreamExt;
    use tokio::sync::Mutex;

    use super::*;

    struct Fixed {
        name: &'static str,
        inbound: Vec<&'static str>,
        sent: Mutex<Vec<String>>,
    }

    impl Fixed {
        fn new(name: &'static str, inbound: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                name,
                inbound,
                sent: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Channel for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        async fn start(&self) -> Result<MessageStream, ChannelError> {
            let name = self.name;
            let msgs: Vec<IncomingMessage> = self
                .inbound
                .iter()
                .map(|text| IncomingMessage::new(name, "u", *text))
                .collect();
            Ok(Box::pin(stream::iter(msgs)))
        }

        async fn respond(
            &self,
            _msg: &IncomingMessage,
            response: OutgoingResponse,
        ) -> Result<(), ChannelError> {
            self.sent.lock().await.push(response.content().to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn start_all_merges_streams() {
        let mut manager = ChannelManager::new();
        manager.add(Fixed::new("a", vec!["1", "2"]));
        manager.add(Fixed::new("b", vec!["3"]));

        let stream = manager.start_all().await.unwrap();
        let mut contents: Vec<String> = stream.map(|m| m.content).collect().await;
        contents.sort();
        assert_eq!(contents, vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn respond_routes_by_channel_name() {
        let a = Fixed::new("a", vec![]);
        let b = Fixed::new("b", vec![]);
        let mut manager = ChannelManager::new();
        manager.add(a.clone());
        manager.add(b.clone());

        let msg = IncomingMessage::new("b", "u", "hi");
        manager
            .respond(&msg, OutgoingResponse::text("reply"))
            .await
            .unwrap();

        assert!(a.sent.lock().await.is_empty());
        assert_eq!(*b.sent.lock().await, vec!["reply".to_string()]);
    }

    #[tokio::test]
    async fn respond_on_unknown_channel_fails() {
        let manager = ChannelManager::new();
        let msg = IncomingMessage::new("ghost", "u", "hi");
        let err = manager
            .respond(&msg, OutgoingResponse::text("reply"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::UnknownChannel { .. }));
    }

    #[tokio::test]
    async fn start_without_channels_fails() {
        let manager = ChannelManager::new();
        assert!(manager.start_all().await.is_err());
    }
}
