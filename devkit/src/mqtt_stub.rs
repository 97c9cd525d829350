/*!
Client MQTT simulé pour tester le démon RPC sans broker

Enregistre les publications et abonnements, et fournit un constructeur
d'appels RPC au format `symbion/rpc/call@v1`.
*/

use anyhow::Result;
use rumqttc::QoS;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Topic des appels RPC
pub const CALL_TOPIC: &str = "symbion/rpc/call@v1";
/// Topic des réponses RPC
pub const REPLY_TOPIC: &str = "symbion/rpc/response@v1";

#[derive(Debug, Clone)]
pub struct MockMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

#[derive(Debug, Default)]
struct Recorded {
    published: Vec<MockMessage>,
    subscriptions: Vec<String>,
}

/// Client simulé, même surface que `rumqttc::AsyncClient` pour publish/subscribe
#[derive(Debug, Clone, Default)]
pub struct MockMqttClient {
    recorded: Arc<Mutex<Recorded>>,
}

impl MockMqttClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn recorded(&self) -> MutexGuard<'_, Recorded> {
        // un test qui panique ne doit pas bloquer les assertions suivantes
        self.recorded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub async fn publish<S, V>(&self, topic: S, qos: QoS, retain: bool, payload: V) -> Result<()>
    where
        S: Into<String>,
        V: Into<Vec<u8>>,
    {
        let message = MockMessage {
            topic: topic.into(),
            payload: payload.into(),
            qos,
            retain,
        };

        log::debug!("[mock] publish {} ({} bytes)", message.topic, message.payload.len());
        self.recorded().published.push(message);
        Ok(())
    }

    pub async fn subscribe<S: Into<String>>(&self, topic: S, _qos: QoS) -> Result<()> {
        let topic = topic.into();
        log::debug!("[mock] subscribe {}", topic);
        self.recorded().subscriptions.push(topic);
        Ok(())
    }

    /// Tous les messages publiés, dans l'ordre
    pub fn published(&self) -> Vec<MockMessage> {
        self.recorded().published.clone()
    }

    /// Messages publiés sur un topic
    pub fn published_on(&self, topic: &str) -> Vec<MockMessage> {
        self.recorded()
            .published
            .iter()
            .filter(|message| message.topic == topic)
            .cloned()
            .collect()
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.recorded().subscriptions.clone()
    }

    /// Dernier message d'un topic décodé en JSON
    pub fn last_json<T: DeserializeOwned>(&self, topic: &str) -> Result<Option<T>> {
        match self.published_on(topic).last() {
            Some(message) => Ok(Some(serde_json::from_slice(&message.payload)?)),
            None => Ok(None),
        }
    }

    pub fn clear(&self) {
        let mut recorded = self.recorded();
        recorded.published.clear();
        recorded.subscriptions.clear();
    }
}

static NEXT_REQUEST: AtomicU64 = AtomicU64::new(1);

/// Constructeur d'appels RPC
#[derive(Debug, Clone)]
pub struct RpcCallBuilder {
    request_id: String,
    object: Option<String>,
    method: String,
    params: Map<String, Value>,
}

impl RpcCallBuilder {
    pub fn new<S: Into<String>>(method: S) -> Self {
        Self {
            request_id: format!("test-{}", NEXT_REQUEST.fetch_add(1, Ordering::Relaxed)),
            object: None,
            method: method.into(),
            params: Map::new(),
        }
    }

    pub fn request_id<S: Into<String>>(mut self, request_id: S) -> Self {
        self.request_id = request_id.into();
        self
    }

    /// Objet cible (`system` ou `network`)
    pub fn object<S: Into<String>>(mut self, object: S) -> Self {
        self.object = Some(object.into());
        self
    }

    pub fn param<V: Into<Value>>(mut self, key: &str, value: V) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn build(&self) -> Value {
        let mut call = serde_json::json!({
            "request_id": self.request_id,
            "method": self.method,
            "params": self.params,
        });
        if let Some(object) = &self.object {
            call["object"] = Value::String(object.clone());
        }
        call
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.build().to_string().into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_publish_and_subscribe() {
        let client = MockMqttClient::new();
        client.subscribe(CALL_TOPIC, QoS::AtLeastOnce).await.unwrap();
        client
            .publish(REPLY_TOPIC, QoS::AtLeastOnce, false, b"{\"code\":0}".to_vec())
            .await
            .unwrap();
        client
            .publish("other/topic", QoS::AtMostOnce, false, "x")
            .await
            .unwrap();

        assert_eq!(client.subscriptions(), vec![CALL_TOPIC]);
        assert_eq!(client.published().len(), 2);
        assert_eq!(client.published_on(REPLY_TOPIC).len(), 1);

        let reply: Value = client.last_json(REPLY_TOPIC).unwrap().unwrap();
        assert_eq!(reply["code"], 0);
        assert!(client.last_json::<Value>("missing").unwrap().is_none());

        client.clear();
        assert!(client.published().is_empty());
    }

    #[test]
    fn test_call_builder() {
        let call = RpcCallBuilder::new("process_signal")
            .request_id("r-1")
            .object("system")
            .param("pid", 42)
            .param("signal", 15)
            .build();

        assert_eq!(
            call,
            serde_json::json!({
                "request_id": "r-1",
                "object": "system",
                "method": "process_signal",
                "params": {"pid": 42, "signal": 15}
            })
        );

        let first = RpcCallBuilder::new("list").build();
        let second = RpcCallBuilder::new("list").build();
        assert_ne!(first["request_id"], second["request_id"]);
        assert!(first.get("object").is_none());
    }
}
