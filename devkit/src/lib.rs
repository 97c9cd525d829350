/*!
# Symbion DevKit - outils de test pour le démon RPC

- Client MQTT simulé (sans broker) et constructeur d'appels RPC
- Hôte simulé : racine temporaire imitant `/proc` et `/etc`
*/

pub mod mqtt_stub;
pub mod test_utils;

pub use mqtt_stub::{MockMessage, MockMqttClient, RpcCallBuilder};
pub use test_utils::FakeHost;
