//! Method dispatch over the MQTT bus
//!
//! Handles:
//! - Call decoding (`symbion/rpc/call@v1`) and parameter routing
//! - Method table for the `system` and `network` objects, plus `list`
//! - Reply encoding with status and numeric code (`symbion/rpc/response@v1`)
//! - The single-threaded serve loop: one call runs to completion before the
//!   next bus event is polled

use crate::config::MqttConfig;
use crate::handlers::{network, system, HandlerContext};
use crate::response::Response;
use crate::status::{RpcError, RpcResult, RpcStatus};
use anyhow::{Context, Result};
use rumqttc::{AsyncClient, Event, EventLoop, Incoming, QoS};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Bus objects exposing methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RpcObject {
    System,
    Network,
}

impl RpcObject {
    pub fn as_str(self) -> &'static str {
        match self {
            RpcObject::System => "system",
            RpcObject::Network => "network",
        }
    }
}

/// Every method the service answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Syslog,
    Dmesg,
    ProcessList,
    ProcessSignal,
    InitList,
    InitAction,
    SshkeysGet,
    SshkeysSet,
    ConntrackCount,
    ConntrackTable,
    ArpTable,
    DhcpLeases,
    Dhcp6Leases,
    Routes,
    Routes6,
    List,
}

impl Method {
    pub const ALL: [Method; 16] = [
        Method::Syslog,
        Method::Dmesg,
        Method::ProcessList,
        Method::ProcessSignal,
        Method::InitList,
        Method::InitAction,
        Method::SshkeysGet,
        Method::SshkeysSet,
        Method::ConntrackCount,
        Method::ConntrackTable,
        Method::ArpTable,
        Method::DhcpLeases,
        Method::Dhcp6Leases,
        Method::Routes,
        Method::Routes6,
        Method::List,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Method::Syslog => "syslog",
            Method::Dmesg => "dmesg",
            Method::ProcessList => "process_list",
            Method::ProcessSignal => "process_signal",
            Method::InitList => "init_list",
            Method::InitAction => "init_action",
            Method::SshkeysGet => "sshkeys_get",
            Method::SshkeysSet => "sshkeys_set",
            Method::ConntrackCount => "conntrack_count",
            Method::ConntrackTable => "conntrack_table",
            Method::ArpTable => "arp_table",
            Method::DhcpLeases => "dhcp_leases",
            Method::Dhcp6Leases => "dhcp6_leases",
            Method::Routes => "routes",
            Method::Routes6 => "routes6",
            Method::List => "list",
        }
    }

    /// Owning object; `list` belongs to none
    pub fn object(self) -> Option<RpcObject> {
        match self {
            Method::Syslog
            | Method::Dmesg
            | Method::ProcessList
            | Method::ProcessSignal
            | Method::InitList
            | Method::InitAction
            | Method::SshkeysGet
            | Method::SshkeysSet => Some(RpcObject::System),
            Method::List => None,
            _ => Some(RpcObject::Network),
        }
    }

    /// Parameter names accepted by the method
    pub fn params(self) -> &'static [&'static str] {
        match self {
            Method::ProcessSignal => &["pid", "signal"],
            Method::InitAction => &["name", "action"],
            Method::SshkeysSet => &["keys"],
            _ => &[],
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|method| method.name() == name)
    }

    /// Resolve a call target, checking the object when the caller names one
    pub fn resolve(object: Option<&str>, name: &str) -> RpcResult<Self> {
        let method = Self::from_name(name)
            .ok_or_else(|| RpcError::MethodNotFound(name.to_string()))?;

        match (object, method.object()) {
            (None, _) => Ok(method),
            (Some(requested), Some(owner)) if requested == owner.as_str() => Ok(method),
            (Some(requested), _) => Err(RpcError::MethodNotFound(format!("{}.{}", requested, name))),
        }
    }
}

/// Incoming call
#[derive(Debug, Clone, Deserialize)]
pub struct RpcCall {
    pub request_id: String,
    #[serde(default)]
    pub object: Option<String>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// Outgoing reply
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcReply {
    pub request_id: String,
    pub method: String,
    pub status: RpcStatus,
    pub code: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RpcReply {
    fn success(request_id: String, method: String, data: Value) -> Self {
        Self {
            request_id,
            method,
            status: RpcStatus::Ok,
            code: RpcStatus::Ok.code(),
            data: Some(data),
            error: None,
        }
    }

    fn failure(request_id: String, method: String, err: &RpcError) -> Self {
        let status = err.status();
        Self {
            request_id,
            method,
            status,
            code: status.code(),
            data: None,
            error: Some(err.to_string()),
        }
    }
}

/// Where replies go; implemented by the MQTT client
pub trait ReplyPublisher {
    fn publish_reply(
        &self,
        topic: &str,
        payload: Vec<u8>,
    ) -> impl std::future::Future<Output = Result<()>>;
}

impl ReplyPublisher for AsyncClient {
    async fn publish_reply(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        self.publish(topic, QoS::AtLeastOnce, false, payload)
            .await
            .context("Failed to publish reply")
    }
}

/// Routes calls to handlers
#[derive(Debug, Clone)]
pub struct Dispatcher {
    ctx: HandlerContext,
}

impl Dispatcher {
    pub fn new(ctx: HandlerContext) -> Self {
        Self { ctx }
    }

    /// Decode a raw payload and run the call it carries
    pub async fn handle(&self, payload: &[u8]) -> RpcReply {
        match serde_json::from_slice::<RpcCall>(payload) {
            Ok(call) => self.call(call).await,
            Err(e) => {
                warn!("Invalid RPC call payload: {}", e);
                let err = RpcError::invalid(format!("malformed call: {}", e));
                RpcReply::failure("unknown".to_string(), String::new(), &err)
            }
        }
    }

    pub async fn call(&self, call: RpcCall) -> RpcReply {
        let started = Instant::now();
        let RpcCall {
            request_id,
            object,
            method,
            params,
        } = call;

        let outcome = match Method::resolve(object.as_deref(), &method) {
            Ok(resolved) => self.invoke(resolved, &params).await,
            Err(e) => Err(e),
        };

        let elapsed = started.elapsed().as_millis();
        match outcome {
            Ok(response) => {
                debug!("{} [{}] OK in {}ms", method, request_id, elapsed);
                RpcReply::success(request_id, method, response.into_value())
            }
            Err(e) => {
                match &e {
                    RpcError::InvalidArgument(_) | RpcError::MethodNotFound(_) => {
                        debug!("{} [{}] rejected: {}", method, request_id, e)
                    }
                    _ => warn!("{} [{}] failed: {}", method, request_id, e),
                }
                RpcReply::failure(request_id, method, &e)
            }
        }
    }

    async fn invoke(&self, method: Method, params: &Value) -> RpcResult<Response> {
        let ctx = &self.ctx;
        let response = Response::new();

        match method {
            Method::Syslog => system::syslog(ctx, params, response).await,
            Method::Dmesg => system::dmesg(ctx, params, response).await,
            Method::ProcessList => system::process_list(ctx, params, response).await,
            Method::ProcessSignal => system::process_signal(ctx, params, response).await,
            Method::InitList => system::init_list(ctx, params, response).await,
            Method::InitAction => system::init_action(ctx, params, response).await,
            Method::SshkeysGet => system::sshkeys_get(ctx, params, response).await,
            Method::SshkeysSet => system::sshkeys_set(ctx, params, response).await,
            Method::ConntrackCount => network::conntrack_count(ctx, params, response).await,
            Method::ConntrackTable => network::conntrack_table(ctx, params, response).await,
            Method::ArpTable => network::arp_table(ctx, params, response).await,
            Method::DhcpLeases => network::dhcp_leases(ctx, params, response).await,
            Method::Dhcp6Leases => network::dhcp6_leases(ctx, params, response).await,
            Method::Routes => network::routes(ctx, params, response).await,
            Method::Routes6 => network::routes6(ctx, params, response).await,
            Method::List => list_methods(response),
        }
    }

    /// Handle one payload and publish the reply
    pub async fn respond<P: ReplyPublisher>(
        &self,
        publisher: &P,
        reply_topic: &str,
        payload: &[u8],
    ) -> Result<RpcReply> {
        let reply = self.handle(payload).await;
        let encoded = serde_json::to_vec(&reply).context("Failed to encode reply")?;
        publisher.publish_reply(reply_topic, encoded).await?;
        Ok(reply)
    }
}

#[derive(Debug, Serialize)]
struct MethodDescription {
    object: Option<RpcObject>,
    method: &'static str,
    params: &'static [&'static str],
}

fn list_methods(response: Response) -> RpcResult<Response> {
    let methods = Method::ALL
        .into_iter()
        .filter(|method| *method != Method::List)
        .map(|method| MethodDescription {
            object: method.object(),
            method: method.name(),
            params: method.params(),
        });

    response.with_array("methods", methods)
}

/// Serve calls until the process is stopped.
///
/// The call topic is (re)subscribed on every broker acknowledgement so a
/// reconnect with a clean session keeps receiving calls.
pub async fn serve(
    dispatcher: &Dispatcher,
    client: &AsyncClient,
    mut eventloop: EventLoop,
    mqtt: &MqttConfig,
) -> Result<()> {
    info!("Serving RPC calls on {}", mqtt.call_topic);

    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                info!("Connected to broker {}:{}", mqtt.broker_host, mqtt.broker_port);
                client
                    .subscribe(&mqtt.call_topic, QoS::AtLeastOnce)
                    .await
                    .context("Failed to subscribe to call topic")?;
            }
            Ok(Event::Incoming(Incoming::Publish(publish))) if publish.topic == mqtt.call_topic => {
                if let Err(e) = dispatcher
                    .respond(client, &mqtt.reply_topic, &publish.payload)
                    .await
                {
                    error!("Failed to reply: {:#}", e);
                }
            }
            Ok(Event::Incoming(Incoming::Publish(publish))) => {
                debug!("Ignoring message on {}", publish.topic);
            }
            Ok(_) => {}
            Err(e) => {
                error!("MQTT connection error: {}", e);
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }
    }
}
