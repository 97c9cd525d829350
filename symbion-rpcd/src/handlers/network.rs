//! `network` object handlers

use super::{read_source, HandlerContext};
use crate::parsers::arp::parse_arp_table;
use crate::parsers::conntrack::{parse_conntrack_table, parse_counter, ConntrackCounters};
use crate::parsers::leases::{parse_dhcp_leases, parse_dnsmasq_leases6, parse_relay_leases};
use crate::parsers::route::{parse_route6_table, parse_route_table};
use crate::response::Response;
use crate::settings::dhcp_lease_file;
use crate::status::{RpcResult, SourceContext};
use chrono::Utc;
use serde_json::Value;
use std::io;
use std::path::Path;
use tracing::debug;

/// Counter file value; unreadable or non-numeric files yield nothing
async fn read_counter(path: &Path) -> Option<u64> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => parse_counter(&text),
        Err(e) => {
            debug!("Counter {} unavailable: {}", path.display(), e);
            None
        }
    }
}

/// `conntrack_count()` → `{count?, limit?}`
pub async fn conntrack_count(ctx: &HandlerContext, _params: &Value, response: Response) -> RpcResult<Response> {
    let counters = ConntrackCounters {
        count: read_counter(&ctx.sources.conntrack_count).await,
        limit: read_counter(&ctx.sources.conntrack_max).await,
    };

    response
        .with_optional("count", counters.count)?
        .with_optional("limit", counters.limit)
}

/// `conntrack_table()` → `{entries}`
pub async fn conntrack_table(ctx: &HandlerContext, _params: &Value, response: Response) -> RpcResult<Response> {
    let text = read_source(&ctx.sources.conntrack_table).await?;
    response.with_array("entries", parse_conntrack_table(&text))
}

/// `arp_table()` → `{entries}`
pub async fn arp_table(ctx: &HandlerContext, _params: &Value, response: Response) -> RpcResult<Response> {
    let text = read_source(&ctx.sources.arp_table).await?;
    response.with_array("entries", parse_arp_table(&text))
}

/// `dhcp_leases()` → `{leases}`; empty when no lease file is configured
pub async fn dhcp_leases(ctx: &HandlerContext, _params: &Value, response: Response) -> RpcResult<Response> {
    let leases = match dhcp_lease_file(ctx.settings.as_ref()) {
        Some(path) => parse_dhcp_leases(&read_source(&path).await?, Utc::now().timestamp()),
        None => {
            debug!("No dnsmasq lease file configured");
            Vec::new()
        }
    };

    response.with_array("leases", leases)
}

/// `dhcp6_leases()` → `{leases}`.
///
/// The relay daemon's host file wins when it exists; otherwise the IPv6 rows
/// of the dnsmasq lease file are used.
pub async fn dhcp6_leases(ctx: &HandlerContext, _params: &Value, response: Response) -> RpcResult<Response> {
    let now = Utc::now().timestamp();
    let relay = &ctx.sources.relay_leases;

    let leases = match tokio::fs::read(relay).await {
        Ok(bytes) => parse_relay_leases(&String::from_utf8_lossy(&bytes), now),
        Err(e) if e.kind() == io::ErrorKind::NotFound => match dhcp_lease_file(ctx.settings.as_ref()) {
            Some(path) => parse_dnsmasq_leases6(&read_source(&path).await?, now),
            None => Vec::new(),
        },
        Err(e) => return Err(e).source_context(format!("reading {}", relay.display())),
    };

    response.with_array("leases", leases)
}

/// `routes()` → `{routes}`
pub async fn routes(ctx: &HandlerContext, _params: &Value, response: Response) -> RpcResult<Response> {
    let text = read_source(&ctx.sources.route_table).await?;
    response.with_array("routes", parse_route_table(&text))
}

/// `routes6()` → `{routes}`
pub async fn routes6(ctx: &HandlerContext, _params: &Value, response: Response) -> RpcResult<Response> {
    let text = read_source(&ctx.sources.route6_table).await?;
    response.with_array("routes", parse_route6_table(&text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::context;
    use crate::status::RpcStatus;
    use serde_json::json;
    use symbion_devkit::FakeHost;

    fn configure_leasefile(host: &FakeHost, file: &Path) {
        host.write(
            "etc/config/dhcp",
            format!("config dnsmasq\n\toption leasefile '{}'\n", file.display()),
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_arp_table_scenario() {
        let host = FakeHost::new().unwrap();
        host.write(
            "proc/net/arp",
            "IP address HW type Flags HW address Mask Device\n192.0.2.5 0x1 0x2 aa:bb:cc:dd:ee:ff * eth0\n",
        )
        .unwrap();

        let ctx = context(&host);
        let value = arp_table(&ctx, &Value::Null, Response::new()).await.unwrap().into_value();
        assert_eq!(
            value,
            json!({"entries": [{"ipaddr": "192.0.2.5", "macaddr": "aa:bb:cc:dd:ee:ff", "device": "eth0"}]})
        );
    }

    #[tokio::test]
    async fn test_missing_tables_are_not_found() {
        let host = FakeHost::new().unwrap();
        let ctx = context(&host);

        for result in [
            arp_table(&ctx, &Value::Null, Response::new()).await,
            routes(&ctx, &Value::Null, Response::new()).await,
            routes6(&ctx, &Value::Null, Response::new()).await,
            conntrack_table(&ctx, &Value::Null, Response::new()).await,
        ] {
            assert_eq!(result.unwrap_err().status(), RpcStatus::NotFound);
        }
    }

    #[tokio::test]
    async fn test_conntrack_counters() {
        let host = FakeHost::new().unwrap();
        let ctx = context(&host);

        let value = conntrack_count(&ctx, &Value::Null, Response::new()).await.unwrap();
        assert!(value.is_empty());

        host.write("proc/sys/net/netfilter/nf_conntrack_count", "42\n").unwrap();
        host.write("proc/sys/net/netfilter/nf_conntrack_max", "garbage\n").unwrap();
        let value = conntrack_count(&ctx, &Value::Null, Response::new()).await.unwrap();
        assert_eq!(value.into_value(), json!({"count": 42}));

        host.write("proc/sys/net/netfilter/nf_conntrack_max", "16384\n").unwrap();
        let value = conntrack_count(&ctx, &Value::Null, Response::new()).await.unwrap();
        assert_eq!(value.into_value(), json!({"count": 42, "limit": 16384}));
    }

    #[tokio::test]
    async fn test_conntrack_table() {
        let host = FakeHost::new().unwrap();
        host.write(
            "proc/net/nf_conntrack",
            "ipv4     2 udp      17 25 src=10.0.0.5 dst=10.0.0.1 sport=5353 dport=53 packets=1 bytes=70 src=10.0.0.1 dst=10.0.0.5 sport=53 dport=5353 packets=1 bytes=120 mark=0 use=2\nipv4 2\n",
        )
        .unwrap();

        let ctx = context(&host);
        let value = conntrack_table(&ctx, &Value::Null, Response::new()).await.unwrap().into_value();
        let entries = value["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["protocol"], 17);
        assert_eq!(entries[0]["rx_bytes"], 70);
        assert_eq!(entries[0]["tx_bytes"], 120);
    }

    #[tokio::test]
    async fn test_dhcp_leases_without_config() {
        let host = FakeHost::new().unwrap();
        let ctx = context(&host);

        let value = dhcp_leases(&ctx, &Value::Null, Response::new()).await.unwrap();
        assert_eq!(value.into_value(), json!({"leases": []}));

        let value = dhcp6_leases(&ctx, &Value::Null, Response::new()).await.unwrap();
        assert_eq!(value.into_value(), json!({"leases": []}));
    }

    #[tokio::test]
    async fn test_dhcp_leases_from_configured_file() {
        let host = FakeHost::new().unwrap();
        let expiry = Utc::now().timestamp() + 3600;
        let leases = host
            .write(
                "tmp/dhcp.leases",
                format!(
                    "{expiry} aa:bb:cc:00:11:22 192.168.1.100 laptop 01:aa:bb:cc:00:11:22\n\
                     {expiry} aa:bb:cc:00:11:44 2001:db8::50 phone 00:01:00:01:2a:3b\n"
                ),
            )
            .unwrap();
        configure_leasefile(&host, &leases);

        let ctx = context(&host);
        let value = dhcp_leases(&ctx, &Value::Null, Response::new()).await.unwrap().into_value();
        let v4 = value["leases"].as_array().unwrap();
        assert_eq!(v4.len(), 1);
        assert_eq!(v4[0]["ipaddr"], "192.168.1.100");
        let remaining = v4[0]["expires"].as_i64().unwrap();
        assert!((3590..=3600).contains(&remaining));

        let value = dhcp6_leases(&ctx, &Value::Null, Response::new()).await.unwrap().into_value();
        let v6 = value["leases"].as_array().unwrap();
        assert_eq!(v6.len(), 1);
        assert_eq!(v6[0]["ip6addr"], "2001:db8::50");
        assert_eq!(v6[0]["duid"], "00:01:00:01:2a:3b");
        assert_eq!(v6[0]["macaddr"], "aa:bb:cc:00:11:44");
    }

    #[tokio::test]
    async fn test_relay_leases_take_precedence() {
        let host = FakeHost::new().unwrap();
        let leases = host
            .write("tmp/dhcp.leases", "1 aa:bb 2001:db8::50 phone 00:01\n")
            .unwrap();
        configure_leasefile(&host, &leases);
        host.write(
            "tmp/hosts/6relayd",
            "# br-lan 000100011c4a2f2a 1 myhost 1 5 128 2001:db8::1234/128\n",
        )
        .unwrap();

        let ctx = context(&host);
        let value = dhcp6_leases(&ctx, &Value::Null, Response::new()).await.unwrap().into_value();
        let v6 = value["leases"].as_array().unwrap();
        assert_eq!(v6.len(), 1);
        assert_eq!(v6[0]["ip6addr"], "2001:db8::1234/128");
        assert_eq!(v6[0]["hostname"], "myhost");
        assert!(v6[0]["expires"].as_i64().unwrap() < 0);
        assert!(v6[0].get("macaddr").is_none());
    }

    #[tokio::test]
    async fn test_configured_lease_file_missing() {
        let host = FakeHost::new().unwrap();
        configure_leasefile(&host, &host.path("tmp/dhcp.leases"));

        let ctx = context(&host);
        let err = dhcp_leases(&ctx, &Value::Null, Response::new()).await.unwrap_err();
        assert_eq!(err.status(), RpcStatus::NotFound);
    }

    #[cfg(target_endian = "little")]
    #[tokio::test]
    async fn test_routes() {
        let host = FakeHost::new().unwrap();
        host.write(
            "proc/net/route",
            "Iface\tDestination\tGateway\tFlags\tRefCnt\tUse\tMetric\tMask\n\
             eth0\t00000000\t0101A8C0\t0003\t0\t0\t10\t00000000\n",
        )
        .unwrap();
        host.write(
            "proc/net/ipv6_route",
            "20010db8000100000000000000000000 40 00000000000000000000000000000000 00 00000000000000000000000000000000 00000100 00000001 00000000 00000001   br-lan\n",
        )
        .unwrap();

        let ctx = context(&host);
        let value = routes(&ctx, &Value::Null, Response::new()).await.unwrap().into_value();
        assert_eq!(
            value,
            json!({"routes": [{"target": "0.0.0.0/0", "nexthop": "192.168.1.1", "metric": 10, "device": "eth0"}]})
        );

        let value = routes6(&ctx, &Value::Null, Response::new()).await.unwrap().into_value();
        assert_eq!(value["routes"][0]["target"], "2001:db8:1::/64");
        assert_eq!(value["routes"][0]["metric"], 256);
    }
}
