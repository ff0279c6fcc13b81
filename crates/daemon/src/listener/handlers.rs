// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request/response command handlers.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use fa_core::{TokenSet, TunnelKey};
use fa_wire::{EstablishResponse, Instances, PingResponse};
use tracing::{debug, info, warn};

use super::session::{arity, err, json, ok, Stream};
use super::ListenCtx;
use crate::adapters::{EngineError, Tunnel};

/// Reply text for commands naming a tunnel that isn't established
pub(crate) const TUNNEL_UNAVAILABLE: &str = "tunnel unavailable";

/// Reply text when a name resolves to nothing
pub(crate) const NO_SUCH_HOST: &str = "no such host";

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const INSTANCES_TIMEOUT: Duration = Duration::from_secs(30);
const PROBE_NAME: &str = "_apps.internal";

pub(super) async fn ping<S: Stream>(ctx: &ListenCtx, stream: &mut S, args: &[&str]) {
    if !arity(stream, "ping", args, 0, 0).await {
        return;
    }
    let response = PingResponse {
        pid: std::process::id(),
        version: ctx.options.version.clone(),
        background: ctx.options.background,
    };
    json(stream, &response).await;
}

pub(super) async fn kill<S: Stream>(ctx: &ListenCtx, stream: &mut S, args: &[&str]) {
    if !arity(stream, "kill", args, 0, 0).await {
        return;
    }
    ok(stream, None).await;
    info!("kill requested");
    ctx.shutdown.cancel();
}

pub(super) async fn establish<S: Stream>(
    ctx: &ListenCtx,
    stream: &mut S,
    args: &[&str],
    tokens: &TokenSet,
    recycle: bool,
) {
    let verb = if recycle { "reestablish" } else { "establish" };
    if !arity(stream, verb, args, 1, 2).await {
        return;
    }
    let key = TunnelKey::from_args(args[0], args.get(1).copied());
    match ctx.registry.establish(ctx.engine.as_ref(), tokens, &key, recycle).await {
        Ok(tunnel) => {
            let response = EstablishResponse {
                state: tunnel.state().clone(),
                config: tunnel.config().clone(),
            };
            json(stream, &response).await;
        }
        Err(e) => {
            err(stream, &e.to_string()).await;
        }
    }
}

pub(super) async fn probe<S: Stream>(ctx: &ListenCtx, stream: &mut S, args: &[&str]) {
    if !arity(stream, "probe", args, 1, 2).await {
        return;
    }
    let key = TunnelKey::from_args(args[0], args.get(1).copied());
    let Some(tunnel) = ctx.registry.get(&key).await else {
        err(stream, TUNNEL_UNAVAILABLE).await;
        return;
    };

    debug!(tunnel = %key, "probing ...");
    match tokio::time::timeout(PROBE_TIMEOUT, tunnel.lookup_txt(PROBE_NAME)).await {
        Err(_) => {
            err(stream, TUNNEL_UNAVAILABLE).await;
        }
        Ok(Err(e)) => {
            err(stream, &format!("failed probing \"{key}\": {e}")).await;
        }
        Ok(Ok(results)) => {
            debug!(tunnel = %key, results = %results.join(", "), "probed");
            ok(stream, None).await;
        }
    }
}

pub(super) async fn resolve<S: Stream>(ctx: &ListenCtx, stream: &mut S, args: &[&str]) {
    if !arity(stream, "resolve", args, 2, 3).await {
        return;
    }
    let Some(tunnel) = tunnel_for(ctx, args[0], args.get(2).copied()).await else {
        err(stream, TUNNEL_UNAVAILABLE).await;
        return;
    };
    match resolve_addr(tunnel.as_ref(), args[1]).await {
        Ok(Some(addr)) => ok(stream, Some(&addr)).await,
        Ok(None) => ok(stream, None).await,
        Err(e) => err(stream, &e.to_string()).await,
    };
}

pub(super) async fn lookup_txt<S: Stream>(ctx: &ListenCtx, stream: &mut S, args: &[&str]) {
    if !arity(stream, "lookupTxt", args, 2, 3).await {
        return;
    }
    let Some(tunnel) = tunnel_for(ctx, args[0], args.get(2).copied()).await else {
        err(stream, TUNNEL_UNAVAILABLE).await;
        return;
    };
    match tunnel.lookup_txt(args[1]).await {
        Ok(records) => json(stream, &records).await,
        Err(e) => err(stream, &e.to_string()).await,
    };
}

pub(super) async fn instances<S: Stream>(ctx: &ListenCtx, stream: &mut S, args: &[&str]) {
    if !arity(stream, "instances", args, 2, 3).await {
        return;
    }
    let Some(tunnel) = tunnel_for(ctx, args[0], args.get(2).copied()).await else {
        err(stream, TUNNEL_UNAVAILABLE).await;
        return;
    };
    let app = args[1];

    let fetched = tokio::time::timeout(INSTANCES_TIMEOUT, fetch_instances(tunnel.as_ref(), app))
        .await
        .unwrap_or_else(|_| Err("timed out".to_string()));
    match fetched {
        Ok(instances) if instances.is_empty() => {
            err(stream, &format!("no running hosts for \"{app}\" found")).await
        }
        Ok(instances) => json(stream, &instances).await,
        Err(e) => err(stream, &format!("failed fetching instances for \"{app}\": {e}")).await,
    };
}

pub(super) async fn tunnel_for(
    ctx: &ListenCtx,
    org: &str,
    network: Option<&str>,
) -> Option<Arc<dyn Tunnel>> {
    ctx.registry.get(&TunnelKey::from_args(org, network)).await
}

/// Regions from `regions.<app>.internal`, then each region's AAAA records.
/// A region with one address is labelled by its name, otherwise each
/// address is labelled `region (addr)`.
async fn fetch_instances(tunnel: &dyn Tunnel, app: &str) -> Result<Instances, String> {
    let records = tunnel
        .lookup_txt(&format!("regions.{app}.internal"))
        .await
        .map_err(|e| format!("look up regions for {app}: {e}"))?;
    let regions = records
        .first()
        .map(|r| r.trim_matches(|c: char| c == ' ' || c == '\t'))
        .unwrap_or_default();
    if regions.is_empty() {
        return Err(format!("can't find deployed regions for {app}"));
    }

    let mut instances = Instances::default();
    for region in regions.split(',') {
        let name = format!("{region}.{app}.internal");
        let addrs = match tunnel.lookup_aaaa(&name).await {
            Ok(addrs) => addrs,
            Err(e) => {
                warn!(name = %name, error = %e, "can't lookup records");
                continue;
            }
        };
        if let [addr] = addrs.as_slice() {
            instances.push(name, addr.to_string());
            continue;
        }
        for addr in addrs {
            instances.push(format!("{region} ({addr})"), addr.to_string());
        }
    }
    Ok(instances)
}

/// Resolve `host[:port]` through the tunnel. IP literals pass through
/// unchanged; `None` when the name has no AAAA records.
pub(super) async fn resolve_addr(
    tunnel: &dyn Tunnel,
    addr: &str,
) -> Result<Option<String>, EngineError> {
    let (host, port) = split_host_port(addr);
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(Some(join_host_port(&ip.to_string(), port)));
    }
    let ips = tunnel.lookup_aaaa(host).await?;
    Ok(ips.first().map(|ip| join_host_port(&ip.to_string(), port)))
}

fn split_host_port(addr: &str) -> (&str, Option<&str>) {
    if let Some((host, tail)) = addr.strip_prefix('[').and_then(|rest| rest.split_once(']')) {
        return (host, tail.strip_prefix(':').filter(|p| !p.is_empty()));
    }
    // A bare IPv6 literal has no port
    if addr.matches(':').count() > 1 {
        return (addr, None);
    }
    match addr.rsplit_once(':') {
        Some((host, port)) if !port.is_empty() => (host, Some(port)),
        Some((host, _)) => (host, None),
        None => (addr, None),
    }
}

fn join_host_port(host: &str, port: Option<&str>) -> String {
    match port {
        None => host.to_string(),
        Some(port) if host.contains(':') => format!("[{host}]:{port}"),
        Some(port) => format!("{host}:{port}"),
    }
}

#[cfg(test)]
#[path = "handlers_tests.rs"]
mod tests;
