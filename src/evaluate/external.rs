//! The remote-reply tag: dispatch to a configured external service with a
//! layered fallback chain (tag default → configured fallback → canned
//! keyword reply).

use std::collections::BTreeMap;

use metrics::counter;

use crate::ast::Element;
use crate::services::{client, ServiceRequest};

use super::EvalContext;

pub fn sraix(el: &Element, body: String, ctx: &mut EvalContext) -> String {
    let Some(service_name) = el.attr("service").map(str::trim).filter(|s| !s.is_empty()) else {
        return String::new();
    };
    let query = body.trim().to_string();

    let config = {
        let services = ctx.services.read().expect("service registry lock poisoned");
        services.get(service_name).cloned()
    };
    let Some(config) = config else {
        counter!("engine_service_errors_total").increment(1);
        ctx.diagnostics
            .push(format!("service '{service_name}' is not configured"));
        return el
            .attr("default")
            .map(str::to_string)
            .unwrap_or_else(|| client::fallback_reply(service_name, &query));
    };

    // Reuse a fresh-enough reply before spending a network call.
    if let Some(hit) =
        ctx.service_cache
            .lookup(&config.name, &query, config.cache_ttl_secs, ctx.clock.now())
    {
        return hit;
    }
    if !ctx
        .service_cache
        .try_consume(&config.name, config.daily_limit, ctx.clock.now())
    {
        counter!("engine_service_budget_exhausted_total").increment(1);
        ctx.diagnostics
            .push(format!("service '{}' hit its daily call limit", config.name));
        return el
            .attr("default")
            .map(str::to_string)
            .or_else(|| config.fallback_response.clone())
            .unwrap_or_else(|| client::fallback_reply(&config.name, &query));
    }

    let mut wildcards = BTreeMap::new();
    if config.include_wildcards {
        for (i, star) in ctx.stars.iter().enumerate() {
            if !star.is_empty() {
                wildcards.insert(format!("star{}", i + 1), star.clone());
            }
        }
    }
    let botid = {
        let kb = ctx.kb.read().expect("kb lock poisoned");
        kb.property("id").map(str::to_string)
    };

    let request = ServiceRequest {
        input: query.clone(),
        wildcards,
        botid,
    };

    match client::call(&config, &request) {
        Ok(reply) => {
            let reply = reply.trim().to_string();
            if config.cache_ttl_secs > 0 {
                ctx.service_cache
                    .store(&config.name, &query, reply.clone(), ctx.clock.now());
            }
            reply
        }
        Err(err) => {
            counter!("engine_service_errors_total").increment(1);
            client::warn_service_failure(&config.name, &query, &err);
            ctx.diagnostics.push(err.to_string());
            el.attr("default")
                .map(str::to_string)
                .or_else(|| config.fallback_response.clone())
                .unwrap_or_else(|| client::fallback_reply(&config.name, &query))
        }
    }
}
