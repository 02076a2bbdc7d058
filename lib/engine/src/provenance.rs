//! PROV-O statements describing each Web API invocation.

use apigraph_common::vocab::{prov, rdf, sms, xsd};
use chrono::{DateTime, SecondsFormat, Utc};
use oxrdf::{BlankNode, Literal, NamedNode, Triple};
use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

static API_KEY: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"(?i)(^|[?&])(api_?key|access_token|token|key)=[^&]*"));

/// Hides the value of the API keys and tokens passed in a query string.
pub fn redact(api_query: &str) -> Cow<'_, str> {
    match &*API_KEY {
        Ok(regex) => regex.replace_all(api_query, "${1}${2}=obfuscated"),
        Err(_) => Cow::Borrowed(api_query),
    }
}

/// Describes one invocation of a service as a `prov:Activity`.
///
/// `cache_hit` is the date the document was fetched at when it was served from the cache.
pub fn activity_triples(
    service_uri: &str,
    api_query: &str,
    started_at: DateTime<Utc>,
    cache_hit: Option<DateTime<Utc>>,
) -> Vec<Triple> {
    let activity = BlankNode::default();
    let mut triples = vec![
        Triple::new(activity.clone(), rdf::TYPE, prov::ACTIVITY.into_owned()),
        Triple::new(
            activity.clone(),
            prov::STARTED_AT_TIME,
            date_time(started_at),
        ),
        Triple::new(
            activity.clone(),
            sms::API_QUERY,
            Literal::new_simple_literal(redact(api_query)),
        ),
    ];
    if let Ok(service) = NamedNode::new(service_uri) {
        triples.push(Triple::new(activity.clone(), prov::USED, service));
    }
    if let Some(cache_hit) = cache_hit {
        triples.push(Triple::new(activity, sms::CACHE_HIT_TIME, date_time(cache_hit)));
    }
    triples
}

fn date_time(value: DateTime<Utc>) -> Literal {
    Literal::new_typed_literal(value.to_rfc3339_opts(SecondsFormat::Secs, true), xsd::DATE_TIME)
}
