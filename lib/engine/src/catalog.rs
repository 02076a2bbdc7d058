//! Loading of the service descriptors, from the service directories or from the service
//! description graphs stored in the graph store.

use apigraph_common::descriptor::{description_graph_uri, shapes_graph_uri};
use apigraph_common::{
    ArgumentBinding, ArgumentDescriptor, Capability, DescriptorError, DescriptorSource,
    GatewayError, GatewayResult, ServiceDescriptor,
};
use apigraph_store::results::{lexical_value, select};
use apigraph_store::GraphStore;
use oxrdf::{NamedNode, Term};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tracing::debug;

/// The descriptor file of a service, in its directory.
pub const SERVICE_FILE: &str = "service.toml";
pub const PROFILE_FILE: &str = "profile.jsonld";
pub const INSERT_RULE_FILE: &str = "insert.sparql";
pub const CONSTRUCT_RULE_FILE: &str = "construct.sparql";

const PREFIXES: &str = "PREFIX sd: <http://www.w3.org/ns/sparql-service-description#>
PREFIX dct: <http://purl.org/dc/terms/>
PREFIX schema: <http://schema.org/>
PREFIX hydra: <http://www.w3.org/ns/hydra/core#>
PREFIX shacl: <http://www.w3.org/ns/shacl#>
PREFIX sms: <http://ns.inria.fr/sparql-micro-service#>
";

/// `service.toml`
///
/// ```toml
/// api_query = "https://api.gbif.org/v1/species/match?name={name}"
/// cache_expires_after = 2592000
/// add_provenance = true
///
/// [[arguments]]
/// name = "name"
/// predicate = "http://schema.org/name"
///
/// [capability]
/// predicates = ["http://schema.org/identifier"]
/// classes = ["http://rs.tdwg.org/dwc/terms/Taxon"]
/// ```
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ServiceFile {
    api_query: String,
    #[serde(default)]
    arguments: Vec<ArgumentFile>,
    /// In seconds.
    #[serde(default)]
    cache_expires_after: Option<u64>,
    #[serde(default)]
    http_headers: BTreeMap<String, String>,
    #[serde(default)]
    add_provenance: bool,
    #[serde(default)]
    argument_builder: Option<String>,
    #[serde(default)]
    capability: CapabilityFile,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ArgumentFile {
    name: String,
    #[serde(default)]
    predicate: Option<String>,
    #[serde(default)]
    shape: Option<String>,
    #[serde(default)]
    pass_multiple_values_as_csv: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CapabilityFile {
    #[serde(default)]
    predicates: Vec<String>,
    #[serde(default)]
    classes: Vec<String>,
}

/// Finds and reads the descriptors of the deployed services.
///
/// A service directory holding a `service.toml` file takes precedence over a service description
/// graph with the same name.
pub struct ServiceCatalog {
    store: Arc<dyn GraphStore>,
    root_url: String,
    services_paths: Vec<PathBuf>,
}

impl ServiceCatalog {
    pub fn new(store: Arc<dyn GraphStore>, root_url: &str, services_paths: Vec<PathBuf>) -> Self {
        Self {
            store,
            root_url: root_url.trim_end_matches('/').to_owned(),
            services_paths,
        }
    }

    /// Loads and validates the descriptor of a service.
    pub async fn load(&self, name: &str) -> GatewayResult<ServiceDescriptor> {
        apigraph_common::descriptor::validate_service_name(name)?;
        let dir = self.service_dir(name).await;
        let has_service_file = match dir.as_deref() {
            Some(dir) => is_file(&dir.join(SERVICE_FILE)).await,
            None => false,
        };
        let descriptor = match dir.as_deref() {
            Some(dir) if has_service_file => load_file(name, dir).await?,
            _ => self.load_graph(name, dir.as_deref()).await?,
        };
        descriptor.validate()?;
        debug!("Service '{name}' loaded from {:?}", descriptor.source);
        Ok(descriptor)
    }

    /// The names of all the services, sorted.
    pub async fn list(&self) -> GatewayResult<Vec<String>> {
        let mut names = Vec::new();
        for services_path in &self.services_paths {
            names.extend(collect_service_dirs(services_path).await);
        }

        let query = format!(
            "{PREFIXES}SELECT DISTINCT ?g WHERE {{ GRAPH ?g {{ ?service a sd:Service }} }}"
        );
        let prefix = format!("{}/", self.root_url);
        for solution in select(self.store.as_ref(), &query, None).await? {
            let Some(graph) = solution.get("g").map(lexical_value) else {
                continue;
            };
            if let Some(name) = graph
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix("/ServiceDescription"))
            {
                if apigraph_common::descriptor::validate_service_name(name).is_ok() {
                    names.push(name.to_owned());
                }
            }
        }
        names.sort();
        names.dedup();
        Ok(names)
    }

    async fn service_dir(&self, name: &str) -> Option<PathBuf> {
        for path in &self.services_paths {
            let dir = path.join(name);
            if is_dir(&dir).await {
                return Some(dir);
            }
        }
        None
    }

    async fn load_graph(&self, name: &str, dir: Option<&Path>) -> GatewayResult<ServiceDescriptor> {
        let service_uri = format!("{}/{name}/", self.root_url);
        let description = description_graph_uri(&self.root_url, name);

        let query = format!(
            "{PREFIXES}SELECT ?apiQuery ?expiresAfter ?addProvenance ?argumentBuilder WHERE {{
  GRAPH <{description}> {{
    <{service_uri}> a sd:Service ;
      dct:source/schema:potentialAction/schema:target/hydra:template ?apiQuery .
    OPTIONAL {{ <{service_uri}> sms:cacheExpiresAfter ?expiresAfter }}
    OPTIONAL {{ <{service_uri}> sms:addProvenance ?addProvenance }}
    OPTIONAL {{ <{service_uri}> sms:argumentBuilder ?argumentBuilder }}
  }}
}} LIMIT 1"
        );
        let solutions = select(self.store.as_ref(), &query, None).await?;
        let Some(solution) = solutions.first() else {
            return Err(GatewayError::BadRequest(format!(
                "No service description found for service <{service_uri}>"
            )));
        };
        let invalid = |message: String| DescriptorError::Invalid {
            service: name.to_owned(),
            message,
        };
        let api_query = solution.get("apiQuery").map(lexical_value).unwrap_or_default();
        let cache_expires_after = match solution.get("expiresAfter") {
            Some(Term::Literal(literal)) => Some(parse_duration(literal.value()).ok_or_else(|| {
                invalid(format!(
                    "invalid sms:cacheExpiresAfter '{}', an xsd:duration is expected",
                    literal.value()
                ))
            })?),
            _ => None,
        };
        let add_provenance = solution
            .get("addProvenance")
            .is_some_and(|value| matches!(lexical_value(value).as_str(), "true" | "1"));
        let argument_builder = solution.get("argumentBuilder").map(lexical_value);

        let query = format!(
            "{PREFIXES}SELECT ?name ?property ?shape ?csv WHERE {{
  GRAPH <{description}> {{
    <{service_uri}> dct:source/schema:potentialAction/schema:target/hydra:mapping ?mapping .
    ?mapping hydra:variable ?name .
    OPTIONAL {{ ?mapping hydra:property ?property }}
    OPTIONAL {{ ?mapping shacl:sourceShape ?shape }}
    OPTIONAL {{ ?mapping sms:passMultipleValuesAsCsv ?csv }}
  }}
}} ORDER BY ?name"
        );
        let mut arguments = Vec::new();
        for solution in select(self.store.as_ref(), &query, None).await? {
            let Some(argument) = solution.get("name").map(lexical_value) else {
                continue;
            };
            let binding = match (solution.get("property"), solution.get("shape")) {
                (Some(Term::NamedNode(property)), None) => {
                    ArgumentBinding::Predicate(property.clone())
                }
                (None, Some(Term::NamedNode(shape))) => ArgumentBinding::Shape(shape.clone()),
                _ => {
                    return Err(DescriptorError::InvalidBinding {
                        service: name.to_owned(),
                        argument,
                    }
                    .into())
                }
            };
            arguments.push(ArgumentDescriptor {
                name: argument,
                binding,
                pass_multiple_values_as_csv: solution
                    .get("csv")
                    .is_some_and(|value| matches!(lexical_value(value).as_str(), "true" | "1")),
            });
        }

        let query = format!(
            "{PREFIXES}SELECT ?headerName ?headerValue WHERE {{
  GRAPH <{description}> {{
    <{service_uri}> sms:httpHeader ?header .
    ?header sms:headerName ?headerName ; sms:headerValue ?headerValue .
  }}
}}"
        );
        let http_headers = select(self.store.as_ref(), &query, None)
            .await?
            .iter()
            .filter_map(|solution| {
                Some((
                    lexical_value(solution.get("headerName")?),
                    lexical_value(solution.get("headerValue")?),
                ))
            })
            .collect();

        let files = match dir {
            Some(dir) => read_rule_files(dir).await?,
            None => RuleFiles::default(),
        };
        Ok(ServiceDescriptor {
            name: name.to_owned(),
            api_query,
            arguments,
            cache_expires_after,
            http_headers,
            add_provenance,
            argument_builder,
            capability: self.graph_capability(name).await?,
            profile: files.profile,
            insert_rule: files.insert_rule,
            construct_rule: files.construct_rule,
            source: DescriptorSource::Graph,
        })
    }

    /// Reads the predicates and classes a service produces from its shapes graph.
    async fn graph_capability(&self, name: &str) -> GatewayResult<Capability> {
        let shapes = shapes_graph_uri(&self.root_url, name);
        let query = format!(
            "{PREFIXES}SELECT DISTINCT ?path ?class WHERE {{
  GRAPH <{shapes}> {{
    {{ ?shape shacl:path ?path FILTER(isIRI(?path)) }}
    UNION {{ ?shape shacl:targetClass ?class }}
    UNION {{ ?shape shacl:class ?class }}
  }}
}}"
        );
        let mut capability = Capability::default();
        for solution in select(self.store.as_ref(), &query, None).await? {
            if let Some(Term::NamedNode(path)) = solution.get("path") {
                push_unique(&mut capability.predicates, path.clone());
            }
            if let Some(Term::NamedNode(class)) = solution.get("class") {
                push_unique(&mut capability.classes, class.clone());
            }
        }
        Ok(capability)
    }
}

fn push_unique(nodes: &mut Vec<NamedNode>, node: NamedNode) {
    if !nodes.contains(&node) {
        nodes.push(node);
    }
}

#[derive(Default)]
struct RuleFiles {
    profile: serde_json::Value,
    insert_rule: Option<String>,
    construct_rule: Option<String>,
}

async fn read_rule_files(dir: &Path) -> Result<RuleFiles, DescriptorError> {
    let invalid = |message: String| DescriptorError::Invalid {
        service: dir.display().to_string(),
        message,
    };
    let profile = match read_optional(&dir.join(PROFILE_FILE)).await.map_err(invalid)? {
        Some(profile) => serde_json::from_str(&profile)
            .map_err(|e| invalid(format!("{PROFILE_FILE} is not valid JSON: {e}")))?,
        None => serde_json::Value::Null,
    };
    Ok(RuleFiles {
        profile,
        insert_rule: read_optional(&dir.join(INSERT_RULE_FILE))
            .await
            .map_err(invalid)?,
        construct_rule: read_optional(&dir.join(CONSTRUCT_RULE_FILE))
            .await
            .map_err(invalid)?,
    })
}

/// Reads a file, `None` if it does not exist.
async fn read_optional(path: &Path) -> Result<Option<String>, String> {
    match fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(format!("unable to read {}: {e}", path.display())),
    }
}

async fn is_file(path: &Path) -> bool {
    fs::metadata(path).await.is_ok_and(|m| m.is_file())
}

async fn is_dir(path: &Path) -> bool {
    fs::metadata(path).await.is_ok_and(|m| m.is_dir())
}

async fn load_file(name: &str, dir: &Path) -> Result<ServiceDescriptor, DescriptorError> {
    let invalid = |message: String| DescriptorError::Invalid {
        service: name.to_owned(),
        message,
    };
    let content = read_optional(&dir.join(SERVICE_FILE))
        .await
        .map_err(invalid)?
        .unwrap_or_default();
    let file: ServiceFile =
        toml::from_str(&content).map_err(|e| invalid(format!("invalid {SERVICE_FILE}: {e}")))?;
    let iri = |value: &str| {
        NamedNode::new(value).map_err(|e| invalid(format!("invalid IRI '{value}': {e}")))
    };

    let mut arguments = Vec::new();
    for argument in file.arguments {
        let binding = match (argument.predicate, argument.shape) {
            (Some(predicate), None) => ArgumentBinding::Predicate(iri(&predicate)?),
            (None, Some(shape)) => ArgumentBinding::Shape(iri(&shape)?),
            _ => {
                return Err(DescriptorError::InvalidBinding {
                    service: name.to_owned(),
                    argument: argument.name,
                })
            }
        };
        arguments.push(ArgumentDescriptor {
            name: argument.name,
            binding,
            pass_multiple_values_as_csv: argument.pass_multiple_values_as_csv,
        });
    }
    let capability = Capability {
        predicates: file
            .capability
            .predicates
            .iter()
            .map(|p| iri(p))
            .collect::<Result<_, _>>()?,
        classes: file
            .capability
            .classes
            .iter()
            .map(|c| iri(c))
            .collect::<Result<_, _>>()?,
    };

    let files = read_rule_files(dir).await?;
    Ok(ServiceDescriptor {
        name: name.to_owned(),
        api_query: file.api_query,
        arguments,
        cache_expires_after: file.cache_expires_after.map(Duration::from_secs),
        http_headers: file.http_headers.into_iter().collect(),
        add_provenance: file.add_provenance,
        argument_builder: file.argument_builder,
        capability,
        profile: files.profile,
        insert_rule: files.insert_rule,
        construct_rule: files.construct_rule,
        source: DescriptorSource::File(dir.to_owned()),
    })
}

/// The names of the service directories below `root`, i.e., those holding a `service.toml`.
async fn collect_service_dirs(root: &Path) -> Vec<String> {
    let mut names = Vec::new();
    let mut pending = vec![(root.to_owned(), String::new())];
    while let Some((dir, prefix)) = pending.pop() {
        let Ok(mut entries) = fs::read_dir(&dir).await else {
            continue;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if !is_dir(&path).await {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let name = if prefix.is_empty() {
                file_name.to_owned()
            } else {
                format!("{prefix}/{file_name}")
            };
            if is_file(&path.join(SERVICE_FILE)).await {
                names.push(name.clone());
            }
            pending.push((path, name));
        }
    }
    names
}

/// Parses an `xsd:duration` such as `P2D`, `PT3600S`, `PT0.5S` or `P1DT12H`.
///
/// Years and months count as 365 and 30 days.
pub fn parse_duration(value: &str) -> Option<Duration> {
    const DAY: u64 = 86_400;
    let rest = value.strip_prefix('P')?;
    let (date, time) = match rest.split_once('T') {
        Some((date, time)) => (date, Some(time)),
        None => (rest, None),
    };
    if date.is_empty() && time.map_or(true, str::is_empty) {
        return None;
    }
    let mut total = Duration::ZERO;
    for (amount, unit) in components(date)? {
        let unit = match unit {
            'Y' => 365 * DAY,
            'M' => 30 * DAY,
            'W' => 7 * DAY,
            'D' => DAY,
            _ => return None,
        };
        total = total.checked_add(whole(amount, unit)?)?;
    }
    for (amount, unit) in components(time.unwrap_or_default())? {
        let part = match unit {
            'H' => whole(amount, 3600)?,
            'M' => whole(amount, 60)?,
            'S' => seconds(amount)?,
            _ => return None,
        };
        total = total.checked_add(part)?;
    }
    Some(total)
}

fn whole(amount: &str, unit_seconds: u64) -> Option<Duration> {
    Some(Duration::from_secs(
        amount.parse::<u64>().ok()?.checked_mul(unit_seconds)?,
    ))
}

/// Seconds may have a fractional part, kept down to the nanosecond.
fn seconds(amount: &str) -> Option<Duration> {
    let (whole, fraction) = amount.split_once('.').unwrap_or((amount, ""));
    if whole.is_empty() || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let nanos = format!("{:0<9}", &fraction[..fraction.len().min(9)])
        .parse::<u32>()
        .ok()?;
    Some(Duration::new(whole.parse().ok()?, nanos))
}

/// Splits `1DT` style parts into (amount, unit designator) pairs.
fn components(part: &str) -> Option<Vec<(&str, char)>> {
    let mut result = Vec::new();
    let mut start = 0;
    for (index, c) in part.char_indices() {
        if !c.is_ascii_digit() && c != '.' {
            let amount = &part[start..index];
            if amount.is_empty() {
                return None;
            }
            result.push((amount, c));
            start = index + c.len_utf8();
        }
    }
    (start == part.len()).then_some(result)
}
