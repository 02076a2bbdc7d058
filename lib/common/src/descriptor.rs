use crate::error::DescriptorError;
use oxrdf::NamedNode;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// Tells where the value of a service argument is found in the caller's query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentBinding {
    /// The value is the object of a triple pattern with this predicate.
    Predicate(NamedNode),
    /// The value is located by a property shape of the service's shapes graph.
    Shape(NamedNode),
}

/// One declared argument of a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentDescriptor {
    pub name: String,
    pub binding: ArgumentBinding,
    /// Whether multiple values are passed as one comma-separated value instead of being unwound.
    pub pass_multiple_values_as_csv: bool,
}

/// The kind of triples a service is able to produce, used for matchmaking.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capability {
    pub predicates: Vec<NamedNode>,
    pub classes: Vec<NamedNode>,
}

/// Where a descriptor has been read from. This selects the argument resolution mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorSource {
    /// A static descriptor file. Arguments are read from the query string.
    File(PathBuf),
    /// A capability graph stored in the graph store. Arguments are read from the graph pattern.
    Graph,
}

/// Identifies one deployed micro-service and everything needed to invoke it.
///
/// A descriptor is loaded once per request and is immutable afterward.
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    /// Path-like unique name, e.g. `flickr/getPhotosByTaxon`.
    pub name: String,
    /// The Web API query template with `{argName}` placeholders.
    pub api_query: String,
    pub arguments: Vec<ArgumentDescriptor>,
    pub cache_expires_after: Option<Duration>,
    pub http_headers: Vec<(String, String)>,
    pub add_provenance: bool,
    /// Name of a registered argument builder replacing the plain template substitution.
    pub argument_builder: Option<String>,
    pub capability: Capability,
    /// The JSON-LD profile applied to the Web API responses.
    pub profile: serde_json::Value,
    /// SPARQL update run against each scratch graph in graph-query mode.
    pub insert_rule: Option<String>,
    /// SPARQL CONSTRUCT query shaping each scratch graph into the response graph.
    pub construct_rule: Option<String>,
    pub source: DescriptorSource,
}

impl ServiceDescriptor {
    /// Checks the invariants that cannot be expressed by the types.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        validate_service_name(&self.name)?;

        let mut names = HashSet::new();
        for argument in &self.arguments {
            if !names.insert(argument.name.as_str()) {
                return Err(DescriptorError::DuplicateArgument {
                    service: self.name.clone(),
                    argument: argument.name.clone(),
                });
            }
        }

        if self.argument_builder.is_none() {
            for placeholder in placeholders(&self.api_query) {
                if !names.contains(placeholder) {
                    return Err(DescriptorError::UndeclaredPlaceholder {
                        service: self.name.clone(),
                        placeholder: placeholder.to_owned(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Returns the argument with the given name.
    pub fn argument(&self, name: &str) -> Option<&ArgumentDescriptor> {
        self.arguments.iter().find(|a| a.name == name)
    }

    /// Whether arguments are extracted from the graph pattern of the query.
    pub fn reads_arguments_from_graph_pattern(&self) -> bool {
        self.source == DescriptorSource::Graph
    }

    /// The URI identifying this service below the gateway root URL. It always ends with `/`.
    pub fn service_uri(&self, root_url: &str) -> String {
        format!("{}/{}/", root_url.trim_end_matches('/'), self.name)
    }

    /// The URI of the graph holding the service description.
    pub fn description_graph_uri(&self, root_url: &str) -> String {
        description_graph_uri(root_url, &self.name)
    }

    /// The URI of the graph holding the shapes of the service.
    pub fn shapes_graph_uri(&self, root_url: &str) -> String {
        shapes_graph_uri(root_url, &self.name)
    }
}

pub fn description_graph_uri(root_url: &str, service: &str) -> String {
    format!("{}/{service}/ServiceDescription", root_url.trim_end_matches('/'))
}

pub fn shapes_graph_uri(root_url: &str, service: &str) -> String {
    format!("{}/{service}/ShapesGraph", root_url.trim_end_matches('/'))
}

/// Checks that a service name is path-like: non-empty segments of letters, digits, `_`, `-`
/// or `.`, separated by `/`, never `.` or `..`.
pub fn validate_service_name(name: &str) -> Result<(), DescriptorError> {
    let valid = !name.is_empty()
        && name.split('/').all(|segment| {
            !segment.is_empty()
                && segment != "."
                && segment != ".."
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        });
    if valid {
        Ok(())
    } else {
        Err(DescriptorError::InvalidName(name.to_owned()))
    }
}

/// Lists the `{name}` placeholders of a template, in order of appearance.
pub fn placeholders(template: &str) -> Vec<&str> {
    let mut result = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            break;
        };
        let name = &after[..end];
        if !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            result.push(name);
            rest = &after[end + 1..];
        } else {
            rest = after;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(api_query: &str, arguments: &[&str]) -> ServiceDescriptor {
        ServiceDescriptor {
            name: "test/getThings".to_owned(),
            api_query: api_query.to_owned(),
            arguments: arguments
                .iter()
                .map(|name| ArgumentDescriptor {
                    name: (*name).to_owned(),
                    binding: ArgumentBinding::Predicate(NamedNode::new_unchecked(
                        "http://schema.org/name",
                    )),
                    pass_multiple_values_as_csv: false,
                })
                .collect(),
            cache_expires_after: None,
            http_headers: Vec::new(),
            add_provenance: false,
            argument_builder: None,
            capability: Capability::default(),
            profile: serde_json::Value::Null,
            insert_rule: None,
            construct_rule: None,
            source: DescriptorSource::Graph,
        }
    }

    #[test]
    fn placeholders_are_listed_in_order() {
        assert_eq!(
            placeholders("http://api.org/q?name={name}&page={page}&x={not valid}"),
            vec!["name", "page"]
        );
    }

    #[test]
    fn undeclared_placeholder_is_rejected() {
        let result = descriptor("http://api.org/q?name={name}&page={page}", &["name"]).validate();
        assert!(matches!(
            result,
            Err(DescriptorError::UndeclaredPlaceholder { placeholder, .. }) if placeholder == "page"
        ));
    }

    #[test]
    fn duplicate_argument_is_rejected() {
        let result = descriptor("http://api.org/q?name={name}", &["name", "name"]).validate();
        assert!(matches!(result, Err(DescriptorError::DuplicateArgument { .. })));
    }

    #[test]
    fn service_names_are_path_like() {
        assert!(validate_service_name("flickr/getPhotosByTaxon").is_ok());
        assert!(validate_service_name("../etc/passwd").is_err());
        assert!(validate_service_name("a//b").is_err());
        assert!(validate_service_name("a b").is_err());
    }

    #[test]
    fn graph_uris_are_derived_from_root_url() {
        let d = descriptor("http://api.org/", &[]);
        assert_eq!(
            d.service_uri("http://example.org/"),
            "http://example.org/test/getThings/"
        );
        assert_eq!(
            d.shapes_graph_uri("http://example.org"),
            "http://example.org/test/getThings/ShapesGraph"
        );
    }
}
