use apigraph_common::{GatewayError, GatewayResult, ResolvedArguments, ServiceDescriptor};

/// Reads the argument values from the HTTP parameters of the request.
///
/// A parameter may be repeated and each occurrence may hold comma-separated values.
pub fn resolve(
    descriptor: &ServiceDescriptor,
    parameters: &[(String, String)],
) -> GatewayResult<ResolvedArguments> {
    let mut arguments = ResolvedArguments::new();
    for argument in &descriptor.arguments {
        let values = parameters
            .iter()
            .filter(|(name, _)| *name == argument.name)
            .flat_map(|(_, value)| value.split(','))
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .collect::<Vec<_>>();
        if values.is_empty() {
            return Err(GatewayError::BadRequest(format!(
                "Missing argument '{}' of service '{}'",
                argument.name, descriptor.name
            )));
        }
        for value in values {
            arguments.push(&argument.name, value);
        }
    }
    Ok(arguments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use apigraph_common::{ArgumentBinding, ArgumentDescriptor, Capability, DescriptorSource};
    use oxrdf::NamedNode;

    fn descriptor() -> ServiceDescriptor {
        ServiceDescriptor {
            name: "flickr/getPhotosByTags".to_owned(),
            api_query: "https://api.example.org/photos?tags={tags}".to_owned(),
            arguments: vec![ArgumentDescriptor {
                name: "tags".to_owned(),
                binding: ArgumentBinding::Predicate(NamedNode::new_unchecked(
                    "http://schema.org/keywords",
                )),
                pass_multiple_values_as_csv: true,
            }],
            cache_expires_after: None,
            http_headers: Vec::new(),
            add_provenance: false,
            argument_builder: None,
            capability: Capability::default(),
            profile: serde_json::Value::Null,
            insert_rule: None,
            construct_rule: None,
            source: DescriptorSource::File("services/flickr/getPhotosByTags".into()),
        }
    }

    #[test]
    fn comma_separated_and_repeated_values() {
        let parameters = vec![
            ("tags".to_owned(), "dolphin, whale".to_owned()),
            ("tags".to_owned(), "orca".to_owned()),
            ("query".to_owned(), "SELECT".to_owned()),
        ];
        let arguments = resolve(&descriptor(), &parameters).unwrap();
        assert_eq!(
            arguments.get("tags").unwrap(),
            ["dolphin", "whale", "orca"].map(String::from).as_slice()
        );
    }

    #[test]
    fn missing_argument_is_a_bad_request() {
        let result = resolve(&descriptor(), &[]);
        assert!(matches!(result, Err(GatewayError::BadRequest(_))));
    }
}
