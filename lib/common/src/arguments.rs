use crate::descriptor::ServiceDescriptor;
use crate::error::GatewayError;
use std::fmt;

/// The values resolved for the arguments of one service invocation.
///
/// Arguments keep the order in which they were inserted, which the resolvers make equal to the
/// declaration order of the service. An argument may hold several values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedArguments {
    values: Vec<(String, Vec<String>)>,
}

impl ResolvedArguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value to an argument. Values already present are ignored.
    pub fn push(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.values.iter_mut().find(|(n, _)| n == name) {
            Some((_, values)) => {
                if !values.contains(&value) {
                    values.push(value);
                }
            }
            None => self.values.push((name.to_owned(), vec![value])),
        }
    }

    /// Returns the values of an argument.
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| values.as_slice())
    }

    /// The number of arguments that have at least one value.
    pub fn len(&self) -> usize {
        self.values.iter().filter(|(_, v)| !v.is_empty()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.values
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// Whether every argument declared by the service has at least one value.
    pub fn is_complete_for(&self, descriptor: &ServiceDescriptor) -> bool {
        descriptor
            .arguments
            .iter()
            .all(|a| self.get(&a.name).is_some_and(|v| !v.is_empty()))
    }
}

/// One combination of single values, i.e., the arguments of exactly one Web API invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgumentCombination {
    values: Vec<(String, String)>,
}

impl ArgumentCombination {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    fn with(&self, name: &str, value: &str) -> Self {
        let mut values = self.values.clone();
        values.push((name.to_owned(), value.to_owned()));
        Self { values }
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for ArgumentCombination {
    fn from_iter<T: IntoIterator<Item = (&'a str, &'a str)>>(iter: T) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(n, v)| (n.to_owned(), v.to_owned()))
                .collect(),
        }
    }
}

impl fmt::Display for ArgumentCombination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, value)) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}: {value}")?;
        }
        f.write_str("}")
    }
}

/// Unwinds the resolved arguments into the list of single-valued combinations.
///
/// Arguments flagged `pass_multiple_values_as_csv` contribute one comma-joined value; the other
/// arguments contribute one combination per value. The cross product is built in argument order
/// so the first argument varies slowest. More than `max_combinations` combinations is refused
/// before any of them is built.
pub fn unwind(
    arguments: &ResolvedArguments,
    descriptor: &ServiceDescriptor,
    max_combinations: usize,
) -> Result<Vec<ArgumentCombination>, GatewayError> {
    let options = arguments
        .iter()
        .map(|(name, values)| {
            let csv = descriptor
                .argument(name)
                .is_some_and(|a| a.pass_multiple_values_as_csv);
            if csv {
                (name, vec![values.join(",")])
            } else {
                (name, values.to_vec())
            }
        })
        .collect::<Vec<_>>();

    let count = options
        .iter()
        .try_fold(1_usize, |acc, (_, values)| acc.checked_mul(values.len()));
    match count {
        Some(count) if count <= max_combinations => {}
        _ => {
            return Err(GatewayError::BadRequest(format!(
                "The arguments of service '{}' entail more than {max_combinations} Web API invocations",
                descriptor.name
            )))
        }
    }

    let mut combinations = vec![ArgumentCombination::default()];
    for (name, values) in &options {
        combinations = combinations
            .iter()
            .flat_map(|combination| values.iter().map(|value| combination.with(name, value)))
            .collect();
    }
    Ok(combinations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{ArgumentBinding, ArgumentDescriptor, Capability, DescriptorSource};
    use oxrdf::NamedNode;

    fn descriptor(csv: &[(&str, bool)]) -> ServiceDescriptor {
        ServiceDescriptor {
            name: "test/unwind".to_owned(),
            api_query: String::new(),
            arguments: csv
                .iter()
                .map(|(name, csv)| ArgumentDescriptor {
                    name: (*name).to_owned(),
                    binding: ArgumentBinding::Predicate(NamedNode::new_unchecked(
                        "http://example.org/p",
                    )),
                    pass_multiple_values_as_csv: *csv,
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

    fn arguments(values: &[(&str, &[&str])]) -> ResolvedArguments {
        let mut args = ResolvedArguments::new();
        for (name, values) in values {
            for value in *values {
                args.push(name, *value);
            }
        }
        args
    }

    #[test]
    fn unwinding_is_deterministic() {
        let descriptor = descriptor(&[("p1", false), ("p2", false)]);
        let args = arguments(&[("p1", &["v1"]), ("p2", &["v21", "v22"])]);

        let combinations = unwind(&args, &descriptor, 10).unwrap();

        assert_eq!(
            combinations,
            vec![
                [("p1", "v1"), ("p2", "v21")].into_iter().collect(),
                [("p1", "v1"), ("p2", "v22")].into_iter().collect::<ArgumentCombination>(),
            ]
        );
    }

    #[test]
    fn first_argument_varies_slowest() {
        let descriptor = descriptor(&[("a", false), ("b", false)]);
        let args = arguments(&[("a", &["a1", "a2"]), ("b", &["b1", "b2"])]);

        let combinations = unwind(&args, &descriptor, 10)
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();

        assert_eq!(
            combinations,
            vec![
                "{a: a1, b: b1}",
                "{a: a1, b: b2}",
                "{a: a2, b: b1}",
                "{a: a2, b: b2}"
            ]
        );
    }

    #[test]
    fn csv_arguments_are_joined() {
        let descriptor = descriptor(&[("p1", true), ("p2", false)]);
        let args = arguments(&[("p1", &["x", "y"]), ("p2", &["v21", "v22"])]);

        let combinations = unwind(&args, &descriptor, 10).unwrap();

        assert_eq!(combinations.len(), 2);
        assert_eq!(combinations[0].get("p1"), Some("x,y"));
        assert_eq!(combinations[1].get("p2"), Some("v22"));
    }

    #[test]
    fn too_many_combinations_fail_fast() {
        let descriptor = descriptor(&[("a", false), ("b", false)]);
        let args = arguments(&[("a", &["1", "2", "3"]), ("b", &["1", "2", "3"])]);

        let result = unwind(&args, &descriptor, 8);

        assert!(matches!(result, Err(GatewayError::BadRequest(_))));
    }

    #[test]
    fn no_arguments_yield_a_single_invocation() {
        let descriptor = descriptor(&[]);
        let combinations = unwind(&ResolvedArguments::new(), &descriptor, 1).unwrap();
        assert_eq!(combinations, vec![ArgumentCombination::default()]);
    }

    #[test]
    fn pushing_the_same_value_twice_keeps_one() {
        let mut args = ResolvedArguments::new();
        args.push("name", "Delphinus");
        args.push("name", "Delphinus");
        assert_eq!(args.get("name"), Some(["Delphinus".to_owned()].as_slice()));
    }
}
