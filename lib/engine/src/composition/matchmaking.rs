use crate::arguments::graph_pattern::{object_values, shape_paths};
use crate::context::RequestContext;
use apigraph_common::vocab::rdf;
use apigraph_common::{ArgumentBinding, GatewayResult, ResolvedArguments, ServiceDescriptor};
use oxrdf::NamedNode;
use spargebra::term::{NamedNodePattern, TermPattern, TriplePattern};

/// A service as seen by the matchmaking: its descriptor and the predicates locating each of its
/// arguments.
#[derive(Debug, Clone)]
pub struct ServiceProfile {
    pub descriptor: ServiceDescriptor,
    pub argument_paths: Vec<(String, Vec<NamedNode>)>,
}

impl ServiceProfile {
    pub async fn load(ctx: &RequestContext, descriptor: ServiceDescriptor) -> GatewayResult<Self> {
        let mut argument_paths = Vec::with_capacity(descriptor.arguments.len());
        for argument in &descriptor.arguments {
            let paths = match &argument.binding {
                ArgumentBinding::Predicate(predicate) => vec![predicate.clone()],
                ArgumentBinding::Shape(shape) => shape_paths(ctx, &descriptor, shape).await?,
            };
            argument_paths.push((argument.name.clone(), paths));
        }
        Ok(Self {
            descriptor,
            argument_paths,
        })
    }

    /// Whether every argument has a value among the constant objects of `patterns`.
    pub fn inputs_satisfied(&self, patterns: &[TriplePattern]) -> bool {
        self.argument_paths.iter().all(|(_, paths)| {
            paths
                .iter()
                .any(|path| !object_values(patterns, path).is_empty())
        })
    }

    /// Whether the service may produce triples matching `pattern`.
    pub fn covers(&self, pattern: &TriplePattern) -> bool {
        let NamedNodePattern::NamedNode(predicate) = &pattern.predicate else {
            return false;
        };
        if *predicate == rdf::TYPE {
            if let TermPattern::NamedNode(class) = &pattern.object {
                return self.descriptor.capability.classes.contains(class);
            }
        }
        self.descriptor.capability.predicates.contains(predicate)
            || self
                .argument_paths
                .iter()
                .any(|(_, paths)| paths.contains(predicate))
    }

    /// The argument values read from `patterns`. Several values per argument are allowed.
    pub fn arguments(&self, patterns: &[TriplePattern]) -> ResolvedArguments {
        let mut arguments = ResolvedArguments::new();
        for (name, paths) in &self.argument_paths {
            for path in paths {
                for value in object_values(patterns, path) {
                    arguments.push(name, value);
                }
            }
        }
        arguments
    }
}

/// The triple patterns assigned to one service.
#[derive(Debug, Clone)]
pub struct PatternGroup<'a> {
    pub profile: &'a ServiceProfile,
    pub patterns: Vec<TriplePattern>,
}

#[derive(Debug, Clone)]
pub struct MatchmakingResult<'a> {
    /// One group per service covering some pattern, in catalog order.
    pub groups: Vec<PatternGroup<'a>>,
    pub unmatched: Vec<TriplePattern>,
}

/// Keeps the services whose inputs can all be read from the query.
pub fn discover(profiles: Vec<ServiceProfile>, patterns: &[TriplePattern]) -> Vec<ServiceProfile> {
    profiles
        .into_iter()
        .filter(|profile| profile.inputs_satisfied(patterns))
        .collect()
}

/// Assigns each triple pattern to the first service covering it.
pub fn matchmake<'a>(
    profiles: &'a [ServiceProfile],
    patterns: &[TriplePattern],
) -> MatchmakingResult<'a> {
    let mut assigned = vec![Vec::new(); profiles.len()];
    let mut unmatched = Vec::new();
    for pattern in patterns {
        match profiles.iter().position(|profile| profile.covers(pattern)) {
            Some(index) => assigned[index].push(pattern.clone()),
            None => unmatched.push(pattern.clone()),
        }
    }
    let groups = profiles
        .iter()
        .zip(assigned)
        .filter(|(_, patterns)| !patterns.is_empty())
        .map(|(profile, patterns)| PatternGroup { profile, patterns })
        .collect();
    MatchmakingResult { groups, unmatched }
}
