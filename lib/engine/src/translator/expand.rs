//! Expansion of JSON documents into RDF triples with a JSON-LD context.
//!
//! [`ContextExpander`] runs the JSON-LD to RDF algorithm of `sophia_jsonld` on the document, the
//! profile of the service acting as the expansion context. No document loader is configured, so
//! remote contexts are refused. Named graphs are flattened into the default graph since all the
//! triples end up in one scratch graph anyway.

use oxrdf::{BlankNode, Literal, NamedNode, NamedOrBlankNode, Subject, Term, Triple};
use serde_json::{json, Map, Value};
use sophia_api::parser::QuadParser;
use sophia_api::quad::Quad;
use sophia_api::source::QuadSource;
use sophia_api::term::Term as RdfTerm;
use sophia_jsonld::JsonLdParser;
use std::collections::HashMap;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ExpansionError {
    #[error("Remote JSON-LD contexts are not supported: {0}")]
    RemoteContext(String),
    #[error("Invalid JSON-LD context: {0}")]
    InvalidContext(String),
    #[error("Invalid JSON-LD document: {0}")]
    Processing(String),
}

/// Turns a JSON document into RDF triples, given a JSON-LD profile.
///
/// Implementations are pure: no I/O, the same input always yields the same triples up to blank
/// node renaming.
pub trait JsonLdExpander: Send + Sync {
    /// `profile` is either a JSON-LD context or an object with a `@context` entry.
    fn expand(&self, document: &Value, profile: &Value) -> Result<Vec<Triple>, ExpansionError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ContextExpander;

impl JsonLdExpander for ContextExpander {
    fn expand(&self, document: &Value, profile: &Value) -> Result<Vec<Triple>, ExpansionError> {
        let context = match profile {
            Value::Object(object) if object.contains_key("@context") => &object["@context"],
            other => other,
        };
        check_context(context)?;
        let document = with_context(document, context);

        let mut blank_nodes = HashMap::new();
        let mut triples = Vec::new();
        let mut invalid = None;
        JsonLdParser::new()
            .parse_str(&document.to_string())
            .for_each_quad(|quad| {
                match triple(&quad, &mut blank_nodes) {
                    Some(triple) => triples.push(triple),
                    None => invalid = Some(format!("{:?}", quad.p())),
                }
            })
            .map_err(|e| ExpansionError::Processing(e.to_string()))?;
        if let Some(term) = invalid {
            return Err(ExpansionError::Processing(format!(
                "the statement with predicate {term} is not a valid RDF triple"
            )));
        }
        Ok(triples)
    }
}

/// Only embedded contexts are accepted.
fn check_context(context: &Value) -> Result<(), ExpansionError> {
    match context {
        Value::Null | Value::Object(_) => Ok(()),
        Value::String(url) => Err(ExpansionError::RemoteContext(url.clone())),
        Value::Array(contexts) => contexts.iter().try_for_each(check_context),
        other => Err(ExpansionError::InvalidContext(format!(
            "a context cannot be {other}"
        ))),
    }
}

/// Embeds the profile context into the document, before the document's own context if any.
///
/// A document that is not an object becomes the `@graph` of a wrapping object.
fn with_context(document: &Value, context: &Value) -> Value {
    if context.is_null() {
        return document.clone();
    }
    match document {
        Value::Object(object) => {
            let mut object = object.clone();
            let context = match object.remove("@context") {
                Some(local) => json!([context, local]),
                None => context.clone(),
            };
            object.insert("@context".to_owned(), context);
            Value::Object(object)
        }
        other => {
            let mut object = Map::new();
            object.insert("@context".to_owned(), context.clone());
            object.insert("@graph".to_owned(), other.clone());
            Value::Object(object)
        }
    }
}

/// Converts a parsed quad into a triple of the default graph.
///
/// Blank nodes are given fresh identifiers so that documents expanded separately never share
/// one.
fn triple(quad: &impl Quad, blank_nodes: &mut HashMap<String, BlankNode>) -> Option<Triple> {
    let subject = match resource(quad.s(), blank_nodes)? {
        NamedOrBlankNode::NamedNode(node) => Subject::NamedNode(node),
        NamedOrBlankNode::BlankNode(node) => Subject::BlankNode(node),
    };
    let predicate = NamedNode::new(quad.p().iri()?.as_str()).ok()?;
    let object = match quad.o().lexical_form() {
        Some(lexical) => Term::Literal(literal(&quad.o(), lexical.to_string())?),
        None => match resource(quad.o(), blank_nodes)? {
            NamedOrBlankNode::NamedNode(node) => Term::NamedNode(node),
            NamedOrBlankNode::BlankNode(node) => Term::BlankNode(node),
        },
    };
    Some(Triple::new(subject, predicate, object))
}

fn resource(
    term: impl RdfTerm,
    blank_nodes: &mut HashMap<String, BlankNode>,
) -> Option<NamedOrBlankNode> {
    if let Some(iri) = term.iri() {
        return NamedNode::new(iri.as_str()).ok().map(Into::into);
    }
    let id = term.bnode_id()?;
    Some(
        blank_nodes
            .entry(id.as_str().to_owned())
            .or_default()
            .clone()
            .into(),
    )
}

fn literal(term: &impl RdfTerm, lexical: String) -> Option<Literal> {
    if let Some(language) = term.language_tag() {
        return Literal::new_language_tagged_literal(lexical, language.as_str()).ok();
    }
    match term.datatype() {
        Some(datatype) => Some(Literal::new_typed_literal(
            lexical,
            NamedNode::new(datatype.as_str()).ok()?,
        )),
        None => Some(Literal::new_simple_literal(lexical)),
    }
}
