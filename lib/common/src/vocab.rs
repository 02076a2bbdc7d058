//! IRIs of the vocabularies used by service descriptions and provenance statements.

pub mod rdf {
    use oxrdf::NamedNodeRef;

    pub const TYPE: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/1999/02/22-rdf-syntax-ns#type");
}

pub mod xsd {
    use oxrdf::NamedNodeRef;

    pub const BOOLEAN: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/2001/XMLSchema#boolean");
    pub const DATE_TIME: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/2001/XMLSchema#dateTime");
    pub const DOUBLE: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/2001/XMLSchema#double");
    pub const DURATION: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/2001/XMLSchema#duration");
    pub const INTEGER: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/2001/XMLSchema#integer");
}

/// SPARQL 1.1 Service Description.
pub mod sd {
    pub const NAMESPACE: &str = "http://www.w3.org/ns/sparql-service-description#";
    pub const SERVICE: &str = "http://www.w3.org/ns/sparql-service-description#Service";
}

/// The SPARQL micro-service vocabulary.
pub mod sms {
    use oxrdf::NamedNodeRef;

    pub const NAMESPACE: &str = "http://ns.inria.fr/sparql-micro-service#";

    pub const API_QUERY: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://ns.inria.fr/sparql-micro-service#apiQuery");
    pub const CACHE_HIT_TIME: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://ns.inria.fr/sparql-micro-service#cacheHitTime");
}

pub mod hydra {
    pub const NAMESPACE: &str = "http://www.w3.org/ns/hydra/core#";
}

pub mod shacl {
    pub const NAMESPACE: &str = "http://www.w3.org/ns/shacl#";
}

/// PROV-O.
pub mod prov {
    use oxrdf::NamedNodeRef;

    pub const ACTIVITY: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/prov#Activity");
    pub const STARTED_AT_TIME: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/prov#startedAtTime");
    pub const USED: NamedNodeRef<'_> =
        NamedNodeRef::new_unchecked("http://www.w3.org/ns/prov#used");
}
