use apigraph_engine::Gateway;

/// Bound on the size of a POSTed query or form.
pub const MAX_SPARQL_BODY_SIZE: usize = 1024 * 1024 * 8; // 8MB

/// The value of the `Server` header of every successful response.
pub const SERVER_NAME: &str = "ApiGraph";

/// Holds the configuration for an ApiGraph web server.
pub struct ServerConfig {
    /// The gateway answering the requests.
    pub gateway: Gateway,
    /// The IP address or DNS name that the socket binds to.
    pub bind: String,
    /// Whether CORS is enabled.
    pub cors: bool,
}
