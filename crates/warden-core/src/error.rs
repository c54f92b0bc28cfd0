/// Errors that can occur across the Warden pipeline.
///
/// Each variant wraps a specific error domain. Library crates use this type
/// directly; the binary crate converts to `miette::Report` at the boundary.
///
/// # Examples
///
/// ```
/// use warden_core::WardenError;
///
/// let err = WardenError::Config("missing API key".into());
/// assert!(err.to_string().contains("missing API key"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum WardenError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A pull request URL that does not match the expected GitHub shape.
    #[error("invalid pull request URL: {0}")]
    InvalidUrl(String),

    /// GitHub API or transport failure.
    #[error("GitHub error: {0}")]
    Github(String),

    /// LLM API or response error.
    #[error("LLM error: {0}")]
    Llm(String),

    /// Issue tracker API or transport failure.
    #[error("issue tracker error: {0}")]
    Tracker(String),

    /// A flow graph that failed structural validation at build time.
    #[error("flow assembly error: {0}")]
    Assembly(String),

    /// A node faulted while a flow was running.
    #[error("node '{node}' in flow '{flow}' failed: {source}")]
    Node {
        /// Name of the flow that was executing.
        flow: String,
        /// Name of the node that returned the error.
        node: String,
        /// The underlying fault.
        #[source]
        source: Box<WardenError>,
    },

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl WardenError {
    /// Wrap an error with the flow and node it surfaced from.
    ///
    /// # Examples
    ///
    /// ```
    /// use warden_core::WardenError;
    ///
    /// let inner = WardenError::Llm("empty response".into());
    /// let err = WardenError::node("analyze", "CALL_MODEL", inner);
    /// assert!(err.to_string().contains("CALL_MODEL"));
    /// assert!(err.to_string().contains("empty response"));
    /// ```
    pub fn node(flow: impl Into<String>, node: impl Into<String>, source: WardenError) -> Self {
        WardenError::Node {
            flow: flow.into(),
            node: node.into(),
            source: Box::new(source),
        }
    }
}
