/// Errors produced by the `lintbox-core` crate.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CoreError {
    /// A configuration section could not be built from the supplied fields,
    /// typically because a value has the wrong type.
    #[error("invalid {section} config: {reason}")]
    InvalidConfig { section: &'static str, reason: String },

    /// A naming-policy field does not hold a valid regular expression.
    #[error("invalid regular expression for '{field}': {reason}")]
    InvalidPattern { field: String, reason: String },

    /// A configuration could not be rendered to its TOML representation.
    #[error("failed to render config: {0}")]
    Render(String),
}

impl CoreError {
    /// Returns `true` for errors caused by caller input rather than by the
    /// service itself.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidConfig { .. } | Self::InvalidPattern { .. })
    }
}
