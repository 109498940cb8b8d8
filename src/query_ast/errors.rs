use serde::Serialize;

pub const SQL_PARSE_ERROR: &str = "SQL_PARSE_ERROR";
pub const EXECUTION_DELEGATION_ERROR: &str = "EXECUTION_DELEGATION_ERROR";
pub const CONFIGURATION_ERROR: &str = "CONFIGURATION_ERROR";

/// Query text did not match a required structural pattern.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("parse error: {reason} (query: {query})")]
pub struct ParseError {
    pub query: String,
    pub reason: String,
}

impl ParseError {
    pub fn new(query: &str, reason: impl Into<String>) -> Self {
        Self {
            query: query.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum FlowError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("execution delegation failed: {reason} (query: {query})")]
    Delegation { query: String, reason: String },
    #[error("configuration error: {0}")]
    Config(String),
}

impl FlowError {
    pub fn delegation(query: &str, err: impl std::fmt::Display) -> Self {
        FlowError::Delegation {
            query: query.to_string(),
            reason: err.to_string(),
        }
    }

    /// Stable machine-readable code for the transport layer.
    pub fn code(&self) -> &'static str {
        match self {
            FlowError::Parse(_) => SQL_PARSE_ERROR,
            FlowError::Delegation { .. } => EXECUTION_DELEGATION_ERROR,
            FlowError::Config(_) => CONFIGURATION_ERROR,
        }
    }

    pub fn query(&self) -> Option<&str> {
        match self {
            FlowError::Parse(e) => Some(&e.query),
            FlowError::Delegation { query, .. } => Some(query),
            FlowError::Config(_) => None,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    query: Option<&'a str>,
}

impl Serialize for FlowError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ErrorBody {
            code: self.code(),
            message: self.to_string(),
            query: self.query(),
        }
        .serialize(serializer)
    }
}
