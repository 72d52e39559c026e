use std::fmt;
use std::time::Duration;

/// One of the two retrieval legs feeding the fuser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalSource {
    Semantic,
    Keyword,
}

impl fmt::Display for RetrievalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetrievalSource::Semantic => write!(f, "semantic"),
            RetrievalSource::Keyword => write!(f, "keyword"),
        }
    }
}

/// Failure of a hybrid retrieval or RAG request.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    /// Rejected before any upstream call was issued.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("{leg} retrieval failed: {error:#}")]
    Upstream {
        leg: RetrievalSource,
        #[source]
        error: anyhow::Error,
    },

    #[error("{leg} retrieval timed out after {}ms", .timeout.as_millis())]
    Timeout {
        leg: RetrievalSource,
        timeout: Duration,
    },

    #[error("answer generation failed: {0:#}")]
    Generation(#[source] anyhow::Error),
}

impl RetrievalError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// The leg that failed, for upstream errors and timeouts.
    pub fn leg(&self) -> Option<RetrievalSource> {
        match self {
            Self::Upstream { leg, .. } | Self::Timeout { leg, .. } => Some(*leg),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_message_includes_leg_and_cause() {
        let err = RetrievalError::Upstream {
            leg: RetrievalSource::Keyword,
            error: anyhow::anyhow!("index offline"),
        };
        let msg = err.to_string();
        assert!(msg.contains("keyword"));
        assert!(msg.contains("index offline"));
        assert_eq!(err.leg(), Some(RetrievalSource::Keyword));
    }

    #[test]
    fn test_timeout_message() {
        let err = RetrievalError::Timeout {
            leg: RetrievalSource::Semantic,
            timeout: Duration::from_millis(250),
        };
        assert_eq!(err.to_string(), "semantic retrieval timed out after 250ms");
    }

    #[test]
    fn test_invalid_has_no_leg() {
        assert!(RetrievalError::invalid("bad").leg().is_none());
    }
}
