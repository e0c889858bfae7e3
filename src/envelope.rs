use serde::{Serialize, Serializer};

/// Reply body returned to the browser for every plan capability.
///
/// On the wire this is `{success: true, response}` or `{success: false, error}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyEnvelope {
    Success { response: String },
    Failure { error: String },
}

impl ProxyEnvelope {
    pub fn success(response: impl Into<String>) -> Self {
        Self::Success {
            response: response.into(),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
        }
    }
}

#[derive(Serialize)]
struct Wire<'a> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    response: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

impl Serialize for ProxyEnvelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match self {
            Self::Success { response } => Wire {
                success: true,
                response: Some(response),
                error: None,
            },
            Self::Failure { error } => Wire {
                success: false,
                response: None,
                error: Some(error),
            },
        };
        wire.serialize(serializer)
    }
}
