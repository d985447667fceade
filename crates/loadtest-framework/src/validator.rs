//! Response body validation.

/// Inspects the body of a successful publish.
///
/// A rejected body turns the publish into a failure.
pub trait ResponseValidator: Send + Sync {
    fn validate(&self, body: &[u8]) -> Result<(), String>;
}

impl<F> ResponseValidator for F
where
    F: Fn(&[u8]) -> Result<(), String> + Send + Sync,
{
    fn validate(&self, body: &[u8]) -> Result<(), String> {
        self(body)
    }
}

/// Requires the body to contain a fixed string (`RESPONSE_BODY_EXPECTED`).
#[derive(Debug, Clone)]
pub struct BodyContains {
    expected: String,
}

impl BodyContains {
    pub fn new(expected: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
        }
    }
}

impl ResponseValidator for BodyContains {
    fn validate(&self, body: &[u8]) -> Result<(), String> {
        let text = String::from_utf8_lossy(body);
        if text.contains(&self.expected) {
            Ok(())
        } else {
            let shown: String = text.chars().take(200).collect();
            Err(format!(
                "response body does not contain '{}': {}",
                self.expected, shown
            ))
        }
    }
}
