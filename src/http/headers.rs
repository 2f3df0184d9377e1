use crate::utils::error::{Result, TransportError};

/// Ordered set of HTTP headers.
///
/// Names are matched case-insensitively and are unique: [`replace`](Self::replace)
/// overwrites an existing value in place, keeping the original position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c)
}

fn validate(name: &str, value: &str) -> Result<()> {
    if name.is_empty() {
        return Err(TransportError::Header {
            name: name.to_string(),
            reason: "empty name",
        });
    }
    if !name.chars().all(is_token_char) {
        return Err(TransportError::Header {
            name: name.to_string(),
            reason: "name contains characters not allowed in a header name",
        });
    }
    if value.chars().any(|c| c.is_control() && c != '\t') {
        return Err(TransportError::Header {
            name: name.to_string(),
            reason: "value contains control characters",
        });
    }
    Ok(())
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name` to `value`, adding the header if it is not present yet.
    pub fn replace(&mut self, name: &str, value: &str) -> Result<()> {
        validate(name, value)?;
        match self
            .entries
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            Some((_, v)) => *v = value.to_string(),
            None => self.entries.push((name.to_string(), value.to_string())),
        }
        Ok(())
    }

    /// Builder-style [`replace`](Self::replace).
    pub fn with(mut self, name: &str, value: &str) -> Result<Self> {
        self.replace(name, value)?;
        Ok(self)
    }

    /// Value of `name`, matched case-insensitively.
    pub fn find(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Headers in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}
