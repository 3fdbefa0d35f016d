use std::fmt;

/// The AWS account being rotated, with its optional display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    pub id: String,
    pub name: Option<String>,
}

impl AccountInfo {
    pub fn new(id: impl Into<String>, name: Option<String>) -> Self {
        Self {
            id: id.into(),
            name: name.filter(|n| !n.trim().is_empty()),
        }
    }

    pub fn console_url(&self) -> String {
        format!("https://{}.signin.aws.amazon.com/console", self.id)
    }
}

/// `name - id` when a name is set, the bare id otherwise.
impl fmt::Display for AccountInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} - {}", name, self.id),
            None => write!(f, "{}", self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_includes_name_when_present() {
        let named = AccountInfo::new("123456789012", Some("prod".into()));
        assert_eq!(named.to_string(), "prod - 123456789012");

        let blank = AccountInfo::new("123456789012", Some(" ".into()));
        assert_eq!(blank.to_string(), "123456789012");
        assert_eq!(
            blank.console_url(),
            "https://123456789012.signin.aws.amazon.com/console"
        );
    }
}
