pub struct Token(String);

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Self(value.trim().to_owned())
    }
}

impl Token {
    /// Blank values, such as an exported but empty `GITLAB_TOKEN`, mean no token.
    pub fn from_optional(value: Option<&str>) -> Option<Self> {
        value
            .map(Token::from)
            .filter(|token| !token.as_str().is_empty())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<redacted>")
    }
}
