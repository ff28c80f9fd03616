use std::fmt;

/// Authentication strength a path requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyBucket {
    /// No credential needed.
    Public,
    /// An active session or a valid bearer API key.
    SessionOrApiKey,
    /// A valid bearer API key. Sessions are ignored.
    ApiKeyOnly,
}

impl fmt::Display for PolicyBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Public => "public",
            Self::SessionOrApiKey => "session_or_api_key",
            Self::ApiKeyOnly => "api_key_only",
        })
    }
}

/// Path matcher.
///
/// Parsed from strings: `"*"` matches everything, `"/auth/*"` matches `/auth` and every
/// path below it on a segment boundary, anything else matches exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPattern {
    Any,
    Exact(String),
    Prefix(String),
}

impl PathPattern {
    #[must_use]
    pub fn parse(pattern: &str) -> Self {
        if pattern == "*" {
            return Self::Any;
        }
        match pattern.strip_suffix("/*") {
            Some(base) => Self::Prefix(base.trim_end_matches('/').to_owned()),
            None => Self::Exact(pattern.to_owned()),
        }
    }

    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(exact) => path == exact,
            Self::Prefix(base) => match path.strip_prefix(base.as_str()) {
                Some(rest) => rest.is_empty() || rest.starts_with('/'),
                None => false,
            },
        }
    }
}

impl From<&str> for PathPattern {
    fn from(pattern: &str) -> Self {
        Self::parse(pattern)
    }
}

/// Ordered path → bucket rules. First match wins, unmatched paths get the fallback.
///
/// Classification is total and depends only on the path.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    rules: Vec<(PathPattern, PolicyBucket)>,
    fallback: PolicyBucket,
}

impl Default for AccessPolicy {
    /// `/auth/*` and `/health` public, `/api/*` gated, everything else public.
    fn default() -> Self {
        Self::standard("/auth", PolicyBucket::Public)
    }
}

impl AccessPolicy {
    /// Empty rule list: every path maps to `fallback`.
    #[must_use]
    pub fn new(fallback: PolicyBucket) -> Self {
        Self {
            rules: Vec::new(),
            fallback,
        }
    }

    /// The gateway's own routes under `auth_path` and `/health` public, `/api/*` gated.
    ///
    /// An empty or root `auth_path` adds no auth rule.
    #[must_use]
    pub fn standard(auth_path: &str, fallback: PolicyBucket) -> Self {
        let auth_path = auth_path.trim_end_matches('/');
        let policy = Self::new(fallback);
        let policy = if auth_path.is_empty() {
            policy
        } else {
            policy.rule(format!("{auth_path}/*").as_str(), PolicyBucket::Public)
        };
        policy
            .rule("/health", PolicyBucket::Public)
            .rule("/api/*", PolicyBucket::SessionOrApiKey)
    }

    /// Append a rule. It only applies to paths no earlier rule matched.
    #[must_use]
    pub fn rule(mut self, pattern: impl Into<PathPattern>, bucket: PolicyBucket) -> Self {
        self.rules.push((pattern.into(), bucket));
        self
    }

    /// Insert a rule ahead of all existing ones.
    #[must_use]
    pub fn override_rule(mut self, pattern: impl Into<PathPattern>, bucket: PolicyBucket) -> Self {
        self.rules.insert(0, (pattern.into(), bucket));
        self
    }

    #[must_use]
    pub fn classify(&self, path: &str) -> PolicyBucket {
        self.rules
            .iter()
            .find(|(pattern, _)| pattern.matches(path))
            .map_or(self.fallback, |(_, bucket)| *bucket)
    }

    #[must_use]
    pub fn fallback(&self) -> PolicyBucket {
        self.fallback
    }
}
