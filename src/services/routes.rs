use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};

/// Compiled list of path globs (`/**`, `/static/**`, `/api/*/reports`).
///
/// `*` stays inside one path segment; `**` crosses segments. A trailing `/**`
/// also matches the bare prefix, so `/auth/**` covers `/auth`.
#[derive(Debug, Clone)]
pub struct PathPatterns {
    raw: Vec<String>,
    set: GlobSet,
}

impl PathPatterns {
    pub fn new<I, S>(patterns: I) -> Result<Self, globset::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut raw = Vec::new();
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            if pattern.is_empty() {
                continue;
            }
            builder.add(compile(pattern)?);
            if let Some(prefix) = pattern.strip_suffix("/**") {
                if !prefix.is_empty() {
                    builder.add(compile(prefix)?);
                }
            }
            raw.push(pattern.to_string());
        }
        Ok(Self {
            raw,
            set: builder.build()?,
        })
    }

    pub fn empty() -> Self {
        Self {
            raw: Vec::new(),
            set: GlobSet::empty(),
        }
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.set.is_match(path)
    }

    pub fn patterns(&self) -> &[String] {
        &self.raw
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

fn compile(pattern: &str) -> Result<Glob, globset::Error> {
    GlobBuilder::new(pattern).literal_separator(true).build()
}

/// Include/exclude classification of routes that require authentication.
#[derive(Debug, Clone)]
pub struct RouteMatcher {
    include: PathPatterns,
    exclude: PathPatterns,
}

impl RouteMatcher {
    pub fn new(include: PathPatterns, exclude: PathPatterns) -> Self {
        Self { include, exclude }
    }

    /// Exclude wins when both lists match.
    pub fn is_protected(&self, path: &str) -> bool {
        self.include.is_match(path) && !self.exclude.is_match(path)
    }
}
