/// Case-insensitive file-extension allowlist.
///
/// Built once from the configured extension strings (mixed case, with or
/// without a leading dot) and queried for every filesystem event, so the
/// normalized set is computed at construction time.
#[derive(Debug, Clone)]
pub struct ExtensionMatcher {
    /// Normalized extensions: lowercase, leading dot included (".gml").
    suffixes: Vec<String>,
}

impl ExtensionMatcher {
    /// Build a matcher from extension strings such as `"gml"`, `".GML"` or `".yy"`.
    /// Empty entries are ignored.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut suffixes: Vec<String> = extensions
            .into_iter()
            .filter_map(|ext| {
                let trimmed = ext.as_ref().trim().trim_start_matches('.').to_lowercase();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(format!(".{trimmed}"))
                }
            })
            .collect();
        suffixes.sort();
        suffixes.dedup();
        Self { suffixes }
    }

    /// True when `file_name` ends with one of the configured extensions,
    /// compared case-insensitively.
    pub fn matches(&self, file_name: &str) -> bool {
        let lower = file_name.to_lowercase();
        self.suffixes.iter().any(|suffix| lower.ends_with(suffix))
    }

    /// The normalized suffix set, for logging.
    pub fn suffixes(&self) -> &[String] {
        &self.suffixes
    }
}
