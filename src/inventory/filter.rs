//! Name filtering for inventory capture

/// Filter names by substring tokens.
///
/// A name is kept when it contains at least one `include` token (every
/// name qualifies when `include` is empty) and none of the `exclude`
/// tokens. Input order is preserved and each call builds a fresh output.
pub fn filter_names<S: AsRef<str>>(names: &[String], include: &[S], exclude: &[S]) -> Vec<String> {
    names
        .iter()
        .filter(|name| {
            include.is_empty() || include.iter().any(|token| name.contains(token.as_ref()))
        })
        .filter(|name| !exclude.iter().any(|token| name.contains(token.as_ref())))
        .cloned()
        .collect()
}
