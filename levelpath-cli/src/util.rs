/// Expand a comma-separated id list flag: `all` selects every known id,
/// `none` selects nothing. Blank entries are dropped.
pub fn select_ids<'a>(arg: &str, known: impl Iterator<Item = &'a str>) -> Vec<String> {
    match arg.trim() {
        "all" => known.map(str::to_string).collect(),
        "none" => Vec::new(),
        other => other
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect(),
    }
}
