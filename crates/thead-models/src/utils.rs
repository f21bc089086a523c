//! Parsing helpers for env-sourced parameter values.

use thiserror::Error;

/// Parse a boolean from its common string spellings.
///
/// Accepts `true`/`1`/`yes` (case-insensitive) as true; anything else is
/// false. Mirrors how the `DEFAULT_STILL`/`DEFAULT_FACE3DVIS` env variables
/// are documented.
pub fn parse_bool(v: &str) -> bool {
    matches!(v.to_lowercase().as_str(), "true" | "1" | "yes")
}

/// Error parsing a comma-separated angle list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid angle list entry: {0}")]
pub struct AngleListError(pub String);

/// Parse a comma-separated list of yaw/pitch/roll angles, e.g. `"-10,0,10"`.
///
/// Whitespace around entries is ignored; an empty string yields an empty
/// list.
pub fn parse_angle_list(s: &str) -> Result<Vec<i32>, AngleListError> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(Vec::new());
    }

    s.split(',')
        .map(|part| {
            let part = part.trim();
            part.parse::<i32>()
                .map_err(|_| AngleListError(part.to_string()))
        })
        .collect()
}
