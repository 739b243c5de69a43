//! Structured output in table, JSON or YAML form

use serde::Serialize;

use crate::cli::OutputFormat;
use crate::error::Result;

/// Print `value` as JSON or YAML, or call `table` for the human format.
pub fn emit<T: Serialize>(format: OutputFormat, value: &T, table: impl FnOnce(&T)) -> Result<()> {
    match format {
        OutputFormat::Table => table(value),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}

/// Shorten a hash for table output.
pub fn short_hash(hash: Option<&str>) -> String {
    match hash {
        Some(hash) if hash.len() > 12 => format!("{}…", &hash[..12]),
        Some(hash) => hash.to_string(),
        None => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_hash() {
        assert_eq!(short_hash(None), "-");
        assert_eq!(short_hash(Some("abc")), "abc");
        assert_eq!(short_hash(Some(&"a".repeat(64))), format!("{}…", "a".repeat(12)));
    }
}
