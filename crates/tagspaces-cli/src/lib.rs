use anyhow::{bail, Result};

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

/// Split a `location:path` argument. The location part is a configured
/// location name or uuid; the path is backend-native and may itself
/// contain colons (Windows drives, URLs), so only the first colon splits.
pub fn parse_entry_spec(spec: &str) -> Result<(&str, &str)> {
    match spec.split_once(':') {
        Some((location, path)) if !location.is_empty() => Ok((location, path)),
        _ => bail!("expected <location>:<path>, got {:?}", spec),
    }
}

/// Human-readable byte count.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[unit])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_spec_splits_on_first_colon() {
        let (location, path) = parse_entry_spec("office:c:\\Users\\docs").unwrap();
        assert_eq!(location, "office");
        assert_eq!(path, "c:\\Users\\docs");
    }

    #[test]
    fn entry_spec_requires_location() {
        assert!(parse_entry_spec(":/tmp/file").is_err());
        assert!(parse_entry_spec("no-colon").is_err());
    }

    #[test]
    fn sizes_format_per_unit() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }
}
