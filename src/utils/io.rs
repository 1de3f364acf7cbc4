//! File and spec input primitives with consistent error handling.

use crate::error::{Error, Result};
use std::fs;
use std::io::Read;
use std::path::Path;

/// Read file contents with standardized error handling.
pub fn read_file(path: &Path, operation: &str) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| Error::internal_io(e.to_string(), Some(operation.to_string())))
}

/// Read a spec from a file path, `@path`, stdin (`-`), or inline JSON.
pub fn read_spec_to_string(spec: &str) -> Result<String> {
    use std::io::IsTerminal;

    let trimmed = spec.trim();

    if trimmed == "-" {
        let mut buf = String::new();
        let mut stdin = std::io::stdin();
        if stdin.is_terminal() {
            return Err(Error::validation_invalid_argument(
                "spec",
                "Cannot read spec from stdin when stdin is a TTY",
                None,
                None,
            ));
        }
        stdin
            .read_to_string(&mut buf)
            .map_err(|e| Error::internal_io(e.to_string(), Some("read stdin".to_string())))?;
        return Ok(buf);
    }

    if trimmed.starts_with('{') {
        return Ok(spec.to_string());
    }

    let path = trimmed.strip_prefix('@').unwrap_or(trimmed);
    if path.is_empty() {
        return Err(Error::validation_invalid_argument(
            "spec",
            "Invalid spec '@' (missing file path)",
            None,
            None,
        ));
    }

    read_file(Path::new(path), &format!("read {}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn inline_json_is_returned_as_is() {
        let spec = r#"{"name":"web"}"#;
        assert_eq!(read_spec_to_string(spec).unwrap(), spec);
    }

    #[test]
    fn reads_plain_and_at_prefixed_paths() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{\"name\":\"web\"}}").unwrap();
        let path = file.path().display().to_string();

        assert_eq!(read_spec_to_string(&path).unwrap(), "{\"name\":\"web\"}");
        assert_eq!(
            read_spec_to_string(&format!("@{}", path)).unwrap(),
            "{\"name\":\"web\"}"
        );
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = read_spec_to_string("/nonexistent/deploy.json").unwrap_err();
        assert_eq!(err.code.as_str(), "internal.io_error");
    }

    #[test]
    fn bare_at_is_rejected() {
        let err = read_spec_to_string("@").unwrap_err();
        assert_eq!(err.code.as_str(), "validation.invalid_argument");
    }
}
