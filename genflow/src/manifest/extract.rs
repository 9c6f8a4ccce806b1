//! Sentinel block extraction.

use super::FileManifest;
use crate::config::ManifestConfig;
use crate::errors::ManifestError;

/// Default opening sentinel.
pub const DEFAULT_OPEN_TAG: &str = "<file_manifest>";

/// Default closing sentinel.
pub const DEFAULT_CLOSE_TAG: &str = "</file_manifest>";

/// Extracts and decodes the single manifest block of `document`.
///
/// The block body may be wrapped in a markdown code fence.
pub fn extract_manifest(
    document: &str,
    config: &ManifestConfig,
) -> Result<FileManifest, ManifestError> {
    let open_tag = config.open_tag.as_str();
    let close_tag = config.close_tag.as_str();

    let count = document.matches(open_tag).count();
    let start = match (count, document.find(open_tag)) {
        (1, Some(start)) => start + open_tag.len(),
        (0, _) | (_, None) => {
            return Err(ManifestError::NotFound {
                open_tag: open_tag.to_string(),
                close_tag: close_tag.to_string(),
            });
        }
        (count, _) => return Err(ManifestError::MultipleBlocks { count }),
    };

    let body_len = document[start..]
        .find(close_tag)
        .ok_or_else(|| ManifestError::Unterminated {
            open_tag: open_tag.to_string(),
        })?;

    let body = strip_fence(&document[start..start + body_len]);
    tracing::debug!(bytes = body.len(), "Extracted manifest block");
    FileManifest::from_json(body)
}

/// Trims `body` and removes a surrounding markdown code fence.
pub(crate) fn strip_fence(body: &str) -> &str {
    let trimmed = body.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the info string (e.g. `json`) on the opening fence line.
    let rest = rest.find('\n').map_or("", |idx| &rest[idx + 1..]);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn extract(document: &str) -> Result<FileManifest, ManifestError> {
        extract_manifest(document, &ManifestConfig::default())
    }

    #[test]
    fn test_extract_plain_block() {
        let manifest = extract(
            "Here is the plan.\n<file_manifest>\n{\"files\": {\"src/a.ts\": {\"dependsOn\": []}}}\n</file_manifest>\nDone.",
        )
        .unwrap();

        assert_eq!(manifest.paths().collect::<Vec<_>>(), vec!["src/a.ts"]);
    }

    #[test]
    fn test_extract_fenced_block() {
        let manifest = extract(
            "<file_manifest>\n```json\n{\"files\": {\"src/a.ts\": {\"dependsOn\": [\"./b\"]}}}\n```\n</file_manifest>",
        )
        .unwrap();

        assert_eq!(manifest.get("src/a.ts").unwrap().depends_on, vec!["./b"]);
    }

    #[test]
    fn test_missing_block() {
        let err = extract("no manifest here").unwrap_err();
        assert!(matches!(err, ManifestError::NotFound { .. }));
        assert!(err.to_string().contains("<file_manifest>"));
    }

    #[test]
    fn test_unterminated_block() {
        let err = extract("<file_manifest>{\"files\": {}}").unwrap_err();
        assert!(matches!(err, ManifestError::Unterminated { .. }));
    }

    #[test]
    fn test_multiple_blocks() {
        let block = "<file_manifest>{\"files\": {}}</file_manifest>";
        let err = extract(&format!("{block}\n{block}")).unwrap_err();
        assert!(matches!(err, ManifestError::MultipleBlocks { count: 2 }));
    }

    #[test]
    fn test_malformed_json() {
        let err = extract("<file_manifest>{files: }</file_manifest>").unwrap_err();
        assert!(matches!(err, ManifestError::Invalid { .. }));
    }

    #[test]
    fn test_custom_tags() {
        let config = ManifestConfig::default().with_tags("[[manifest]]", "[[/manifest]]");
        let manifest =
            extract_manifest("[[manifest]]{\"files\": {\"a.md\": {}}}[[/manifest]]", &config).unwrap();
        assert_eq!(manifest.len(), 1);
    }
}
