//! The user's request: one arXiv identifier and two revision numbers.
//!
//! A [`DiffRequest`] is validated once at construction and never mutated.
//! Validation is intentionally strict about shape (so a typo fails before any
//! network traffic) but makes no claim that the paper or revisions exist;
//! that is only known after the download.

use crate::error::ArxivDiffError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// New-style identifiers: `YYMM.NNNN` (2007–2014) or `YYMM.NNNNN` (2015+).
static RE_NEW_STYLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}\.\d{4,5}$").unwrap());

/// Old-style identifiers: `archive(.SUBJ)?/YYMMNNN`, e.g. `hep-th/9901001`.
static RE_OLD_STYLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z-]*(\.[A-Z]{2})?/\d{7}$").unwrap());

/// Trailing `vN` the user may have pasted from an abstract page URL.
static RE_VERSION_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"v\d+$").unwrap());

/// A validated diff request.
///
/// Deserialising goes through [`DiffRequest::new`], so a request read from
/// JSON is held to the same checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDiffRequest")]
pub struct DiffRequest {
    identifier: String,
    old_revision: String,
    new_revision: String,
}

#[derive(Deserialize)]
struct RawDiffRequest {
    identifier: String,
    old_revision: String,
    new_revision: String,
}

impl TryFrom<RawDiffRequest> for DiffRequest {
    type Error = ArxivDiffError;

    fn try_from(raw: RawDiffRequest) -> Result<Self, Self::Error> {
        Self::new(raw.identifier, raw.old_revision, raw.new_revision)
    }
}

impl DiffRequest {
    /// Validate and build a request.
    ///
    /// Inputs are trimmed. Revisions may be given as `2` or `v2`.
    ///
    /// # Errors
    /// [`ArxivDiffError::InvalidRequest`] when a field is empty, the identifier
    /// is not a recognisable arXiv identifier, or a revision is not a
    /// positive integer.
    pub fn new(
        identifier: impl AsRef<str>,
        old_revision: impl AsRef<str>,
        new_revision: impl AsRef<str>,
    ) -> Result<Self, ArxivDiffError> {
        let identifier = identifier.as_ref().trim();
        let old = old_revision.as_ref().trim();
        let new = new_revision.as_ref().trim();

        if identifier.is_empty() || old.is_empty() || new.is_empty() {
            return Err(ArxivDiffError::InvalidRequest(
                "Please fill in all fields (identifier, old revision, new revision).".into(),
            ));
        }

        let identifier = parse_identifier(identifier)?;
        let old_revision = parse_revision(old, "old")?;
        let new_revision = parse_revision(new, "new")?;

        Ok(Self {
            identifier,
            old_revision,
            new_revision,
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn old_revision(&self) -> &str {
        &self.old_revision
    }

    pub fn new_revision(&self) -> &str {
        &self.new_revision
    }

    /// `{identifier}_v{old}_to_v{new}`, safe to use as a file name.
    ///
    /// Old-style identifiers contain a `/`, which becomes `_`.
    pub fn artifact_stem(&self) -> String {
        format!(
            "{}_v{}_to_v{}",
            self.identifier.replace('/', "_"),
            self.old_revision,
            self.new_revision
        )
    }

    /// Download name of the rendered diff PDF.
    pub fn pdf_file_name(&self) -> String {
        format!("{}_diff.pdf", self.artifact_stem())
    }

    /// Download name of the fallback source bundle.
    pub fn bundle_file_name(&self) -> String {
        format!("{}_source.tar.gz", self.artifact_stem())
    }

    /// Name of the build log written next to a fallback bundle.
    pub fn build_log_file_name(&self) -> String {
        format!("{}_build.log", self.artifact_stem())
    }
}

fn parse_identifier(raw: &str) -> Result<String, ArxivDiffError> {
    let id = raw
        .strip_prefix("arXiv:")
        .or_else(|| raw.strip_prefix("arxiv:"))
        .unwrap_or(raw);

    if !(RE_NEW_STYLE.is_match(id) || RE_OLD_STYLE.is_match(id)) {
        let hint = if RE_VERSION_SUFFIX.is_match(id) {
            " (drop the version suffix; revisions are given separately)"
        } else {
            ""
        };
        return Err(ArxivDiffError::InvalidRequest(format!(
            "'{raw}' is not an arXiv identifier{hint}"
        )));
    }
    Ok(id.to_string())
}

fn parse_revision(raw: &str, which: &str) -> Result<String, ArxivDiffError> {
    let digits = raw
        .strip_prefix('v')
        .or_else(|| raw.strip_prefix('V'))
        .unwrap_or(raw);
    match digits.parse::<u32>() {
        Ok(n) if n >= 1 => Ok(n.to_string()),
        _ => Err(ArxivDiffError::InvalidRequest(format!(
            "{which} revision '{raw}' must be a positive integer"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_new_style_identifier() {
        let r = DiffRequest::new("2303.00096", "1", "2").unwrap();
        assert_eq!(r.identifier(), "2303.00096");
        assert_eq!(r.old_revision(), "1");
        assert_eq!(r.new_revision(), "2");
    }

    #[test]
    fn accepts_old_style_identifier() {
        let r = DiffRequest::new("hep-th/9901001", "1", "3").unwrap();
        assert_eq!(r.artifact_stem(), "hep-th_9901001_v1_to_v3");

        assert!(DiffRequest::new("math.GT/0309136", "1", "2").is_ok());
    }

    #[test]
    fn trims_and_strips_prefixes() {
        let r = DiffRequest::new("  arXiv:2303.00096 ", " v1", "V2 ").unwrap();
        assert_eq!(r.identifier(), "2303.00096");
        assert_eq!(r.old_revision(), "1");
        assert_eq!(r.new_revision(), "2");
    }

    #[test]
    fn rejects_empty_fields() {
        let err = DiffRequest::new("2303.00096", "", "2").unwrap_err();
        assert!(err.to_string().contains("fill in all fields"), "got: {err}");
        assert!(DiffRequest::new("   ", "1", "2").is_err());
    }

    #[test]
    fn rejects_identifier_with_version_suffix() {
        let err = DiffRequest::new("2303.00096v2", "1", "2").unwrap_err();
        assert!(err.to_string().contains("version suffix"), "got: {err}");
    }

    #[test]
    fn rejects_bad_revisions() {
        assert!(DiffRequest::new("2303.00096", "0", "2").is_err());
        assert!(DiffRequest::new("2303.00096", "1", "two").is_err());
        assert!(DiffRequest::new("2303.00096", "-1", "2").is_err());
    }

    #[test]
    fn normalises_leading_zeros() {
        let r = DiffRequest::new("2303.00096", "01", "002").unwrap();
        assert_eq!(r.artifact_stem(), "2303.00096_v1_to_v2");
    }

    #[test]
    fn file_names_use_all_three_inputs() {
        let r = DiffRequest::new("2303.00096", "1", "2").unwrap();
        assert_eq!(r.pdf_file_name(), "2303.00096_v1_to_v2_diff.pdf");
        assert_eq!(r.bundle_file_name(), "2303.00096_v1_to_v2_source.tar.gz");
        assert_eq!(r.build_log_file_name(), "2303.00096_v1_to_v2_build.log");
    }

    #[test]
    fn deserialising_applies_the_same_validation() {
        let r: DiffRequest = serde_json::from_str(
            r#"{"identifier":"arXiv:2303.00096","old_revision":"v1","new_revision":"2"}"#,
        )
        .unwrap();
        assert_eq!(r, DiffRequest::new("2303.00096", "1", "2").unwrap());

        let escaping = r#"{"identifier":"not an id","old_revision":"1/../../../../tmp/escape","new_revision":""}"#;
        assert!(serde_json::from_str::<DiffRequest>(escaping).is_err());

        let traversal = r#"{"identifier":"2303.00096","old_revision":"1/../../x","new_revision":"2"}"#;
        let err = serde_json::from_str::<DiffRequest>(traversal).unwrap_err();
        assert!(err.to_string().contains("positive integer"), "got: {err}");
    }
}
