//! Reader for the leading duration/fps directive comments.
//!
//! Generated source carries two machine-readable directives as plain
//! comment lines before the code, e.g. `// duration: 5s` and `// fps: 30`.
//! They are syntactically inert, so the validator and the lowering pass
//! ignore them; this reader is the metadata extractor collaborators use to
//! size the composition.

/// Directive values found in the leading comment lines.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Directives {
    /// Requested composition length in seconds.
    pub duration_seconds: Option<f64>,
    /// Requested frame rate.
    pub fps: Option<f64>,
}

/// Scans the leading comment lines of `source` for directives.
///
/// Scanning stops at the first line that is neither blank nor a `//`
/// comment; directives buried in the code body are ignored. Unparseable
/// directive values are treated as absent.
#[must_use]
pub fn read_directives(source: &str) -> Directives {
    let mut directives = Directives::default();
    for line in source.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let Some(comment) = trimmed.strip_prefix("//") else {
            break;
        };
        let comment = comment.trim();
        if let Some(value) = directive_value(comment, "duration") {
            directives.duration_seconds = parse_seconds(value);
        } else if let Some(value) = directive_value(comment, "fps") {
            directives.fps = parse_number(value);
        }
    }
    directives
}

fn directive_value<'a>(comment: &'a str, key: &str) -> Option<&'a str> {
    let rest = comment.strip_prefix(key)?.trim_start();
    rest.strip_prefix(':').map(str::trim)
}

fn parse_seconds(value: &str) -> Option<f64> {
    let value = value
        .strip_suffix("seconds")
        .or_else(|| value.strip_suffix("sec"))
        .or_else(|| value.strip_suffix('s'))
        .unwrap_or(value)
        .trim();
    parse_number(value)
}

fn parse_number(value: &str) -> Option<f64> {
    let parsed = value.parse::<f64>().ok()?;
    (parsed.is_finite() && parsed > 0.0).then_some(parsed)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("// duration: 5s\n// fps: 30\nconst x = 1;", Some(5.0), Some(30.0))]
    #[case("// duration: 2.5 seconds\nconst x = 1;", Some(2.5), None)]
    #[case("// fps: 60\n// duration: 10\nconst x = 1;", Some(10.0), Some(60.0))]
    #[case("const x = 1;\n// duration: 5s", None, None)]
    #[case("", None, None)]
    fn reads_leading_directives(
        #[case] source: &str,
        #[case] duration: Option<f64>,
        #[case] fps: Option<f64>,
    ) {
        let directives = read_directives(source);
        assert_eq!(directives.duration_seconds, duration);
        assert_eq!(directives.fps, fps);
    }

    #[test]
    fn blank_lines_before_directives_are_skipped() {
        let directives = read_directives("\n\n// duration: 3s\nconst x = 1;");
        assert_eq!(directives.duration_seconds, Some(3.0));
    }

    #[rstest]
    #[case("// duration: soon")]
    #[case("// duration: -5s")]
    #[case("// duration:")]
    fn unparseable_values_are_absent(#[case] source: &str) {
        assert_eq!(read_directives(source).duration_seconds, None);
    }

    #[test]
    fn directives_do_not_affect_validation() {
        let source = "// duration: 5s\n// fps: 30\nconst MyComposition = () => null;";
        let verdict = reelguard_syntax::validate(source, reelguard_policy::Allowlist::standard());
        assert!(verdict.valid);
    }
}
