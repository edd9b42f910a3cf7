//! Argument splitting
//!
//! Splits operator arguments on top-level commas. Used both for value lists
//! (`IN(1,2,3)`) and for the sub-expressions of `AND(...)`/`OR(...)`.

/// Split `raw` on commas that are neither escaped nor inside parentheses.
///
/// - `\,` at the top level is a literal comma; the backslash is dropped.
///   Inside parentheses the backslash is kept, unlike at the top level, and
///   is only dropped once the nested group is split in turn. So
///   `OR(IN(a\,b,c))` binds `a,b` and `c`.
/// - `\(` and `\)` do not change the depth and keep their backslash.
/// - Empty segments are dropped, so `""` yields no segments.
/// - Unbalanced input never fails; the open region runs to the end.
pub fn split(raw: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut depth: usize = 0;
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.peek().copied() {
                Some(',') => {
                    chars.next();
                    if depth > 0 {
                        current.push('\\');
                    }
                    current.push(',');
                }
                Some(p @ ('(' | ')')) => {
                    chars.next();
                    current.push('\\');
                    current.push(p);
                }
                _ => current.push('\\'),
            },
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }

    if !current.is_empty() {
        segments.push(current);
    }

    segments
}

/// Byte index of the parenthesis closing the one at `open`, skipping escaped
/// parentheses. `None` when the input is unbalanced.
pub fn matching_close(raw: &str, open: usize) -> Option<usize> {
    let mut depth: usize = 0;
    let mut escaped = false;

    for (idx, c) in raw[open..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(open + idx);
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_top_level_commas() {
        assert_eq!(split("1,2,3"), vec!["1", "2", "3"]);
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(split("").is_empty());
        assert!(split(",,").is_empty());
    }

    #[test]
    fn escaped_comma_is_literal() {
        assert_eq!(split(r"a\,b,c"), vec!["a,b", "c"]);
    }

    #[test]
    fn nested_parentheses_are_not_split() {
        assert_eq!(
            split("EQ(1),IN(2,3),NULL()"),
            vec!["EQ(1)", "IN(2,3)", "NULL()"]
        );
    }

    #[test]
    fn escape_survives_inside_nested_region() {
        let outer = split(r"IN(a\,b,c),EQ(x)");
        assert_eq!(outer, vec![r"IN(a\,b,c)", "EQ(x)"]);
        assert_eq!(split(r"a\,b,c"), vec!["a,b", "c"]);
    }

    #[test]
    fn escaped_parenthesis_does_not_change_depth() {
        assert_eq!(split(r"a\(,b"), vec![r"a\(", "b"]);
        assert_eq!(split(r"(a\),b),c"), vec![r"(a\),b)", "c"]);
    }

    #[test]
    fn unbalanced_input_terminates() {
        assert_eq!(split("(a,b"), vec!["(a,b"]);
        assert_eq!(split("a),b"), vec!["a)", "b"]);
    }

    #[test]
    fn segments_are_not_trimmed() {
        assert_eq!(split("a, b"), vec!["a", " b"]);
    }

    #[test]
    fn split_recovers_joined_segments() {
        let samples: [&[&str]; 4] = [
            &["a"],
            &["1", "2", "3"],
            &["fulano", "beltrano", "sicrano de tal"],
            &["@me", "@agent:10", "x.y"],
        ];
        for xs in samples {
            assert_eq!(split(&xs.join(",")), xs);
        }
    }

    #[test]
    fn matching_close_finds_outer_parenthesis() {
        let raw = "OR(EQ(1),EQ(2)) tail";
        assert_eq!(matching_close(raw, 2), Some(14));
    }

    #[test]
    fn matching_close_skips_escaped() {
        let raw = r"LIKE(a\)b)";
        assert_eq!(matching_close(raw, 4), Some(9));
    }

    #[test]
    fn matching_close_unbalanced() {
        assert_eq!(matching_close("EQ(1", 2), None);
    }
}
