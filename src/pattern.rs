//! Compiles URI templates into regex fragments.
//!
//! A template is literal text interspersed with placeholders:
//!
//! ```ignore
//!  Syntax              Captures
//!  {name}              one or more characters up to the next '/'
//!  {name:constraint}   whatever `constraint` matches
//! ```
//!
//! ```ignore
//!  Template: /blog/{category}/{post}
//!  Pattern:  /blog/([^/]+)/([^/]+)
//!
//!  Template: /posts/{id:\d+}
//!  Pattern:  /posts/(\d+)
//! ```
//!
//! Every placeholder contributes exactly one capture group, in declaration
//! order, so the n-th group of a match binds the n-th parameter name.
use crate::error::CompileError;

use std::collections::HashSet;

use regex::Regex;

/// The capture body of a placeholder without a constraint.
pub const DEFAULT_CONSTRAINT: &str = "[^/]+";

/// The result of compiling a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledPattern {
    /// Regex fragment, unanchored.
    pub pattern: String,
    /// Placeholder names in the order they appear.
    pub parameter_names: Vec<String>,
}

impl CompiledPattern {
    pub fn is_dynamic(&self) -> bool {
        !self.parameter_names.is_empty()
    }
}

/// Compiles `template` into a regex fragment and its parameter names.
pub fn compile(template: &str) -> Result<CompiledPattern, CompileError> {
    if template.is_empty() {
        return Err(CompileError::Empty);
    }

    if !template.starts_with('/') {
        return Err(CompileError::MissingLeadingSlash {
            template: template.to_owned(),
        });
    }

    let mut rest = template.trim_end_matches('/');
    let mut pattern = String::with_capacity(rest.len() * 2);
    let mut parameter_names = Vec::new();
    let mut seen = HashSet::new();

    while let Some(open) = rest.find('{') {
        pattern.push_str(&regex::escape(&rest[..open]));

        let len = placeholder_len(&rest[open..]).ok_or_else(|| {
            CompileError::UnclosedPlaceholder {
                template: template.to_owned(),
            }
        })?;
        let body = &rest[open + 1..open + len - 1];

        let (name, constraint) = match body.find(':') {
            Some(i) => (&body[..i], &body[i + 1..]),
            None => (body, DEFAULT_CONSTRAINT),
        };

        if !is_valid_name(name) {
            return Err(CompileError::InvalidParameterName {
                template: template.to_owned(),
                name: name.to_owned(),
            });
        }

        if !seen.insert(name) {
            return Err(CompileError::DuplicateParameter {
                template: template.to_owned(),
                name: name.to_owned(),
            });
        }

        check_constraint(template, name, constraint)?;

        pattern.push('(');
        pattern.push_str(constraint);
        pattern.push(')');
        parameter_names.push(name.to_owned());

        rest = &rest[open + len..];
    }

    pattern.push_str(&regex::escape(rest));

    Ok(CompiledPattern {
        pattern,
        parameter_names,
    })
}

/// Length in bytes of the placeholder at the start of `s`, braces included.
/// Braces inside a constraint (`{id:\d{4}}`) nest.
fn placeholder_len(s: &str) -> Option<usize> {
    let mut depth = 0usize;

    for (i, c) in s.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }

    None
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

fn check_constraint(template: &str, name: &str, constraint: &str) -> Result<(), CompileError> {
    let invalid = |source| CompileError::InvalidConstraint {
        template: template.to_owned(),
        name: name.to_owned(),
        source,
    };

    // on its own, a ')' that would close the capture group does not parse
    let bare = Regex::new(constraint).map_err(invalid)?;

    // the fragment exactly as it is placed into the route
    let placed = Regex::new(&format!("^({})$", constraint)).map_err(invalid)?;

    if bare.captures_len() != 1 || placed.captures_len() != 2 {
        return Err(CompileError::CapturingConstraint {
            template: template.to_owned(),
            name: name.to_owned(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchored(p: &CompiledPattern) -> Regex {
        Regex::new(&format!("^{}$", p.pattern)).unwrap()
    }

    #[test]
    fn static_template() {
        let p = compile("/posts").unwrap();
        assert!(!p.is_dynamic());
        assert_eq!(p.pattern, "/posts");
    }

    #[test]
    fn placeholders() {
        let p = compile("/blog/{category}/{post}").unwrap();
        assert_eq!(p.pattern, "/blog/([^/]+)/([^/]+)");
        assert_eq!(p.parameter_names, vec!["category", "post"]);

        let caps = anchored(&p).captures("/blog/rust/request-routers").unwrap();
        assert_eq!(&caps[1], "rust");
        assert_eq!(&caps[2], "request-routers");
        assert!(anchored(&p).captures("/blog/rust/").is_none());
        assert!(anchored(&p).captures("/blog/rust/a/b").is_none());
    }

    #[test]
    fn literals_are_escaped() {
        let p = compile("/files/{name}.tar.gz").unwrap();
        assert_eq!(p.pattern, r"/files/([^/]+)\.tar\.gz");
        assert!(!anchored(&p).is_match("/files/aXtarXgz"));
        assert!(anchored(&p).is_match("/files/a.tar.gz"));
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let p = compile("/posts/{id}/").unwrap();
        assert_eq!(p.pattern, "/posts/([^/]+)");
    }

    #[test]
    fn constraints() {
        let p = compile(r"/posts/{id:\d+}").unwrap();
        assert_eq!(p.pattern, r"/posts/(\d+)");
        assert!(anchored(&p).is_match("/posts/42"));
        assert!(!anchored(&p).is_match("/posts/abc"));

        let p = compile(r"/archive/{year:\d{4}}").unwrap();
        assert_eq!(p.parameter_names, vec!["year"]);
        assert!(anchored(&p).is_match("/archive/2024"));
        assert!(!anchored(&p).is_match("/archive/24"));
    }

    #[test]
    fn errors() {
        assert!(matches!(compile(""), Err(CompileError::Empty)));
        assert!(matches!(
            compile("posts"),
            Err(CompileError::MissingLeadingSlash { .. })
        ));
        assert!(matches!(
            compile("/a/{id}/b/{id}"),
            Err(CompileError::DuplicateParameter { ref name, .. }) if name == "id"
        ));
        assert!(matches!(
            compile("/a/{}"),
            Err(CompileError::InvalidParameterName { .. })
        ));
        assert!(matches!(
            compile("/a/{1d}"),
            Err(CompileError::InvalidParameterName { .. })
        ));
        assert!(matches!(
            compile("/a/{id"),
            Err(CompileError::UnclosedPlaceholder { .. })
        ));
        assert!(matches!(
            compile("/a/{id:[}"),
            Err(CompileError::InvalidConstraint { .. })
        ));
        assert!(matches!(
            compile("/a/{id:(a|b)}"),
            Err(CompileError::CapturingConstraint { .. })
        ));
        assert!(matches!(
            compile("/p/{x:a)|(?:b}"),
            Err(CompileError::InvalidConstraint { .. })
        ));
        assert!(matches!(
            compile("/p/{x:(?x)a#}"),
            Err(CompileError::InvalidConstraint { .. })
        ));
    }

    #[test]
    fn constraints_stay_inside_their_group() {
        let p = compile("/p/{x:a|b}/q").unwrap();
        assert_eq!(p.pattern, "/p/(a|b)/q");
        assert!(anchored(&p).is_match("/p/b/q"));
        assert!(!anchored(&p).is_match("b/q"));
        assert!(!anchored(&p).is_match("/p/a"));
    }
}
