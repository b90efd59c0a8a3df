//! Path cleaning for fixed-path redirects.

/// Returns the canonical form of a URL path.
///
/// The following rules are applied until no further processing can be done:
///  1. Replace multiple slashes with a single slash.
///  2. Eliminate each `.` path name element (the current directory).
///  3. Eliminate each inner `..` path name element (the parent directory)
///     along with the non-`..` element that precedes it.
///  4. Eliminate `..` elements that begin a rooted path, that is, replace
///     `/..` by `/` at the beginning of a path.
///
/// A trailing slash is kept, and a final `.` element leaves one behind.
/// If the result of this process is an empty string, `/` is returned.
/// ```rust
/// use routemark::path::clean;
///
/// assert_eq!(clean("/abc//def/../ghi/"), "/abc/ghi/");
/// assert_eq!(clean("../.."), "/");
/// ```
pub fn clean(p: &str) -> String {
    let mut trailing = p.len() > 1 && p.ends_with('/');
    let mut elements: Vec<&str> = Vec::new();
    let mut segments = p.split('/').peekable();

    while let Some(segment) = segments.next() {
        match segment {
            "" => {}
            "." => {
                if segments.peek().is_none() {
                    trailing = true;
                }
            }
            ".." => {
                elements.pop();
            }
            name => elements.push(name),
        }
    }

    let mut cleaned = String::with_capacity(p.len() + 1);
    for element in &elements {
        cleaned.push('/');
        cleaned.push_str(element);
    }

    if cleaned.is_empty() {
        return String::from("/");
    }

    if trailing {
        cleaned.push('/');
    }

    cleaned
}
