//! Identifier length checks and quoting

/// Whether `identifier` fits within `limit` bytes of UTF-8
///
/// Stores count identifier length in bytes, so a name of 32 two-byte
/// characters is 64 long.
pub fn fits(identifier: &str, limit: usize) -> bool {
    identifier.len() <= limit
}

/// Quote an identifier, doubling embedded quotes
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote `name`, qualified by `namespace` unless the namespace is empty
pub fn qualified(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        quote_identifier(name)
    } else {
        format!("{}.{}", quote_identifier(namespace), quote_identifier(name))
    }
}
