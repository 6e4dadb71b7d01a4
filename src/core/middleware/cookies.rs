//! Verification cookie handling.
//!
//! Parses request `Cookie` headers and formats the `Set-Cookie` value issued
//! by the challenge page.

use percent_encoding::percent_decode_str;

/// Looks up cookie `name` across one or more `Cookie` header values.
///
/// Values are percent-decoded when possible and unquoted; a value that does
/// not decode is returned verbatim. The first occurrence wins.
#[must_use]
pub fn find_cookie<'a, I>(header_values: I, name: &str) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    header_values
        .into_iter()
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| decode_value(value.trim()))
}

fn decode_value(raw: &str) -> String {
    let unquoted = raw
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(raw);
    percent_decode_str(unquoted)
        .decode_utf8()
        .map_or_else(|_| unquoted.to_string(), |v| v.into_owned())
}

/// Formats a verification cookie.
///
/// With `http_only` this is a `Set-Cookie` header value; without it, the same
/// string works for `document.cookie`.
#[must_use]
pub fn format_set_cookie(
    name: &str,
    value: &str,
    max_age: u64,
    http_only: bool,
    secure: bool,
) -> String {
    let http_only_flag = if http_only { "; HttpOnly" } else { "" };
    let secure_flag = if secure { "; Secure" } else { "" };
    format!("{name}={value}; Max-Age={max_age}; Path=/{http_only_flag}; SameSite=Lax{secure_flag}")
}
