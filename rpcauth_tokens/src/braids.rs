//! String newtypes for client identifiers and secrets
//!
//! Secret values print as a `***LABEL***` placeholder. The alternate `Debug`
//! form (`{:#?}`) shows a short quoted preview for diagnostics, sized by the
//! format width when one is given. The alternate `Display` form (`{:#}`)
//! prints the value in full.

use aliri_braid::braid;
use std::fmt;

macro_rules! redacted_fmt {
    ($ty:ty: $label:literal, $preview:literal) => {
        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                if f.alternate() {
                    let max_chars = f.width().unwrap_or($preview);
                    write!(f, "\"{}\"", Preview(self.as_str(), max_chars))
                } else {
                    f.write_str(concat!("***", $label, "***"))
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                if f.alternate() {
                    f.write_str(self.as_str())
                } else {
                    f.write_str(concat!("***", $label, "***"))
                }
            }
        }
    };
}

/// At most `max_chars` characters of a secret, ending in `…` when cut short
struct Preview<'a>(&'a str, usize);

impl fmt::Display for Preview<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let Self(value, max_chars) = *self;
        match value.char_indices().nth(max_chars.saturating_sub(1)) {
            Some((cut, _)) => {
                f.write_str(&value[..cut])?;
                f.write_str("…")
            }
            None => f.write_str(value),
        }
    }
}

/// A client ID
#[braid(serde)]
pub struct ClientId;

/// A client secret
#[braid(serde, debug = "owned", display = "owned")]
pub struct ClientSecret;

redacted_fmt!(ClientSecretRef: "CLIENT SECRET", 5);

/// An access token, as issued by the identity provider
#[braid(serde, debug = "owned", display = "owned")]
pub struct AccessToken;

redacted_fmt!(AccessTokenRef: "ACCESS TOKEN", 15);

/// A refresh token
///
/// For the identity providers this crate targets, the refresh token is
/// already the base64 value expected after `Basic ` in an `Authorization`
/// header.
#[braid(serde, debug = "owned", display = "owned")]
pub struct RefreshToken;

redacted_fmt!(RefreshTokenRef: "REFRESH TOKEN", 5);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_are_hidden_by_default() {
        let secret = ClientSecret::from_static("super-secret-value");
        assert_eq!(format!("{:?}", secret), "***CLIENT SECRET***");
        assert_eq!(format!("{}", secret), "***CLIENT SECRET***");
    }

    #[test]
    fn alternate_debug_reveals_a_prefix() {
        let token = AccessToken::from_static("abcdefghijklmnopqrstuvwxyz");
        assert_eq!(format!("{:#?}", token), "\"abcdefghijklmn…\"");
    }

    #[test]
    fn alternate_display_reveals_everything() {
        let token = RefreshToken::from_static("abc123");
        assert_eq!(format!("{:#}", token), "abc123");
    }

    #[test]
    fn short_values_are_not_truncated() {
        let token = AccessToken::from_static("abc");
        assert_eq!(format!("{:#?}", token), "\"abc\"");
    }

    #[test]
    fn format_width_sizes_the_preview() {
        let secret = ClientSecret::from_static("super-secret-value");
        assert_eq!(format!("{:#3?}", secret), "\"su…\"");
        assert_eq!(format!("{:#1?}", secret), "\"…\"");
    }
}
