use std::str::FromStr;

use garde::Validate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Validate, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[garde(transparent)]
pub struct ValidEmail(#[garde(email)] String);

impl FromStr for ValidEmail {
    type Err = garde::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let email = ValidEmail(s.to_string());
        email.validate()?;
        Ok(email)
    }
}

impl AsRef<str> for ValidEmail {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

pub const MAX_SLUG_LEN: usize = 120;

/// Slug usable in urls and as object store path segment:
/// lowercase ascii alphanumerics separated by single dashes
pub fn is_valid_slug(slug: &str, _ctx: &()) -> garde::Result {
    let valid = !slug.is_empty()
        && slug.len() <= MAX_SLUG_LEN
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--")
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(garde::Error::new(format!("invalid slug: {slug}")))
    }
}

/// Same as [`is_valid_slug`], missing slug is accepted
pub fn is_valid_optional_slug(slug: &Option<String>, ctx: &()) -> garde::Result {
    match slug {
        Some(slug) => is_valid_slug(slug, ctx),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use fake::Fake as _;
    use quickcheck::Arbitrary;
    use quickcheck_macros::quickcheck;

    use super::*;

    impl Arbitrary for ValidEmail {
        fn arbitrary(_g: &mut quickcheck::Gen) -> Self {
            let email: String = fake::faker::internet::en::SafeEmail().fake();
            ValidEmail(email)
        }
    }

    #[quickcheck]
    fn test_valid_email_arbitrary(valid_email: ValidEmail) {
        assert!(valid_email.validate().is_ok());
    }

    #[test]
    fn test_invalid_email() {
        assert!(ValidEmail::from_str("creator@localhost").is_ok());
        assert!(ValidEmail::from_str("creator").is_err());
    }

    #[test]
    fn test_slug_validation() {
        assert!(is_valid_slug("night-shift-2", &()).is_ok());
        assert!(is_valid_slug("", &()).is_err());
        assert!(is_valid_slug("-night", &()).is_err());
        assert!(is_valid_slug("night--shift", &()).is_err());
        assert!(is_valid_slug("Night", &()).is_err());
        assert!(is_valid_slug("night/shift", &()).is_err());
        assert!(is_valid_optional_slug(&None, &()).is_ok());
        assert!(is_valid_optional_slug(&Some("Night".into()), &()).is_err());
    }
}
