//! MySQL root password policy and generation

use std::fmt;

use regex::Regex;

use crate::error::RequestError;

/// Shortest password accepted.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Length of auto-generated passwords.
pub const GENERATED_PASSWORD_LEN: usize = 16;

const SYMBOLS: &str = "!@#%^*-_=+.,:";

/// Password wrapper that never shows its content in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharClass {
    Upper,
    Lower,
    Digit,
    Symbol,
}

impl CharClass {
    pub const ALL: [CharClass; 4] = [Self::Upper, Self::Lower, Self::Digit, Self::Symbol];

    fn pattern(self) -> &'static str {
        match self {
            Self::Upper => "[A-Z]",
            Self::Lower => "[a-z]",
            Self::Digit => "[0-9]",
            Self::Symbol => "[^A-Za-z0-9]",
        }
    }
}

impl fmt::Display for CharClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Upper => "uppercase letter",
            Self::Lower => "lowercase letter",
            Self::Digit => "digit",
            Self::Symbol => "symbol",
        };
        f.write_str(name)
    }
}

/// Result of an accepted password check.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Assessment {
    pub missing: Vec<CharClass>,
}

impl Assessment {
    pub fn is_strong(&self) -> bool {
        self.missing.is_empty()
    }

    /// Human readable warning, `None` when every class is present.
    pub fn warning(&self) -> Option<String> {
        if self.is_strong() {
            return None;
        }
        let names: Vec<String> = self.missing.iter().map(ToString::to_string).collect();
        Some(format!(
            "weak password: consider adding at least one {}",
            names.join(", ")
        ))
    }
}

/// Check a candidate password.
///
/// Shorter than [`MIN_PASSWORD_LEN`] characters is an error; anything longer
/// is accepted and the assessment lists the missing character classes.
pub fn check(candidate: &str) -> Result<Assessment, RequestError> {
    let len = candidate.chars().count();
    if len < MIN_PASSWORD_LEN {
        return Err(RequestError::PasswordTooShort {
            min: MIN_PASSWORD_LEN,
            len,
        });
    }

    let missing = CharClass::ALL
        .into_iter()
        .filter(|class| {
            // patterns are constant and valid
            Regex::new(class.pattern())
                .map(|re| !re.is_match(candidate))
                .unwrap_or(true)
        })
        .collect();

    Ok(Assessment { missing })
}

/// Generate a password that satisfies every character class.
pub fn generate() -> Secret {
    let upper: Vec<char> = ('A'..='Z').collect();
    let lower: Vec<char> = ('a'..='z').collect();
    let digits: Vec<char> = ('0'..='9').collect();
    let symbols: Vec<char> = SYMBOLS.chars().collect();
    let pool: Vec<char> = upper
        .iter()
        .chain(&lower)
        .chain(&digits)
        .chain(&symbols)
        .copied()
        .collect();

    let pick = |set: &[char]| set[fastrand::usize(..set.len())];

    let mut chars = vec![pick(&upper), pick(&lower), pick(&digits), pick(&symbols)];
    while chars.len() < GENERATED_PASSWORD_LEN {
        chars.push(pick(&pool));
    }
    fastrand::shuffle(&mut chars);

    Secret(chars.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_passwords_are_rejected() {
        assert_eq!(
            check("Ab1!xyz"),
            Err(RequestError::PasswordTooShort { min: 8, len: 7 })
        );
        assert!(check("").is_err());
    }

    #[test]
    fn full_class_coverage_has_no_warning() {
        let assessment = check("Str0ng!pass").expect("accepted");
        assert!(assessment.is_strong());
        assert_eq!(assessment.warning(), None);
    }

    #[test]
    fn missing_classes_are_reported() {
        let assessment = check("alllowercase").expect("accepted");
        assert_eq!(
            assessment.missing,
            vec![CharClass::Upper, CharClass::Digit, CharClass::Symbol]
        );
        let warning = assessment.warning().expect("warning");
        assert!(warning.contains("uppercase letter"));
        assert!(warning.contains("symbol"));
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        // 7 characters, more than 8 bytes
        assert!(check("Äbc1!éü").is_err());
    }

    #[test]
    fn generated_passwords_meet_the_policy() {
        for _ in 0..50 {
            let secret = generate();
            assert_eq!(secret.expose().chars().count(), GENERATED_PASSWORD_LEN);
            assert!(check(secret.expose()).expect("accepted").is_strong());
        }
    }

    #[test]
    fn secret_debug_is_redacted() {
        let secret = Secret::new("hunter2hunter2");
        assert_eq!(format!("{secret:?}"), "Secret(***)");
    }
}
