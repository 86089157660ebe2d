//! Validated identifier types shared across the imaging catalog crates.
//!
//! Every identifier that ends up as a key in a catalog index is backed by
//! [`NonEmptyText`], so an empty series kind, patient id or doctor name cannot be
//! constructed in the first place.

use std::fmt;

/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,
}

/// A string type that guarantees non-empty content.
///
/// The input is trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// Returns `Err(TextError::Empty)` if the trimmed input is empty.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the wrapper and returns the owned, trimmed string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for NonEmptyText {
    type Err = TextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

/// Declares a named identifier backed by [`NonEmptyText`].
macro_rules! text_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(NonEmptyText);

        impl $name {
            /// Creates the identifier from trimmed, non-empty input.
            ///
            /// # Errors
            ///
            /// Returns `TextError::Empty` if the trimmed input is empty.
            pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
                NonEmptyText::new(input).map(Self)
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.0.as_str()
            }
        }

        impl std::str::FromStr for $name {
            type Err = TextError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl From<NonEmptyText> for $name {
            fn from(text: NonEmptyText) -> Self {
                Self(text)
            }
        }
    };
}

text_identifier!(
    /// Logical series name such as `adc` or `dwi`.
    ///
    /// The kind is kept exactly as given; matching against folder and file names is
    /// case-insensitive and goes through [`SeriesKind::lowercase`].
    SeriesKind
);

text_identifier!(
    /// External patient identifier. Also the name of the patient's directory under the
    /// dataset root.
    PatientId
);

text_identifier!(
    /// Annotating doctor, taken from the name of a subfolder of the masks folder.
    DoctorId
);

impl SeriesKind {
    /// Lowercased form used by the folder and file matching rules.
    pub fn lowercase(&self) -> String {
        self.as_str().to_lowercase()
    }
}
