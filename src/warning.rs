/// Non-fatal conditions that degrade or drop a single item
///
/// Warnings never abort a run. Producers return them alongside their results;
/// the pipeline logs each one and keeps them in the run summary.
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// A single verse marker whose text is not a positive integer
    InvalidVerseNumber { text: String },
    /// More than one verse marker inside one paragraph; the first was used
    MultipleVerseMarkers { count: usize },
    /// A paragraph left without text once its markers were removed
    EmptyParagraph,
    /// An image whose source does not have the raw animation extension
    UnexpectedImageExtension { src: String, expected: String },
    /// No exact master for a stem; the nearest one was used instead
    FuzzyAssetMatch {
        requested: String,
        chosen: String,
        distance: usize,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::InvalidVerseNumber { text } => write!(f, "Invalid verse number: \"{}\"", text),
            Warning::MultipleVerseMarkers { count } => {
                write!(f, "Found {} potential verse numbers, using the first", count)
            }
            Warning::EmptyParagraph => write!(f, "Found <p> without text, skipping it"),
            Warning::UnexpectedImageExtension { src, expected } => {
                write!(f, "Expected {} to end with .{}, skipping it", src, expected)
            }
            Warning::FuzzyAssetMatch {
                requested,
                chosen,
                distance,
            } => write!(
                f,
                "No exact master match for \"{}\", using \"{}\" (distance {})",
                requested, chosen, distance
            ),
        }
    }
}
