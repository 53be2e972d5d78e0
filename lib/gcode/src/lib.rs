//! A templated (in the Rust sense: compile-time-registered) G-code parser.
//!
//! This is the portable half of the control kernel shared by every module:
//! it knows nothing about mailboxes, tasks, or hardware, only how to turn a
//! byte slice into a sequence of typed command records. Parsing never
//! allocates and never panics on malformed input.
//!
//! A module declares its own command enum with [`gcode_group!`], listing
//! every G-code it understands and the type that knows how to recognize it.
//! Recognizers are tried in declaration order; the first one that matches a
//! given position in the input wins, mirroring the fold-over-template-pack
//! in the C++ original this crate's contract was distilled from.

#![no_std]

pub mod value;

pub use value::{gobble_whitespace, parse_float, parse_int, parse_uint, parse_word, prefix_matches};

/// Marker for "the remaining bytes don't match any known G-code". The whole
/// line is discarded; there's nothing more specific to say about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseError;

/// The result of one `parse_available` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupResult<T> {
    /// Nothing left but whitespace.
    None,
    /// Non-whitespace bytes remained but matched no recognizer.
    Error(ParseError),
    /// A G-code was recognized.
    Gcode(T),
}

impl<T> GroupResult<T> {
    pub fn is_none(&self) -> bool {
        matches!(self, GroupResult::None)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, GroupResult::Error(_))
    }

    pub fn gcode(self) -> Option<T> {
        match self {
            GroupResult::Gcode(g) => Some(g),
            _ => None,
        }
    }
}

/// Implemented by every individual G-code a module accepts.
///
/// `parse` is pure: given the unconsumed tail of the line, it either
/// recognizes its own prefix and returns `Some(Self)` with the iterator
/// advanced past whatever it consumed, or leaves the input alone and
/// returns `None` so the next recognizer in the group can have a turn.
pub trait Recognizer: Sized {
    fn parse(input: &[u8]) -> (Option<Self>, &[u8]);
}

/// Declares a command enum and its `parse_available` dispatcher.
///
/// ```ignore
/// gcode_group! {
///     pub enum HeaterShakerGcode {
///         SetRpm(SetRpm),
///         GetRpm(GetRpm),
///     }
/// }
/// ```
///
/// expands to an enum with one variant per listed G-code plus an inherent
/// `parse_available(&[u8]) -> (GroupResult<Self>, &[u8])` that:
/// - skips leading whitespace once,
/// - tries each variant's [`Recognizer::parse`] in declaration order,
/// - returns the first match, or `GroupResult::None` if nothing but
///   whitespace was left, or `GroupResult::Error` (consuming the rest of
///   the line) otherwise.
#[macro_export]
macro_rules! gcode_group {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $variant:ident ( $ty:ty ) ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        $vis enum $name {
            $( $variant($ty) ),+
        }

        impl $name {
            /// Parses the first recognized G-code out of `input`. Callers
            /// should keep calling this with the returned remainder until
            /// it yields `GroupResult::None`.
            pub fn parse_available(input: &[u8]) -> ($crate::GroupResult<$name>, &[u8]) {
                let start = $crate::gobble_whitespace(input);

                $(
                    if let (Some(value), rest) = <$ty as $crate::Recognizer>::parse(start) {
                        return ($crate::GroupResult::Gcode($name::$variant(value)), rest);
                    }
                )+

                if start.is_empty() {
                    ($crate::GroupResult::None, start)
                } else {
                    ($crate::GroupResult::Error($crate::ParseError), &start[start.len()..])
                }
            }
        }
    };
}
