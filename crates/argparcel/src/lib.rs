//! argparcel: declare a record, get a command-line parser for it.
//!
//! Each field of a record becomes one long option named after the field
//! (`_` rendered as `-`). Booleans become a `--x`/`--no-x` pair, literal and
//! enum types become choice sets, lists and homogeneous tuples take several
//! tokens, and a field is required exactly when it has no default.
//!
//! ```ignore
//! use argparcel::Record;
//!
//! #[derive(Debug, Record)]
//! struct Moo {
//!     a: i64,
//!     b: f64,
//!     c: bool,
//!     #[parcel(default)]
//!     d: Option<String>,
//! }
//!
//! let moo: Moo = argparcel::try_parse_from(["--a", "2", "--b", "3.2", "--c"])?;
//! ```

extern crate self as argparcel;

pub mod analyze;
mod error;
pub mod parser;
mod registry;
pub mod schema;
mod value;

use std::ffi::OsString;
use std::path::Path;

pub use argparcel_macros::{Choice, Record};
pub use error::{ConstructError, ConversionError, DeclarationError, ParcelError, ValueError};
pub use parser::ArgParser;
pub use registry::{Converter, Registry};
pub use schema::{EnumDecl, FieldDecl, Literal, RecordDecl, TypeExpr};
pub use value::{AtLeastOne, FieldType, FieldValues, Value};

/// A type that can be declared as command-line arguments and built from the parsed values.
///
/// Usually derived with `#[derive(Record)]`.
pub trait Record: Sized {
    fn declaration() -> RecordDecl;

    /// Build the record from values keyed by field name, in declaration order.
    fn construct(values: FieldValues) -> Result<Self, ConstructError>;
}

/// Parse the process arguments into `T`.
///
/// The usage name is taken from the file name of `argv[0]`. Help requests and
/// usage errors print and exit the process.
pub fn parse<T: Record>() -> Result<T, ParcelError> {
    parse_with(&Registry::default())
}

/// [`parse`] with caller-supplied converters and type definitions.
pub fn parse_with<T: Record>(registry: &Registry) -> Result<T, ParcelError> {
    let mut args = std::env::args_os();
    let program = args.next().and_then(|argv0| {
        Path::new(&argv0)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
    });

    let mut parser = ArgParser::for_record::<T>(registry)?;
    if let Some(program) = program {
        parser = parser.with_program_name(program);
    }
    Ok(T::construct(parser.parse_from(args)?)?)
}

/// Parse `tokens` (no program name) into `T`, exiting on help or usage errors.
pub fn parse_from<T, I, S>(tokens: I) -> Result<T, ParcelError>
where
    T: Record,
    I: IntoIterator<Item = S>,
    S: Into<OsString> + Clone,
{
    parse_from_with(&Registry::default(), tokens)
}

/// Parse `tokens` (no program name) into `T`, returning help and usage errors.
pub fn try_parse_from<T, I, S>(tokens: I) -> Result<T, ParcelError>
where
    T: Record,
    I: IntoIterator<Item = S>,
    S: Into<OsString> + Clone,
{
    try_parse_from_with(&Registry::default(), tokens)
}

/// [`parse_from`] with caller-supplied converters and type definitions.
pub fn parse_from_with<T, I, S>(registry: &Registry, tokens: I) -> Result<T, ParcelError>
where
    T: Record,
    I: IntoIterator<Item = S>,
    S: Into<OsString> + Clone,
{
    let values = ArgParser::for_record::<T>(registry)?.parse_from(tokens)?;
    Ok(T::construct(values)?)
}

/// [`try_parse_from`] with caller-supplied converters and type definitions.
pub fn try_parse_from_with<T, I, S>(registry: &Registry, tokens: I) -> Result<T, ParcelError>
where
    T: Record,
    I: IntoIterator<Item = S>,
    S: Into<OsString> + Clone,
{
    let values = ArgParser::for_record::<T>(registry)?.try_parse_from(tokens)?;
    Ok(T::construct(values)?)
}
