use thiserror::Error;

/// A record declaration that cannot be turned into command-line arguments.
///
/// These are raised while building the parser, before any token is looked at,
/// and always name the offending field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeclarationError {
    #[error("field names must not be empty")]
    EmptyName,

    #[error("field names must not start with an underscore; got '{field}'")]
    LeadingUnderscore { field: String },

    #[error("field name '{field}' must only contain ASCII letters, digits and '_'")]
    InvalidName { field: String },

    #[error("duplicate field name '{field}'")]
    DuplicateField { field: String },

    #[error("flag '--{flag}' of field '{field}' collides with another argument")]
    FlagCollision { field: String, flag: String },

    #[error("unresolved type reference '{reference}' for field '{field}'")]
    Unresolved { field: String, reference: String },

    #[error("no converter registered for scalar type '{scalar}' (field '{field}')")]
    MissingConverter { field: String, scalar: String },

    #[error("exactly one non-none type required for '{field}'; got {ty}")]
    UnsupportedUnion { field: String, ty: String },

    #[error("unsupported nested type for field '{field}': {ty}")]
    UnsupportedNesting { field: String, ty: String },

    #[error("empty tuples are not supported (field '{field}')")]
    EmptyTuple { field: String },

    #[error("only homogeneous tuples are supported for field '{field}'; got {ty}")]
    MixedTuple { field: String, ty: String },

    #[error(
        "only a single leading element before a variadic tail is supported \
         for field '{field}'; got {ty}"
    )]
    UnsupportedUnpack { field: String, ty: String },

    #[error("need at least one choice for field '{field}' of type {ty}")]
    EmptyChoices { field: String, ty: String },

    #[error("need exactly one kind of literal for field '{field}'; got {ty}")]
    MixedLiterals { field: String, ty: String },

    #[error("choice {choice} is not a valid {scalar} value (field '{field}')")]
    IncompatibleChoice {
        field: String,
        scalar: String,
        choice: String,
    },
}

/// Failure to turn a single command-line token into a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error("invalid {scalar} value '{token}': {reason}")]
    Invalid {
        scalar: String,
        token: String,
        reason: String,
    },

    #[error("invalid choice '{token}' (choose from {})", .choices.join(", "))]
    UnknownChoice { token: String, choices: Vec<String> },
}

/// A `Value` that does not fit the Rust type a field asked for.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("expected {expected}, found {found}")]
    Mismatch { expected: &'static str, found: String },

    #[error("{value} is out of range for {target}")]
    OutOfRange { value: String, target: &'static str },

    #[error("expected {expected} elements, found {found}")]
    Arity { expected: usize, found: usize },

    #[error("'{member}' is not a member of {target}")]
    UnknownMember { member: String, target: &'static str },
}

/// Failure raised while constructing a record from its field values.
#[derive(Debug, Error)]
pub enum ConstructError {
    #[error("missing value for field '{field}'")]
    MissingField { field: String },

    #[error("field '{field}': {source}")]
    Field {
        field: String,
        #[source]
        source: ValueError,
    },

    /// The record's own constructor refused the values.
    #[error(transparent)]
    Rejected(Box<dyn std::error::Error + Send + Sync>),
}

/// Everything that can go wrong between a record declaration and a parsed record.
#[derive(Debug, Error)]
pub enum ParcelError {
    #[error(transparent)]
    Declaration(#[from] DeclarationError),

    /// Usage error or help/usage request, as reported by the token parser.
    #[error(transparent)]
    Usage(#[from] clap::Error),

    #[error(transparent)]
    Construct(#[from] ConstructError),

    #[error("failed to read parsed value for field '{field}': {source}")]
    Matches {
        field: String,
        #[source]
        source: clap::parser::MatchesError,
    },

    #[error("no value supplied for field '{field}'")]
    MissingValue { field: String },
}

impl ParcelError {
    /// Whether this is a help request rather than a real failure.
    pub fn is_help(&self) -> bool {
        matches!(
            self,
            Self::Usage(err) if err.kind() == clap::error::ErrorKind::DisplayHelp
        )
    }
}
