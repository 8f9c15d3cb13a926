//! Builds a clap command from analyzed fields and turns clap matches back into field values.

use std::collections::HashSet;
use std::ffi::OsString;

use clap::builder::{
    PossibleValuesParser, StringValueParser, TypedValueParser, ValueParser, ValueRange,
};
use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgGroup, ArgMatches, Command};

use crate::Record;
use crate::analyze::{AnalyzedField, Element, FieldShape, Sequence, analyze_field, negated_flag};
use crate::error::{DeclarationError, ParcelError};
use crate::registry::Registry;
use crate::schema::RecordDecl;
use crate::value::{FieldValues, Value};

const HELP_FLAG: &str = "help";

// Field names are restricted to `[A-Za-z0-9_]`, so ids containing '/' never clash with them.
fn negated_id(field: &str) -> String {
    format!("{field}/no")
}

fn pair_group_id(field: &str) -> String {
    format!("{field}/pair")
}

/// A parser for one record declaration.
///
/// Construction analyzes every field and registers the corresponding clap
/// arguments; any field that cannot be expressed fails the whole build.
#[derive(Debug, Clone)]
pub struct ArgParser {
    fields: Vec<AnalyzedField>,
    command: Command,
}

impl ArgParser {
    pub fn new(record: &RecordDecl, registry: &Registry) -> Result<Self, DeclarationError> {
        let mut fields = Vec::with_capacity(record.fields().len());
        let mut names: HashSet<&str> = HashSet::new();
        let mut flags: HashSet<String> = HashSet::from([HELP_FLAG.to_string()]);

        for decl in record.fields() {
            let field = analyze_field(decl, registry)?;
            if !names.insert(decl.name.as_str()) {
                return Err(DeclarationError::DuplicateField {
                    field: decl.name.clone(),
                });
            }
            for flag in field.flags() {
                if !flags.insert(flag.clone()) {
                    return Err(DeclarationError::FlagCollision {
                        field: decl.name.clone(),
                        flag,
                    });
                }
            }
            fields.push(field);
        }

        let mut command = Command::new(record.name().to_string())
            .no_binary_name(true)
            .args_override_self(true);
        if let Some(about) = record.description() {
            command = command.about(about.to_string());
        }
        for field in &fields {
            command = register(command, field);
        }

        tracing::debug!(
            record = record.name(),
            fields = fields.len(),
            "built argument parser"
        );

        Ok(Self { fields, command })
    }

    /// Build the parser for a [`Record`] type.
    pub fn for_record<T: Record>(registry: &Registry) -> Result<Self, DeclarationError> {
        Self::new(&T::declaration(), registry)
    }

    /// Name shown in usage and help output.
    pub fn with_program_name(mut self, name: impl Into<String>) -> Self {
        self.command = self.command.bin_name(name.into());
        self
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    pub fn fields(&self) -> &[AnalyzedField] {
        &self.fields
    }

    pub fn render_help(&self) -> String {
        self.command.clone().render_help().to_string()
    }

    /// Parse `tokens` (without a program name), returning usage errors and help requests.
    pub fn try_parse_from<I, T>(&self, tokens: I) -> Result<FieldValues, ParcelError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = self.command.clone().try_get_matches_from(tokens)?;
        self.materialize(&matches)
    }

    /// Parse `tokens`, printing help or usage errors and exiting the process on them.
    ///
    /// Exits with status 0 after `--help` and 2 after a usage error.
    pub fn parse_from<I, T>(&self, tokens: I) -> Result<FieldValues, ParcelError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        match self.try_parse_from(tokens) {
            Err(ParcelError::Usage(err)) => err.exit(),
            other => other,
        }
    }

    fn materialize(&self, matches: &ArgMatches) -> Result<FieldValues, ParcelError> {
        let mut values = FieldValues::new();
        for field in &self.fields {
            let supplied = match &field.shape {
                FieldShape::Flag => flag_value(matches, &field.name),
                FieldShape::Scalar(_) | FieldShape::Choice(_) => single_value(matches, field)?,
                FieldShape::Sequence(seq) => sequence_value(matches, field, seq)?,
            };

            let value = match supplied {
                Some(value) => value,
                None => field
                    .default
                    .clone()
                    .ok_or_else(|| ParcelError::MissingValue {
                        field: field.name.clone(),
                    })?,
            };

            tracing::trace!(field = %field.name, value = ?value, "materialized field");
            values.insert(field.name.clone(), value);
        }
        Ok(values)
    }
}

fn on_command_line(matches: &ArgMatches, id: &str) -> bool {
    matches.value_source(id) == Some(ValueSource::CommandLine)
}

fn flag_value(matches: &ArgMatches, name: &str) -> Option<Value> {
    if on_command_line(matches, name) {
        Some(Value::Bool(true))
    } else if on_command_line(matches, &negated_id(name)) {
        Some(Value::Bool(false))
    } else {
        None
    }
}

fn single_value(matches: &ArgMatches, field: &AnalyzedField) -> Result<Option<Value>, ParcelError> {
    if !on_command_line(matches, &field.name) {
        return Ok(None);
    }
    matches
        .try_get_one::<Value>(&field.name)
        .map(|value| value.cloned())
        .map_err(|source| ParcelError::Matches {
            field: field.name.clone(),
            source,
        })
}

fn sequence_value(
    matches: &ArgMatches,
    field: &AnalyzedField,
    seq: &Sequence,
) -> Result<Option<Value>, ParcelError> {
    if !on_command_line(matches, &field.name) {
        return Ok(None);
    }
    let items: Vec<Value> = matches
        .try_get_many::<Value>(&field.name)
        .map_err(|source| ParcelError::Matches {
            field: field.name.clone(),
            source,
        })?
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    Ok(Some(seq.container.wrap(items)))
}

fn value_parser(element: &Element) -> ValueParser {
    let convert = element.clone();
    match element {
        Element::Choice(choices) => PossibleValuesParser::new(choices.tokens())
            .try_map(move |token: String| convert.convert(&token))
            .into(),
        Element::Scalar(_) => StringValueParser::new()
            .try_map(move |token: String| convert.convert(&token))
            .into(),
    }
}

fn value_arg(field: &AnalyzedField, element: &Element) -> Arg {
    let mut arg = Arg::new(field.name.clone())
        .long(field.long.clone())
        .value_name(field.name.to_ascii_uppercase())
        .action(ArgAction::Set)
        .required(field.required)
        .allow_negative_numbers(true)
        .value_parser(value_parser(element));
    if let Some(help) = &field.help {
        arg = arg.help(help.clone());
    }
    arg
}

fn arity(seq: &Sequence) -> ValueRange {
    match seq.max {
        Some(max) => ValueRange::new(seq.min..=max),
        None => ValueRange::new(seq.min..),
    }
}

fn register(command: Command, field: &AnalyzedField) -> Command {
    match &field.shape {
        FieldShape::Flag => {
            let negated = negated_id(&field.name);
            let mut positive = Arg::new(field.name.clone())
                .long(field.long.clone())
                .action(ArgAction::SetTrue)
                .conflicts_with(negated.clone());
            if let Some(help) = &field.help {
                positive = positive.help(help.clone());
            }
            let negative = Arg::new(negated.clone())
                .long(negated_flag(&field.long))
                .action(ArgAction::SetTrue)
                .help(format!("Negate --{}", field.long));

            let command = command.arg(positive).arg(negative);
            if field.required {
                command.group(
                    ArgGroup::new(pair_group_id(&field.name))
                        .args([field.name.clone(), negated])
                        .required(true)
                        .multiple(false),
                )
            } else {
                command
            }
        }
        FieldShape::Scalar(converter) => {
            command.arg(value_arg(field, &Element::Scalar(converter.clone())).num_args(1))
        }
        FieldShape::Choice(choices) => {
            command.arg(value_arg(field, &Element::Choice(choices.clone())).num_args(1))
        }
        FieldShape::Sequence(seq) => {
            command.arg(value_arg(field, &seq.element).num_args(arity(seq)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EnumDecl, FieldDecl, TypeExpr};
    use clap::error::ErrorKind;

    fn moo() -> RecordDecl {
        RecordDecl::new("moo")
            .field(FieldDecl::new("a", TypeExpr::int()))
            .field(FieldDecl::new("b", TypeExpr::float()))
            .field(FieldDecl::new("c", TypeExpr::Bool))
            .field(
                FieldDecl::new("d", TypeExpr::optional(TypeExpr::string()))
                    .default_value(Value::None),
            )
    }

    fn parser(record: &RecordDecl) -> ArgParser {
        ArgParser::new(record, &Registry::default()).unwrap()
    }

    fn usage_error(result: Result<FieldValues, ParcelError>) -> clap::Error {
        match result {
            Err(ParcelError::Usage(err)) => err,
            other => panic!("expected a usage error, got: {other:?}"),
        }
    }

    #[test]
    fn parses_scalars_and_flags() {
        let p = parser(&moo());
        let values = p.try_parse_from(["--a", "2", "--b", "3.2", "--c"]).unwrap();
        assert_eq!(values.get("a"), Some(&Value::Int(2)));
        assert_eq!(values.get("b"), Some(&Value::Float(3.2)));
        assert_eq!(values.get("c"), Some(&Value::Bool(true)));
        assert_eq!(values.get("d"), Some(&Value::None));

        let values = p.try_parse_from(["--a", "2", "--b", "3.2", "--no-c"]).unwrap();
        assert_eq!(values.get("c"), Some(&Value::Bool(false)));
    }

    #[test]
    fn values_keep_declaration_order() {
        let p = parser(&moo());
        let values = p
            .try_parse_from(["--d", "moo", "--c", "--b", "1", "--a", "1"])
            .unwrap();
        let names: Vec<&str> = values.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
        assert_eq!(values.get("d"), Some(&Value::Str("moo".to_string())));
    }

    #[test]
    fn both_flags_of_a_pair_conflict() {
        let p = parser(&moo());
        let err = usage_error(p.try_parse_from(["--a", "2", "--b", "1", "--c", "--no-c"]));
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn required_flag_pair_needs_one_side() {
        let p = parser(&moo());
        let err = usage_error(p.try_parse_from(["--a", "2", "--b", "1"]));
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        assert!(err.to_string().contains("--c"));
    }

    #[test]
    fn negative_numbers_are_values() {
        let p = parser(&moo());
        let values = p.try_parse_from(["--a", "-3", "--b", "-0.5", "--c"]).unwrap();
        assert_eq!(values.get("a"), Some(&Value::Int(-3)));
        assert_eq!(values.get("b"), Some(&Value::Float(-0.5)));
    }

    #[test]
    fn last_occurrence_wins() {
        let p = parser(&moo());
        let values = p
            .try_parse_from(["--a", "1", "--a", "5", "--b", "1", "--c"])
            .unwrap();
        assert_eq!(values.get("a"), Some(&Value::Int(5)));
    }

    #[test]
    fn conversion_failure_is_a_usage_error() {
        let p = parser(&moo());
        let err = usage_error(p.try_parse_from(["--a", "two", "--b", "1", "--c"]));
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
        assert!(err.to_string().contains("invalid int value 'two'"));
    }

    #[test]
    fn help_is_reported_with_status_zero() {
        let p = parser(&moo());
        let result = p.try_parse_from(["--help"]);
        let Err(err) = &result else {
            panic!("expected help");
        };
        assert!(err.is_help());
        let err = usage_error(result);
        assert_eq!(err.exit_code(), 0);
        let text = err.to_string();
        assert!(text.contains("--no-c"));
        assert!(text.contains("Negate --c"));
        assert!(text.contains("--d <D>"));
    }

    #[test]
    fn sequences() {
        let record = RecordDecl::new("seq")
            .field(
                FieldDecl::new("xs", TypeExpr::list(TypeExpr::int()))
                    .default_value(Value::List(Vec::new())),
            )
            .field(
                FieldDecl::new("pair", TypeExpr::optional(TypeExpr::repeat(TypeExpr::int(), 2)))
                    .default_value(Value::None),
            )
            .field(
                FieldDecl::new("floats", TypeExpr::at_least_one(TypeExpr::float()))
                    .default_value(Value::Tuple(vec![Value::Float(1.0)])),
            );
        let p = parser(&record);

        let values = p
            .try_parse_from(["--xs", "1", "2", "3", "--pair", "4", "5", "--floats", "0.5"])
            .unwrap();
        assert_eq!(
            values.get("xs"),
            Some(&Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]))
        );
        assert_eq!(
            values.get("pair"),
            Some(&Value::Tuple(vec![Value::Int(4), Value::Int(5)]))
        );
        assert_eq!(
            values.get("floats"),
            Some(&Value::Tuple(vec![Value::Float(0.5)]))
        );

        // zero-or-more accepts the bare flag
        let values = p.try_parse_from(["--xs"]).unwrap();
        assert_eq!(values.get("xs"), Some(&Value::List(Vec::new())));
        assert_eq!(values.get("pair"), Some(&Value::None));

        assert!(p.try_parse_from(["--pair", "4"]).is_err());
        assert!(p.try_parse_from(["--pair", "4", "5", "6"]).is_err());
        let err = usage_error(p.try_parse_from(["--floats"]));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn choices_are_enforced() {
        let record = RecordDecl::new("choices")
            .field(FieldDecl::new("choice", TypeExpr::literal([1i128, 2, 3])))
            .field(
                FieldDecl::new(
                    "bird",
                    TypeExpr::enumeration(EnumDecl::new("Bird", ["puffin", "lark"])),
                )
                .default_value(Value::Member("puffin".to_string())),
            );
        let p = parser(&record);

        let values = p.try_parse_from(["--choice", "3", "--bird", "lark"]).unwrap();
        assert_eq!(values.get("choice"), Some(&Value::Int(3)));
        assert_eq!(values.get("bird"), Some(&Value::Member("lark".to_string())));

        let err = usage_error(p.try_parse_from(["--choice", "9"]));
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
        assert_eq!(err.exit_code(), 2);

        assert!(p.render_help().contains("puffin"));
    }

    #[test]
    fn declaration_errors_stop_the_build() {
        let duplicate = RecordDecl::new("dup")
            .field(FieldDecl::new("a", TypeExpr::int()))
            .field(FieldDecl::new("a", TypeExpr::float()));
        assert!(matches!(
            ArgParser::new(&duplicate, &Registry::default()),
            Err(DeclarationError::DuplicateField { .. })
        ));

        let shadowed = RecordDecl::new("shadow")
            .field(FieldDecl::new("c", TypeExpr::Bool))
            .field(FieldDecl::new("no_c", TypeExpr::int()));
        assert_eq!(
            ArgParser::new(&shadowed, &Registry::default()).unwrap_err(),
            DeclarationError::FlagCollision {
                field: "no_c".to_string(),
                flag: "no-c".to_string()
            }
        );

        let help = RecordDecl::new("help").field(FieldDecl::new("help", TypeExpr::string()));
        assert!(matches!(
            ArgParser::new(&help, &Registry::default()),
            Err(DeclarationError::FlagCollision { .. })
        ));
    }

    #[test]
    fn help_text_is_attached() {
        let record = RecordDecl::new("helpful")
            .about("Does helpful things.")
            .field(FieldDecl::new("path", TypeExpr::path()).help("specify a path"));
        let text = parser(&record).render_help();
        assert!(text.contains("Does helpful things."));
        assert!(text.contains("specify a path"));
    }
}
