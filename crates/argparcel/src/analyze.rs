//! Field analysis: from a declared type to the shape of its command-line argument.
//!
//! Resolution order for a field's type:
//! 1. named references are looked up in the [`Registry`];
//! 2. `T | none` unwraps to `T` and marks the field nullable;
//! 3. `bool` becomes a `--x`/`--no-x` flag pair;
//! 4. literals and enums become a choice set;
//! 5. lists and homogeneous tuples become an arity-bounded sequence of scalars or choices;
//! 6. anything else must be a scalar with a registered converter.
//!
//! Whether a field is required depends only on the presence of a default.

use crate::error::{ConversionError, DeclarationError};
use crate::registry::{Converter, Registry};
use crate::schema::{EnumDecl, FieldDecl, Literal, TypeExpr};
use crate::value::Value;

/// Bound on chains of named references, so that cyclic definitions fail instead of looping.
const MAX_REFERENCE_DEPTH: usize = 32;

/// The permissible tokens of a choice field and the value each one selects.
#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceSet {
    options: Vec<(String, Value)>,
}

impl ChoiceSet {
    fn from_literals(choices: &[Literal]) -> Self {
        Self {
            options: choices.iter().map(|c| (c.token(), c.to_value())).collect(),
        }
    }

    fn from_enum(decl: &EnumDecl) -> Self {
        Self {
            options: decl
                .members
                .iter()
                .map(|m| (m.clone(), Value::Member(m.clone())))
                .collect(),
        }
    }

    /// Tokens in declaration order.
    pub fn tokens(&self) -> Vec<String> {
        self.options.iter().map(|(token, _)| token.clone()).collect()
    }

    pub fn convert(&self, token: &str) -> Result<Value, ConversionError> {
        self.options
            .iter()
            .find(|(candidate, _)| candidate == token)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| ConversionError::UnknownChoice {
                token: token.to_string(),
                choices: self.tokens(),
            })
    }
}

/// What a single token converts into.
#[derive(Debug, Clone)]
pub enum Element {
    Scalar(Converter),
    Choice(ChoiceSet),
}

impl Element {
    pub fn convert(&self, token: &str) -> Result<Value, ConversionError> {
        match self {
            Self::Scalar(converter) => converter.convert(token),
            Self::Choice(choices) => choices.convert(token),
        }
    }

    pub fn choices(&self) -> Option<&ChoiceSet> {
        match self {
            Self::Choice(choices) => Some(choices),
            Self::Scalar(_) => None,
        }
    }
}

/// How a sequence's values are packaged for the constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    List,
    Tuple,
}

impl Container {
    pub fn wrap(self, items: Vec<Value>) -> Value {
        match self {
            Self::List => Value::List(items),
            Self::Tuple => Value::Tuple(items),
        }
    }
}

/// A multi-token argument.
#[derive(Debug, Clone)]
pub struct Sequence {
    pub element: Element,
    pub min: usize,
    /// `None` means unbounded.
    pub max: Option<usize>,
    pub container: Container,
}

/// The parser-relevant classification of a field.
#[derive(Debug, Clone)]
pub enum FieldShape {
    Scalar(Converter),
    /// `--x` / `--no-x`.
    Flag,
    Choice(ChoiceSet),
    Sequence(Sequence),
}

impl FieldShape {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "scalar",
            Self::Flag => "flag",
            Self::Choice(_) => "choice",
            Self::Sequence(_) => "sequence",
        }
    }
}

/// A field ready to be registered with the token parser.
#[derive(Debug, Clone)]
pub struct AnalyzedField {
    pub name: String,
    /// Long flag without the leading dashes.
    pub long: String,
    pub shape: FieldShape,
    pub required: bool,
    pub nullable: bool,
    pub help: Option<String>,
    pub default: Option<Value>,
}

impl AnalyzedField {
    /// Every long flag this field occupies.
    pub fn flags(&self) -> Vec<String> {
        match self.shape {
            FieldShape::Flag => vec![self.long.clone(), negated_flag(&self.long)],
            _ => vec![self.long.clone()],
        }
    }
}

pub(crate) fn negated_flag(long: &str) -> String {
    format!("no-{long}")
}

/// Check that a field name can become a flag: `_` renders as `-`.
pub fn flag_name(field: &str) -> Result<String, DeclarationError> {
    if field.is_empty() {
        return Err(DeclarationError::EmptyName);
    }
    if field.starts_with('_') {
        return Err(DeclarationError::LeadingUnderscore {
            field: field.to_string(),
        });
    }
    if !field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(DeclarationError::InvalidName {
            field: field.to_string(),
        });
    }
    Ok(field.replace('_', "-"))
}

/// Analyze one field declaration.
pub fn analyze_field(
    field: &FieldDecl,
    registry: &Registry,
) -> Result<AnalyzedField, DeclarationError> {
    let long = flag_name(&field.name)?;
    let cx = Context {
        field: &field.name,
        registry,
    };

    let (nullable, base) = cx.unwrap_optional(&field.ty)?;
    let shape = cx.shape(base)?;
    let required = field.is_required();

    tracing::debug!(
        field = %field.name,
        ty = %field.ty,
        shape = shape.kind(),
        required,
        nullable,
        "analyzed field"
    );

    Ok(AnalyzedField {
        name: field.name.clone(),
        long,
        shape,
        required,
        nullable,
        help: field.help.clone(),
        default: field.default.clone(),
    })
}

struct Context<'a> {
    field: &'a str,
    registry: &'a Registry,
}

impl<'a> Context<'a> {
    fn resolve(&self, ty: &'a TypeExpr) -> Result<&'a TypeExpr, DeclarationError> {
        let mut current = ty;
        for _ in 0..MAX_REFERENCE_DEPTH {
            let TypeExpr::Named(reference) = current else {
                return Ok(current);
            };
            current = self.registry.lookup_type(reference).ok_or_else(|| {
                DeclarationError::Unresolved {
                    field: self.field.to_string(),
                    reference: reference.clone(),
                }
            })?;
        }
        Err(DeclarationError::Unresolved {
            field: self.field.to_string(),
            reference: ty.to_string(),
        })
    }

    fn unwrap_optional(
        &self,
        ty: &'a TypeExpr,
    ) -> Result<(bool, &'a TypeExpr), DeclarationError> {
        let resolved = self.resolve(ty)?;
        let TypeExpr::Union(members) = resolved else {
            return Ok((false, resolved));
        };

        let mut nullable = false;
        let mut non_none = Vec::new();
        for member in members {
            match self.resolve(member)? {
                TypeExpr::None => nullable = true,
                other => non_none.push(other),
            }
        }

        match non_none.as_slice() {
            [single] if members.len() <= 2 => Ok((nullable, *single)),
            _ => Err(DeclarationError::UnsupportedUnion {
                field: self.field.to_string(),
                ty: resolved.to_string(),
            }),
        }
    }

    fn shape(&self, ty: &'a TypeExpr) -> Result<FieldShape, DeclarationError> {
        match ty {
            TypeExpr::Bool => Ok(FieldShape::Flag),
            TypeExpr::Literal(_)
            | TypeExpr::Restricted { .. }
            | TypeExpr::Enum(_)
            | TypeExpr::Scalar(_) => {
                Ok(match self.element(ty)? {
                    Element::Scalar(converter) => FieldShape::Scalar(converter),
                    Element::Choice(choices) => FieldShape::Choice(choices),
                })
            }
            TypeExpr::List(element) => Ok(FieldShape::Sequence(Sequence {
                element: self.element(element)?,
                min: 0,
                max: None,
                container: Container::List,
            })),
            TypeExpr::Tuple(items) => {
                let Some((first, rest)) = items.split_first() else {
                    return Err(DeclarationError::EmptyTuple {
                        field: self.field.to_string(),
                    });
                };
                self.ensure_homogeneous(ty, first, rest)?;
                Ok(FieldShape::Sequence(Sequence {
                    element: self.element(first)?,
                    min: items.len(),
                    max: Some(items.len()),
                    container: Container::Tuple,
                }))
            }
            TypeExpr::Variadic(element) => Ok(FieldShape::Sequence(Sequence {
                element: self.element(element)?,
                min: 0,
                max: None,
                container: Container::Tuple,
            })),
            TypeExpr::Unpacked { head, tail } => {
                let [leading] = head.as_slice() else {
                    return Err(DeclarationError::UnsupportedUnpack {
                        field: self.field.to_string(),
                        ty: ty.to_string(),
                    });
                };
                self.ensure_homogeneous(ty, leading, std::slice::from_ref(&**tail))?;
                Ok(FieldShape::Sequence(Sequence {
                    element: self.element(leading)?,
                    min: 1,
                    max: None,
                    container: Container::Tuple,
                }))
            }
            TypeExpr::None | TypeExpr::Union(_) => Err(DeclarationError::UnsupportedUnion {
                field: self.field.to_string(),
                ty: ty.to_string(),
            }),
            TypeExpr::Named(_) => self.shape(self.resolve(ty)?),
        }
    }

    fn ensure_homogeneous(
        &self,
        whole: &TypeExpr,
        first: &'a TypeExpr,
        rest: &'a [TypeExpr],
    ) -> Result<(), DeclarationError> {
        let first = self.resolve(first)?;
        for other in rest {
            if self.resolve(other)? != first {
                return Err(DeclarationError::MixedTuple {
                    field: self.field.to_string(),
                    ty: whole.to_string(),
                });
            }
        }
        Ok(())
    }

    /// The single-token element of a scalar, choice or sequence field.
    fn element(&self, ty: &'a TypeExpr) -> Result<Element, DeclarationError> {
        match self.resolve(ty)? {
            TypeExpr::Scalar(id) => self
                .registry
                .converter(id)
                .cloned()
                .map(Element::Scalar)
                .ok_or_else(|| DeclarationError::MissingConverter {
                    field: self.field.to_string(),
                    scalar: id.clone(),
                }),
            literal @ TypeExpr::Literal(choices) => self.literal_choices(literal, choices),
            restricted @ TypeExpr::Restricted { scalar, choices } => {
                let choice_set = self.literal_choices(restricted, choices)?;
                let converter = self.registry.converter(scalar).ok_or_else(|| {
                    DeclarationError::MissingConverter {
                        field: self.field.to_string(),
                        scalar: scalar.clone(),
                    }
                })?;
                for choice in choices {
                    let fits = converter
                        .convert(&choice.token())
                        .is_ok_and(|value| value == choice.to_value());
                    if !fits {
                        return Err(DeclarationError::IncompatibleChoice {
                            field: self.field.to_string(),
                            scalar: scalar.clone(),
                            choice: choice.to_string(),
                        });
                    }
                }
                Ok(choice_set)
            }
            enumeration @ TypeExpr::Enum(decl) => {
                if decl.members.is_empty() {
                    return Err(DeclarationError::EmptyChoices {
                        field: self.field.to_string(),
                        ty: enumeration.to_string(),
                    });
                }
                Ok(Element::Choice(ChoiceSet::from_enum(decl)))
            }
            other => Err(DeclarationError::UnsupportedNesting {
                field: self.field.to_string(),
                ty: other.to_string(),
            }),
        }
    }

    fn literal_choices(
        &self,
        ty: &TypeExpr,
        choices: &[Literal],
    ) -> Result<Element, DeclarationError> {
        if choices.is_empty() {
            return Err(DeclarationError::EmptyChoices {
                field: self.field.to_string(),
                ty: ty.to_string(),
            });
        }
        if !TypeExpr::literal_kinds_agree(choices) {
            return Err(DeclarationError::MixedLiterals {
                field: self.field.to_string(),
                ty: ty.to_string(),
            });
        }
        Ok(Element::Choice(ChoiceSet::from_literals(choices)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze(ty: TypeExpr) -> Result<AnalyzedField, DeclarationError> {
        analyze_field(&FieldDecl::new("field", ty), &Registry::default())
    }

    fn sequence(field: &AnalyzedField) -> &Sequence {
        match &field.shape {
            FieldShape::Sequence(seq) => seq,
            other => panic!("expected Sequence, got: {other:?}"),
        }
    }

    #[test]
    fn optional_scalar_is_nullable_but_still_required() {
        let field = analyze(TypeExpr::optional(TypeExpr::string())).unwrap();
        assert!(field.nullable);
        assert!(field.required);
        assert!(matches!(field.shape, FieldShape::Scalar(_)));
    }

    #[test]
    fn default_makes_field_optional() {
        let decl = FieldDecl::new("c", TypeExpr::Bool).default_value(Value::Bool(true));
        let field = analyze_field(&decl, &Registry::default()).unwrap();
        assert!(!field.required);
        assert!(matches!(field.shape, FieldShape::Flag));
        assert_eq!(field.flags(), vec!["c".to_string(), "no-c".to_string()]);
    }

    #[test]
    fn literal_choices_convert_by_string_form() {
        let field = analyze(TypeExpr::literal([1i128, 2, 3])).unwrap();
        let FieldShape::Choice(choices) = &field.shape else {
            panic!("expected Choice");
        };
        assert_eq!(choices.tokens(), vec!["1", "2", "3"]);
        assert_eq!(choices.convert("2").unwrap(), Value::Int(2));
        assert!(matches!(
            choices.convert("9"),
            Err(ConversionError::UnknownChoice { .. })
        ));
    }

    #[test]
    fn enum_choices_use_member_names() {
        let ty = TypeExpr::enumeration(EnumDecl::new("Bird", ["puffin", "lark"]));
        let field = analyze(TypeExpr::optional(ty)).unwrap();
        let FieldShape::Choice(choices) = &field.shape else {
            panic!("expected Choice");
        };
        assert_eq!(
            choices.convert("lark").unwrap(),
            Value::Member("lark".to_string())
        );
        let err = choices.convert("owl").unwrap_err();
        assert_eq!(err.to_string(), "invalid choice 'owl' (choose from puffin, lark)");
    }

    #[test]
    fn sequence_arities() {
        let list = analyze(TypeExpr::list(TypeExpr::int())).unwrap();
        let seq = sequence(&list);
        assert_eq!((seq.min, seq.max, seq.container), (0, None, Container::List));

        let pair = analyze(TypeExpr::optional(TypeExpr::repeat(TypeExpr::int(), 2))).unwrap();
        let seq = sequence(&pair);
        assert_eq!((seq.min, seq.max, seq.container), (2, Some(2), Container::Tuple));

        let variadic = analyze(TypeExpr::variadic(TypeExpr::float())).unwrap();
        assert_eq!((sequence(&variadic).min, sequence(&variadic).max), (0, None));

        let one_or_more = analyze(TypeExpr::at_least_one(TypeExpr::float())).unwrap();
        assert_eq!(
            (sequence(&one_or_more).min, sequence(&one_or_more).max),
            (1, None)
        );
    }

    #[test]
    fn sequence_of_choices() {
        let field = analyze(TypeExpr::list(TypeExpr::literal(["a", "b"]))).unwrap();
        let seq = sequence(&field);
        assert_eq!(seq.element.choices().unwrap().tokens(), vec!["a", "b"]);
    }

    #[test]
    fn rejects_unsupported_unions() {
        let two_types = TypeExpr::Union(vec![TypeExpr::int(), TypeExpr::string()]);
        assert!(matches!(
            analyze(two_types),
            Err(DeclarationError::UnsupportedUnion { .. })
        ));

        let three = TypeExpr::Union(vec![TypeExpr::int(), TypeExpr::None, TypeExpr::None]);
        assert!(matches!(
            analyze(three),
            Err(DeclarationError::UnsupportedUnion { .. })
        ));

        assert!(matches!(
            analyze(TypeExpr::None),
            Err(DeclarationError::UnsupportedUnion { .. })
        ));
    }

    #[test]
    fn rejects_mixed_and_empty_tuples() {
        let mixed = TypeExpr::tuple(vec![TypeExpr::int(), TypeExpr::string()]);
        let err = analyze(mixed).unwrap_err();
        assert_eq!(
            err.to_string(),
            "only homogeneous tuples are supported for field 'field'; got tuple[int, str]"
        );

        assert!(matches!(
            analyze(TypeExpr::tuple(Vec::new())),
            Err(DeclarationError::EmptyTuple { .. })
        ));

        let mismatched_tail = TypeExpr::Unpacked {
            head: vec![TypeExpr::int()],
            tail: Box::new(TypeExpr::float()),
        };
        assert!(matches!(
            analyze(mismatched_tail),
            Err(DeclarationError::MixedTuple { .. })
        ));

        let two_heads = TypeExpr::Unpacked {
            head: vec![TypeExpr::int(), TypeExpr::int()],
            tail: Box::new(TypeExpr::int()),
        };
        assert!(matches!(
            analyze(two_heads),
            Err(DeclarationError::UnsupportedUnpack { .. })
        ));
    }

    #[test]
    fn rejects_deep_nesting() {
        let nested = TypeExpr::list(TypeExpr::list(TypeExpr::int()));
        assert!(matches!(
            analyze(nested),
            Err(DeclarationError::UnsupportedNesting { .. })
        ));

        let optional_elements = TypeExpr::list(TypeExpr::optional(TypeExpr::int()));
        assert!(matches!(
            analyze(optional_elements),
            Err(DeclarationError::UnsupportedNesting { .. })
        ));
    }

    #[test]
    fn rejects_bad_choice_sets() {
        assert!(matches!(
            analyze(TypeExpr::literal([Literal::Int(42), Literal::from("42")])),
            Err(DeclarationError::MixedLiterals { .. })
        ));
        assert!(matches!(
            analyze(TypeExpr::Literal(Vec::new())),
            Err(DeclarationError::EmptyChoices { .. })
        ));
        let empty_enum = TypeExpr::enumeration(EnumDecl::new("Nothing", Vec::<String>::new()));
        assert!(matches!(
            analyze(empty_enum),
            Err(DeclarationError::EmptyChoices { .. })
        ));
    }

    #[test]
    fn restricted_choices_must_fit_their_scalar() {
        let small = TypeExpr::scalar("u8").restrict_to(vec![Literal::Int(1), Literal::Int(2)]);
        let ok = analyze(small).unwrap();
        assert!(matches!(ok.shape, FieldShape::Choice(_)));
        let ok = analyze(TypeExpr::string().restrict_to(vec![Literal::from("a")])).unwrap();
        assert!(matches!(ok.shape, FieldShape::Choice(_)));

        let rejected = [
            (TypeExpr::float(), Literal::Int(1)),
            (TypeExpr::path(), Literal::from("a")),
            (TypeExpr::string(), Literal::Int(1)),
            (TypeExpr::int(), Literal::from("1")),
            (TypeExpr::scalar("u8"), Literal::Int(300)),
        ];
        for (ty, choice) in rejected {
            let scalar = ty.to_string();
            let err = analyze(ty.restrict_to(vec![choice])).unwrap_err();
            assert!(
                matches!(
                    &err,
                    DeclarationError::IncompatibleChoice { scalar: s, .. } if *s == scalar
                ),
                "{scalar}: {err:?}"
            );
        }

        let err = analyze(TypeExpr::float().restrict_to(vec![Literal::Int(1)])).unwrap_err();
        assert_eq!(err.to_string(), "choice 1 is not a valid float value (field 'field')");
    }

    #[test]
    fn resolves_named_references() {
        let registry = Registry::default()
            .with_type("Count", TypeExpr::int())
            .with_type("MaybeCount", TypeExpr::optional(TypeExpr::named("Count")));
        let decl = FieldDecl::new("n", TypeExpr::named("MaybeCount"));
        let field = analyze_field(&decl, &registry).unwrap();
        assert!(field.nullable);
        assert!(matches!(field.shape, FieldShape::Scalar(_)));

        let missing = FieldDecl::new("n", TypeExpr::named("Later"));
        assert_eq!(
            analyze_field(&missing, &registry).unwrap_err(),
            DeclarationError::Unresolved {
                field: "n".to_string(),
                reference: "Later".to_string()
            }
        );

        let cyclic = Registry::default().with_type("Loop", TypeExpr::named("Loop"));
        assert!(matches!(
            analyze_field(&FieldDecl::new("n", TypeExpr::named("Loop")), &cyclic),
            Err(DeclarationError::Unresolved { .. })
        ));
    }

    #[test]
    fn missing_converter_is_a_declaration_error() {
        let err = analyze(TypeExpr::scalar("ipv4")).unwrap_err();
        assert_eq!(
            err,
            DeclarationError::MissingConverter {
                field: "field".to_string(),
                scalar: "ipv4".to_string()
            }
        );
    }

    #[test]
    fn flag_names() {
        assert_eq!(flag_name("optional_choice").unwrap(), "optional-choice");
        assert_eq!(
            flag_name("_a").unwrap_err().to_string(),
            "field names must not start with an underscore; got '_a'"
        );
        assert_eq!(
            flag_name("__a").unwrap_err().to_string(),
            "field names must not start with an underscore; got '__a'"
        );
        assert!(matches!(
            flag_name("a-b"),
            Err(DeclarationError::InvalidName { .. })
        ));
    }
}
