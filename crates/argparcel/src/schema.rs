//! Record declarations: the explicit schema a parser is built from.
//!
//! A [`RecordDecl`] is an ordered list of [`FieldDecl`]s. Each field carries a
//! [`TypeExpr`] describing its declared type, an optional default and optional
//! help text. `#[derive(Record)]` produces these at compile time; they can also
//! be assembled by hand with the builder methods below.

use std::fmt;

use crate::value::Value;

/// Built-in scalar ids understood by the default [`Registry`](crate::Registry).
pub mod scalar {
    pub const INT: &str = "int";
    pub const FLOAT: &str = "float";
    pub const STR: &str = "str";
    pub const PATH: &str = "path";
}

/// A single literal choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Int(i128),
    Str(String),
}

impl Literal {
    /// The token that selects this literal on the command line.
    pub fn token(&self) -> String {
        match self {
            Self::Int(i) => i.to_string(),
            Self::Str(s) => s.clone(),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Int(i) => Value::Int(*i),
            Self::Str(s) => Value::Str(s.clone()),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Str(_) => "str",
        }
    }
}

impl From<i128> for Literal {
    fn from(v: i128) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for Literal {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Literal {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Str(s) => write!(f, "{s:?}"),
        }
    }
}

/// An enumeration: a name plus the ordered names of its members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDecl {
    pub name: String,
    pub members: Vec<String>,
}

impl EnumDecl {
    pub fn new<I, S>(name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            members: members.into_iter().map(Into::into).collect(),
        }
    }
}

/// The declared type of a field.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    /// The unit "nothing" type; only meaningful as a union member.
    None,
    Bool,
    /// A scalar converted from one token by the registry converter with this id.
    Scalar(String),
    Literal(Vec<Literal>),
    /// A scalar narrowed to a fixed set of literals; the literals must be values of that scalar.
    Restricted {
        scalar: String,
        choices: Vec<Literal>,
    },
    Enum(EnumDecl),
    /// A reference to a type defined in the registry.
    Named(String),
    Union(Vec<TypeExpr>),
    List(Box<TypeExpr>),
    /// Fixed-arity tuple.
    Tuple(Vec<TypeExpr>),
    /// `tuple[E, ...]`: any number of `E`.
    Variadic(Box<TypeExpr>),
    /// `tuple[E, *tuple[E, ...]]`: fixed leading elements followed by a variadic tail.
    Unpacked {
        head: Vec<TypeExpr>,
        tail: Box<TypeExpr>,
    },
}

impl TypeExpr {
    pub fn scalar(id: impl Into<String>) -> Self {
        Self::Scalar(id.into())
    }

    pub fn int() -> Self {
        Self::scalar(scalar::INT)
    }

    pub fn float() -> Self {
        Self::scalar(scalar::FLOAT)
    }

    pub fn string() -> Self {
        Self::scalar(scalar::STR)
    }

    pub fn path() -> Self {
        Self::scalar(scalar::PATH)
    }

    pub fn named(reference: impl Into<String>) -> Self {
        Self::Named(reference.into())
    }

    /// `T | None`.
    pub fn optional(inner: TypeExpr) -> Self {
        Self::Union(vec![inner, Self::None])
    }

    pub fn literal<I, L>(choices: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<Literal>,
    {
        Self::Literal(choices.into_iter().map(Into::into).collect())
    }

    pub fn enumeration(decl: EnumDecl) -> Self {
        Self::Enum(decl)
    }

    pub fn list(element: TypeExpr) -> Self {
        Self::List(Box::new(element))
    }

    pub fn tuple(elements: Vec<TypeExpr>) -> Self {
        Self::Tuple(elements)
    }

    /// A homogeneous tuple of exactly `arity` elements.
    pub fn repeat(element: TypeExpr, arity: usize) -> Self {
        Self::Tuple(vec![element; arity])
    }

    pub fn variadic(element: TypeExpr) -> Self {
        Self::Variadic(Box::new(element))
    }

    /// One `element` followed by any number of further `element`s.
    pub fn at_least_one(element: TypeExpr) -> Self {
        Self::Unpacked {
            head: vec![element.clone()],
            tail: Box::new(element),
        }
    }

    /// Narrow every scalar leaf to a literal choice set.
    ///
    /// Container and union structure is kept, so `list[int] | None` restricted
    /// to `[1, 2]` becomes `list[literal[1, 2] as int] | None`.
    pub fn restrict_to(self, choices: Vec<Literal>) -> Self {
        match self {
            Self::Scalar(scalar) | Self::Restricted { scalar, .. } => {
                Self::Restricted { scalar, choices }
            }
            Self::Union(members) => Self::Union(
                members
                    .into_iter()
                    .map(|m| m.restrict_to(choices.clone()))
                    .collect(),
            ),
            Self::List(e) => Self::List(Box::new(e.restrict_to(choices))),
            Self::Tuple(items) => Self::Tuple(
                items
                    .into_iter()
                    .map(|m| m.restrict_to(choices.clone()))
                    .collect(),
            ),
            Self::Variadic(e) => Self::Variadic(Box::new(e.restrict_to(choices))),
            Self::Unpacked { head, tail } => Self::Unpacked {
                head: head
                    .into_iter()
                    .map(|m| m.restrict_to(choices.clone()))
                    .collect(),
                tail: Box::new(tail.restrict_to(choices)),
            },
            other => other,
        }
    }

    /// Whether all literals share one primitive kind.
    pub(crate) fn literal_kinds_agree(choices: &[Literal]) -> bool {
        choices
            .first()
            .is_none_or(|first| choices.iter().all(|c| c.kind() == first.kind()))
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Bool => f.write_str("bool"),
            Self::Scalar(id) => f.write_str(id),
            Self::Literal(choices) => {
                f.write_str("literal[")?;
                write_joined(f, choices)?;
                f.write_str("]")
            }
            Self::Restricted { scalar, choices } => {
                f.write_str("literal[")?;
                write_joined(f, choices)?;
                write!(f, "] as {scalar}")
            }
            Self::Enum(decl) => write!(f, "enum {}", decl.name),
            Self::Named(reference) => write!(f, "'{reference}'"),
            Self::Union(members) => {
                for (idx, m) in members.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(" | ")?;
                    }
                    write!(f, "{m}")?;
                }
                Ok(())
            }
            Self::List(e) => write!(f, "list[{e}]"),
            Self::Tuple(items) => {
                f.write_str("tuple[")?;
                write_joined(f, items)?;
                f.write_str("]")
            }
            Self::Variadic(e) => write!(f, "tuple[{e}, ...]"),
            Self::Unpacked { head, tail } => {
                f.write_str("tuple[")?;
                write_joined(f, head)?;
                write!(f, ", *tuple[{tail}, ...]]")
            }
        }
    }
}

fn write_joined<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (idx, item) in items.iter().enumerate() {
        if idx > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

/// One named, typed field of a record.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeExpr,
    pub default: Option<Value>,
    pub help: Option<String>,
}

impl FieldDecl {
    pub fn new(name: impl Into<String>, ty: TypeExpr) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
            help: None,
        }
    }

    /// Give the field a default, which also makes it optional on the command line.
    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// An ordered collection of fields plus the name used in usage output.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordDecl {
    name: String,
    about: Option<String>,
    fields: Vec<FieldDecl>,
}

impl RecordDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn about(mut self, about: impl Into<String>) -> Self {
        self.about = Some(about.into());
        self
    }

    pub fn field(mut self, field: FieldDecl) -> Self {
        self.fields.push(field);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.about.as_deref()
    }

    pub fn fields(&self) -> &[FieldDecl] {
        &self.fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_reads_like_the_declaration() {
        let ty = TypeExpr::optional(TypeExpr::repeat(TypeExpr::int(), 2));
        assert_eq!(ty.to_string(), "tuple[int, int] | none");

        let ty = TypeExpr::at_least_one(TypeExpr::float());
        assert_eq!(ty.to_string(), "tuple[float, *tuple[float, ...]]");

        let ty = TypeExpr::literal(["foo", "bar"]);
        assert_eq!(ty.to_string(), "literal[\"foo\", \"bar\"]");
    }

    #[test]
    fn restrict_to_keeps_structure() {
        let ty = TypeExpr::optional(TypeExpr::list(TypeExpr::int()));
        let restricted = ty.restrict_to(vec![Literal::Int(1), Literal::Int(2)]);
        assert_eq!(
            restricted,
            TypeExpr::optional(TypeExpr::list(TypeExpr::Restricted {
                scalar: "int".to_string(),
                choices: vec![Literal::Int(1), Literal::Int(2)],
            }))
        );
        assert_eq!(restricted.to_string(), "list[literal[1, 2] as int] | none");
    }

    #[test]
    fn required_iff_no_default() {
        let field = FieldDecl::new("d", TypeExpr::optional(TypeExpr::string()));
        assert!(field.is_required());
        assert!(!field.default_value(Value::None).is_required());
    }

    #[test]
    fn literal_kind_check() {
        assert!(TypeExpr::literal_kinds_agree(&[Literal::Int(1), Literal::Int(2)]));
        assert!(!TypeExpr::literal_kinds_agree(&[
            Literal::Int(42),
            Literal::from("42")
        ]));
        assert!(TypeExpr::literal_kinds_agree(&[]));
    }
}
