//! Dynamic values and their mapping to Rust field types.

use std::any::Any;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{ConstructError, ValueError};
use crate::schema::{TypeExpr, scalar};

/// A field value on its way from the command line to a record constructor.
#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i128),
    Float(f64),
    Str(String),
    Path(PathBuf),
    /// An enumeration member, by declared name.
    Member(String),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    /// A caller-defined scalar produced by a registered converter.
    Custom(Arc<dyn Any + Send + Sync>),
}

impl Value {
    pub fn custom<T: Any + Send + Sync>(value: T) -> Self {
        Self::Custom(Arc::new(value))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::Path(_) => "path",
            Self::Member(_) => "enum member",
            Self::List(_) => "list",
            Self::Tuple(_) => "tuple",
            Self::Custom(_) => "custom value",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Command-line tokens that would reproduce this value.
    ///
    /// Sequences yield one token per element; `None` yields nothing.
    pub fn tokens(&self) -> Vec<String> {
        match self {
            Self::None => Vec::new(),
            Self::List(items) | Self::Tuple(items) => {
                items.iter().map(ToString::to_string).collect()
            }
            other => vec![other.to_string()],
        }
    }

    fn mismatch(&self, expected: &'static str) -> ValueError {
        ValueError::Mismatch {
            expected,
            found: self.kind().to_string(),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Int(i) => f.debug_tuple("Int").field(i).finish(),
            Self::Float(x) => f.debug_tuple("Float").field(x).finish(),
            Self::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Self::Path(p) => f.debug_tuple("Path").field(p).finish(),
            Self::Member(m) => f.debug_tuple("Member").field(m).finish(),
            Self::List(items) => f.debug_tuple("List").field(items).finish(),
            Self::Tuple(items) => f.debug_tuple("Tuple").field(items).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => f.write_str(s),
            Self::Path(p) => write!(f, "{}", p.display()),
            Self::Member(m) => f.write_str(m),
            Self::List(items) | Self::Tuple(items) => {
                let tokens: Vec<String> = items.iter().map(ToString::to_string).collect();
                f.write_str(&tokens.join(" "))
            }
            Self::Custom(_) => f.write_str("<custom>"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Path(a), Self::Path(b)) => a == b,
            (Self::Member(a), Self::Member(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Tuple(a), Self::Tuple(b)) => a == b,
            (Self::Custom(a), Self::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Resolved field values, in declaration order.
///
/// Handed to [`Record::construct`](crate::Record::construct).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldValues {
    values: IndexMap<String, Value>,
}

impl FieldValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Remove a field's value and convert it into `T`.
    pub fn take<T: FieldType>(&mut self, name: &str) -> Result<T, ConstructError> {
        let value = self
            .values
            .shift_remove(name)
            .ok_or_else(|| ConstructError::MissingField {
                field: name.to_string(),
            })?;
        T::from_value(value).map_err(|source| ConstructError::Field {
            field: name.to_string(),
            source,
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl IntoIterator for FieldValues {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

/// A Rust type usable as a record field.
///
/// `type_expr` declares how the field is presented on the command line,
/// `from_value`/`into_value` move between the dynamic [`Value`] and `Self`.
pub trait FieldType: Sized {
    fn type_expr() -> TypeExpr;
    fn from_value(value: Value) -> Result<Self, ValueError>;
    fn into_value(self) -> Value;
}

macro_rules! int_field {
    ($($ty:ty => $id:literal),* $(,)?) => {$(
        impl FieldType for $ty {
            fn type_expr() -> TypeExpr {
                TypeExpr::scalar($id)
            }

            fn from_value(value: Value) -> Result<Self, ValueError> {
                match value {
                    Value::Int(i) => <$ty>::try_from(i).map_err(|_| ValueError::OutOfRange {
                        value: i.to_string(),
                        target: stringify!($ty),
                    }),
                    other => Err(other.mismatch("int")),
                }
            }

            fn into_value(self) -> Value {
                Value::Int(i128::from(self))
            }
        }
    )*};
}

int_field! {
    i8 => "i8",
    i16 => "i16",
    i32 => "i32",
    i64 => "int",
    u8 => "u8",
    u16 => "u16",
    u32 => "u32",
    u64 => "u64",
}

impl FieldType for isize {
    fn type_expr() -> TypeExpr {
        TypeExpr::scalar("isize")
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Int(i) => isize::try_from(i).map_err(|_| ValueError::OutOfRange {
                value: i.to_string(),
                target: "isize",
            }),
            other => Err(other.mismatch("int")),
        }
    }

    fn into_value(self) -> Value {
        // isize is at most 64 bits wide on every supported target.
        Value::Int(self as i128)
    }
}

impl FieldType for usize {
    fn type_expr() -> TypeExpr {
        TypeExpr::scalar("usize")
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Int(i) => usize::try_from(i).map_err(|_| ValueError::OutOfRange {
                value: i.to_string(),
                target: "usize",
            }),
            other => Err(other.mismatch("int")),
        }
    }

    fn into_value(self) -> Value {
        Value::Int(self as i128)
    }
}

impl FieldType for f64 {
    fn type_expr() -> TypeExpr {
        TypeExpr::float()
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Float(x) => Ok(x),
            other => Err(other.mismatch("float")),
        }
    }

    fn into_value(self) -> Value {
        Value::Float(self)
    }
}

impl FieldType for f32 {
    fn type_expr() -> TypeExpr {
        TypeExpr::scalar("f32")
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Float(x) => Ok(x as f32),
            other => Err(other.mismatch("float")),
        }
    }

    fn into_value(self) -> Value {
        Value::Float(f64::from(self))
    }
}

impl FieldType for String {
    fn type_expr() -> TypeExpr {
        TypeExpr::scalar(scalar::STR)
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Str(s) => Ok(s),
            other => Err(other.mismatch("str")),
        }
    }

    fn into_value(self) -> Value {
        Value::Str(self)
    }
}

impl FieldType for PathBuf {
    fn type_expr() -> TypeExpr {
        TypeExpr::path()
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Path(p) => Ok(p),
            other => Err(other.mismatch("path")),
        }
    }

    fn into_value(self) -> Value {
        Value::Path(self)
    }
}

impl FieldType for bool {
    fn type_expr() -> TypeExpr {
        TypeExpr::Bool
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(other.mismatch("bool")),
        }
    }

    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

impl<T: FieldType> FieldType for Option<T> {
    fn type_expr() -> TypeExpr {
        TypeExpr::optional(T::type_expr())
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::None => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }

    fn into_value(self) -> Value {
        match self {
            Some(v) => v.into_value(),
            None => Value::None,
        }
    }
}

fn sequence_items(value: Value, expected: &'static str) -> Result<Vec<Value>, ValueError> {
    match value {
        Value::List(items) | Value::Tuple(items) => Ok(items),
        other => Err(other.mismatch(expected)),
    }
}

impl<T: FieldType> FieldType for Vec<T> {
    fn type_expr() -> TypeExpr {
        TypeExpr::list(T::type_expr())
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        sequence_items(value, "list")?
            .into_iter()
            .map(T::from_value)
            .collect()
    }

    fn into_value(self) -> Value {
        Value::List(self.into_iter().map(FieldType::into_value).collect())
    }
}

/// `Box<[T]>` stands for a variadic tuple: any number of `T`, kept as a tuple.
impl<T: FieldType> FieldType for Box<[T]> {
    fn type_expr() -> TypeExpr {
        TypeExpr::variadic(T::type_expr())
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        Vec::<T>::from_value(value).map(Vec::into_boxed_slice)
    }

    fn into_value(self) -> Value {
        Value::Tuple(self.into_vec().into_iter().map(FieldType::into_value).collect())
    }
}

impl<T: FieldType, const N: usize> FieldType for [T; N] {
    fn type_expr() -> TypeExpr {
        TypeExpr::repeat(T::type_expr(), N)
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        let items = sequence_items(value, "tuple")?;
        let found = items.len();
        let converted = items
            .into_iter()
            .map(T::from_value)
            .collect::<Result<Vec<T>, _>>()?;
        converted
            .try_into()
            .map_err(|_| ValueError::Arity { expected: N, found })
    }

    fn into_value(self) -> Value {
        Value::Tuple(self.into_iter().map(FieldType::into_value).collect())
    }
}

macro_rules! tuple_field {
    ($len:literal => $($name:ident),+) => {
        impl<$($name: FieldType),+> FieldType for ($($name,)+) {
            fn type_expr() -> TypeExpr {
                TypeExpr::tuple(vec![$($name::type_expr()),+])
            }

            fn from_value(value: Value) -> Result<Self, ValueError> {
                let items = sequence_items(value, "tuple")?;
                if items.len() != $len {
                    return Err(ValueError::Arity {
                        expected: $len,
                        found: items.len(),
                    });
                }
                let mut items = items.into_iter();
                Ok(($(
                    match items.next() {
                        Some(item) => $name::from_value(item)?,
                        None => return Err(ValueError::Arity { expected: $len, found: 0 }),
                    },
                )+))
            }

            #[allow(non_snake_case)]
            fn into_value(self) -> Value {
                let ($($name,)+) = self;
                Value::Tuple(vec![$($name.into_value()),+])
            }
        }
    };
}

tuple_field!(1 => A);
tuple_field!(2 => A, B);
tuple_field!(3 => A, B, C);
tuple_field!(4 => A, B, C, D);

/// One or more values: a leading element plus any number of further ones.
#[derive(Debug, Clone, PartialEq)]
pub struct AtLeastOne<T> {
    pub first: T,
    pub rest: Vec<T>,
}

impl<T> AtLeastOne<T> {
    pub fn new(first: T) -> Self {
        Self {
            first,
            rest: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        1 + self.rest.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        std::iter::once(&self.first).chain(self.rest.iter())
    }

    pub fn into_vec(self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.len());
        out.push(self.first);
        out.extend(self.rest);
        out
    }
}

impl<T> TryFrom<Vec<T>> for AtLeastOne<T> {
    type Error = ValueError;

    fn try_from(mut items: Vec<T>) -> Result<Self, Self::Error> {
        if items.is_empty() {
            return Err(ValueError::Arity {
                expected: 1,
                found: 0,
            });
        }
        let first = items.remove(0);
        Ok(Self { first, rest: items })
    }
}

impl<T: FieldType> FieldType for AtLeastOne<T> {
    fn type_expr() -> TypeExpr {
        TypeExpr::at_least_one(T::type_expr())
    }

    fn from_value(value: Value) -> Result<Self, ValueError> {
        Vec::<T>::from_value(value)?.try_into()
    }

    fn into_value(self) -> Value {
        Value::Tuple(self.into_vec().into_iter().map(FieldType::into_value).collect())
    }
}

/// Implement [`FieldType`] for a caller-defined scalar.
///
/// The type must be `Clone + Send + Sync + 'static`, and the registry used for
/// parsing needs a converter under the same id, usually via
/// [`Registry::with_from_str`](crate::Registry::with_from_str).
///
/// ```ignore
/// #[derive(Clone)]
/// struct Port(u16);
/// argparcel::scalar_type!(Port => "port");
/// ```
#[macro_export]
macro_rules! scalar_type {
    ($ty:ty => $id:literal) => {
        impl $crate::FieldType for $ty {
            fn type_expr() -> $crate::TypeExpr {
                $crate::TypeExpr::scalar($id)
            }

            fn from_value(
                value: $crate::Value,
            ) -> ::core::result::Result<Self, $crate::ValueError> {
                match value {
                    $crate::Value::Custom(any) => any
                        .downcast_ref::<$ty>()
                        .cloned()
                        .ok_or_else(|| $crate::ValueError::Mismatch {
                            expected: $id,
                            found: ::std::string::String::from("custom value of another type"),
                        }),
                    other => ::core::result::Result::Err($crate::ValueError::Mismatch {
                        expected: $id,
                        found: other.kind().to_string(),
                    }),
                }
            }

            fn into_value(self) -> $crate::Value {
                $crate::Value::custom(self)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_check_range() {
        assert_eq!(u8::from_value(Value::Int(255)), Ok(255));
        assert!(matches!(
            u8::from_value(Value::Int(256)),
            Err(ValueError::OutOfRange { .. })
        ));
        assert!(matches!(
            i64::from_value(Value::Str("2".into())),
            Err(ValueError::Mismatch { expected: "int", .. })
        ));
    }

    #[test]
    fn option_maps_none() {
        assert_eq!(Option::<String>::from_value(Value::None), Ok(None));
        assert_eq!(
            Option::<String>::from_value(Value::Str("moo".into())),
            Ok(Some("moo".to_string()))
        );
        assert_eq!(Option::<i64>::None.into_value(), Value::None);
    }

    #[test]
    fn tuples_check_arity() {
        let value = Value::Tuple(vec![Value::Int(4), Value::Int(5)]);
        assert_eq!(<(i64, i64)>::from_value(value.clone()), Ok((4, 5)));
        assert_eq!(<[i64; 2]>::from_value(value.clone()), Ok([4, 5]));
        assert_eq!(
            <[i64; 3]>::from_value(value),
            Err(ValueError::Arity {
                expected: 3,
                found: 2
            })
        );
    }

    #[test]
    fn at_least_one_rejects_empty() {
        assert!(AtLeastOne::<f64>::from_value(Value::Tuple(Vec::new())).is_err());
        let parsed =
            AtLeastOne::<f64>::from_value(Value::Tuple(vec![Value::Float(1.5), Value::Float(2.0)]))
                .unwrap();
        assert_eq!(parsed.first, 1.5);
        assert_eq!(parsed.rest, vec![2.0]);
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn tokens_follow_display() {
        assert_eq!(Value::Float(3.2).tokens(), vec!["3.2"]);
        assert_eq!(
            Value::Tuple(vec![Value::Int(4), Value::Int(5)]).tokens(),
            vec!["4", "5"]
        );
        assert!(Value::None.tokens().is_empty());
    }

    #[test]
    fn field_values_take_in_order() {
        let mut values = FieldValues::new();
        values.insert("a", Value::Int(2));
        values.insert("d", Value::None);
        assert_eq!(values.len(), 2);
        assert_eq!(values.take::<i64>("a").unwrap(), 2);
        assert_eq!(values.take::<Option<String>>("d").unwrap(), None);
        assert!(matches!(
            values.take::<i64>("a"),
            Err(ConstructError::MissingField { .. })
        ));
    }
}
