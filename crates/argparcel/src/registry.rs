//! Scalar converters and named type definitions.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::ConversionError;
use crate::schema::{TypeExpr, scalar};
use crate::value::Value;

type ConvertFn = dyn Fn(&str) -> Result<Value, ConversionError> + Send + Sync;

/// Turns one command-line token into a [`Value`].
#[derive(Clone)]
pub struct Converter {
    scalar: Arc<str>,
    func: Arc<ConvertFn>,
}

impl Converter {
    /// Wrap a conversion function; its error message becomes the reason shown to the user.
    pub fn new<F, E>(scalar: &str, func: F) -> Self
    where
        F: Fn(&str) -> Result<Value, E> + Send + Sync + 'static,
        E: fmt::Display,
    {
        let id: Arc<str> = Arc::from(scalar);
        let name = id.clone();
        Self {
            scalar: id,
            func: Arc::new(move |token: &str| {
                func(token).map_err(|err| ConversionError::Invalid {
                    scalar: name.to_string(),
                    token: token.to_string(),
                    reason: err.to_string(),
                })
            }),
        }
    }

    pub fn scalar(&self) -> &str {
        &self.scalar
    }

    pub fn convert(&self, token: &str) -> Result<Value, ConversionError> {
        (self.func)(token)
    }
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converter")
            .field("scalar", &self.scalar)
            .finish_non_exhaustive()
    }
}

fn int_converter<T>(scalar: &str) -> Converter
where
    T: FromStr + 'static,
    T::Err: fmt::Display,
    i128: From<T>,
{
    Converter::new(scalar, |token: &str| {
        token.parse::<T>().map(|v| Value::Int(i128::from(v)))
    })
}

fn size_converter<T>(scalar: &str) -> Converter
where
    T: FromStr + TryInto<i128> + 'static,
    T::Err: fmt::Display,
{
    Converter::new(scalar, |token: &str| {
        let parsed = token.parse::<T>().map_err(|err| err.to_string())?;
        parsed
            .try_into()
            .map(Value::Int)
            .map_err(|_| "out of range".to_string())
    })
}

/// Where scalar ids get their converters and named types get their definitions.
///
/// `Registry::default()` knows `int`, `float`, `str`, `path` and the width-specific
/// Rust numeric ids (`i8` .. `u64`, `isize`, `usize`, `f32`).
#[derive(Debug, Clone)]
pub struct Registry {
    converters: HashMap<String, Converter>,
    types: HashMap<String, TypeExpr>,
}

impl Default for Registry {
    fn default() -> Self {
        let mut registry = Self::empty();
        for converter in [
            int_converter::<i64>(scalar::INT),
            int_converter::<i8>("i8"),
            int_converter::<i16>("i16"),
            int_converter::<i32>("i32"),
            int_converter::<u8>("u8"),
            int_converter::<u16>("u16"),
            int_converter::<u32>("u32"),
            int_converter::<u64>("u64"),
            size_converter::<isize>("isize"),
            size_converter::<usize>("usize"),
            Converter::new(scalar::FLOAT, |token: &str| {
                token.parse::<f64>().map(Value::Float)
            }),
            Converter::new("f32", |token: &str| {
                token.parse::<f32>().map(|v| Value::Float(f64::from(v)))
            }),
            Converter::new(scalar::STR, |token: &str| {
                Ok::<_, std::convert::Infallible>(Value::Str(token.to_string()))
            }),
            Converter::new(scalar::PATH, |token: &str| {
                Ok::<_, std::convert::Infallible>(Value::Path(PathBuf::from(token)))
            }),
        ] {
            registry
                .converters
                .insert(converter.scalar().to_string(), converter);
        }
        registry
    }
}

impl Registry {
    /// A registry without any converters.
    pub fn empty() -> Self {
        Self {
            converters: HashMap::new(),
            types: HashMap::new(),
        }
    }

    /// Register (or replace) the converter for `scalar`.
    pub fn with_converter<F, E>(mut self, scalar: &str, func: F) -> Self
    where
        F: Fn(&str) -> Result<Value, E> + Send + Sync + 'static,
        E: fmt::Display,
    {
        self.converters
            .insert(scalar.to_string(), Converter::new(scalar, func));
        self
    }

    /// Register a converter that parses `T` with `FromStr` and stores it as a custom value.
    pub fn with_from_str<T>(self, scalar: &str) -> Self
    where
        T: FromStr + Send + Sync + 'static,
        T::Err: fmt::Display,
    {
        self.with_converter(scalar, |token: &str| token.parse::<T>().map(Value::custom))
    }

    /// Define `name` so that `TypeExpr::Named(name)` resolves to `ty`.
    pub fn with_type(mut self, name: impl Into<String>, ty: TypeExpr) -> Self {
        self.types.insert(name.into(), ty);
        self
    }

    pub fn converter(&self, scalar: &str) -> Option<&Converter> {
        self.converters.get(scalar)
    }

    pub fn lookup_type(&self, name: &str) -> Option<&TypeExpr> {
        self.types.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_converters() {
        let registry = Registry::default();
        let int = registry.converter("int").unwrap();
        assert_eq!(int.convert("2").unwrap(), Value::Int(2));
        assert_eq!(int.convert("-7").unwrap(), Value::Int(-7));

        let float = registry.converter("float").unwrap();
        assert_eq!(float.convert("3.2").unwrap(), Value::Float(3.2));

        let path = registry.converter("path").unwrap();
        assert_eq!(
            path.convert("/somewhere/over/the/rainbow").unwrap(),
            Value::Path(PathBuf::from("/somewhere/over/the/rainbow"))
        );
    }

    #[test]
    fn narrow_ints_reject_out_of_range() {
        let registry = Registry::default();
        let err = registry.converter("u8").unwrap().convert("300").unwrap_err();
        match err {
            ConversionError::Invalid { scalar, token, .. } => {
                assert_eq!(scalar, "u8");
                assert_eq!(token, "300");
            }
            other => panic!("expected Invalid, got: {other:?}"),
        }
        assert_eq!(
            registry.converter("usize").unwrap().convert("12").unwrap(),
            Value::Int(12)
        );
    }

    #[test]
    fn invalid_token_names_the_scalar() {
        let registry = Registry::default();
        let err = registry.converter("int").unwrap().convert("moo").unwrap_err();
        assert!(err.to_string().starts_with("invalid int value 'moo'"));
    }

    #[test]
    fn custom_from_str_converter() {
        let registry = Registry::empty().with_from_str::<std::net::Ipv4Addr>("ipv4");
        let value = registry.converter("ipv4").unwrap().convert("10.0.0.1").unwrap();
        let Value::Custom(any) = value else {
            panic!("expected Custom");
        };
        assert_eq!(
            any.downcast_ref::<std::net::Ipv4Addr>(),
            Some(&std::net::Ipv4Addr::new(10, 0, 0, 1))
        );
        assert!(registry.converter("int").is_none());
    }
}
