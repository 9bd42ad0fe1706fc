//! Type binder.
//!
//! Converts untyped wire [`Value`]s into statically declared Rust types and
//! back. Every bindable type implements [`WireType`], which names the type
//! for registries and documentation, plus [`FromValue`] for parameters and
//! [`ToValue`] for results.
//!
//! Scalar targets coerce the literal text regardless of the wire tag, so an
//! `<i4>` sent as `<string>5</string>` still binds to `i32`. Records are
//! declared with [`xmlrpc_record!`](crate::xmlrpc_record) and bind leniently:
//! members missing from the wire struct leave their field at its default.

use crate::error::BindError;
use chrono::NaiveDateTime;
use std::fmt;
use xmlrpc_protocol::{Members, Scalar, Value};

/// Declared type of a parameter or result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclaredType {
    Int,
    I8,
    Boolean,
    Double,
    String,
    DateTime,
    Base64,
    Array(Box<DeclaredType>),
    Struct(&'static str),
    /// Any value, passed through untouched.
    Value,
    /// No value.
    Nil,
}

impl fmt::Display for DeclaredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclaredType::Int => write!(f, "int"),
            DeclaredType::I8 => write!(f, "i8"),
            DeclaredType::Boolean => write!(f, "boolean"),
            DeclaredType::Double => write!(f, "double"),
            DeclaredType::String => write!(f, "string"),
            DeclaredType::DateTime => write!(f, "dateTime.iso8601"),
            DeclaredType::Base64 => write!(f, "base64"),
            DeclaredType::Array(item) => write!(f, "array of {}", item),
            DeclaredType::Struct(name) => write!(f, "struct {}", name),
            DeclaredType::Value => write!(f, "value"),
            DeclaredType::Nil => write!(f, "nil"),
        }
    }
}

/// A type that can cross the wire.
pub trait WireType {
    fn declared_type() -> DeclaredType;
}

/// Binds a wire value onto `Self`.
pub trait FromValue: WireType + Sized {
    fn from_value(value: &Value) -> Result<Self, BindError>;
}

/// Serializes `Self` as a wire value.
///
/// Returns `None` for null values, which are omitted from structs and arrays.
pub trait ToValue: WireType {
    fn to_value(&self) -> Option<Value>;
}

/// Binary payload written as `base64`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Base64(pub Vec<u8>);

impl From<Vec<u8>> for Base64 {
    fn from(bytes: Vec<u8>) -> Self {
        Base64(bytes)
    }
}

fn scalar<T: WireType>(value: &Value) -> Result<&Scalar, BindError> {
    value
        .as_scalar()
        .ok_or_else(|| BindError::shape(T::declared_type(), value.shape()))
}

#[doc(hidden)]
pub fn expect_struct<T: WireType>(value: &Value) -> Result<&Members, BindError> {
    value
        .as_struct()
        .ok_or_else(|| BindError::shape(T::declared_type(), value.shape()))
}

macro_rules! scalar_binding {
    ($ty:ty, $declared:ident, $read:ident, $write:expr) => {
        impl WireType for $ty {
            fn declared_type() -> DeclaredType {
                DeclaredType::$declared
            }
        }

        impl FromValue for $ty {
            fn from_value(value: &Value) -> Result<Self, BindError> {
                let scalar = scalar::<Self>(value)?;
                scalar
                    .$read()
                    .map_err(|_| BindError::literal(DeclaredType::$declared, scalar))
            }
        }

        impl ToValue for $ty {
            fn to_value(&self) -> Option<Value> {
                let write: fn(&$ty) -> Scalar = $write;
                Some(Value::Scalar(write(self)))
            }
        }
    };
}

scalar_binding!(i32, Int, as_i32, |v| Scalar::int(*v));
scalar_binding!(i64, I8, as_i64, |v| Scalar::i8(*v));
scalar_binding!(bool, Boolean, as_bool, |v| Scalar::boolean(*v));
scalar_binding!(f64, Double, as_f64, |v| Scalar::double(*v));
scalar_binding!(NaiveDateTime, DateTime, as_datetime, |v| Scalar::datetime(*v));

impl WireType for String {
    fn declared_type() -> DeclaredType {
        DeclaredType::String
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, BindError> {
        Ok(scalar::<Self>(value)?.as_str().to_string())
    }
}

impl ToValue for String {
    fn to_value(&self) -> Option<Value> {
        Some(Value::string(self.as_str()))
    }
}

impl WireType for Base64 {
    fn declared_type() -> DeclaredType {
        DeclaredType::Base64
    }
}

impl FromValue for Base64 {
    fn from_value(value: &Value) -> Result<Self, BindError> {
        let scalar = scalar::<Self>(value)?;
        scalar
            .as_base64()
            .map(Base64)
            .map_err(|_| BindError::literal(DeclaredType::Base64, scalar))
    }
}

impl ToValue for Base64 {
    fn to_value(&self) -> Option<Value> {
        Some(Value::Scalar(Scalar::base64(&self.0)))
    }
}

impl WireType for Value {
    fn declared_type() -> DeclaredType {
        DeclaredType::Value
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, BindError> {
        Ok(value.clone())
    }
}

impl ToValue for Value {
    fn to_value(&self) -> Option<Value> {
        Some(self.clone())
    }
}

impl WireType for () {
    fn declared_type() -> DeclaredType {
        DeclaredType::Nil
    }
}

impl ToValue for () {
    fn to_value(&self) -> Option<Value> {
        None
    }
}

impl<T: WireType> WireType for Option<T> {
    fn declared_type() -> DeclaredType {
        T::declared_type()
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, BindError> {
        T::from_value(value).map(Some)
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Option<Value> {
        self.as_ref().and_then(ToValue::to_value)
    }
}

impl<T: WireType> WireType for Vec<T> {
    fn declared_type() -> DeclaredType {
        DeclaredType::Array(Box::new(T::declared_type()))
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Result<Self, BindError> {
        let items = value
            .as_array()
            .ok_or_else(|| BindError::shape(Self::declared_type(), value.shape()))?;
        items
            .iter()
            .enumerate()
            .map(|(i, item)| T::from_value(item).map_err(|e| e.at_index(i)))
            .collect()
    }
}

impl<T: ToValue> ToValue for Vec<T> {
    fn to_value(&self) -> Option<Value> {
        Some(Value::Array(
            self.iter().filter_map(ToValue::to_value).collect(),
        ))
    }
}

/// Declares a record type that binds to and from wire structs.
///
/// The generated struct derives `Default`. Each field binds from the struct
/// member of the same name, or from the name given after `as`:
///
/// ```
/// use xmlrpc_core::xmlrpc_record;
///
/// xmlrpc_record! {
///     #[derive(Debug, Clone, PartialEq)]
///     pub struct Post {
///         pub title: String,
///         pub post_id: i32 as "postid",
///         pub categories: Vec<String>,
///         pub summary: Option<String> as "mt_excerpt",
///     }
/// }
/// ```
#[macro_export]
macro_rules! xmlrpc_record {
    (@wire $field:ident $wire:literal) => {
        $wire
    };
    (@wire $field:ident) => {
        stringify!($field)
    };
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$fmeta:meta])*
                $fvis:vis $field:ident : $ty:ty $(as $wire:literal)?
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Default)]
        $vis struct $name {
            $(
                $(#[$fmeta])*
                $fvis $field: $ty,
            )*
        }

        impl $crate::binder::WireType for $name {
            fn declared_type() -> $crate::binder::DeclaredType {
                $crate::binder::DeclaredType::Struct(stringify!($name))
            }
        }

        impl $crate::binder::FromValue for $name {
            #[allow(unused_mut, unused_variables)]
            fn from_value(
                value: &$crate::Value,
            ) -> ::std::result::Result<Self, $crate::BindError> {
                let members = $crate::binder::expect_struct::<Self>(value)?;
                let mut record = <Self as ::std::default::Default>::default();
                $(
                    let name = $crate::xmlrpc_record!(@wire $field $($wire)?);
                    if let Some(member) = members.get(name) {
                        record.$field = <$ty as $crate::binder::FromValue>::from_value(member)
                            .map_err(|e| e.in_field(name))?;
                    }
                )*
                Ok(record)
            }
        }

        impl $crate::binder::ToValue for $name {
            #[allow(unused_mut)]
            fn to_value(&self) -> ::std::option::Option<$crate::Value> {
                let mut members = $crate::Members::new();
                $(
                    if let Some(value) = $crate::binder::ToValue::to_value(&self.$field) {
                        members.insert($crate::xmlrpc_record!(@wire $field $($wire)?), value);
                    }
                )*
                Some($crate::Value::Struct(members))
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PathSegment;
    use chrono::NaiveDate;
    use xmlrpc_protocol::ScalarKind;

    crate::xmlrpc_record! {
        #[derive(Debug, Clone, PartialEq)]
        struct Author {
            name: String,
            email: Option<String>,
        }
    }

    crate::xmlrpc_record! {
        #[derive(Debug, Clone, PartialEq)]
        struct Post {
            title: String,
            post_id: i32 as "postid",
            published: bool,
            tags: Vec<String>,
            author: Author,
            excerpt: Option<String> as "mt_excerpt",
        }
    }

    fn int(text: &str) -> Value {
        Value::Scalar(Scalar::new(ScalarKind::Int, text))
    }

    #[test]
    fn test_scalar_binding() {
        assert_eq!(i32::from_value(&int("5")).unwrap(), 5);
        assert_eq!(i64::from_value(&int("-9000000000")).unwrap(), -9_000_000_000);
        assert!(bool::from_value(&Value::boolean(true)).unwrap());
        assert_eq!(f64::from_value(&Value::double(2.5)).unwrap(), 2.5);
        assert_eq!(String::from_value(&Value::string("hi")).unwrap(), "hi");

        let at = NaiveDate::from_ymd_opt(2004, 2, 29)
            .unwrap()
            .and_hms_opt(23, 59, 1)
            .unwrap();
        let wire = Value::Scalar(Scalar::new(ScalarKind::DateTime, "20040229T23:59:01"));
        assert_eq!(NaiveDateTime::from_value(&wire).unwrap(), at);

        let wire = Value::Scalar(Scalar::base64(b"\x00\xffdata"));
        assert_eq!(Base64::from_value(&wire).unwrap().0, b"\x00\xffdata");
    }

    #[test]
    fn test_scalar_binding_ignores_wire_tag() {
        // Coercion works on the literal text; the tag is advisory.
        assert_eq!(i32::from_value(&Value::string("42")).unwrap(), 42);
        assert_eq!(String::from_value(&int("7")).unwrap(), "7");
    }

    #[test]
    fn test_scalar_binding_errors() {
        let err = i32::from_value(&Value::string("five")).unwrap_err();
        assert_eq!(err.expected(), &DeclaredType::Int);
        assert_eq!(err.found(), "string \"five\"");

        let err = i32::from_value(&Value::Array(vec![])).unwrap_err();
        assert_eq!(err.found(), "array");

        let err = String::from_value(&Value::Struct(Members::new())).unwrap_err();
        assert_eq!(err.expected(), &DeclaredType::String);
    }

    #[test]
    fn test_array_binding() {
        let wire = Value::Array(vec![int("1"), int("2"), int("3")]);
        assert_eq!(Vec::<i32>::from_value(&wire).unwrap(), vec![1, 2, 3]);

        let err = Vec::<i32>::from_value(&int("1")).unwrap_err();
        assert_eq!(err.expected(), &DeclaredType::Array(Box::new(DeclaredType::Int)));

        let wire = Value::Array(vec![int("1"), Value::string("x")]);
        let err = Vec::<i32>::from_value(&wire).unwrap_err();
        assert_eq!(err.path(), &[PathSegment::Index(1)]);
    }

    #[test]
    fn test_record_binding() {
        let wire = Value::Struct(
            Members::new()
                .with("title", "Hello")
                .with("postid", int("12"))
                .with("published", Value::Scalar(Scalar::new(ScalarKind::Boolean, "1")))
                .with("tags", Value::Array(vec![Value::string("a"), Value::string("b")]))
                .with(
                    "author",
                    Members::new()
                        .with("name", "Ann")
                        .with("email", "ann@example.com"),
                )
                .with("mt_excerpt", "short"),
        );
        let post = Post::from_value(&wire).unwrap();
        assert_eq!(post.title, "Hello");
        assert_eq!(post.post_id, 12);
        assert!(post.published);
        assert_eq!(post.tags, vec!["a", "b"]);
        assert_eq!(post.author.name, "Ann");
        assert_eq!(post.author.email.as_deref(), Some("ann@example.com"));
        assert_eq!(post.excerpt.as_deref(), Some("short"));
    }

    #[test]
    fn test_record_partial_binding() {
        let wire = Value::Struct(Members::new().with("title", "Only title"));
        let post = Post::from_value(&wire).unwrap();
        assert_eq!(
            post,
            Post {
                title: "Only title".to_string(),
                ..Post::default()
            }
        );
    }

    #[test]
    fn test_record_ignores_unknown_members() {
        let wire = Value::Struct(Members::new().with("name", "Bob").with("age", 40));
        let author = Author::from_value(&wire).unwrap();
        assert_eq!(author.name, "Bob");
        assert_eq!(author.email, None);
    }

    #[test]
    fn test_record_binding_error_path() {
        let wire = Value::Struct(
            Members::new().with("author", Members::new().with("name", Value::Array(vec![]))),
        );
        let err = Post::from_value(&wire).unwrap_err();
        assert_eq!(
            err.path(),
            &[
                PathSegment::Field("author".to_string()),
                PathSegment::Field("name".to_string())
            ]
        );

        let err = Post::from_value(&Value::string("x")).unwrap_err();
        assert_eq!(err.expected(), &DeclaredType::Struct("Post"));
    }

    #[test]
    fn test_array_of_records() {
        let wire = Value::Array(vec![
            Value::Struct(Members::new().with("name", "a")),
            Value::Struct(Members::new().with("name", "b")),
        ]);
        let authors = Vec::<Author>::from_value(&wire).unwrap();
        assert_eq!(authors.len(), 2);
        assert_eq!(authors[1].name, "b");
    }

    #[test]
    fn test_record_serialization_skips_null() {
        let post = Post {
            title: "T".to_string(),
            post_id: 3,
            author: Author {
                name: "N".to_string(),
                email: None,
            },
            ..Post::default()
        };
        let value = post.to_value().unwrap();
        let members = value.as_struct().unwrap();
        assert_eq!(
            members.names().collect::<Vec<_>>(),
            vec!["title", "postid", "published", "tags", "author"]
        );
        assert!(!members.contains("mt_excerpt"));

        let author = members.get("author").unwrap().as_struct().unwrap();
        assert_eq!(author.names().collect::<Vec<_>>(), vec!["name"]);
    }

    #[test]
    fn test_record_roundtrip() {
        let post = Post {
            title: "Round".to_string(),
            post_id: 9,
            published: true,
            tags: vec!["x".to_string()],
            author: Author {
                name: "A".to_string(),
                email: Some("a@b".to_string()),
            },
            excerpt: Some("e".to_string()),
        };
        let value = post.to_value().unwrap();
        assert_eq!(Post::from_value(&value).unwrap(), post);
    }

    #[test]
    fn test_option_and_unit_serialization() {
        assert_eq!(None::<i32>.to_value(), None);
        assert_eq!(Some(4).to_value(), Some(Value::int(4)));
        assert_eq!(().to_value(), None);

        let items = vec![Some(1), None, Some(3)];
        assert_eq!(
            items.to_value(),
            Some(Value::Array(vec![Value::int(1), Value::int(3)]))
        );
    }

    #[test]
    fn test_declared_type_display() {
        assert_eq!(Vec::<Post>::declared_type().to_string(), "array of struct Post");
        assert_eq!(Option::<i64>::declared_type().to_string(), "i8");
        assert_eq!(<()>::declared_type().to_string(), "nil");
        assert_eq!(Base64::declared_type().to_string(), "base64");
        assert_eq!(NaiveDateTime::declared_type().to_string(), "dateTime.iso8601");
    }
}
