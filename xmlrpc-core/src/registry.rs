//! Method registry.
//!
//! Services expose methods by explicit registration:
//!
//! ```
//! use xmlrpc_core::{MethodError, Methods, Registry, Service};
//!
//! struct Math;
//!
//! impl Math {
//!     fn add(&self, a: i32, b: i32) -> Result<i32, MethodError> {
//!         Ok(a + b)
//!     }
//! }
//!
//! impl Service for Math {
//!     const NAME: &'static str = "math";
//!
//!     fn methods(methods: &mut Methods<Self>) {
//!         methods
//!             .add("math.add", Math::add)
//!             .describe("Adds two integers")
//!             .params(&["a", "b"]);
//!     }
//! }
//!
//! let registry = Registry::builder().service(Math).build().unwrap();
//! assert!(registry.lookup("math.add").is_some());
//! ```
//!
//! The registry is immutable once built and is shared across requests
//! without locking.

use crate::binder::{DeclaredType, FromValue, ToValue};
use crate::error::{CoreError, InvokeError, MethodError};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use xmlrpc_protocol::{ResponseMode, Value};

/// A set of methods exposed together.
pub trait Service: Send + Sync + 'static {
    /// Name used in diagnostics and on the overview page.
    const NAME: &'static str;

    /// Registers the service's exposed methods.
    fn methods(methods: &mut Methods<Self>)
    where
        Self: Sized;
}

/// A callable that binds wire parameters and invokes a service method.
///
/// Implemented for `Fn(&S, A1, .., An) -> Result<R, MethodError>` with up to
/// six parameters, where every `Ai` is [`FromValue`] and `R` is [`ToValue`].
pub trait Handler<S, Args, R>: Send + Sync + 'static {
    fn param_types() -> Vec<DeclaredType>;

    fn return_type() -> DeclaredType;

    fn call(&self, service: &S, params: &[Value]) -> Result<Option<Value>, InvokeError>;
}

macro_rules! impl_handler {
    ($($A:ident),*) => {
        impl<S, F, R, $($A,)*> Handler<S, ($($A,)*), R> for F
        where
            F: Fn(&S, $($A),*) -> Result<R, MethodError> + Send + Sync + 'static,
            R: ToValue,
            $($A: FromValue,)*
        {
            fn param_types() -> Vec<DeclaredType> {
                vec![$($A::declared_type()),*]
            }

            fn return_type() -> DeclaredType {
                R::declared_type()
            }

            #[allow(non_snake_case, unused_mut, unused_variables, unused_assignments)]
            fn call(&self, service: &S, params: &[Value]) -> Result<Option<Value>, InvokeError> {
                let [$($A),*] = params else {
                    return Err(InvokeError::Arity {
                        expected: Self::param_types().len(),
                        found: params.len(),
                    });
                };
                let mut index = 0;
                $(
                    let $A = $A::from_value($A)
                        .map_err(|source| InvokeError::Bind { index, source })?;
                    index += 1;
                )*
                let result = (self)(service, $($A),*).map_err(InvokeError::Method)?;
                Ok(result.to_value())
            }
        }
    };
}

impl_handler!();
impl_handler!(A1);
impl_handler!(A1, A2);
impl_handler!(A1, A2, A3);
impl_handler!(A1, A2, A3, A4);
impl_handler!(A1, A2, A3, A4, A5);
impl_handler!(A1, A2, A3, A4, A5, A6);

/// Type-erased handler bound to its service instance.
trait Invoke: Send + Sync {
    fn invoke(&self, params: &[Value]) -> Result<Option<Value>, InvokeError>;
}

struct Bound<S, H, Args, R> {
    service: Arc<S>,
    handler: H,
    _marker: PhantomData<fn() -> (Args, R)>,
}

impl<S, H, Args, R> Invoke for Bound<S, H, Args, R>
where
    S: Service,
    H: Handler<S, Args, R>,
{
    fn invoke(&self, params: &[Value]) -> Result<Option<Value>, InvokeError> {
        self.handler.call(&self.service, params)
    }
}

/// A declared parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: Option<String>,
    pub ty: DeclaredType,
}

/// Everything the registry knows about one exposed method.
pub struct MethodDescriptor {
    name: String,
    description: String,
    response_mode: ResponseMode,
    params: Vec<Param>,
    returns: DeclaredType,
    returns_description: String,
    service: &'static str,
    handle: Arc<dyn Invoke>,
}

impl MethodDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn response_mode(&self) -> ResponseMode {
        self.response_mode
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Number of parameters the method accepts.
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn returns(&self) -> &DeclaredType {
        &self.returns
    }

    pub fn returns_description(&self) -> &str {
        &self.returns_description
    }

    /// Name of the service that registered the method.
    pub fn service(&self) -> &'static str {
        self.service
    }

    /// Binds `params` and calls the method.
    pub fn invoke(&self, params: &[Value]) -> Result<Option<Value>, InvokeError> {
        self.handle.invoke(params)
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("response_mode", &self.response_mode)
            .field("params", &self.params)
            .field("returns", &self.returns)
            .field("returns_description", &self.returns_description)
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}

/// Collects the methods of one service.
pub struct Methods<S> {
    service: Arc<S>,
    entries: Vec<MethodDescriptor>,
}

impl<S: Service> Methods<S> {
    fn new(service: Arc<S>) -> Self {
        Self {
            service,
            entries: Vec::new(),
        }
    }

    /// Exposes `handler` under `name`.
    pub fn add<H, Args, R>(&mut self, name: impl Into<String>, handler: H) -> MethodEntry<'_>
    where
        H: Handler<S, Args, R>,
        Args: 'static,
        R: 'static,
    {
        let params = H::param_types()
            .into_iter()
            .map(|ty| Param { name: None, ty })
            .collect();
        self.entries.push(MethodDescriptor {
            name: name.into(),
            description: String::new(),
            response_mode: ResponseMode::default(),
            params,
            returns: H::return_type(),
            returns_description: String::new(),
            service: S::NAME,
            handle: Arc::new(Bound {
                service: Arc::clone(&self.service),
                handler,
                _marker: PhantomData,
            }),
        });
        let last = self.entries.len() - 1;
        MethodEntry(&mut self.entries[last])
    }
}

/// Builder for a just-registered method.
pub struct MethodEntry<'a>(&'a mut MethodDescriptor);

impl MethodEntry<'_> {
    pub fn describe(self, description: impl Into<String>) -> Self {
        self.0.description = description.into();
        self
    }

    /// Names the parameters in order. Extra names are ignored.
    pub fn params(self, names: &[&str]) -> Self {
        for (param, name) in self.0.params.iter_mut().zip(names) {
            param.name = Some(name.to_string());
        }
        self
    }

    /// Describes the result.
    pub fn returns(self, description: impl Into<String>) -> Self {
        self.0.returns_description = description.into();
        self
    }

    pub fn mode(self, mode: ResponseMode) -> Self {
        self.0.response_mode = mode;
        self
    }

    /// Writes results in the bare envelope.
    pub fn bare(self) -> Self {
        self.mode(ResponseMode::Bare)
    }
}

/// Immutable name-to-method table.
#[derive(Debug)]
pub struct Registry {
    methods: HashMap<String, MethodDescriptor>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Finds a method by exact, case-sensitive name.
    pub fn lookup(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.get(name)
    }

    /// Returns every method sorted by name.
    pub fn methods(&self) -> Vec<&MethodDescriptor> {
        let mut methods: Vec<_> = self.methods.values().collect();
        methods.sort_by(|a, b| a.name.cmp(&b.name));
        methods
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

/// Collects services before the registry is frozen.
#[derive(Default)]
pub struct RegistryBuilder {
    entries: Vec<MethodDescriptor>,
}

impl RegistryBuilder {
    /// Adds every method exposed by `service`.
    pub fn service<S: Service>(mut self, service: S) -> Self {
        let mut methods = Methods::new(Arc::new(service));
        S::methods(&mut methods);
        self.entries.extend(methods.entries);
        self
    }

    /// Builds the registry, rejecting blank and duplicate method names.
    pub fn build(self) -> Result<Registry, CoreError> {
        let mut methods: HashMap<String, MethodDescriptor> = HashMap::new();
        for entry in self.entries {
            if entry.name.trim().is_empty() || entry.name.trim() != entry.name {
                return Err(CoreError::InvalidMethodName {
                    name: entry.name,
                    service: entry.service,
                });
            }
            if let Some(existing) = methods.get(&entry.name) {
                return Err(CoreError::DuplicateMethod {
                    method: entry.name,
                    first: existing.service,
                    second: entry.service,
                });
            }
            tracing::debug!(
                method = %entry.name,
                service = entry.service,
                mode = %entry.response_mode,
                "registered method"
            );
            methods.insert(entry.name.clone(), entry);
        }
        Ok(Registry { methods })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xmlrpc_protocol::{Scalar, ScalarKind};

    struct Math;

    impl Math {
        fn add(&self, a: i32, b: i32) -> Result<i32, MethodError> {
            Ok(a + b)
        }

        fn sum(&self, items: Vec<i32>) -> Result<i64, MethodError> {
            Ok(items.into_iter().map(i64::from).sum())
        }

        fn ping(&self) -> Result<(), MethodError> {
            Ok(())
        }
    }

    impl Service for Math {
        const NAME: &'static str = "math";

        fn methods(methods: &mut Methods<Self>) {
            methods
                .add("math.add", Math::add)
                .describe("Adds two integers")
                .params(&["a", "b"])
                .returns("The sum");
            methods.add("math.sum", Math::sum).bare();
            methods.add("math.ping", Math::ping);
        }
    }

    struct Shadow;

    impl Service for Shadow {
        const NAME: &'static str = "shadow";

        fn methods(methods: &mut Methods<Self>) {
            methods.add("math.add", |_: &Shadow, a: i32| -> Result<i32, MethodError> { Ok(a) });
        }
    }

    struct Blank;

    impl Service for Blank {
        const NAME: &'static str = "blank";

        fn methods(methods: &mut Methods<Self>) {
            methods.add(" ", |_: &Blank| -> Result<(), MethodError> { Ok(()) });
        }
    }

    fn int(text: &str) -> Value {
        Value::Scalar(Scalar::new(ScalarKind::Int, text))
    }

    #[test]
    fn test_registry_lookup() {
        let registry = Registry::builder().service(Math).build().unwrap();
        assert_eq!(registry.len(), 3);

        let add = registry.lookup("math.add").unwrap();
        assert_eq!(add.description(), "Adds two integers");
        assert_eq!(add.response_mode(), ResponseMode::Wrapped);
        assert_eq!(add.arity(), 2);
        assert_eq!(add.params()[0].name.as_deref(), Some("a"));
        assert_eq!(add.params()[1].ty, DeclaredType::Int);
        assert_eq!(add.returns(), &DeclaredType::Int);
        assert_eq!(add.returns_description(), "The sum");
        assert_eq!(add.service(), "math");

        let sum = registry.lookup("math.sum").unwrap();
        assert_eq!(sum.response_mode(), ResponseMode::Bare);
        assert_eq!(sum.params()[0].ty, DeclaredType::Array(Box::new(DeclaredType::Int)));
        assert_eq!(sum.params()[0].name, None);
        assert_eq!(sum.returns(), &DeclaredType::I8);

        // Lookup is case-sensitive
        assert!(registry.lookup("Math.Add").is_none());
        assert!(registry.lookup("math.missing").is_none());
    }

    #[test]
    fn test_registry_methods_sorted() {
        let registry = Registry::builder().service(Math).build().unwrap();
        let names: Vec<_> = registry.methods().iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["math.add", "math.ping", "math.sum"]);
    }

    #[test]
    fn test_duplicate_method_rejected() {
        let err = Registry::builder()
            .service(Math)
            .service(Shadow)
            .build()
            .unwrap_err();
        match err {
            CoreError::DuplicateMethod {
                method,
                first,
                second,
            } => {
                assert_eq!(method, "math.add");
                assert_eq!(first, "math");
                assert_eq!(second, "shadow");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_blank_method_name_rejected() {
        let err = Registry::builder().service(Blank).build().unwrap_err();
        assert!(matches!(err, CoreError::InvalidMethodName { .. }));
    }

    #[test]
    fn test_invoke_binds_and_calls() {
        let registry = Registry::builder().service(Math).build().unwrap();

        let add = registry.lookup("math.add").unwrap();
        assert_eq!(
            add.invoke(&[int("2"), int("3")]).unwrap(),
            Some(Value::int(5))
        );

        let ping = registry.lookup("math.ping").unwrap();
        assert_eq!(ping.invoke(&[]).unwrap(), None);
    }

    #[test]
    fn test_invoke_reports_arity_and_bind_errors() {
        let registry = Registry::builder().service(Math).build().unwrap();
        let add = registry.lookup("math.add").unwrap();

        let err = add.invoke(&[int("2")]).unwrap_err();
        assert!(matches!(
            err,
            InvokeError::Arity {
                expected: 2,
                found: 1
            }
        ));

        let err = add.invoke(&[int("2"), Value::string("x")]).unwrap_err();
        assert!(matches!(err, InvokeError::Bind { index: 1, .. }));
    }

    #[test]
    fn test_empty_registry() {
        let registry = Registry::builder().build().unwrap();
        assert!(registry.is_empty());
        assert!(registry.methods().is_empty());
    }
}
