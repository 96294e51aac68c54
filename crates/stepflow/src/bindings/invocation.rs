//! Invoking binding bodies.
//!
//! Every binding body is an [`Invocable`]: it receives a [`BindingContext`]
//! and the converted [`Arguments`] and returns a boxed `Send` future. Plain
//! closures returning `async` blocks implement the trait automatically.

use std::any::{Any, TypeId};
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use unic_langid::LanguageIdentifier;

use crate::container::{ObjectContainer, ResolutionError};
use crate::info::{FeatureInfo, ScenarioInfo, StepInfo};
use crate::table::Table;

/// A converted argument or binding result.
pub type ArgValue = Box<dyn Any + Send + Sync>;

/// Result of invoking a binding: an optional return value or a failure.
pub type BindingResult = Result<Option<ArgValue>, StepFailure>;

/// Boxed future returned by [`Invocable::invoke`].
pub type BindingFuture = Pin<Box<dyn Future<Output = BindingResult> + Send + 'static>>;

/// Failure signalled by a binding body.
///
/// Any [`std::error::Error`] converts into [`StepFailure::Failed`], so `?`
/// works inside binding bodies.
#[derive(Debug)]
pub enum StepFailure {
    /// The binding is not implemented yet.
    Pending,
    /// The binding body failed.
    Failed(Box<dyn Error + Send + Sync>),
    /// The binding could not be invoked, for example because an argument had
    /// an unexpected type.
    Binding(String),
}

impl StepFailure {
    /// A failure carrying only a message.
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Failed(message.into().into())
    }
}

impl<E> From<E> for StepFailure
where
    E: Error + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Self::Failed(Box::new(error))
    }
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("step definition is pending"),
            Self::Failed(error) => write!(f, "{error}"),
            Self::Binding(message) => f.write_str(message),
        }
    }
}

/// Capability to run a binding body.
pub trait Invocable: Send + Sync {
    /// Start the body with `context` and `arguments`.
    fn invoke(&self, context: BindingContext, arguments: Arguments) -> BindingFuture;
}

impl<F, Fut> Invocable for F
where
    F: Fn(BindingContext, Arguments) -> Fut + Send + Sync,
    Fut: Future<Output = BindingResult> + Send + 'static,
{
    fn invoke(&self, context: BindingContext, arguments: Arguments) -> BindingFuture {
        Box::pin(self(context, arguments))
    }
}

/// A named binding body.
///
/// Clones share the body, and clones are the same method: a hook registered
/// several times through clones of one method runs once per event. Distinct
/// methods stay distinct even when their names collide.
#[derive(Clone)]
pub struct BindingMethod {
    name: Arc<str>,
    body: Arc<dyn Invocable>,
}

impl BindingMethod {
    /// Wrap a closure returning a future.
    ///
    /// # Examples
    ///
    /// ```
    /// use stepflow::BindingMethod;
    ///
    /// let method = BindingMethod::new("steps::noop", |_ctx, _args| async { Ok(None) });
    /// assert_eq!(method.name(), "steps::noop");
    /// ```
    #[must_use]
    pub fn new<F, Fut>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(BindingContext, Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = BindingResult> + Send + 'static,
    {
        Self {
            name: Arc::from(name.into()),
            body: Arc::new(body),
        }
    }

    /// Wrap an existing [`Invocable`].
    #[must_use]
    pub fn from_invocable(name: impl Into<String>, body: Arc<dyn Invocable>) -> Self {
        Self {
            name: Arc::from(name.into()),
            body,
        }
    }

    /// Method name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether `other` wraps the same body.
    #[must_use]
    pub fn is_same_method(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.body, &other.body)
    }

    /// Start the body.
    #[must_use]
    pub fn invoke(&self, context: BindingContext, arguments: Arguments) -> BindingFuture {
        self.body.invoke(context, arguments)
    }
}

impl fmt::Debug for BindingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BindingMethod").field(&self.name).finish()
    }
}

/// Raw step argument before conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawArgument {
    /// A regex capture or a multiline text argument.
    Text(String),
    /// A table argument.
    Table(Table),
}

impl RawArgument {
    /// The text, when this is a text argument.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Table(_) => None,
        }
    }

    /// [`TypeId`] of the carried value.
    #[must_use]
    pub fn value_type(&self) -> TypeId {
        match self {
            Self::Text(_) => TypeId::of::<String>(),
            Self::Table(_) => TypeId::of::<Table>(),
        }
    }

    /// Box a copy of the carried value.
    #[must_use]
    pub fn to_value(&self) -> ArgValue {
        match self {
            Self::Text(text) => Box::new(text.clone()),
            Self::Table(table) => Box::new(table.clone()),
        }
    }
}

impl fmt::Display for RawArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => write!(f, "{text:?}"),
            Self::Table(table) => write!(f, "<table: {} rows>", table.row_count()),
        }
    }
}

/// Converted arguments handed to a binding body.
///
/// # Examples
///
/// ```
/// use stepflow::{ArgValue, Arguments};
///
/// let mut args = Arguments::new(vec![Box::new(3_u32) as ArgValue, Box::new(String::from("x"))]);
/// assert_eq!(args.get::<u32>(0), Some(&3));
/// let count: u32 = args.take(0).unwrap();
/// let name: String = args.take(1).unwrap();
/// assert_eq!((count, name.as_str()), (3, "x"));
/// assert!(args.take::<u32>(0).is_err());
/// ```
#[derive(Default)]
pub struct Arguments {
    values: Vec<Option<ArgValue>>,
}

impl Arguments {
    /// Wrap converted values.
    #[must_use]
    pub fn new(values: Vec<ArgValue>) -> Self {
        Self {
            values: values.into_iter().map(Some).collect(),
        }
    }

    /// An empty argument list, as passed to hooks.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no arguments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Borrow the argument at `index` as `T`.
    #[must_use]
    pub fn get<T: 'static>(&self, index: usize) -> Option<&T> {
        self.values.get(index)?.as_ref()?.downcast_ref::<T>()
    }

    /// Move the argument at `index` out as `T`.
    ///
    /// # Errors
    ///
    /// Returns [`StepFailure::Binding`] when the index is out of range, the
    /// value was already taken, or it is not a `T`.
    pub fn take<T: 'static>(&mut self, index: usize) -> Result<T, StepFailure> {
        let slot = self.values.get_mut(index).ok_or_else(|| {
            StepFailure::Binding(format!("argument {index} is out of range"))
        })?;
        let value = slot.take().ok_or_else(|| {
            StepFailure::Binding(format!("argument {index} was already taken"))
        })?;
        match value.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(original) => {
                *slot = Some(original);
                Err(StepFailure::Binding(format!(
                    "argument {index} is not a {}",
                    std::any::type_name::<T>()
                )))
            }
        }
    }
}

impl fmt::Debug for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arguments")
            .field("len", &self.values.len())
            .finish()
    }
}

/// What a binding body can see of the running scenario.
///
/// Cloning is cheap; every field is shared.
#[derive(Debug, Clone)]
pub struct BindingContext {
    container: Arc<ObjectContainer>,
    culture: LanguageIdentifier,
    feature: Option<Arc<FeatureInfo>>,
    scenario: Option<Arc<ScenarioInfo>>,
    step: Option<Arc<StepInfo>>,
}

impl BindingContext {
    /// Context resolving instances from `container`.
    #[must_use]
    pub fn new(container: Arc<ObjectContainer>, culture: LanguageIdentifier) -> Self {
        Self {
            container,
            culture,
            feature: None,
            scenario: None,
            step: None,
        }
    }

    /// Attach the running feature.
    #[must_use]
    pub fn with_feature(mut self, feature: Option<Arc<FeatureInfo>>) -> Self {
        self.feature = feature;
        self
    }

    /// Attach the running scenario.
    #[must_use]
    pub fn with_scenario(mut self, scenario: Option<Arc<ScenarioInfo>>) -> Self {
        self.scenario = scenario;
        self
    }

    /// Attach the running step.
    #[must_use]
    pub fn with_step(mut self, step: Option<Arc<StepInfo>>) -> Self {
        self.step = step;
        self
    }

    /// Container instances are resolved from.
    #[must_use]
    pub fn container(&self) -> &Arc<ObjectContainer> {
        &self.container
    }

    /// Return the nearest `T`, creating one in the current scope if needed.
    #[must_use]
    pub fn resolve<T>(&self) -> Arc<T>
    where
        T: Default + Send + Sync + 'static,
    {
        self.container.resolve::<T>()
    }

    /// Return a `T` that must already be registered.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError`] when no scope holds a `T`.
    pub fn get<T>(&self) -> Result<Arc<T>, ResolutionError>
    where
        T: Send + Sync + 'static,
    {
        self.container.get::<T>()
    }

    /// Culture used for argument conversion.
    #[must_use]
    pub fn culture(&self) -> &LanguageIdentifier {
        &self.culture
    }

    /// Running feature, if any.
    #[must_use]
    pub fn feature(&self) -> Option<&FeatureInfo> {
        self.feature.as_deref()
    }

    /// Running scenario, if any.
    #[must_use]
    pub fn scenario(&self) -> Option<&ScenarioInfo> {
        self.scenario.as_deref()
    }

    /// Running step, if any.
    #[must_use]
    pub fn step(&self) -> Option<&StepInfo> {
        self.step.as_deref()
    }
}
