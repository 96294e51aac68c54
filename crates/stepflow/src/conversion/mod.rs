//! Conversion of raw step arguments into binding parameter types.
//!
//! Conversion tries, in order:
//!
//! 1. the first step transformation producing the target type (regex
//!    transformations only apply to text they match, and their captures are
//!    converted recursively into the transformation's own parameter types);
//! 2. passing the raw value through when it already has the target type;
//! 3. built-in parsing of enums, UUIDs and culture-formatted primitives.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use unic_langid::LanguageIdentifier;
use uuid::Uuid;

use crate::bindings::{
    ArgValue, Arguments, BindingCatalog, BindingContext, BindingType, RawArgument,
    StepTransformation,
};
use crate::panic::panic_message;
use crate::tracer::TestTracer;

mod culture;

/// Failure to convert a step argument.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversionError {
    /// No conversion to the target type exists.
    #[error("cannot convert {value:?} to {target}")]
    Unsupported {
        /// Raw value.
        value: String,
        /// Target type name.
        target: String,
    },
    /// The value is malformed for the target type.
    #[error("cannot convert {value:?} to {target}: {reason}")]
    InvalidValue {
        /// Raw value.
        value: String,
        /// Target type name.
        target: String,
        /// Parser message.
        reason: String,
    },
    /// A transformation failed or returned the wrong type.
    #[error("step transformation {method} to {target} failed: {message}")]
    Transformation {
        /// Transformation method name.
        method: String,
        /// Target type name.
        target: String,
        /// Failure description.
        message: String,
    },
    /// A transformation regex captured a different number of groups than the
    /// transformation takes parameters.
    #[error("step transformation {method} takes {expected} parameters but its regex captured {actual}")]
    CaptureCount {
        /// Transformation method name.
        method: String,
        /// Declared parameter count.
        expected: usize,
        /// Captured group count.
        actual: usize,
    },
}

/// Converts step arguments using the catalog's transformations.
#[derive(Clone)]
pub struct StepArgumentTypeConverter {
    catalog: Arc<BindingCatalog>,
    tracer: Arc<dyn TestTracer>,
}

impl StepArgumentTypeConverter {
    /// Converter reading transformations from `catalog`.
    #[must_use]
    pub fn new(catalog: Arc<BindingCatalog>, tracer: Arc<dyn TestTracer>) -> Self {
        Self { catalog, tracer }
    }

    /// Catalog transformations are read from.
    #[must_use]
    pub fn catalog(&self) -> &Arc<BindingCatalog> {
        &self.catalog
    }

    /// First transformation able to turn `value` into `target`.
    ///
    /// When several apply and `trace_warning` is set, a warning is traced.
    #[must_use]
    pub fn get_matching_step_transformation(
        &self,
        value: &RawArgument,
        target: &BindingType,
        trace_warning: bool,
    ) -> Option<&StepTransformation> {
        let mut eligible = self
            .catalog
            .step_transformations()
            .iter()
            .filter(|transformation| is_eligible(transformation, value, target));
        let first = eligible.next()?;
        if trace_warning && eligible.next().is_some() {
            self.tracer.trace_warning(&format!(
                "Multiple step transformation matches to the input ({value}, target type: {target}). We use the first."
            ));
        }
        Some(first)
    }

    /// Convert `value` into `target`, invoking transformations with `context`.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError`] when no conversion applies or a
    /// transformation fails.
    pub fn convert<'a>(
        &'a self,
        value: RawArgument,
        target: &'a BindingType,
        context: &'a BindingContext,
    ) -> BoxFuture<'a, Result<ArgValue, ConversionError>> {
        async move {
            if let Some(transformation) = self.get_matching_step_transformation(&value, target, true) {
                return self.transform(transformation, value, target, context).await;
            }
            if value.value_type() == target.id() {
                return Ok(value.to_value());
            }
            convert_simple(target, &value, context.culture())
        }
        .boxed()
    }

    /// Whether `value` could be converted into `target`.
    ///
    /// Transformations are not invoked; a matching one counts as convertible.
    #[must_use]
    pub fn can_convert(
        &self,
        value: &RawArgument,
        target: &BindingType,
        culture: &LanguageIdentifier,
    ) -> bool {
        self.get_matching_step_transformation(value, target, false)
            .is_some()
            || value.value_type() == target.id()
            || convert_simple(target, value, culture).is_ok()
    }

    async fn transform(
        &self,
        transformation: &StepTransformation,
        value: RawArgument,
        target: &BindingType,
        context: &BindingContext,
    ) -> Result<ArgValue, ConversionError> {
        let method = transformation.method().name();
        let arguments = match (transformation.regex(), &value) {
            (Some(regex), RawArgument::Text(text)) => {
                let captures: Vec<String> = regex
                    .captures(text)
                    .map(|found| {
                        found
                            .iter()
                            .skip(1)
                            .map(|group| {
                                group.map_or_else(String::new, |group| group.as_str().to_owned())
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                let parameters = transformation.parameters();
                if captures.len() != parameters.len() {
                    return Err(ConversionError::CaptureCount {
                        method: method.to_owned(),
                        expected: parameters.len(),
                        actual: captures.len(),
                    });
                }
                let mut converted = Vec::with_capacity(captures.len());
                for (capture, parameter) in captures.into_iter().zip(parameters) {
                    converted.push(self.convert(RawArgument::Text(capture), parameter, context).await?);
                }
                converted
            }
            _ => vec![value.to_value()],
        };

        let failed = |message: String| ConversionError::Transformation {
            method: method.to_owned(),
            target: target.name().to_owned(),
            message,
        };
        let outcome = AssertUnwindSafe(
            transformation
                .method()
                .invoke(context.clone(), Arguments::new(arguments)),
        )
        .catch_unwind()
        .await;
        let result = match outcome {
            Ok(Ok(Some(result))) => result,
            Ok(Ok(None)) => return Err(failed("returned no value".into())),
            Ok(Err(failure)) => return Err(failed(failure.to_string())),
            Err(payload) => return Err(failed(panic_message(payload.as_ref()))),
        };
        if Any::type_id(&*result) == target.id() {
            Ok(result)
        } else {
            Err(failed(format!("returned a value that is not a {}", target.name())))
        }
    }
}

impl std::fmt::Debug for StepArgumentTypeConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepArgumentTypeConverter")
            .field("transformations", &self.catalog.step_transformations().len())
            .finish_non_exhaustive()
    }
}

fn is_eligible(transformation: &StepTransformation, value: &RawArgument, target: &BindingType) -> bool {
    if transformation.return_type() != target {
        return false;
    }
    match (transformation.regex(), value) {
        (Some(regex), RawArgument::Text(text)) => regex.is_match(text),
        _ => true,
    }
}

fn retrieve_uuid(text: &str, target: &BindingType) -> Result<Uuid, ConversionError> {
    Uuid::parse_str(text.trim()).map_err(|err| ConversionError::InvalidValue {
        value: text.to_owned(),
        target: target.name().to_owned(),
        reason: err.to_string(),
    })
}

fn convert_simple(
    target: &BindingType,
    value: &RawArgument,
    culture: &LanguageIdentifier,
) -> Result<ArgValue, ConversionError> {
    let RawArgument::Text(text) = value else {
        return Err(ConversionError::Unsupported {
            value: value.to_string(),
            target: target.name().to_owned(),
        });
    };
    if target.is_enum() {
        return target
            .parse_enum(text)
            .ok_or_else(|| ConversionError::InvalidValue {
                value: text.clone(),
                target: target.name().to_owned(),
                reason: "no variant has this name".into(),
            });
    }
    if target.is::<Option<Uuid>>() {
        if text.is_empty() {
            return Ok(Box::new(None::<Uuid>));
        }
        return retrieve_uuid(text, target).map(|id| Box::new(Some(id)) as ArgValue);
    }
    if target.is::<Uuid>() {
        return retrieve_uuid(text, target).map(|id| Box::new(id) as ArgValue);
    }
    culture::parse_primitive(target, text, culture)
}
