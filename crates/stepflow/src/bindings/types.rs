//! Runtime descriptions of binding parameter and return types.

use std::any::TypeId;
use std::fmt;

use super::ArgValue;

type EnumParser = fn(&str) -> Option<ArgValue>;

/// A fieldless enum whose variants can be named in step text.
///
/// Implement it with [`step_enum!`](crate::step_enum) rather than by hand.
pub trait StepEnum: Sized + Send + Sync + 'static {
    /// Variant names in declaration order.
    const VARIANTS: &'static [&'static str];

    /// Construct the variant at `index` in [`Self::VARIANTS`].
    fn from_variant(index: usize) -> Option<Self>;
}

/// Implement [`StepEnum`] for a fieldless enum.
///
/// # Examples
///
/// ```
/// use stepflow::{step_enum, StepEnum};
///
/// #[derive(Debug, PartialEq)]
/// enum Weekday { Monday, Tuesday }
/// step_enum!(Weekday { Monday, Tuesday });
///
/// assert_eq!(Weekday::VARIANTS, ["Monday", "Tuesday"]);
/// assert_eq!(Weekday::from_variant(1), Some(Weekday::Tuesday));
/// ```
#[macro_export]
macro_rules! step_enum {
    ($ty:ident { $($variant:ident),+ $(,)? }) => {
        impl $crate::StepEnum for $ty {
            const VARIANTS: &'static [&'static str] = &[$(stringify!($variant)),+];

            fn from_variant(index: usize) -> ::core::option::Option<Self> {
                [$($ty::$variant),+].into_iter().nth(index)
            }
        }
    };
}

fn parse_enum<E: StepEnum>(value: &str) -> Option<ArgValue> {
    let compact: String = value.chars().filter(|c| *c != ' ').collect();
    E::VARIANTS
        .iter()
        .position(|variant| variant.eq_ignore_ascii_case(&compact))
        .and_then(E::from_variant)
        .map(|variant| Box::new(variant) as ArgValue)
}

/// Type of a binding parameter or of a transformation's result.
///
/// Two binding types are equal when they describe the same Rust type.
#[derive(Clone, Copy)]
pub struct BindingType {
    id: TypeId,
    name: &'static str,
    enum_parser: Option<EnumParser>,
}

impl BindingType {
    /// Describe `T`.
    #[must_use]
    pub fn of<T: Send + Sync + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            enum_parser: None,
        }
    }

    /// Describe an enum whose variants are parsed from step text.
    #[must_use]
    pub fn enumeration<E: StepEnum>() -> Self {
        Self {
            enum_parser: Some(parse_enum::<E>),
            ..Self::of::<E>()
        }
    }

    /// The described type's [`TypeId`].
    #[must_use]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The described type's name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether this describes `T`.
    #[must_use]
    pub fn is<T: 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }

    /// Whether values are parsed from enum variant names.
    #[must_use]
    pub fn is_enum(&self) -> bool {
        self.enum_parser.is_some()
    }

    pub(crate) fn parse_enum(&self, value: &str) -> Option<ArgValue> {
        self.enum_parser.and_then(|parse| parse(value))
    }
}

impl PartialEq for BindingType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for BindingType {}

impl fmt::Debug for BindingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for BindingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum Colour {
        DarkRed,
        Green,
    }
    step_enum!(Colour { DarkRed, Green });

    fn parsed(ty: BindingType, value: &str) -> Option<Colour> {
        ty.parse_enum(value)
            .and_then(|value| value.downcast::<Colour>().ok())
            .map(|boxed| *boxed)
    }

    #[test]
    fn enum_parsing_ignores_case_and_spaces() {
        let ty = BindingType::enumeration::<Colour>();
        assert_eq!(parsed(ty, "dark red"), Some(Colour::DarkRed));
        assert_eq!(parsed(ty, "GREEN"), Some(Colour::Green));
        assert_eq!(parsed(ty, "blue"), None);
    }

    #[test]
    fn equality_follows_the_rust_type() {
        assert_eq!(BindingType::of::<Colour>(), BindingType::enumeration::<Colour>());
        assert_ne!(BindingType::of::<u8>(), BindingType::of::<u16>());
        assert!(BindingType::of::<String>().is::<String>());
        assert!(!BindingType::of::<Colour>().is_enum());
        assert!(BindingType::of::<Colour>().parse_enum("green").is_none());
    }
}
