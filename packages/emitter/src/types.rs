use smallvec::SmallVec;

use crate::{Error, Result};

/// The distinguished event type that matches every concrete event type.
///
/// Handlers registered for the wildcard fire whenever any concrete type is emitted.
/// The wildcard itself can never be emitted directly.
pub const WILDCARD: &str = "*";

/// Most registrations name one or two types, which fit inline without allocating.
type TypeList = SmallVec<[String; 2]>;

/// The event types that a caller passes to a registration, emission or removal.
///
/// This is unvalidated caller input. It can be built from a single type, from any
/// collection of types or be empty (see [`EventTypes::none()`]), which each operation
/// interprets in its own way:
///
/// * Registering with no types registers a wildcard handler.
/// * Emitting no types does nothing.
/// * Removing with no types ignores the type of the registered handlers.
///
/// # Example
///
/// ```
/// use emitter::EventTypes;
///
/// let single = EventTypes::from("gnarly");
/// let several = EventTypes::from(["gnarly", "rad"]);
///
/// assert_eq!(single.len(), 1);
/// assert_eq!(several.len(), 2);
/// assert!(EventTypes::none().is_empty());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventTypes {
    types: TypeList,
}

impl EventTypes {
    /// Creates an empty set of event types, the "no types given" value.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Whether no event types were given.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// The number of event types given, counting duplicates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Iterates over the event types in the order they were given.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.types.iter().map(String::as_str)
    }

    /// Whether the wildcard marker is one of the given types.
    #[must_use]
    pub fn contains_wildcard(&self) -> bool {
        self.iter().any(|t| t == WILDCARD)
    }
}

impl From<&str> for EventTypes {
    fn from(value: &str) -> Self {
        Self {
            types: smallvec::smallvec![value.to_string()],
        }
    }
}

impl From<String> for EventTypes {
    fn from(value: String) -> Self {
        Self {
            types: smallvec::smallvec![value],
        }
    }
}

impl From<&String> for EventTypes {
    fn from(value: &String) -> Self {
        Self::from(value.as_str())
    }
}

impl<const N: usize> From<[&str; N]> for EventTypes {
    fn from(value: [&str; N]) -> Self {
        value.into_iter().collect()
    }
}

impl From<&[&str]> for EventTypes {
    fn from(value: &[&str]) -> Self {
        value.iter().copied().collect()
    }
}

impl From<Vec<&str>> for EventTypes {
    fn from(value: Vec<&str>) -> Self {
        value.into_iter().collect()
    }
}

impl From<Vec<String>> for EventTypes {
    fn from(value: Vec<String>) -> Self {
        Self {
            types: TypeList::from_vec(value),
        }
    }
}

impl<T> From<Option<T>> for EventTypes
where
    T: Into<Self>,
{
    fn from(value: Option<T>) -> Self {
        value.map_or_else(Self::none, Into::into)
    }
}

impl<'a> FromIterator<&'a str> for EventTypes {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self {
            types: iter.into_iter().map(str::to_string).collect(),
        }
    }
}

impl FromIterator<String> for EventTypes {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            types: iter.into_iter().collect(),
        }
    }
}

/// The normalized set of event types that a registered handler matches.
///
/// A set is either the wildcard or a non-empty list of distinct concrete types in
/// registration order. A mix of the two cannot be represented.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum TypeSet {
    /// Matches every concrete event type.
    Wildcard,

    /// Matches exactly the listed concrete event types.
    Concrete(SmallVec<[String; 2]>),
}

impl TypeSet {
    /// Normalizes caller input into a set of types.
    ///
    /// Empty input and a lone wildcard marker both normalize to [`TypeSet::Wildcard`].
    /// Duplicate concrete types are dropped, keeping the first occurrence.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidWildcardCombination`] if the wildcard marker is given
    /// together with any concrete type.
    pub fn new(types: impl Into<EventTypes>) -> Result<Self> {
        let types = types.into();

        if types.is_empty() {
            return Ok(Self::Wildcard);
        }

        if types.contains_wildcard() {
            if types.iter().all(|t| t == WILDCARD) {
                return Ok(Self::Wildcard);
            }

            return Err(Error::InvalidWildcardCombination {
                types: types.iter().map(str::to_string).collect(),
            });
        }

        let mut concrete = TypeList::new();

        for event_type in types.types {
            if !concrete.contains(&event_type) {
                concrete.push(event_type);
            }
        }

        Ok(Self::Concrete(concrete))
    }

    /// Whether this is the wildcard set.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::Wildcard)
    }

    /// Whether a handler registered for this set should fire for `event_type`.
    #[must_use]
    pub fn matches(&self, event_type: &str) -> bool {
        match self {
            Self::Wildcard => true,
            Self::Concrete(types) => types.iter().any(|t| t == event_type),
        }
    }

    /// Whether this set literally contains `event_type`.
    ///
    /// Unlike [`matches()`][Self::matches], the wildcard set only contains the wildcard
    /// marker itself and not every concrete type.
    #[must_use]
    pub fn contains(&self, event_type: &str) -> bool {
        match self {
            Self::Wildcard => event_type == WILDCARD,
            Self::Concrete(types) => types.iter().any(|t| t == event_type),
        }
    }

    /// Whether any of the given types is literally contained in this set.
    #[must_use]
    pub fn overlaps(&self, types: &EventTypes) -> bool {
        types.iter().any(|t| self.contains(t))
    }

    /// Iterates over the types in the set. The wildcard set yields the wildcard marker.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let (wildcard, concrete) = match self {
            Self::Wildcard => (Some(WILDCARD), &[][..]),
            Self::Concrete(types) => (None, types.as_slice()),
        };

        wildcard.into_iter().chain(concrete.iter().map(String::as_str))
    }
}
