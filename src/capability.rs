//! Host capabilities that may or may not exist at runtime.
//!
//! Speech synthesis and recognition are feature-detected once at startup and
//! handed to the components that use them as a [`Capability`].  Components
//! degrade instead of failing when a capability is [`Capability::Unavailable`].

/// A host facility that is either present or not.
#[derive(Debug, Clone)]
pub enum Capability<T> {
    Available(T),
    Unavailable,
}

impl<T> Capability<T> {
    pub fn is_available(&self) -> bool {
        matches!(self, Capability::Available(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Capability<U> {
        match self {
            Capability::Available(inner) => Capability::Available(f(inner)),
            Capability::Unavailable => Capability::Unavailable,
        }
    }
}
