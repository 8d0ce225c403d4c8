use std::fmt;

/// Opaque entity handle (dense index into every component array)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity(usize);

impl Entity {
    pub(crate) const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Raw index into component storage
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl From<Entity> for usize {
    fn from(entity: Entity) -> usize {
        entity.0
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
