//! Python source building blocks shared by the mapper, translator and emitter.

mod expr;
pub(crate) mod imports;
pub(crate) mod literal;

pub use expr::PyType;
pub use imports::ImportSet;
