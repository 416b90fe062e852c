mod arena;
mod handle;

pub(crate) use arena::Arena;
pub use handle::Handle;
