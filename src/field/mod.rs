//! Grid fields: padded 3D storage, halo exchange and expression assignment.

pub mod bare_field;
pub mod expr;
pub mod field;
pub mod halo;
pub mod view;

pub use bare_field::BareField;
pub use expr::{from_fn, FieldExpr};
pub use field::Field;
pub use halo::{FieldBufferData, HaloCells};
pub use view::View3;

/// Element types storable in a field: fixed layout for the wire, cheap to
/// copy, zero-initializable, shareable across kernel threads.
pub trait GridScalar: bytemuck::Pod + Default + Send + Sync + 'static {}
impl<T: bytemuck::Pod + Default + Send + Sync + 'static> GridScalar for T {}
