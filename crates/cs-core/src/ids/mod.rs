//! ID type wrappers for type safety.

mod device_id;
mod entry_id;
mod id_macro;

pub use device_id::DeviceId;
pub use entry_id::EntryId;
