pub mod policy;
pub mod record;

pub use policy::*;
pub use record::*;
