//! Type definitions for live-ops storage.

mod credentials;
mod events;
mod ids;
mod principals;
mod roles;

pub use credentials::*;
pub use events::*;
pub use ids::*;
pub use principals::*;
pub use roles::*;
