//! API-facing descriptors (data) and the identity provider client (behavior).
//!
//! `descriptor` exposes validated metadata ([`ApiDescriptor`]) covering the API base URL,
//! the identity provider's sign-in/refresh/logout routes, and the bearer authorization
//! convention. `identity` wraps those routes in [`IdentityProvider`], which also serves as the
//! default [`RefreshExecutor`](crate::flows::RefreshExecutor).

pub mod descriptor;
pub mod identity;

pub use descriptor::*;
pub use identity::*;
