//! Business logic services layer

pub mod acl_service;
pub mod identity_service;
pub mod permission_service;

pub use acl_service::AclService;
pub use identity_service::IdentityResolver;
pub use permission_service::PermissionService;
