mod acl;
mod permissions;
mod process;
mod registration;

pub use acl::{AccessRights, AclEntry, AclSpecification, ParseAclError};
pub use permissions::{EffectivePermissions, ElevationState};
pub use process::ProcessRecord;
pub use registration::{RegistrationEntry, RegistrationKind, RegistryHive};
