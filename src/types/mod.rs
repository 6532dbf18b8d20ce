// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Uses phantom types to prevent provider ID confusion at compile time.

mod id;
mod image_ref;
mod resource_name;

pub use id::{Arn, Id, RegistryId, SecurityGroupId, SubnetId, VpcId};
pub use image_ref::{ImageRef, ParseImageRefError};
pub use resource_name::{ResourceName, ResourceNameError};
