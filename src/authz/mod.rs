//! Authorization core.
//!
//! - [`Capability`] and [`PolicyRegistry`]: named policies bound to capability flags
//! - [`DefaultPolicyEvaluator`]: capability checks against the acting user's set
//! - [`DepartmentScopeResolver`]: department-membership checks on field arguments
//! - [`FieldGuard`]: per-field dispatch over the declarative field table
//! - [`RequestIdentityResolver`]: bearer claims to a validated per-request identity

mod capability;
mod department;
mod evaluator;
mod fields;
mod identity;
mod memory;
mod policy;

pub use capability::Capability;
pub use department::{
    AccessObjectBinding, AccessObjectKind, AccessObjectStore, AccessTarget, BoxedAccessObject, DepartmentScopeResolver,
    DepartmentScoped, IGNORED_ARGUMENT,
};
pub use evaluator::{CurrentUserProvider, Decision, DefaultPolicyEvaluator, PolicyEvaluator};
pub use fields::{FieldGuard, FieldPolicy, FieldPolicyTable, FIELD_POLICIES};
pub use identity::{Identity, IdentitySnapshot, IdentityState, RequestIdentityResolver, ISSUED_AT_CLAIM, USER_ID_CLAIM};
pub use memory::InMemoryDirectory;
pub use policy::{PolicyRegistry, PolicyRequirement};
