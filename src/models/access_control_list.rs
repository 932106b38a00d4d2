use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::authz::Capability;

/// Per-user capability flags, one row per user in `access_control_lists`.
///
/// Flags are independent and compose additively. A fresh set grants nothing
/// except viewing external news.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct CapabilitySet {
    pub user_id: i64,
    pub can_edit_users: bool,
    pub can_view_users: bool,
    pub can_edit_department_users: bool,
    pub can_view_department_users: bool,
    pub can_edit_departments: bool,
    pub can_view_departments: bool,
    pub can_edit_own_department: bool,
    pub can_view_own_department: bool,
    pub can_edit_deployment_plans: bool,
    pub can_view_deployment_plans: bool,
    pub can_edit_department_deployment_plans: bool,
    pub can_view_department_deployment_plans: bool,
    pub can_edit_external_news: bool,
    pub can_view_external_news: bool,
    pub can_edit_internal_news: bool,
    pub can_view_internal_news: bool,
    pub can_edit_educational_content: bool,
    pub can_view_educational_content: bool,
    pub can_edit_appointments: bool,
    pub can_view_appointments: bool,
}

impl CapabilitySet {
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            can_edit_users: false,
            can_view_users: false,
            can_edit_department_users: false,
            can_view_department_users: false,
            can_edit_departments: false,
            can_view_departments: false,
            can_edit_own_department: false,
            can_view_own_department: false,
            can_edit_deployment_plans: false,
            can_view_deployment_plans: false,
            can_edit_department_deployment_plans: false,
            can_view_department_deployment_plans: false,
            can_edit_external_news: false,
            can_view_external_news: true,
            can_edit_internal_news: false,
            can_view_internal_news: false,
            can_edit_educational_content: false,
            can_view_educational_content: false,
            can_edit_appointments: false,
            can_view_appointments: false,
        }
    }

    pub fn with(mut self, capability: Capability) -> Self {
        self.set(capability, true);
        self
    }

    pub fn get(&self, capability: Capability) -> bool {
        *self.flag(capability)
    }

    pub fn set(&mut self, capability: Capability, value: bool) {
        *self.flag_mut(capability) = value;
    }

    /// Capabilities currently granted, in declaration order.
    pub fn granted(&self) -> Vec<Capability> {
        Capability::ALL.iter().copied().filter(|c| self.get(*c)).collect()
    }

    fn flag(&self, capability: Capability) -> &bool {
        match capability {
            Capability::CanEditUsers => &self.can_edit_users,
            Capability::CanViewUsers => &self.can_view_users,
            Capability::CanEditDepartmentUsers => &self.can_edit_department_users,
            Capability::CanViewDepartmentUsers => &self.can_view_department_users,
            Capability::CanEditDepartments => &self.can_edit_departments,
            Capability::CanViewDepartments => &self.can_view_departments,
            Capability::CanEditOwnDepartment => &self.can_edit_own_department,
            Capability::CanViewOwnDepartment => &self.can_view_own_department,
            Capability::CanEditDeploymentPlans => &self.can_edit_deployment_plans,
            Capability::CanViewDeploymentPlans => &self.can_view_deployment_plans,
            Capability::CanEditDepartmentDeploymentPlans => &self.can_edit_department_deployment_plans,
            Capability::CanViewDepartmentDeploymentPlans => &self.can_view_department_deployment_plans,
            Capability::CanEditExternalNews => &self.can_edit_external_news,
            Capability::CanViewExternalNews => &self.can_view_external_news,
            Capability::CanEditInternalNews => &self.can_edit_internal_news,
            Capability::CanViewInternalNews => &self.can_view_internal_news,
            Capability::CanEditEducationalContent => &self.can_edit_educational_content,
            Capability::CanViewEducationalContent => &self.can_view_educational_content,
            Capability::CanEditAppointments => &self.can_edit_appointments,
            Capability::CanViewAppointments => &self.can_view_appointments,
        }
    }

    fn flag_mut(&mut self, capability: Capability) -> &mut bool {
        match capability {
            Capability::CanEditUsers => &mut self.can_edit_users,
            Capability::CanViewUsers => &mut self.can_view_users,
            Capability::CanEditDepartmentUsers => &mut self.can_edit_department_users,
            Capability::CanViewDepartmentUsers => &mut self.can_view_department_users,
            Capability::CanEditDepartments => &mut self.can_edit_departments,
            Capability::CanViewDepartments => &mut self.can_view_departments,
            Capability::CanEditOwnDepartment => &mut self.can_edit_own_department,
            Capability::CanViewOwnDepartment => &mut self.can_view_own_department,
            Capability::CanEditDeploymentPlans => &mut self.can_edit_deployment_plans,
            Capability::CanViewDeploymentPlans => &mut self.can_view_deployment_plans,
            Capability::CanEditDepartmentDeploymentPlans => &mut self.can_edit_department_deployment_plans,
            Capability::CanViewDepartmentDeploymentPlans => &mut self.can_view_department_deployment_plans,
            Capability::CanEditExternalNews => &mut self.can_edit_external_news,
            Capability::CanViewExternalNews => &mut self.can_view_external_news,
            Capability::CanEditInternalNews => &mut self.can_edit_internal_news,
            Capability::CanViewInternalNews => &mut self.can_view_internal_news,
            Capability::CanEditEducationalContent => &mut self.can_edit_educational_content,
            Capability::CanViewEducationalContent => &mut self.can_view_educational_content,
            Capability::CanEditAppointments => &mut self.can_edit_appointments,
            Capability::CanViewAppointments => &mut self.can_view_appointments,
        }
    }
}
