use std::fmt;
use std::str::FromStr;

use crate::errors::AppError;

/// A single permission flag of a [`CapabilitySet`](crate::models::access_control_list::CapabilitySet).
///
/// The variant name doubles as the policy name guarded fields refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    CanEditUsers,
    CanViewUsers,
    CanEditDepartmentUsers,
    CanViewDepartmentUsers,
    CanEditDepartments,
    CanViewDepartments,
    CanEditOwnDepartment,
    CanViewOwnDepartment,
    CanEditDeploymentPlans,
    CanViewDeploymentPlans,
    CanEditDepartmentDeploymentPlans,
    CanViewDepartmentDeploymentPlans,
    CanEditExternalNews,
    CanViewExternalNews,
    CanEditInternalNews,
    CanViewInternalNews,
    CanEditEducationalContent,
    CanViewEducationalContent,
    CanEditAppointments,
    CanViewAppointments,
}

impl Capability {
    pub const ALL: &'static [Capability] = &[
        Capability::CanEditUsers,
        Capability::CanViewUsers,
        Capability::CanEditDepartmentUsers,
        Capability::CanViewDepartmentUsers,
        Capability::CanEditDepartments,
        Capability::CanViewDepartments,
        Capability::CanEditOwnDepartment,
        Capability::CanViewOwnDepartment,
        Capability::CanEditDeploymentPlans,
        Capability::CanViewDeploymentPlans,
        Capability::CanEditDepartmentDeploymentPlans,
        Capability::CanViewDepartmentDeploymentPlans,
        Capability::CanEditExternalNews,
        Capability::CanViewExternalNews,
        Capability::CanEditInternalNews,
        Capability::CanViewInternalNews,
        Capability::CanEditEducationalContent,
        Capability::CanViewEducationalContent,
        Capability::CanEditAppointments,
        Capability::CanViewAppointments,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Capability::CanEditUsers => "CanEditUsers",
            Capability::CanViewUsers => "CanViewUsers",
            Capability::CanEditDepartmentUsers => "CanEditDepartmentUsers",
            Capability::CanViewDepartmentUsers => "CanViewDepartmentUsers",
            Capability::CanEditDepartments => "CanEditDepartments",
            Capability::CanViewDepartments => "CanViewDepartments",
            Capability::CanEditOwnDepartment => "CanEditOwnDepartment",
            Capability::CanViewOwnDepartment => "CanViewOwnDepartment",
            Capability::CanEditDeploymentPlans => "CanEditDeploymentPlans",
            Capability::CanViewDeploymentPlans => "CanViewDeploymentPlans",
            Capability::CanEditDepartmentDeploymentPlans => "CanEditDepartmentDeploymentPlans",
            Capability::CanViewDepartmentDeploymentPlans => "CanViewDepartmentDeploymentPlans",
            Capability::CanEditExternalNews => "CanEditExternalNews",
            Capability::CanViewExternalNews => "CanViewExternalNews",
            Capability::CanEditInternalNews => "CanEditInternalNews",
            Capability::CanViewInternalNews => "CanViewInternalNews",
            Capability::CanEditEducationalContent => "CanEditEducationalContent",
            Capability::CanViewEducationalContent => "CanViewEducationalContent",
            Capability::CanEditAppointments => "CanEditAppointments",
            Capability::CanViewAppointments => "CanViewAppointments",
        }
    }

    /// The capability granting the same action across every department, for
    /// capabilities limited to the acting user's own department.
    pub fn escalation(&self) -> Option<Capability> {
        match self {
            Capability::CanEditDepartmentUsers => Some(Capability::CanEditUsers),
            Capability::CanViewDepartmentUsers => Some(Capability::CanViewUsers),
            Capability::CanEditOwnDepartment => Some(Capability::CanEditDepartments),
            Capability::CanViewOwnDepartment => Some(Capability::CanViewDepartments),
            Capability::CanEditDepartmentDeploymentPlans => Some(Capability::CanEditDeploymentPlans),
            Capability::CanViewDepartmentDeploymentPlans => Some(Capability::CanViewDeploymentPlans),
            _ => None,
        }
    }

    pub fn is_department_scoped(&self) -> bool {
        self.escalation().is_some()
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Capability {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Capability::ALL
            .iter()
            .copied()
            .find(|c| c.name() == s)
            .ok_or_else(|| AppError::configuration(format!("unknown capability: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_name_parses_back() {
        for capability in Capability::ALL {
            assert_eq!(capability.name().parse::<Capability>().unwrap(), *capability);
        }
        assert_eq!(Capability::ALL.len(), 20);
    }

    #[test]
    fn unknown_name_is_a_configuration_error() {
        let err = "CanLaunchRockets".parse::<Capability>().unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }

    #[test]
    fn escalations_are_global_capabilities() {
        for capability in Capability::ALL {
            if let Some(escalation) = capability.escalation() {
                assert!(!escalation.is_department_scoped(), "{capability} escalates to a scoped capability");
            }
        }
        assert_eq!(Capability::CanViewDepartmentUsers.escalation(), Some(Capability::CanViewUsers));
        assert_eq!(Capability::CanViewExternalNews.escalation(), None);
    }
}
