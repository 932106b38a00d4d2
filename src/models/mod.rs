pub mod access_control_list;
pub mod department;
pub mod deployment_plan;
pub mod user;
