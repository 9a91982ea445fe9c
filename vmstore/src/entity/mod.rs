pub mod account_attribute;
pub mod app_template;
pub mod favorite;
pub mod instantiation_attribute;
pub mod role;
pub mod security_group;
pub mod user;
