//! Wire types for the REST surface.

use sea_orm::prelude::DateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::{account_attribute, app_template, instantiation_attribute, role, security_group, user};
use crate::naming::{Collision, CollisionReason};

// ---------- templates ----------

#[derive(Serialize)]
pub struct TemplateResponse {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub short_description: Option<String>,
    pub instantiation_notice: Option<String>,
    pub script: Option<String>,
    pub image_id: Uuid,
    pub version: i32,
    pub public: bool,
    pub approved: bool,
    pub creator_id: Option<String>,
    pub fixed_ram_gb: f64,
    pub fixed_disk_gb: f64,
    pub fixed_cores: f64,
    pub per_user_ram_gb: f64,
    pub per_user_disk_gb: f64,
    pub per_user_cores: f64,
    pub volume_size_gb: Option<f64>,
    pub ssh_user_requested: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl From<app_template::Model> for TemplateResponse {
    fn from(m: app_template::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            description: m.description,
            short_description: m.short_description,
            instantiation_notice: m.instantiation_notice,
            script: m.script,
            image_id: m.image_id,
            version: m.version,
            public: m.public,
            approved: m.approved,
            creator_id: m.creator_id,
            fixed_ram_gb: m.fixed_ram_gb,
            fixed_disk_gb: m.fixed_disk_gb,
            fixed_cores: m.fixed_cores,
            per_user_ram_gb: m.per_user_ram_gb,
            per_user_disk_gb: m.per_user_disk_gb,
            per_user_cores: m.per_user_cores,
            volume_size_gb: m.volume_size_gb,
            ssh_user_requested: m.ssh_user_requested,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Serialize)]
pub struct AttributeResponse {
    pub id: Uuid,
    pub name: String,
}

impl From<instantiation_attribute::Model> for AttributeResponse {
    fn from(m: instantiation_attribute::Model) -> Self {
        Self { id: m.id, name: m.name }
    }
}

impl From<account_attribute::Model> for AttributeResponse {
    fn from(m: account_attribute::Model) -> Self {
        Self { id: m.id, name: m.name }
    }
}

impl From<security_group::Model> for AttributeResponse {
    fn from(m: security_group::Model) -> Self {
        Self { id: m.id, name: m.name }
    }
}

#[derive(Serialize)]
pub struct TemplateDetailResponse {
    #[serde(flatten)]
    pub template: TemplateResponse,
    pub instantiation_attributes: Vec<AttributeResponse>,
    pub account_attributes: Vec<AttributeResponse>,
    pub security_groups: Vec<AttributeResponse>,
}

#[derive(Serialize)]
pub struct ApproveResponse {
    pub release: TemplateResponse,
    pub draft: TemplateResponse,
}

#[derive(Serialize)]
pub struct CollisionResponse {
    pub name: String,
    pub collisions: bool,
    pub reason: CollisionReason,
    pub detail: String,
}

impl From<Collision> for CollisionResponse {
    fn from(c: Collision) -> Self {
        Self {
            detail: c.to_string(),
            collisions: c.colliding(),
            reason: c.reason,
            name: c.name,
        }
    }
}

// ---------- favorites ----------

#[derive(Deserialize)]
pub struct FavoriteRequest {
    pub app_template_id: Uuid,
}

// ---------- users and roles ----------

#[derive(Serialize)]
pub struct RoleResponse {
    pub id: Uuid,
    pub name: String,
    pub access_level: i32,
}

impl From<role::Model> for RoleResponse {
    fn from(m: role::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            access_level: m.access_level,
        }
    }
}

#[derive(Serialize)]
pub struct UserResponse {
    pub id: String,
    pub role: Option<RoleResponse>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl UserResponse {
    pub fn new(user: user::Model, role: Option<role::Model>) -> Self {
        Self {
            id: user.id,
            role: role.map(RoleResponse::from),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Deserialize)]
pub struct SetRoleRequest {
    pub role_id: Uuid,
}

#[derive(Deserialize)]
pub struct RoleRequest {
    pub name: String,
    pub access_level: i32,
}
