//! Name-collision rules for template names.
//!
//! The suffix grammar `-V<digits>` is produced exclusively by the approve
//! step, so user-chosen names must never claim it, directly or indirectly.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde::Serialize;

use crate::entity::app_template;
use crate::error::Error;

/// Matches a version suffix at the end of a name: literal hyphen,
/// uppercase V, one or more decimal digits. Case-sensitive.
static VERSION_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-V\d+$").expect("hardcoded pattern"));

/// Matches a string that is entirely a version suffix.
static VERSION_SUFFIX_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-V\d+$").expect("hardcoded pattern"));

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CollisionReason {
    NoCollision,
    DirectMatch,
    VersionedTemplateExists,
    VersionSuffixReserved,
}

/// Outcome of a collision check: the first matching rule wins.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Collision {
    pub reason: CollisionReason,
    pub name: String,
    pub suffix: Option<String>,
}

impl Collision {
    fn new(reason: CollisionReason, name: &str, suffix: Option<String>) -> Self {
        Self {
            reason,
            name: name.to_owned(),
            suffix,
        }
    }

    pub fn colliding(&self) -> bool {
        self.reason != CollisionReason::NoCollision
    }
}

impl fmt::Display for Collision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason {
            CollisionReason::NoCollision => {
                write!(f, "No collision for name '{}' found", self.name)
            }
            CollisionReason::DirectMatch => {
                write!(f, "AppTemplate with name '{}' already exists", self.name)
            }
            CollisionReason::VersionedTemplateExists => write!(
                f,
                "A versioned template with this base name '{}' exists",
                self.name
            ),
            CollisionReason::VersionSuffixReserved => write!(
                f,
                "The version suffix '{}' is reserved for approved templates",
                self.suffix.as_deref().unwrap_or_default()
            ),
        }
    }
}

pub fn has_version_suffix(name: &str) -> bool {
    VERSION_SUFFIX.is_match(name)
}

pub fn extract_version_suffix(name: &str) -> Option<&str> {
    VERSION_SUFFIX.find(name).map(|m| m.as_str())
}

/// Check a candidate name against existing non-deleted templates and the
/// reserved suffix grammar. Pure query, no side effects; invoked both on
/// create validation and on the explicit collision-check route.
pub async fn check_name_collision<C: ConnectionTrait>(
    db: &C,
    name: &str,
) -> Result<Collision, Error> {
    // 1. Direct name collision.
    let direct = app_template::Entity::find()
        .filter(app_template::Column::Name.eq(name))
        .filter(app_template::Column::Deleted.eq(false))
        .count(db)
        .await?;
    if direct > 0 {
        return Ok(Collision::new(CollisionReason::DirectMatch, name, None));
    }

    // 2. The candidate itself claims the reserved suffix space.
    if let Some(suffix) = extract_version_suffix(name) {
        return Ok(Collision::new(
            CollisionReason::VersionSuffixReserved,
            name,
            Some(suffix.to_owned()),
        ));
    }

    // 3. A versioned sibling exists, so approving this candidate later
    //    would produce a name that is already taken. LIKE narrows to
    //    candidates; `%`/`_` in the base name can only widen that set,
    //    and the exact grammar check happens here.
    let candidates = app_template::Entity::find()
        .filter(app_template::Column::Name.starts_with(format!("{name}-V")))
        .filter(app_template::Column::Deleted.eq(false))
        .all(db)
        .await?;
    let versioned = candidates.iter().any(|t| {
        t.name
            .strip_prefix(name)
            .is_some_and(|rest| VERSION_SUFFIX_ONLY.is_match(rest))
    });
    if versioned {
        return Ok(Collision::new(
            CollisionReason::VersionedTemplateExists,
            name,
            None,
        ));
    }

    Ok(Collision::new(CollisionReason::NoCollision, name, None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
    use uuid::Uuid;

    // ===== suffix grammar =====

    #[test]
    fn suffix_matches_hyphen_v_digits_at_end() {
        assert!(has_version_suffix("Foo-V1"));
        assert!(has_version_suffix("Foo-V42"));
        assert!(has_version_suffix("Foo-V2-V3"));
    }

    #[test]
    fn suffix_is_case_sensitive() {
        assert!(!has_version_suffix("Foo-v1"));
    }

    #[test]
    fn suffix_requires_end_of_string() {
        assert!(!has_version_suffix("Foo-V1x"));
        assert!(!has_version_suffix("Foo-V1 "));
    }

    #[test]
    fn suffix_requires_hyphen_and_digits() {
        assert!(!has_version_suffix("Foo V1"));
        assert!(!has_version_suffix("Foo-V"));
        assert!(!has_version_suffix("FooV1"));
    }

    #[test]
    fn extract_returns_trailing_suffix() {
        assert_eq!(extract_version_suffix("Foo-V7"), Some("-V7"));
        assert_eq!(extract_version_suffix("Foo-V2-V13"), Some("-V13"));
        assert_eq!(extract_version_suffix("Foo"), None);
    }

    // ===== collision check =====

    async fn setup_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        db
    }

    async fn insert_template(db: &DatabaseConnection, name: &str, deleted: bool) {
        let now = Utc::now().naive_utc();
        crate::entity::app_template::ActiveModel {
            id: Set(Uuid::now_v7()),
            name: Set(name.to_owned()),
            description: Set("d".to_owned()),
            short_description: Set(None),
            instantiation_notice: Set(None),
            script: Set(None),
            image_id: Set(Uuid::now_v7()),
            version: Set(1),
            public: Set(false),
            approved: Set(false),
            creator_id: Set(None),
            fixed_ram_gb: Set(1.0),
            fixed_disk_gb: Set(10.0),
            fixed_cores: Set(1.0),
            per_user_ram_gb: Set(0.5),
            per_user_disk_gb: Set(5.0),
            per_user_cores: Set(0.5),
            volume_size_gb: Set(None),
            ssh_user_requested: Set(false),
            deleted: Set(deleted),
            deleted_at: Set(deleted.then_some(now)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn direct_match_wins_first() {
        let db = setup_db().await;
        insert_template(&db, "Collision Template", false).await;

        let result = check_name_collision(&db, "Collision Template").await.unwrap();
        assert!(result.colliding());
        assert_eq!(result.reason, CollisionReason::DirectMatch);
    }

    #[tokio::test]
    async fn soft_deleted_rows_do_not_collide() {
        let db = setup_db().await;
        insert_template(&db, "Gone Template", true).await;

        let result = check_name_collision(&db, "Gone Template").await.unwrap();
        assert!(!result.colliding());
        assert_eq!(result.reason, CollisionReason::NoCollision);
    }

    #[tokio::test]
    async fn version_suffix_reserved_regardless_of_existence() {
        let db = setup_db().await;

        // No "Brand New" template exists, the suffix space is still reserved.
        let result = check_name_collision(&db, "Brand New-V3").await.unwrap();
        assert_eq!(result.reason, CollisionReason::VersionSuffixReserved);
        assert_eq!(result.suffix.as_deref(), Some("-V3"));
    }

    #[tokio::test]
    async fn lowercase_v_is_not_reserved() {
        let db = setup_db().await;

        let result = check_name_collision(&db, "Foo-v1").await.unwrap();
        assert_eq!(result.reason, CollisionReason::NoCollision);
    }

    #[tokio::test]
    async fn versioned_sibling_blocks_base_name() {
        let db = setup_db().await;
        insert_template(&db, "Ubuntu Base-V1", false).await;

        let result = check_name_collision(&db, "Ubuntu Base").await.unwrap();
        assert_eq!(result.reason, CollisionReason::VersionedTemplateExists);
    }

    #[tokio::test]
    async fn prefix_without_exact_suffix_is_no_collision() {
        let db = setup_db().await;
        insert_template(&db, "Ubuntu Base-V1x", false).await;
        insert_template(&db, "Ubuntu Base-Variant", false).await;

        let result = check_name_collision(&db, "Ubuntu Base").await.unwrap();
        assert_eq!(result.reason, CollisionReason::NoCollision);
    }

    #[tokio::test]
    async fn clean_name_reports_no_collision() {
        let db = setup_db().await;
        insert_template(&db, "Other", false).await;

        let result = check_name_collision(&db, "Fresh Name").await.unwrap();
        assert!(!result.colliding());
        assert_eq!(result.to_string(), "No collision for name 'Fresh Name' found");
    }
}
