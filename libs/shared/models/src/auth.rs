use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Patient,
    Admin,
}

/// The authenticated party performing an action. Resolved by the web layer;
/// the core only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub role: UserRole,
}

impl Actor {
    pub fn patient(id: Uuid) -> Self {
        Self { id, role: UserRole::Patient }
    }

    pub fn admin(id: Uuid) -> Self {
        Self { id, role: UserRole::Admin }
    }

    pub fn is_staff(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Staff own everything; patients own only their own records.
    pub fn owns(&self, patient_id: Uuid) -> bool {
        self.is_staff() || self.id == patient_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patient_owns_only_itself() {
        let me = Uuid::new_v4();
        let actor = Actor::patient(me);
        assert!(actor.owns(me));
        assert!(!actor.owns(Uuid::new_v4()));
    }

    #[test]
    fn test_admin_owns_everything() {
        let actor = Actor::admin(Uuid::new_v4());
        assert!(actor.is_staff());
        assert!(actor.owns(Uuid::new_v4()));
    }

    #[test]
    fn test_role_serializes_snake_case() {
        let json = serde_json::to_string(&UserRole::Admin).unwrap();
        assert_eq!(json, "\"admin\"");
    }
}
