//! Request-scoped identity and role capabilities.
//!
//! The authentication collaborator supplies an [`Actor`] with every call. The
//! engine keeps no session state. Each workflow operation accepts only the
//! capability type it needs, and capabilities can only be obtained from an
//! actor whose role grants them, so role checks happen once at the boundary.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::Role;
use crate::errors::WorkflowError;

/// Authenticated caller of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

/// Implemented by every capability so events can record who acted.
pub trait Capability {
    fn actor_id(&self) -> &str;
}

macro_rules! capability {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            id: String,
        }

        impl $name {
            #[must_use]
            pub fn id(&self) -> &str {
                &self.id
            }
        }

        impl Capability for $name {
            fn actor_id(&self) -> &str {
                &self.id
            }
        }
    };
}

capability!(
    /// Semester, ledger and grading administration. Admins and moderators.
    Administrator
);
capability!(
    /// Publishes topics, decides applications, assigns theses. Teachers.
    Supervisor
);
capability!(
    /// Grades works under a grader role. Teachers.
    Grader
);
capability!(
    /// Applies to topics, cancels applications, submits work. Students.
    Student
);

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    /// # Errors
    ///
    /// `Unauthorized` unless the actor is an admin or moderator.
    pub fn administrator(&self) -> Result<Administrator, WorkflowError> {
        match self.role {
            Role::Admin | Role::Moderator => Ok(Administrator {
                id: self.id.clone(),
            }),
            Role::Teacher | Role::Student => Err(self.denied("administer")),
        }
    }

    /// # Errors
    ///
    /// `Unauthorized` unless the actor is a teacher.
    pub fn supervisor(&self) -> Result<Supervisor, WorkflowError> {
        match self.role {
            Role::Teacher => Ok(Supervisor {
                id: self.id.clone(),
            }),
            Role::Admin | Role::Moderator | Role::Student => Err(self.denied("supervise")),
        }
    }

    /// # Errors
    ///
    /// `Unauthorized` unless the actor is a teacher.
    pub fn grader(&self) -> Result<Grader, WorkflowError> {
        match self.role {
            Role::Teacher => Ok(Grader {
                id: self.id.clone(),
            }),
            Role::Admin | Role::Moderator | Role::Student => Err(self.denied("grade")),
        }
    }

    /// # Errors
    ///
    /// `Unauthorized` unless the actor is a student.
    pub fn student(&self) -> Result<Student, WorkflowError> {
        match self.role {
            Role::Student => Ok(Student {
                id: self.id.clone(),
            }),
            Role::Admin | Role::Moderator | Role::Teacher => Err(self.denied("act as student")),
        }
    }

    fn denied(&self, action: &str) -> WorkflowError {
        WorkflowError::unauthorized(&self.id, format!("{action} as {}", self.role))
    }
}

impl Capability for Actor {
    fn actor_id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn teacher_gets_supervisor_and_grader() {
        let actor = Actor::new("tch-1", Role::Teacher);
        assert_eq!(actor.supervisor().unwrap().id(), "tch-1");
        assert_eq!(actor.grader().unwrap().actor_id(), "tch-1");
        assert_eq!(
            actor.student().unwrap_err().kind(),
            ErrorKind::Unauthorized
        );
    }

    #[test]
    fn moderator_administers_but_cannot_supervise() {
        let actor = Actor::new("mod-1", Role::Moderator);
        assert!(actor.administrator().is_ok());
        assert_eq!(
            actor.supervisor().unwrap_err().kind(),
            ErrorKind::Unauthorized
        );
    }

    #[test]
    fn student_is_only_a_student() {
        let actor = Actor::new("stu-1", Role::Student);
        assert!(actor.student().is_ok());
        assert!(actor.administrator().is_err());
        assert!(actor.grader().is_err());
    }
}
