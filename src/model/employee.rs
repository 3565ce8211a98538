use serde::Serialize;

use super::role::Role;

/// Full `tootaja` row; `pass` never leaves the service.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Employee {
    pub tootaja_id: u64,
    pub nimi: String,
    pub perekonnanimi: String,
    pub kood: String,
    pub tel: Option<String>,
    pub aadres: Option<String>,
    pub role_id: u8,
    #[serde(skip_serializing)]
    pub pass: String,
}

impl Employee {
    pub fn role(&self) -> Option<Role> {
        Role::from_id(self.role_id)
    }
}

#[derive(Debug, Clone)]
pub struct NewEmployee {
    pub nimi: String,
    pub perekonnanimi: String,
    pub kood: String,
    pub tel: Option<String>,
    pub aadres: Option<String>,
    pub role_id: u8,
    pub pass: String,
}
