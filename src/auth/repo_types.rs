use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

/// Account role. Immutable after registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Patient,
    Doctor,
    Admin,
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PATIENT" => Ok(Role::Patient),
            "DOCTOR" => Ok(Role::Doctor),
            "ADMIN" => Ok(Role::Admin),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Patient => "PATIENT",
            Role::Doctor => "DOCTOR",
            Role::Admin => "ADMIN",
        };
        f.write_str(s)
    }
}

/// User record in the database.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // argon2 PHC string, never exposed in JSON
    pub role: Role,
    pub is_active: bool,
    pub is_email_verified: bool,
    pub last_login_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

/// Patient extension record, 1:1 with a PATIENT user.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PatientProfile {
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub date_of_birth: Date,
    pub gender: String,
    pub profile_picture: Option<String>,
    pub created_at: OffsetDateTime,
}

/// Doctor extension record, 1:1 with a DOCTOR user.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DoctorProfile {
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub gender: String,
    pub specialization: String,
    pub qualifications: Vec<String>,
    pub license_number: String,
    pub years_of_experience: i32,
    pub consultation_fee: Decimal,
    pub profile_picture: Option<String>,
    pub created_at: OffsetDateTime,
}

/// Stored profile variant matching the owning user's role.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Profile {
    Patient(PatientProfile),
    Doctor(DoctorProfile),
}

/// Profile payload for registration, selected once at the request boundary
/// and carried through the insert transaction. ADMIN accounts have no
/// profile record.
#[derive(Debug, Clone)]
pub enum NewProfile {
    Patient(NewPatientProfile),
    Doctor(NewDoctorProfile),
    Admin,
}

impl NewProfile {
    pub fn role(&self) -> Role {
        match self {
            NewProfile::Patient(_) => Role::Patient,
            NewProfile::Doctor(_) => Role::Doctor,
            NewProfile::Admin => Role::Admin,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewPatientProfile {
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub date_of_birth: Date,
    pub gender: String,
    pub profile_picture: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewDoctorProfile {
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub gender: String,
    pub specialization: String,
    pub qualifications: Vec<String>,
    pub license_number: String,
    pub years_of_experience: i32,
    pub consultation_fee: Decimal,
    pub profile_picture: Option<String>,
}
