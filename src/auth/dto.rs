use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use time::macros::format_description;
use time::Date;
use uuid::Uuid;

use crate::auth::error::AuthError;
use crate::auth::repo_types::{
    NewDoctorProfile, NewPatientProfile, NewProfile, Profile, Role, User,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Registration body. The wire format is the flat camelCase object of the
/// client API; every field is optional here so that presence is checked at
/// the boundary instead of surfacing as a deserialization failure.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    // Common profile fields
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub gender: Option<String>,
    // Patient specific
    pub date_of_birth: Option<String>,
    // Doctor specific
    pub specialization: Option<String>,
    #[serde(default, deserialize_with = "string_or_seq")]
    pub qualifications: Option<Vec<String>>,
    pub license_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_i32")]
    pub years_of_experience: Option<i32>,
    pub consultation_fee: Option<Decimal>,
    // Stored-file reference supplied by the upload collaborator
    pub profile_picture: Option<String>,
}

/// Validated registration payload: credentials plus the profile variant
/// selected once from the role field.
#[derive(Debug)]
pub struct NewAccount {
    pub email: String,
    pub password: String,
    pub profile: NewProfile,
}

impl RegisterRequest {
    pub fn into_new_account(self) -> Result<NewAccount, AuthError> {
        let RegisterRequest {
            email,
            password,
            role,
            first_name,
            last_name,
            phone_number,
            gender,
            date_of_birth,
            specialization,
            qualifications,
            license_number,
            years_of_experience,
            consultation_fee,
            profile_picture,
        } = self;

        let email = email.map(|e| e.trim().to_lowercase()).filter(|e| !e.is_empty());
        let password = password.filter(|p| !p.is_empty());
        let role = role.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
        let (email, password, role) = match (email, password, role) {
            (Some(e), Some(p), Some(r)) => (e, p, r),
            _ => {
                return Err(AuthError::Validation(
                    "Email, password and role are required".into(),
                ))
            }
        };

        if !is_valid_email(&email) {
            return Err(AuthError::Validation("Invalid email".into()));
        }
        let role: Role = role.parse().map_err(AuthError::Validation)?;

        let profile = match role {
            Role::Patient => NewProfile::Patient(NewPatientProfile {
                first_name: require(first_name, "firstName")?,
                last_name: require(last_name, "lastName")?,
                phone_number: require(phone_number, "phoneNumber")?,
                date_of_birth: parse_date(&require(date_of_birth, "dateOfBirth")?)?,
                gender: require(gender, "gender")?,
                profile_picture,
            }),
            Role::Doctor => {
                let years = years_of_experience
                    .ok_or_else(|| missing("yearsOfExperience"))?;
                if years < 0 {
                    return Err(AuthError::Validation(
                        "yearsOfExperience must be non-negative".into(),
                    ));
                }
                let fee = consultation_fee.ok_or_else(|| missing("consultationFee"))?;
                if fee < Decimal::ZERO {
                    return Err(AuthError::Validation(
                        "consultationFee must be non-negative".into(),
                    ));
                }
                NewProfile::Doctor(NewDoctorProfile {
                    first_name: require(first_name, "firstName")?,
                    last_name: require(last_name, "lastName")?,
                    phone_number: require(phone_number, "phoneNumber")?,
                    gender: require(gender, "gender")?,
                    specialization: require(specialization, "specialization")?,
                    qualifications: qualifications.unwrap_or_default(),
                    license_number: require(license_number, "licenseNumber")?,
                    years_of_experience: years,
                    consultation_fee: fee,
                    profile_picture,
                })
            }
            Role::Admin => NewProfile::Admin,
        };

        Ok(NewAccount {
            email,
            password,
            profile,
        })
    }
}

fn require(value: Option<String>, field: &str) -> Result<String, AuthError> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| missing(field))
}

fn missing(field: &str) -> AuthError {
    AuthError::Validation(format!("{field} is required"))
}

fn parse_date(value: &str) -> Result<Date, AuthError> {
    let format = format_description!("[year]-[month]-[day]");
    Date::parse(value, format).map_err(|_| {
        AuthError::Validation(format!("Invalid dateOfBirth '{value}', expected YYYY-MM-DD"))
    })
}

/// Accept a single string or a list of strings, normalized to a list.
fn string_or_seq<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }
    Ok(Option::<OneOrMany>::deserialize(deserializer)?.map(|v| match v {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
    }))
}

/// Accept an integer given as a JSON number or a numeric string.
fn lenient_i32<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IntOrString {
        Int(i64),
        Str(String),
    }
    match Option::<IntOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(IntOrString::Int(i)) => i32::try_from(i)
            .map(Some)
            .map_err(serde::de::Error::custom),
        Some(IntOrString::Str(s)) => s
            .trim()
            .parse::<i32>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
        }
    }
}

/// Public user with the role-matched profile embedded.
#[derive(Debug, Serialize)]
pub struct UserWithProfile {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub profile: Option<Profile>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: String,
    pub user: PublicUser,
    pub profile: Option<Profile>,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub user: UserWithProfile,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub users: Vec<PublicUser>,
}
