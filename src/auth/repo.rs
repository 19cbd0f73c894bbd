use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::error::AuthError;
use crate::auth::repo_types::{
    DoctorProfile, NewDoctorProfile, NewPatientProfile, NewProfile, PatientProfile, Profile, Role,
    User,
};

const USER_COLUMNS: &str =
    "id, email, password_hash, role, is_active, is_email_verified, last_login_at, created_at";

impl User {
    /// Find a user by email.
    pub async fn find_by_email(db: &PgPool, email: &str) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Find a user by id; the auth gate uses this to re-resolve token claims
    /// against the store.
    pub async fn find_by_id(db: &PgPool, id: Uuid) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Current role straight from the store, for the role gate.
    pub async fn role_of(db: &PgPool, id: Uuid) -> Result<Option<Role>, AuthError> {
        let role = sqlx::query_scalar::<_, Role>("SELECT role FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(role)
    }

    /// Create the user row and its role-matched profile row in one
    /// transaction. A duplicate email that slipped past the pre-check
    /// fails here on the unique index, rolling back both inserts.
    pub async fn create_with_profile(
        db: &PgPool,
        email: &str,
        password_hash: &str,
        profile: &NewProfile,
    ) -> Result<(User, Option<Profile>), AuthError> {
        let mut tx = db.begin().await?;

        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, password_hash, role, is_active, is_email_verified)
             VALUES ($1, $2, $3, TRUE, TRUE)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(email)
        .bind(password_hash)
        .bind(profile.role())
        .fetch_one(&mut *tx)
        .await?;

        let created = match profile {
            NewProfile::Patient(p) => {
                Some(Profile::Patient(insert_patient(&mut tx, user.id, p).await?))
            }
            NewProfile::Doctor(d) => {
                Some(Profile::Doctor(insert_doctor(&mut tx, user.id, d).await?))
            }
            NewProfile::Admin => None,
        };

        tx.commit().await?;
        Ok((user, created))
    }

    /// Best-effort timestamp bump after a successful login.
    pub async fn update_last_login(db: &PgPool, id: Uuid) -> Result<(), AuthError> {
        sqlx::query("UPDATE users SET last_login_at = now() WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn list(db: &PgPool) -> Result<Vec<User>, AuthError> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC"
        ))
        .fetch_all(db)
        .await?;
        Ok(users)
    }
}

async fn insert_patient(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: Uuid,
    p: &NewPatientProfile,
) -> Result<PatientProfile, AuthError> {
    let profile = sqlx::query_as::<_, PatientProfile>(
        "INSERT INTO patient_profiles
             (user_id, first_name, last_name, phone_number, date_of_birth, gender, profile_picture)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING user_id, first_name, last_name, phone_number, date_of_birth, gender,
                   profile_picture, created_at",
    )
    .bind(user_id)
    .bind(&p.first_name)
    .bind(&p.last_name)
    .bind(&p.phone_number)
    .bind(p.date_of_birth)
    .bind(&p.gender)
    .bind(&p.profile_picture)
    .fetch_one(&mut **tx)
    .await?;
    Ok(profile)
}

async fn insert_doctor(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: Uuid,
    d: &NewDoctorProfile,
) -> Result<DoctorProfile, AuthError> {
    let profile = sqlx::query_as::<_, DoctorProfile>(
        "INSERT INTO doctor_profiles
             (user_id, first_name, last_name, phone_number, gender, specialization,
              qualifications, license_number, years_of_experience, consultation_fee,
              profile_picture)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
         RETURNING user_id, first_name, last_name, phone_number, gender, specialization,
                   qualifications, license_number, years_of_experience, consultation_fee,
                   profile_picture, created_at",
    )
    .bind(user_id)
    .bind(&d.first_name)
    .bind(&d.last_name)
    .bind(&d.phone_number)
    .bind(&d.gender)
    .bind(&d.specialization)
    .bind(&d.qualifications)
    .bind(&d.license_number)
    .bind(d.years_of_experience)
    .bind(d.consultation_fee)
    .bind(&d.profile_picture)
    .fetch_one(&mut **tx)
    .await?;
    Ok(profile)
}

impl Profile {
    /// Load the profile variant matching the user's role. ADMIN users have
    /// none by design.
    pub async fn find_for_user(
        db: &PgPool,
        role: Role,
        user_id: Uuid,
    ) -> Result<Option<Profile>, AuthError> {
        match role {
            Role::Patient => {
                let profile = sqlx::query_as::<_, PatientProfile>(
                    "SELECT user_id, first_name, last_name, phone_number, date_of_birth, gender,
                            profile_picture, created_at
                     FROM patient_profiles WHERE user_id = $1",
                )
                .bind(user_id)
                .fetch_optional(db)
                .await?;
                Ok(profile.map(Profile::Patient))
            }
            Role::Doctor => {
                let profile = sqlx::query_as::<_, DoctorProfile>(
                    "SELECT user_id, first_name, last_name, phone_number, gender, specialization,
                            qualifications, license_number, years_of_experience, consultation_fee,
                            profile_picture, created_at
                     FROM doctor_profiles WHERE user_id = $1",
                )
                .bind(user_id)
                .fetch_optional(db)
                .await?;
                Ok(profile.map(Profile::Doctor))
            }
            Role::Admin => Ok(None),
        }
    }
}
