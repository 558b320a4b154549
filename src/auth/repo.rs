use sqlx::PgPool;

use super::repo_types::{Role, User};

impl User {
    /// Find a user by login identifier (mobile number or email).
    pub async fn find_by_identifier(db: &PgPool, identifier: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, mobile_number, email, password_hash, role, created_at
            FROM users
            WHERE mobile_number = $1 OR email = $1
            "#,
        )
        .bind(identifier)
        .fetch_optional(db)
        .await
    }

    /// Find a user holding either the given mobile number or email.
    pub async fn find_by_mobile_or_email(
        db: &PgPool,
        mobile: &str,
        email: &str,
    ) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, mobile_number, email, password_hash, role, created_at
            FROM users
            WHERE mobile_number = $1 OR email = $2
            "#,
        )
        .bind(mobile)
        .bind(email)
        .fetch_optional(db)
        .await
    }

    pub async fn find_by_email(db: &PgPool, email: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, mobile_number, email, password_hash, role, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await
    }

    pub async fn find_by_id(db: &PgPool, id: i64) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, mobile_number, email, password_hash, role, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
    }

    /// Create a new user; the role always starts as `user`.
    pub async fn create(
        db: &PgPool,
        name: &str,
        mobile: &str,
        email: &str,
        password_hash: &str,
    ) -> sqlx::Result<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, mobile_number, email, password_hash, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, mobile_number, email, password_hash, role, created_at
            "#,
        )
        .bind(name)
        .bind(mobile)
        .bind(email)
        .bind(password_hash)
        .bind(Role::User)
        .fetch_one(db)
        .await
    }

    /// Update the display name, returning the number of affected rows.
    pub async fn update_name(db: &PgPool, id: i64, name: &str) -> sqlx::Result<u64> {
        let result = sqlx::query("UPDATE users SET name = $1 WHERE id = $2")
            .bind(name)
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected())
    }

    /// Update the mobile number. Uniqueness is left to the store's
    /// constraint; a duplicate surfaces as a database error.
    pub async fn update_mobile(db: &PgPool, id: i64, mobile: &str) -> sqlx::Result<u64> {
        let result = sqlx::query("UPDATE users SET mobile_number = $1 WHERE id = $2")
            .bind(mobile)
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected())
    }

    /// Replace the stored password hash wholesale.
    pub async fn update_password_hash(db: &PgPool, id: i64, hash: &str) -> sqlx::Result<u64> {
        let result = sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
            .bind(hash)
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected())
    }
}
