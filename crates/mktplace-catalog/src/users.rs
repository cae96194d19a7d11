use sqlx::PgPool;

use crate::models::User;

/// Insert a newly registered user; `hashed_password` is already an argon2
/// hash by the time it reaches this layer.
pub async fn create(
    pool: &PgPool,
    email: &str,
    hashed_password: &str,
    role: &str,
) -> sqlx::Result<User> {
    sqlx::query_as::<_, User>(
        r"insert into users (email, hashed_password, role)
          values ($1, $2, $3)
          returning id, email, hashed_password, role, created_at, delta_sharing_server_url",
    )
    .bind(email)
    .bind(hashed_password)
    .bind(role)
    .fetch_one(pool)
    .await
}

pub async fn find_by_email(pool: &PgPool, email: &str) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>(
        r"select id, email, hashed_password, role, created_at, delta_sharing_server_url
          from users where email = $1",
    )
    .bind(email)
    .fetch_optional(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>(
        r"select id, email, hashed_password, role, created_at, delta_sharing_server_url
          from users where id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn set_delta_sharing_server_url(
    pool: &PgPool,
    user_id: i64,
    url: &str,
) -> sqlx::Result<()> {
    sqlx::query("update users set delta_sharing_server_url = $2 where id = $1")
        .bind(user_id)
        .bind(url)
        .execute(pool)
        .await?;
    Ok(())
}
