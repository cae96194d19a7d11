use sqlx::PgPool;

use crate::models::Purchase;

pub async fn create(
    pool: &PgPool,
    buyer_id: i64,
    dataset_id: i64,
    share_id: i64,
    amount: f64,
) -> sqlx::Result<Purchase> {
    sqlx::query_as::<_, Purchase>(
        r"insert into purchases (buyer_id, dataset_id, share_id, amount)
          values ($1, $2, $3, $4)
          returning id, buyer_id, dataset_id, share_id, amount, created_at",
    )
    .bind(buyer_id)
    .bind(dataset_id)
    .bind(share_id)
    .bind(amount)
    .fetch_one(pool)
    .await
}

pub async fn list_by_buyer(pool: &PgPool, buyer_id: i64) -> sqlx::Result<Vec<Purchase>> {
    sqlx::query_as::<_, Purchase>(
        r"select id, buyer_id, dataset_id, share_id, amount, created_at
          from purchases where buyer_id = $1 order by created_at desc",
    )
    .bind(buyer_id)
    .fetch_all(pool)
    .await
}
