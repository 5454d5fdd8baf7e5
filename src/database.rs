use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database query failed: {0}")]
    Query(#[from] sqlx::Error),
    #[error("{0}")]
    NotFound(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Favorite {
    pub id: i64,
    pub city: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFavorite {
    pub city: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

/// SQLite-backed list of favorite cities.
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init_tables(&self) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS favorites (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                city TEXT NOT NULL,
                lat REAL,
                lon REAL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_favorites_city ON favorites(city COLLATE NOCASE)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Insert a favorite, or return the existing one for the same city (case-insensitive).
    pub async fn create_favorite(&self, favorite: CreateFavorite) -> Result<Favorite, DatabaseError> {
        let existing = sqlx::query_as::<_, Favorite>(
            "SELECT * FROM favorites WHERE city = $1 COLLATE NOCASE ORDER BY id LIMIT 1",
        )
        .bind(&favorite.city)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(existing) = existing {
            tracing::debug!(id = existing.id, city = %existing.city, "Favorite already stored");
            return Ok(existing);
        }

        let result = sqlx::query_as::<_, Favorite>(
            r#"
            INSERT INTO favorites (city, lat, lon, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&favorite.city)
        .bind(favorite.lat)
        .bind(favorite.lon)
        .bind(chrono::Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(result)
    }

    /// Newest first.
    pub async fn list_favorites(&self) -> Result<Vec<Favorite>, DatabaseError> {
        let favorites = sqlx::query_as::<_, Favorite>(
            "SELECT * FROM favorites ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(favorites)
    }

    pub async fn delete_favorite(&self, id: i64) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM favorites WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound("Favorite not found".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) async fn memory_database() -> Database {
    // One connection: every new connection to :memory: is a separate empty database.
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let database = Database::new(pool);
    database.init_tables().await.unwrap();
    database
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_favorite(city: &str) -> CreateFavorite {
        CreateFavorite {
            city: city.to_string(),
            lat: Some(41.69),
            lon: Some(44.8),
        }
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let db = memory_database().await;

        let tbilisi = db.create_favorite(new_favorite("Tbilisi")).await.unwrap();
        let batumi = db.create_favorite(new_favorite("Batumi")).await.unwrap();
        assert_eq!(tbilisi.city, "Tbilisi");
        assert_eq!(tbilisi.lat, Some(41.69));

        let favorites = db.list_favorites().await.unwrap();
        assert_eq!(favorites.len(), 2);
        assert_eq!(favorites[0].id, batumi.id);
        assert_eq!(favorites[1].id, tbilisi.id);
    }

    #[tokio::test]
    async fn test_duplicate_city_returns_existing() {
        let db = memory_database().await;

        let first = db.create_favorite(new_favorite("Tbilisi")).await.unwrap();
        let second = db.create_favorite(new_favorite("TBILISI")).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(db.list_favorites().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let db = memory_database().await;
        let favorite = db.create_favorite(new_favorite("Kutaisi")).await.unwrap();

        db.delete_favorite(favorite.id).await.unwrap();
        assert!(db.list_favorites().await.unwrap().is_empty());

        let err = db.delete_favorite(favorite.id).await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound(_)));
    }
}
