// SQLite DoctorRegistry Implementation
//
// Read path for the engine; the upsert helper exists for seeding and for
// the admin surface that owns doctor state.

use async_trait::async_trait;
use medq_core::domain::DoctorId;
use medq_core::error::Result;
use medq_core::port::{Doctor, DoctorRegistry};
use sqlx::SqlitePool;

use crate::queue_store::map_sqlx_error;

pub struct SqliteDoctorRegistry {
    pool: SqlitePool,
}

impl SqliteDoctorRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or update one doctor row (seeding / admin path)
    pub async fn upsert_doctor(
        &self,
        doctor: &Doctor,
        full_name: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO doctors (id, full_name, on_duty, capacity, avg_service_secs)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                full_name = excluded.full_name,
                on_duty = excluded.on_duty,
                capacity = excluded.capacity,
                avg_service_secs = excluded.avg_service_secs
            "#,
        )
        .bind(&doctor.id)
        .bind(full_name)
        .bind(if doctor.on_duty { 1 } else { 0 })
        .bind(doctor.capacity as i64)
        .bind(doctor.avg_service_secs.map(|s| s as i64))
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }
}

#[async_trait]
impl DoctorRegistry for SqliteDoctorRegistry {
    async fn get_doctor(&self, doctor_id: &str) -> Result<Option<Doctor>> {
        let row: Option<DoctorRow> = sqlx::query_as("SELECT * FROM doctors WHERE id = ?")
            .bind(doctor_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(|r| r.into_doctor()))
    }

    async fn list_on_duty(&self) -> Result<Vec<DoctorId>> {
        let ids: Vec<String> =
            sqlx::query_scalar("SELECT id FROM doctors WHERE on_duty = 1 ORDER BY id ASC")
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        Ok(ids)
    }
}

/// SQLite row representation of a doctor
#[derive(Debug, sqlx::FromRow)]
struct DoctorRow {
    id: String,
    #[allow(dead_code)]
    full_name: Option<String>,
    on_duty: i64, // SQLite boolean as integer
    capacity: i64,
    avg_service_secs: Option<i64>,
}

impl DoctorRow {
    fn into_doctor(self) -> Doctor {
        Doctor {
            id: self.id,
            on_duty: self.on_duty != 0,
            capacity: self.capacity.max(1) as u32,
            avg_service_secs: self.avg_service_secs.map(|s| s.max(0) as u32),
        }
    }
}
