// Doctor Registry Port (Interface)
//
// The engine only reads doctor state; availability and capacity are owned
// by the surrounding application.

use crate::domain::DoctorId;
use crate::error::Result;
use async_trait::async_trait;

/// Live view of one doctor as the registry reports it
#[derive(Debug, Clone)]
pub struct Doctor {
    pub id: DoctorId,
    pub on_duty: bool,
    /// Number of patients the doctor may have in service at once
    pub capacity: u32,
    /// Average consultation length, if any history exists
    pub avg_service_secs: Option<u32>,
}

/// Read-only interface to the external doctor directory
#[async_trait]
pub trait DoctorRegistry: Send + Sync {
    /// Look up a doctor; `None` means the registry has never heard of them
    async fn get_doctor(&self, doctor_id: &str) -> Result<Option<Doctor>>;

    /// All doctors currently on duty
    async fn list_on_duty(&self) -> Result<Vec<DoctorId>>;
}
