use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    /// The project manager this project reports to. Embedded in
    /// admin-level responses.
    pub referring_employee_id: Uuid,
}
