//! Waybill: delivery-tracking sub-record attached 1:1 to an invoice.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

const DEFAULT_DELIVERY_HOURS: i64 = 2;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Waybill {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub driver_name: String,
    pub material_type: Option<String>,
    pub vehicle_capacity: Option<String>,
    pub delivery_location: Option<String>,
    pub loading_at: DateTime<Utc>,
    pub unloading_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationUnit {
    Minutes,
    Hours,
    Days,
}

/// Waybill sub-request on invoice creation. A request with an empty driver
/// name fails the entire invoice.
#[derive(Debug, Clone, Deserialize)]
pub struct WaybillRequest {
    #[serde(default)]
    pub driver_name: String,
    #[serde(default)]
    pub material_type: Option<String>,
    #[serde(default)]
    pub vehicle_capacity: Option<String>,
    #[serde(default)]
    pub delivery_location: Option<String>,
    #[serde(default)]
    pub loading_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub delivery_duration: Option<i64>,
    #[serde(default)]
    pub duration_unit: Option<DurationUnit>,
}

impl WaybillRequest {
    /// Unloading time is derived from loading time plus the requested
    /// duration; 2 hours when unspecified.
    pub fn unloading_after(&self, loading_at: DateTime<Utc>) -> DateTime<Utc> {
        let duration = match (self.delivery_duration, self.duration_unit) {
            (Some(n), Some(DurationUnit::Minutes)) => Duration::minutes(n),
            (Some(n), Some(DurationUnit::Days)) => Duration::days(n),
            (Some(n), _) => Duration::hours(n),
            (None, _) => Duration::hours(DEFAULT_DELIVERY_HOURS),
        };
        loading_at + duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> WaybillRequest {
        WaybillRequest {
            driver_name: "Kumar".to_string(),
            material_type: None,
            vehicle_capacity: None,
            delivery_location: None,
            loading_at: None,
            delivery_duration: None,
            duration_unit: None,
        }
    }

    #[test]
    fn default_duration_is_two_hours() {
        let loading = Utc::now();
        assert_eq!(request().unloading_after(loading), loading + Duration::hours(2));
    }

    #[test]
    fn explicit_duration_in_minutes() {
        let loading = Utc::now();
        let mut req = request();
        req.delivery_duration = Some(45);
        req.duration_unit = Some(DurationUnit::Minutes);
        assert_eq!(req.unloading_after(loading), loading + Duration::minutes(45));
    }

    #[test]
    fn duration_without_unit_defaults_to_hours() {
        let loading = Utc::now();
        let mut req = request();
        req.delivery_duration = Some(3);
        assert_eq!(req.unloading_after(loading), loading + Duration::hours(3));
    }
}
