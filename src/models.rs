//! Appointment domain types

use serde::{Deserialize, Serialize};

/// Prefix of locally generated, not yet committed appointment ids.
pub const TENTATIVE_ID_PREFIX: &str = "temp-";

/// A single appointment as held by caches, local views and the repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentRecord {
    pub id: String,
    /// Calendar date, e.g. `2024-05-01`.
    pub date: String,
    /// Slot start, e.g. `10:00`.
    pub time: String,
    pub barber_id: String,
    /// Account that booked, when known. Keys the per-user cache.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub client_name: String,
    pub service_name: String,
    /// Price in minor currency units.
    pub price: u64,
    #[serde(default)]
    pub is_cancelled: bool,
    #[serde(default)]
    pub is_removed: bool,
}

impl AppointmentRecord {
    /// Build a live record from a booking request.
    pub fn from_request(id: impl Into<String>, request: &BookingRequest) -> Self {
        Self {
            id: id.into(),
            date: request.date.clone(),
            time: request.time.clone(),
            barber_id: request.barber_id.clone(),
            user_id: request.user_id.clone(),
            client_name: request.client_name.clone(),
            service_name: request.service_name.clone(),
            price: request.price,
            is_cancelled: false,
            is_removed: false,
        }
    }

    /// Whether the id is a local placeholder awaiting a server id.
    #[must_use]
    pub fn is_tentative(&self) -> bool {
        self.id.starts_with(TENTATIVE_ID_PREFIX)
    }

    /// Whether the record still occupies its slot.
    #[must_use]
    pub fn is_live(&self) -> bool {
        !self.is_cancelled && !self.is_removed
    }

    pub fn slot(&self) -> Slot {
        Slot::new(&self.date, &self.time, &self.barber_id)
    }
}

/// The `(date, time, barber)` triple two bookings compete for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub date: String,
    pub time: String,
    pub barber_id: String,
}

impl Slot {
    pub fn new(date: &str, time: &str, barber_id: &str) -> Self {
        Self {
            date: date.to_string(),
            time: time.to_string(),
            barber_id: barber_id.to_string(),
        }
    }

    /// True when `record` is live and sits on this slot.
    #[must_use]
    pub fn occupied_by(&self, record: &AppointmentRecord) -> bool {
        record.is_live()
            && record.date == self.date
            && record.time == self.time
            && record.barber_id == self.barber_id
    }

    /// First record in `records` occupying this slot.
    pub fn find_conflict<'a>(&self, records: &'a [AppointmentRecord]) -> Option<&'a AppointmentRecord> {
        records.iter().find(|record| self.occupied_by(record))
    }
}

/// Data needed to create an appointment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub date: String,
    pub time: String,
    pub barber_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub client_name: String,
    pub service_name: String,
    pub price: u64,
}

impl BookingRequest {
    pub fn slot(&self) -> Slot {
        Slot::new(&self.date, &self.time, &self.barber_id)
    }
}

/// Partial update applied through the repository.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_cancelled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_removed: Option<bool>,
}

impl AppointmentPatch {
    pub fn cancel() -> Self {
        Self {
            is_cancelled: Some(true),
            ..Self::default()
        }
    }

    pub fn apply(&self, record: &mut AppointmentRecord) {
        if let Some(date) = &self.date {
            record.date.clone_from(date);
        }
        if let Some(time) = &self.time {
            record.time.clone_from(time);
        }
        if let Some(cancelled) = self.is_cancelled {
            record.is_cancelled = cancelled;
        }
        if let Some(removed) = self.is_removed {
            record.is_removed = removed;
        }
    }
}

/// Selection passed to `find_all`; also determines the logical cache key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barber_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl AppointmentFilter {
    /// Every appointment of the tenant.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn barber(barber_id: impl Into<String>) -> Self {
        Self {
            barber_id: Some(barber_id.into()),
            ..Self::default()
        }
    }

    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn on(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    /// Logical (un-prefixed) cache key for this selection.
    ///
    /// `appointments:all`, `appointments:barberId=X`, `appointments:userId=Y`,
    /// with `&date=D` appended when a date is set.
    pub fn cache_key(&self) -> String {
        let mut parts = Vec::with_capacity(3);
        if let Some(barber_id) = &self.barber_id {
            parts.push(format!("barberId={barber_id}"));
        }
        if let Some(user_id) = &self.user_id {
            parts.push(format!("userId={user_id}"));
        }
        if let Some(date) = &self.date {
            parts.push(format!("date={date}"));
        }
        if parts.is_empty() {
            "appointments:all".to_string()
        } else {
            format!("appointments:{}", parts.join("&"))
        }
    }

    pub fn matches(&self, record: &AppointmentRecord) -> bool {
        self.barber_id.as_ref().is_none_or(|b| *b == record.barber_id)
            && self
                .user_id
                .as_ref()
                .is_none_or(|u| record.user_id.as_ref() == Some(u))
            && self.date.as_ref().is_none_or(|d| *d == record.date)
    }
}
