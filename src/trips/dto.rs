use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::trips::repo::{NewTrip, Trip};

const TITLE_MAX_CHARS: usize = 1000;

fn default_preferences() -> Value {
    serde_json::json!({
        "travel_type": [],
        "accommodation_type": [],
        "interests": []
    })
}

/// Request body for trip creation. Presence is checked here so missing
/// fields come back as 400 with a message, not an extractor rejection.
#[derive(Debug, Deserialize)]
pub struct CreateTripRequest {
    pub title: Option<String>,
    pub destination: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub start_date: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub end_date: Option<OffsetDateTime>,
    pub budget: Option<Decimal>,
    pub description: Option<String>,
    pub itinerary: Option<Value>,
    pub is_public: Option<bool>,
    pub preferences: Option<Value>,
    pub generated_by_ai: Option<bool>,
}

impl CreateTripRequest {
    pub fn into_new_trip(self) -> Result<NewTrip, String> {
        let title = self
            .title
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string();
        if title.is_empty() {
            return Err("title is required".into());
        }
        if title.chars().count() > TITLE_MAX_CHARS {
            return Err("title must be between 1 and 1000 characters".into());
        }

        let destination = self
            .destination
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string();
        if destination.is_empty() {
            return Err("destination is required".into());
        }

        let start_date = self.start_date.ok_or("start_date is required")?;
        let end_date = self.end_date.ok_or("end_date is required")?;
        if end_date <= start_date {
            return Err("end_date must be after start_date".into());
        }

        let budget = self.budget.unwrap_or(Decimal::ZERO);
        if budget < Decimal::ZERO {
            return Err("budget must be non-negative".into());
        }

        Ok(NewTrip {
            title,
            destination,
            start_date,
            end_date,
            budget,
            description: self.description.unwrap_or_default(),
            itinerary: self.itinerary.unwrap_or_else(|| serde_json::json!([])),
            is_public: self.is_public.unwrap_or(false),
            preferences: self.preferences.unwrap_or_else(default_preferences),
            generated_by_ai: self.generated_by_ai.unwrap_or(false),
        })
    }
}

/// Partial update: every field optional, validated against the merged state.
#[derive(Debug, Deserialize)]
pub struct UpdateTripRequest {
    pub title: Option<String>,
    pub destination: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub start_date: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub end_date: Option<OffsetDateTime>,
    pub budget: Option<Decimal>,
    pub description: Option<String>,
    pub itinerary: Option<Value>,
    pub expenses: Option<Value>,
    pub photos: Option<Value>,
    pub is_public: Option<bool>,
    pub preferences: Option<Value>,
    pub generated_by_ai: Option<bool>,
}

impl UpdateTripRequest {
    pub fn apply(self, trip: &mut Trip) -> Result<(), String> {
        if let Some(title) = self.title {
            let title = title.trim();
            if title.is_empty() || title.chars().count() > TITLE_MAX_CHARS {
                return Err("title must be between 1 and 1000 characters".into());
            }
            trip.title = title.to_string();
        }
        if let Some(destination) = self.destination {
            let destination = destination.trim();
            if destination.is_empty() {
                return Err("destination must not be empty".into());
            }
            trip.destination = destination.to_string();
        }
        if let Some(start_date) = self.start_date {
            trip.start_date = start_date;
        }
        if let Some(end_date) = self.end_date {
            trip.end_date = end_date;
        }
        if trip.end_date <= trip.start_date {
            return Err("end_date must be after start_date".into());
        }
        if let Some(budget) = self.budget {
            if budget < Decimal::ZERO {
                return Err("budget must be non-negative".into());
            }
            trip.budget = budget;
        }
        if let Some(description) = self.description {
            trip.description = description;
        }
        if let Some(itinerary) = self.itinerary {
            trip.itinerary = itinerary;
        }
        if let Some(expenses) = self.expenses {
            trip.expenses = expenses;
        }
        if let Some(photos) = self.photos {
            trip.photos = photos;
        }
        if let Some(is_public) = self.is_public {
            trip.is_public = is_public;
        }
        if let Some(preferences) = self.preferences {
            trip.preferences = preferences;
        }
        if let Some(generated_by_ai) = self.generated_by_ai {
            trip.generated_by_ai = generated_by_ai;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct TripData {
    pub success: bool,
    pub data: Trip,
}

#[derive(Debug, Serialize)]
pub struct TripList {
    pub success: bool,
    pub count: usize,
    pub data: Vec<Trip>,
}

#[derive(Debug, Serialize)]
pub struct TripDeleted {
    pub success: bool,
    pub message: String,
}
