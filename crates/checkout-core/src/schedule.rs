//! # Scheduling
//!
//! Order type, "now vs later" choice and the date/time slot selection for
//! scheduled orders. Dine-in always needs a slot; takeaway only when the
//! customer picks "later".

use crate::error::{CheckoutError, CheckoutResult};
use crate::ids::RestaurantId;
use crate::ports::CheckoutBackend;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

/// Shown when submission is attempted without a required time slot
pub const SELECT_TIME_SLOT_MESSAGE: &str = "Please select a time slot for your scheduled order.";

/// How the order is fulfilled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    #[default]
    Takeaway,
    DineIn,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Takeaway => "takeaway",
            OrderType::DineIn => "dine_in",
        }
    }
}

impl std::str::FromStr for OrderType {
    type Err = CheckoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "takeaway" | "pickup" => Ok(OrderType::Takeaway),
            "dine_in" | "dinein" | "dine-in" => Ok(OrderType::DineIn),
            other => Err(CheckoutError::validation(format!(
                "Unknown order type: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Takeaway timing choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScheduleChoice {
    #[default]
    Now,
    Later,
}

/// A bookable time within a day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    /// Wire value sent back as `scheduled_time`, e.g. "2025-10-14 18:30:00"
    pub value: String,
    /// Human label, e.g. "6:30 PM"
    pub display: String,
}

/// One day of availability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableDay {
    pub date_value: String,
    pub date_display: String,
    #[serde(default)]
    pub slots: Vec<TimeSlot>,
}

/// The customer's chosen slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSelection {
    pub date: String,
    pub time: String,
}

/// Resolves and tracks the scheduled-time selection for one checkout.
#[derive(Debug, Clone, Default)]
pub struct SchedulingResolver {
    order_type: OrderType,
    choice: ScheduleChoice,
    days: Vec<AvailableDay>,
    selected_date: Option<String>,
    selected_time: Option<String>,
    slots_error: Option<String>,
}

impl SchedulingResolver {
    pub fn new(order_type: OrderType) -> Self {
        Self {
            order_type,
            ..Self::default()
        }
    }

    pub fn order_type(&self) -> OrderType {
        self.order_type
    }

    pub fn choice(&self) -> ScheduleChoice {
        self.choice
    }

    /// True when the order must carry a scheduled time
    pub fn is_scheduling(&self) -> bool {
        self.order_type == OrderType::DineIn || self.choice == ScheduleChoice::Later
    }

    /// Switch order type; drops any loaded days and selection
    pub fn set_order_type(&mut self, order_type: OrderType) {
        self.order_type = order_type;
        self.days.clear();
        self.selected_date = None;
        self.selected_time = None;
        self.slots_error = None;
    }

    /// Choose "now" or "later" for takeaway
    pub fn set_choice(&mut self, choice: ScheduleChoice) {
        self.choice = choice;
        self.sync_selection();
    }

    fn sync_selection(&mut self) {
        if !self.is_scheduling() {
            self.selected_date = None;
            self.selected_time = None;
        } else if self.selected_date.is_none() {
            if let Some(first) = self.days.first() {
                self.selected_date = Some(first.date_value.clone());
            }
        }
    }

    /// Fetch availability from `reference_date` onwards.
    ///
    /// Does nothing (and returns no days) when scheduling is not active.
    /// A lookup failure leaves no days loaded and records `slots_error`.
    #[instrument(skip(self, backend))]
    pub async fn fetch_availability(
        &mut self,
        backend: &dyn CheckoutBackend,
        restaurant_id: RestaurantId,
        reference_date: NaiveDate,
    ) -> CheckoutResult<Vec<AvailableDay>> {
        if !self.is_scheduling() {
            return Ok(Vec::new());
        }

        self.slots_error = None;
        match backend.available_slots(restaurant_id, reference_date).await {
            Ok(days) => {
                self.load_days(days);
                Ok(self.days.clone())
            }
            Err(e) => {
                warn!(error = %e, "failed to fetch available slots");
                self.days.clear();
                self.selected_date = None;
                self.selected_time = None;
                self.slots_error = Some("Failed to load available slots".to_string());
                Err(e)
            }
        }
    }

    /// Replace the loaded days. Keeps the selected date only if it is
    /// still offered; otherwise re-selects the first day.
    pub fn load_days(&mut self, days: Vec<AvailableDay>) {
        self.days = days;
        let still_offered = self
            .selected_date
            .as_ref()
            .is_some_and(|d| self.days.iter().any(|day| &day.date_value == d));
        if !still_offered {
            self.selected_date = None;
            self.selected_time = None;
        }
        self.sync_selection();
    }

    pub fn days(&self) -> &[AvailableDay] {
        &self.days
    }

    /// True if at least one slot exists on any loaded day
    pub fn has_slots(&self) -> bool {
        self.days.iter().any(|d| !d.slots.is_empty())
    }

    pub fn slots_error(&self) -> Option<&str> {
        self.slots_error.as_deref()
    }

    pub fn selected_date(&self) -> Option<&str> {
        self.selected_date.as_deref()
    }

    pub fn selected_time(&self) -> Option<&str> {
        self.selected_time.as_deref()
    }

    /// Slots of the currently selected day
    pub fn slots_for_selected_day(&self) -> &[TimeSlot] {
        self.selected_date
            .as_ref()
            .and_then(|d| self.days.iter().find(|day| &day.date_value == d))
            .map(|day| day.slots.as_slice())
            .unwrap_or(&[])
    }

    /// Select a loaded day. Always clears the chosen time.
    pub fn select_date(&mut self, date_value: &str) -> CheckoutResult<()> {
        if !self.days.iter().any(|d| d.date_value == date_value) {
            return Err(CheckoutError::validation(format!(
                "No availability on {}",
                date_value
            )));
        }
        self.selected_date = Some(date_value.to_string());
        self.selected_time = None;
        Ok(())
    }

    /// Select a time from the selected day's slots
    pub fn select_time(&mut self, slot_value: &str) -> CheckoutResult<()> {
        if self.selected_date.is_none() {
            return Err(CheckoutError::validation("Please select a date first."));
        }
        if !self
            .slots_for_selected_day()
            .iter()
            .any(|s| s.value == slot_value)
        {
            return Err(CheckoutError::validation(format!(
                "{} is not an available time slot",
                slot_value
            )));
        }
        self.selected_time = Some(slot_value.to_string());
        Ok(())
    }

    pub fn clear_time(&mut self) {
        self.selected_time = None;
    }

    /// Complete selection, if any
    pub fn selection(&self) -> Option<ScheduleSelection> {
        match (&self.selected_date, &self.selected_time) {
            (Some(date), Some(time)) => Some(ScheduleSelection {
                date: date.clone(),
                time: time.clone(),
            }),
            _ => None,
        }
    }

    /// Value for the order's `scheduled_time`; `None` for "order now"
    pub fn scheduled_time(&self) -> Option<String> {
        if self.is_scheduling() {
            self.selected_time.clone()
        } else {
            None
        }
    }

    /// True while submission must stay disabled for lack of a time
    pub fn is_blocking(&self) -> bool {
        self.is_scheduling() && self.selected_time.is_none()
    }

    /// Validation gate used right before placing an order
    pub fn require_selection(&self) -> CheckoutResult<()> {
        if self.is_blocking() {
            return Err(CheckoutError::validation(SELECT_TIME_SLOT_MESSAGE));
        }
        Ok(())
    }
}
