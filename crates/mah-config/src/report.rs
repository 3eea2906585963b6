//! Report policy: which message categories are pushed to webhooks, and where.

use mah_core::{Destinations, MessageCategory};

use crate::schema::{ExtraMap, Report, Reportable};

impl Report {
    /// Toggle for a single category.
    pub fn reportable(&self, category: MessageCategory) -> Reportable {
        match category {
            MessageCategory::Group => self.group_message,
            MessageCategory::Friend => self.friend_message,
            MessageCategory::Temp => self.temp_message,
            MessageCategory::Event => self.event_message,
        }
    }

    /// Whether traffic of `category` should be delivered.
    ///
    /// The master `enable` switch wins over every per-category flag.
    pub fn should_report(&self, category: MessageCategory) -> bool {
        self.enable && self.reportable(category).report
    }

    /// Destinations and extra headers, exactly as configured.
    ///
    /// An empty destination list means there is nothing to deliver to.
    pub fn delivery_targets(&self) -> (&Destinations, &ExtraMap) {
        (&self.destinations, &self.extra_headers)
    }

    /// Enabled with at least one destination, i.e. reporting has an effect.
    pub fn is_effective(&self) -> bool {
        self.enable && !self.destinations.is_empty()
    }
}
