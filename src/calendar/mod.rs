//! Calendar domain: events, day grouping, freshness tokens and export.

mod cache;
pub mod bucket;
pub mod day_map;
pub mod display;
pub mod freshness;
pub mod ics;
pub mod interval;
mod types;

pub use bucket::{bucket_by_day, DayBucketer, DayBuckets, DayStart};
pub use cache::EventSetKey;
pub use day_map::{DayKey, DayMap};
pub use display::DisplayEvent;
pub use freshness::{CacheControl, ConditionalResponse, Freshness};
pub use interval::DateInterval;
pub use types::{CalendarEvent, CalendarEventSet};
