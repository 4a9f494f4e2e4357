//! Request handling: event lists for a date range and calendar export.

mod events;
mod export;
mod provider;

pub use events::{
  wrap_events, EventListController, EventListModel, EventListRequest, EventListResponse,
  IndexedEvent, RequestError, JSON_VIEW,
};
pub use export::{CalendarExport, ExportController, ExportError, EXPORT_FILENAME};
pub use provider::{AdapterEventProvider, EventProvider};
