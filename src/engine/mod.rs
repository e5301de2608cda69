//! Update decision engine
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌──────────────┐
//! │   Oracle    │────▶│   Engine    │────▶│   Fan-out    │
//! │ (analysis)  │     │ (decide)    │     │  (digests)   │
//! └─────────────┘     └─────────────┘     └──────────────┘
//!                            │
//!                            ▼
//!                     ┌─────────────┐
//!                     │    Store    │
//!                     │ (caches)    │
//!                     └─────────────┘
//! ```
//!
//! - [`decision`]: released-path decisions and the library registry check
//! - [`future`]: lifecycle of not-yet-released updates
//! - [`events`]: tagged outcome and event payload types

pub mod decision;
pub mod events;
mod future;

pub use decision::{CheckRequest, DecisionEngine, LibraryCheck};
pub use events::{
    ConfidenceEvent, FutureEvent, Outcome, ReleasedEvent, SuppressReason, UpdateEvent,
};
