//! Application services on top of the stores and ports.
pub mod checkout;
pub mod history;
pub mod profile;
pub mod submission;
pub mod tracking;

pub use checkout::CheckoutService;
pub use history::{OrderHistory, OrderHistoryView, OrderSummary};
pub use profile::{ProfileService, UserProfile};
pub use submission::{OrderSubmission, PendingOrder, SubmissionOptions, SubmissionOutcome};
pub use tracking::{order_lines, timeline, OrderLine, OrderTracking, TimelineEntry, TrackingState};
