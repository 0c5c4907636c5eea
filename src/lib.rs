//! `marvin-http` is an async HTTP client for the Amazing Marvin API.
//!
//! Every call goes through [`RequestExecutor`], which applies a per-attempt
//! timeout, retries server errors, rate limits and transport faults with
//! exponential backoff (or the server's `Retry-After`), and reports any
//! failure as a uniform [`ApiError`].
//!
//! [`MarvinClient`] adds typed endpoint methods on top:
//! - [`MarvinClient::today_items`]
//! - [`MarvinClient::add_task`]
//! - [`MarvinClient::mark_done`]

mod client;
mod error;
mod executor;
mod options;
mod retry;
mod transport;
mod types;
mod wire;

pub use client::{endpoint_with_query, MarvinClient, DEFAULT_BASE_URL, FULL_ACCESS_TOKEN_HEADER};
pub use error::{ApiError, MarvinError, TransportError};
pub use executor::{parse_json, parse_text, ApiRequest, RequestExecutor, API_TOKEN_HEADER};
pub use options::ClientOptions;
pub use retry::{backoff_delay_ms, parse_retry_after, Sleeper, TokioSleeper};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
pub use types::{
    Category, Extra, Goal, Habit, Kudos, Label, Profile, Reminder, Task, TimeBlock, TrackResult,
    TrackedItem,
};
pub use wire::{HabitUpdate, NewProject, NewTask};

pub type Result<T> = std::result::Result<T, MarvinError>;
