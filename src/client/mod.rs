//! Client side: the API seam, the in-process client and the `UserState` cache.

pub mod api;
pub mod local;
pub mod notify;
pub mod optimistic;
pub mod prefs;
pub mod state;

pub use api::{ApiClient, ApiResult, EmptyResponse, ResponseStatus};
pub use local::LocalApiClient;
pub use prefs::{AppPrefs, JsonFileStorage, MemoryPrefsStorage, PrefsStorage};
pub use state::{UserState, CREATIVE_HISTORY_TAKE};
