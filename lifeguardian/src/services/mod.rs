//! Services module
//!
//! Business logic services that sit between callers and the [`Store`].
//! Each one wraps a single entity; the session wraps the signed-in identity.
//!
//! [`Store`]: crate::database::Store

pub mod auth;
pub mod check_ins;
pub mod contacts;
pub mod moods;
pub mod profile;
pub mod session;
pub mod settings;
pub mod will;

pub use auth::{AuthProvider, PhoneAuthService};
pub use check_ins::CheckInService;
pub use contacts::ContactService;
pub use moods::MoodService;
pub use profile::ProfileService;
pub use session::{Session, SessionState, SessionStore};
pub use settings::{EmailTemplate, SettingsService};
pub use will::WillService;
