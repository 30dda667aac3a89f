//! IMS portal automation: login, frameset navigation, and table extraction.

pub mod browser;
pub mod errors;
pub mod extract;
pub mod navigate;

pub use browser::{CaptchaChallenge, begin_login};
pub use errors::PortalError;
pub use extract::AttendanceRecord;
pub use navigate::scrape_attendance;
