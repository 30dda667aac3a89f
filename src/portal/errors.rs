//! Error types for portal automation.
//!
//! Every failure ultimately surfaces to the client as a human-readable
//! message, so the display strings here are part of the API contract.

#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    #[error("Login failed - wrong page")]
    LoginRejected,
    #[error("Could not find My Activities")]
    ActivitiesNotFound,
    #[error("Could not find My Attendance")]
    AttendanceLinkNotFound,
    #[error("Could not select year/semester")]
    SelectionFailed,
    #[error("No attendance data found")]
    NoData,
    #[error("Browser error: {0}")]
    WebDriver(#[from] thirtyfour::error::WebDriverError),
}
