//! Database layer (Firestore).

pub mod firestore;

pub use firestore::FirestoreDb;

/// Collection names as constants.
pub mod collections {
    pub const REPORTS: &str = "reports";
    pub const SPORTS: &str = "sports";
    pub const HEALTHCARE_PROVIDERS: &str = "healthcare_providers";
    /// One document per authenticated request
    pub const USER_ACTIVITY: &str = "user_activity";
}
