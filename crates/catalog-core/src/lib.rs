pub mod errors;
pub mod ids;
pub mod platform;
pub mod records;
pub mod security;

pub use errors::PlatformError;
pub use ids::SessionToken;
pub use platform::{PlatformApi, PlatformFactory};
pub use records::{
    merge_catalog, CatalogEntry, EventType, ManagerNode, Named, PublisherRecord, SubscriberRecord,
};
pub use security::{AccessToken, Credentials};
